use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use column_batch::RowSet;
use output_contract::OutputPattern;
use plan::ParamValue;

use crate::context::ExecContext;
use crate::param::{ParamField, ParamKind};
use crate::registry::TaskSpec;
use crate::task_impl::{TaskError, TaskImpl};

/// `stable_filter{keep}`: keeps only the active rows of `inputs[0]`
/// whose raw row index appears in `keep`, preserving input order — a
/// reference fixture standing in for a real predicate-driven filter,
/// which would evaluate `pred_table` entries row by row instead of
/// taking an explicit index list.
#[derive(Debug)]
pub struct StableFilter;

impl TaskImpl for StableFilter {
    fn run(
        &self,
        inputs: &[RowSet],
        params: &BTreeMap<String, ParamValue>,
        _ctx: &ExecContext<'_>,
    ) -> Result<RowSet, TaskError> {
        let input = inputs.first().ok_or(TaskError::MissingInput { index: 0 })?;
        let keep: HashSet<u32> = params
            .get("keep")
            .and_then(|v| match v {
                ParamValue::List(items) => Some(items),
                _ => None,
            })
            .ok_or_else(|| TaskError::failed("keep must be a list of row indices"))?
            .iter()
            .filter_map(ParamValue::as_i64)
            .map(|i| i as u32)
            .collect();

        let retained: Vec<u32> = input.active_rows().into_iter().filter(|r| keep.contains(r)).collect();

        RowSet::with_selection(Arc::clone(input.batch()), retained).map_err(|e| TaskError::failed(e.to_string()))
    }
}

pub fn spec() -> TaskSpec {
    TaskSpec {
        op: "stable_filter",
        params: vec![ParamField::required("keep", ParamKind::List)],
        reads: vec![],
        writes: vec![],
        output_pattern: OutputPattern::StableFilter,
        writes_effect: None,
        is_io: false,
        task: Arc::new(StableFilter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use column_batch::ColumnBatch;

    fn ctx() -> ExecContext<'static> {
        ExecContext {
            node_id: "n",
            op: "stable_filter",
            user_id: plan::UserId::new(1).unwrap(),
            request_id: "r",
            node_refs: Default::default(),
            deadline: None,
        }
    }

    fn base(n: usize) -> Arc<ColumnBatch> {
        Arc::new(ColumnBatch::new((0..n as i64).collect(), vec![true; n]).unwrap())
    }

    #[test]
    fn keeps_only_listed_rows_in_input_order() {
        let input = RowSet::with_selection(base(5), vec![4, 3, 2, 1, 0]).unwrap();
        let mut params = BTreeMap::new();
        params.insert(
            "keep".to_string(),
            ParamValue::List(vec![ParamValue::Int(1), ParamValue::Int(3)]),
        );
        let out = StableFilter.run(&[input], &params, &ctx()).unwrap();
        assert_eq!(out.active_rows(), vec![3, 1]);
    }
}
