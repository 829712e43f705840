use std::collections::BTreeMap;
use std::sync::Arc;

use column_batch::RowSet;
use output_contract::OutputPattern;
use plan::ParamValue;

use crate::context::ExecContext;
use crate::param::{ParamField, ParamKind};
use crate::registry::TaskSpec;
use crate::task_impl::{TaskError, TaskImpl};

/// `sort_by{order}`: reorders `inputs[0]`'s active rows to the
/// caller-supplied permutation — a reference fixture standing in for a
/// real expression-driven sort, which would evaluate an `expr_table`
/// entry per row instead of taking the new order explicitly.
#[derive(Debug)]
pub struct SortBy;

impl TaskImpl for SortBy {
    fn run(
        &self,
        inputs: &[RowSet],
        params: &BTreeMap<String, ParamValue>,
        _ctx: &ExecContext<'_>,
    ) -> Result<RowSet, TaskError> {
        let input = inputs.first().ok_or(TaskError::MissingInput { index: 0 })?;
        let order: Vec<u32> = params
            .get("order")
            .and_then(|v| match v {
                ParamValue::List(items) => Some(items),
                _ => None,
            })
            .ok_or_else(|| TaskError::failed("order must be a list of row indices"))?
            .iter()
            .filter_map(ParamValue::as_i64)
            .map(|i| i as u32)
            .collect();

        RowSet::with_selection(Arc::clone(input.batch()), order).map_err(|e| TaskError::failed(e.to_string()))
    }
}

pub fn spec() -> TaskSpec {
    TaskSpec {
        op: "sort_by",
        params: vec![ParamField::required("order", ParamKind::List)],
        reads: vec![],
        writes: vec![],
        output_pattern: OutputPattern::PermutationOfInput,
        writes_effect: None,
        is_io: false,
        task: Arc::new(SortBy),
    }
}
