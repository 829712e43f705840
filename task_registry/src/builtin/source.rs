use std::collections::BTreeMap;
use std::sync::Arc;

use column_batch::{ColumnBatch, RowSet};
use output_contract::OutputPattern;
use plan::ParamValue;

use crate::context::ExecContext;
use crate::param::{ParamField, ParamKind};
use crate::registry::TaskSpec;
use crate::task_impl::{TaskError, TaskImpl};

/// `source{fanout}`: produces `fanout` rows with ids `0..fanout`,
/// dense, no further columns — the plan-entry fixture used throughout
/// §8.4's scenarios.
#[derive(Debug)]
pub struct Source;

impl TaskImpl for Source {
    fn run(
        &self,
        _inputs: &[RowSet],
        params: &BTreeMap<String, ParamValue>,
        _ctx: &ExecContext<'_>,
    ) -> Result<RowSet, TaskError> {
        let fanout = params
            .get("fanout")
            .and_then(ParamValue::as_usize)
            .ok_or_else(|| TaskError::failed("fanout must be a non-negative integer"))?;

        let ids: Vec<i64> = (0..fanout as i64).collect();
        let valid = vec![true; fanout];
        let batch = ColumnBatch::new(ids, valid).map_err(|e| TaskError::failed(e.to_string()))?;
        Ok(RowSet::new(Arc::new(batch)))
    }
}

pub fn spec() -> TaskSpec {
    TaskSpec {
        op: "source",
        params: vec![ParamField::required("fanout", ParamKind::Int)],
        reads: vec![],
        writes: vec![],
        output_pattern: OutputPattern::SourceFanoutDense,
        writes_effect: None,
        is_io: false,
        task: Arc::new(Source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ExecContext<'static> {
        ExecContext {
            node_id: "n",
            op: "source",
            user_id: plan::UserId::new(1).unwrap(),
            request_id: "r",
            node_refs: Default::default(),
            deadline: None,
        }
    }

    #[test]
    fn produces_dense_fanout_rows() {
        let mut params = BTreeMap::new();
        params.insert("fanout".to_string(), ParamValue::Int(5));
        let out = Source.run(&[], &params, &ctx()).unwrap();
        assert_eq!(out.logical_size(), 5);
        assert_eq!(out.active_rows(), vec![0, 1, 2, 3, 4]);
    }
}
