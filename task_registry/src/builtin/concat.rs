use std::collections::BTreeMap;
use std::sync::Arc;

use column_batch::{ColumnBatch, RowSet};
use output_contract::OutputPattern;
use plan::ParamValue;

use crate::context::ExecContext;
use crate::registry::TaskSpec;
use crate::task_impl::{TaskError, TaskImpl};

/// `concat`: stacks `inputs[0]`'s active rows followed by `inputs[1]`'s
/// active rows into a fresh dense batch. Only the id column carries
/// over; this is a reference fixture, not a general-purpose merge.
#[derive(Debug)]
pub struct Concat;

impl TaskImpl for Concat {
    fn run(
        &self,
        inputs: &[RowSet],
        _params: &BTreeMap<String, ParamValue>,
        _ctx: &ExecContext<'_>,
    ) -> Result<RowSet, TaskError> {
        let left = inputs.first().ok_or(TaskError::MissingInput { index: 0 })?;
        let right = inputs.get(1).ok_or(TaskError::MissingInput { index: 1 })?;

        let mut ids = Vec::with_capacity(left.logical_size() + right.logical_size());
        let mut valid = Vec::with_capacity(ids.capacity());
        for side in [left, right] {
            let id_col = side.batch().id();
            for row in side.active_rows() {
                ids.push(id_col.values[row as usize]);
                valid.push(id_col.valid[row as usize]);
            }
        }

        let batch = ColumnBatch::new(ids, valid).map_err(|e| TaskError::failed(e.to_string()))?;
        Ok(RowSet::new(Arc::new(batch)))
    }
}

pub fn spec() -> TaskSpec {
    TaskSpec {
        op: "concat",
        params: vec![],
        reads: vec![],
        writes: vec![],
        output_pattern: OutputPattern::ConcatDense,
        writes_effect: None,
        is_io: false,
        task: Arc::new(Concat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ExecContext<'static> {
        ExecContext {
            node_id: "n",
            op: "concat",
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
    fn concatenates_active_rows_in_order() {
        let left = RowSet::with_selection(base(3), vec![2, 0]).unwrap();
        let right = RowSet::new(base(2));
        let out = Concat.run(&[left, right], &BTreeMap::new(), &ctx()).unwrap();
        assert_eq!(out.row_count(), 4);
        assert_eq!(out.batch().id().values, vec![2, 0, 0, 1]);
    }
}
