use std::collections::BTreeMap;
use std::sync::Arc;

use column_batch::RowSet;
use output_contract::OutputPattern;
use plan::ParamValue;

use crate::context::ExecContext;
use crate::param::{ParamField, ParamKind};
use crate::registry::TaskSpec;
use crate::task_impl::{TaskError, TaskImpl};

/// `take{count}`: keeps the first `min(count, |active|)` active rows
/// of `inputs[0]`, in order.
#[derive(Debug)]
pub struct Take;

impl TaskImpl for Take {
    fn run(
        &self,
        inputs: &[RowSet],
        params: &BTreeMap<String, ParamValue>,
        _ctx: &ExecContext<'_>,
    ) -> Result<RowSet, TaskError> {
        let input = inputs.first().ok_or(TaskError::MissingInput { index: 0 })?;
        let count = params
            .get("count")
            .and_then(ParamValue::as_usize)
            .ok_or_else(|| TaskError::failed("count must be a non-negative integer"))?;

        let active = input.active_rows();
        let prefix_len = count.min(active.len());
        let prefix = active[..prefix_len].to_vec();

        RowSet::with_selection(Arc::clone(input.batch()), prefix).map_err(|e| TaskError::failed(e.to_string()))
    }
}

pub fn spec() -> TaskSpec {
    TaskSpec {
        op: "take",
        params: vec![ParamField::required("count", ParamKind::Int)],
        reads: vec![],
        writes: vec![],
        output_pattern: OutputPattern::PrefixOfInput,
        writes_effect: None,
        is_io: false,
        task: Arc::new(Take),
    }
}
