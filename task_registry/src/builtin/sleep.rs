use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use column_batch::RowSet;
use output_contract::OutputPattern;
use plan::ParamValue;

use crate::context::{AsyncExecContext, ExecContext};
use crate::param::{ParamField, ParamKind};
use crate::registry::TaskSpec;
use crate::task_impl::{TaskError, TaskImpl};

/// `sleep{ms}`: an I/O-bound reference fixture with no sync
/// implementation at all — it waits on the event loop's own timer and
/// hands its input back untouched, the way §4's "branch that just
/// waits" scenarios need.
#[derive(Debug)]
pub struct Sleep;

#[async_trait]
impl TaskImpl for Sleep {
    fn run(
        &self,
        _inputs: &[RowSet],
        _params: &BTreeMap<String, ParamValue>,
        _ctx: &ExecContext<'_>,
    ) -> Result<RowSet, TaskError> {
        Err(TaskError::AsyncNotSupported)
    }

    fn supports_async(&self) -> bool {
        true
    }

    async fn run_async(
        &self,
        inputs: &[RowSet],
        params: &BTreeMap<String, ParamValue>,
        _ctx: &AsyncExecContext<'_>,
    ) -> Result<RowSet, TaskError> {
        let input = inputs.first().ok_or(TaskError::MissingInput { index: 0 })?;
        let ms = params
            .get("ms")
            .and_then(ParamValue::as_usize)
            .ok_or_else(|| TaskError::failed("ms must be a non-negative integer"))?;

        tokio::time::sleep(std::time::Duration::from_millis(ms as u64)).await;
        Ok(input.clone())
    }
}

pub fn spec() -> TaskSpec {
    TaskSpec {
        op: "sleep",
        params: vec![ParamField::required("ms", ParamKind::Int)],
        reads: vec![],
        writes: vec![],
        output_pattern: OutputPattern::UnaryPreserveView,
        writes_effect: None,
        is_io: true,
        task: Arc::new(Sleep),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_cache::ClientCache;
    use column_batch::ColumnBatch;
    use plan::EndpointRegistry;

    fn ctx<'a>(clients: &'a Arc<ClientCache>) -> AsyncExecContext<'a> {
        AsyncExecContext {
            base: ExecContext {
                node_id: "n",
                op: "sleep",
                user_id: plan::UserId::new(1).unwrap(),
                request_id: "r",
                node_refs: Default::default(),
                deadline: None,
            },
            clients,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn passes_input_through_unchanged_after_waiting() {
        let batch = Arc::new(ColumnBatch::new(vec![1, 2], vec![true, true]).unwrap());
        let input = RowSet::new(Arc::clone(&batch));
        let mut params = BTreeMap::new();
        params.insert("ms".to_string(), ParamValue::Int(50));

        let clients = Arc::new(ClientCache::new(EndpointRegistry::from_specs(vec![])));
        let out = Sleep
            .run_async(&[input.clone()], &params, &ctx(&clients))
            .await
            .unwrap();
        assert_eq!(out.active_rows(), input.active_rows());
        assert!(out.is_same_batch(&input));
    }

    #[test]
    fn sync_run_is_unsupported() {
        let ctx_sync = ExecContext {
            node_id: "n",
            op: "sleep",
            user_id: plan::UserId::new(1).unwrap(),
            request_id: "r",
            node_refs: Default::default(),
            deadline: None,
        };
        let err = Sleep.run(&[], &BTreeMap::new(), &ctx_sync);
        assert!(matches!(err, Err(TaskError::AsyncNotSupported)));
    }
}
