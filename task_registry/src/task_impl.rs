use std::collections::BTreeMap;

use async_trait::async_trait;
use column_batch::RowSet;
use plan::ParamValue;

use crate::context::{AsyncExecContext, ExecContext};

#[derive(Debug, snafu::Snafu)]
pub enum TaskError {
    #[snafu(display("{message}"))]
    Failed { message: String },
    #[snafu(display("this task has no native async implementation"))]
    AsyncNotSupported,
    #[snafu(display("required input row-set missing at index {index}"))]
    MissingInput { index: usize },
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed { message: message.into() }
    }
}

/// A task kind's behaviour: §3.4's `run` (sync) and optional
/// `run_async` (awaitable).
///
/// `dag_scheduler`'s node pipeline (§4.7.3 step 5) calls `run_async`
/// directly when `supports_async()` is true (native I/O tasks); for
/// everything else it offloads `run` to the CPU pool via
/// `executor::DedicatedExecutor`.
#[async_trait]
pub trait TaskImpl: std::fmt::Debug + Send + Sync {
    /// Run synchronously. Called from a CPU-pool worker thread for
    /// every task whose `supports_async()` is false.
    fn run(
        &self,
        inputs: &[RowSet],
        params: &BTreeMap<String, ParamValue>,
        ctx: &ExecContext<'_>,
    ) -> Result<RowSet, TaskError>;

    /// True for tasks with a native async implementation (typically
    /// I/O-bound ones). Default: false, meaning `run` is always
    /// offloaded.
    fn supports_async(&self) -> bool {
        false
    }

    /// Run natively on the event loop, suspending at I/O/timer
    /// boundaries instead of blocking a CPU-pool thread. Only called
    /// when `supports_async()` is true.
    async fn run_async(
        &self,
        _inputs: &[RowSet],
        _params: &BTreeMap<String, ParamValue>,
        _ctx: &AsyncExecContext<'_>,
    ) -> Result<RowSet, TaskError> {
        Err(TaskError::AsyncNotSupported)
    }
}
