//! Component C: CPU offload.
//!
//! Pure-CPU work (e.g. dictionary-encoding a large string column, or
//! evaluating a heavy predicate) must not run on the event-loop
//! thread, or it blocks every other node's I/O callbacks. The
//! original `OffloadCpu` awaitable posted the work to a libuv
//! thread-pool and resumed the coroutine via a `Post` back to the
//! loop. In Tokio the equivalent is a second, dedicated multi-thread
//! runtime: `spawn_blocking` onto it and `.await` the `JoinHandle` —
//! the executor's own waker takes care of resuming the awaiting task
//! on whichever thread polls it next, so there is no manual
//! repost step.
use std::fmt;

use observability_deps::tracing::warn;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinError;

/// Error produced by a CPU-offloaded closure.
#[derive(Debug, snafu::Snafu)]
pub enum OffloadError {
    #[snafu(display("offloaded work panicked"))]
    Panicked,
    #[snafu(display("offloaded work was cancelled"))]
    Cancelled,
}

impl From<JoinError> for OffloadError {
    fn from(err: JoinError) -> Self {
        if err.is_panic() {
            Self::Panicked
        } else {
            Self::Cancelled
        }
    }
}

/// A dedicated pool of OS threads used to run CPU-bound closures off
/// the event-loop thread.
pub struct DedicatedExecutor {
    runtime: Runtime,
}

impl fmt::Debug for DedicatedExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DedicatedExecutor").finish_non_exhaustive()
    }
}

impl DedicatedExecutor {
    /// Build a pool with `num_threads` worker threads (must be at
    /// least 1).
    pub fn new(name: &str, num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        let thread_name = name.to_string();
        let runtime = Builder::new_multi_thread()
            .worker_threads(num_threads)
            .thread_name(thread_name)
            .enable_all()
            .build()
            .expect("failed to build dedicated executor runtime");

        Self { runtime }
    }

    /// Run `f` on the pool and await its result.
    ///
    /// This is the Rust analogue of `co_await OffloadCpu{...}`: the
    /// calling task suspends (yields the event-loop thread to other
    /// ready nodes) until the blocking closure completes.
    pub async fn spawn<F, T>(&self, f: F) -> Result<T, OffloadError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        match self.runtime.spawn_blocking(f).await {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(panicked = err.is_panic(), "cpu offload task did not complete cleanly");
                Err(err.into())
            }
        }
    }

    /// Number of worker threads configured for this pool.
    pub fn metrics(&self) -> DedicatedExecutorMetrics {
        DedicatedExecutorMetrics {
            active_tasks: self.runtime.metrics().num_alive_tasks(),
        }
    }
}

/// A minimal snapshot of pool occupancy, exposed for `metric`
/// reporting rather than as a stable public API.
#[derive(Debug, Clone, Copy)]
pub struct DedicatedExecutorMetrics {
    pub active_tasks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn offloaded_closure_runs_and_returns_value() {
        let exec = DedicatedExecutor::new("test-offload", 2);
        let result = exec.spawn(|| 6 * 7).await.unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn offloaded_panic_is_reported_as_error() {
        let exec = DedicatedExecutor::new("test-offload-panic", 1);
        let result: Result<(), OffloadError> = exec
            .spawn(|| panic!("boom"))
            .await;
        assert!(matches!(result, Err(OffloadError::Panicked)));
    }

    #[tokio::test]
    async fn concurrent_offloads_all_complete() {
        let exec = Arc::new(DedicatedExecutor::new("test-offload-concurrent", 4));
        let counter = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let exec = Arc::clone(&exec);
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                exec.spawn(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }
}
