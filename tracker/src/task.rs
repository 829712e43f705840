//! Component B: the coroutine task primitive.
//!
//! The original `Task<T>` was a hand-rolled C++ coroutine type: lazy
//! (suspended until started), move-only, with a single continuation
//! and captured-exception propagation on await. Rust's `async fn`
//! already gives every one of those properties for free — a `Future`
//! does nothing until polled, owns its captured state, and propagates
//! panics/errors through its `Output` — so there is nothing to
//! reimplement here. What *is* worth a small wrapper is the lifetime
//! contract §4.2 calls out: "the Task owns its frame; destroying a
//! suspended Task while an I/O callback still references it is
//! undefined. Callers must keep the Task alive until it completes."
//!
//! [`Job`] is that wrapper: it spawns a future onto the current
//! `LocalSet` (so it runs on the single event-loop thread, matching
//! the engine's thread model) and holds the resulting `JoinHandle`
//! until the caller awaits it, which is the idiomatic equivalent of
//! "the owning coroutine keeps the Task alive."
use std::fmt;
use std::future::Future;

use observability_deps::tracing::warn;
use tokio::task::{JoinError, JoinHandle};

/// A node-pipeline unit of work, spawned on the event loop's
/// `LocalSet`.
///
/// Dropping a `Job` does not cancel or detach it — the underlying
/// Tokio task keeps running until it completes or the `LocalSet`
/// itself is torn down, matching the "must outlive its dependents"
/// contract from the original coroutine type.
pub struct Job<T> {
    handle: JoinHandle<T>,
}

impl<T: 'static> Job<T> {
    /// Spawn `fut` onto the currently running `LocalSet`.
    ///
    /// # Panics
    /// Panics if called outside of a `LocalSet` context, the same way
    /// the original `Task<T>` required being driven from the event
    /// loop thread.
    pub fn spawn(fut: impl Future<Output = T> + 'static) -> Self {
        Self {
            handle: tokio::task::spawn_local(fut),
        }
    }

    /// Await completion, propagating a panic inside the task as an
    /// error rather than silently losing the result.
    pub async fn join(self) -> Result<T, JoinError> {
        self.handle.await
    }

    /// Abort the underlying task. Used only on fail-fast teardown
    /// paths where the scheduler has already recorded `first_error`
    /// and is draining; see `dag_scheduler`.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl<T> fmt::Debug for Job<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("finished", &self.handle.is_finished()).finish()
    }
}

/// Log (rather than propagate) a join error from a task whose result
/// no longer matters — e.g. a node that kept running after
/// `first_error` was already recorded.
pub fn log_join_error(node_id: &str, err: JoinError) {
    if err.is_panic() {
        warn!(node_id, "node task panicked during drain");
    } else if err.is_cancelled() {
        warn!(node_id, "node task cancelled during drain");
    }
}
