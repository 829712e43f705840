//! A coroutine-friendly, FIFO-ordered concurrency limiter.
//!
//! This is Component D of the engine: acquiring a permit suspends the
//! caller (rather than blocking a thread) when none are free, and
//! releases hand the permit directly to the longest-waiting acquirer.
//! `tokio::sync::Semaphore` already implements exactly this —
//! FIFO-fair waiter resumption is one of its documented guarantees —
//! so [`AsyncSemaphore`] is a thin, typed wrapper rather than a
//! hand-rolled waiter queue. Reimplementing the waiter list by hand
//! would just be a worse version of what the ecosystem already gives
//! us here.
use std::sync::Arc;

use tokio::sync::{AcquireError, Semaphore};

/// Maximum concurrent permits for a single endpoint if none is
/// configured explicitly.
pub const DEFAULT_MAX_INFLIGHT: usize = 64;

/// A FIFO-ordered async permit pool.
///
/// Cloning an `AsyncSemaphore` shares the same underlying pool of
/// permits (it's a thin `Arc` wrapper), mirroring how the original
/// `AsyncInflightLimiter` was shared by reference across coroutines
/// running on one event loop.
#[derive(Debug, Clone)]
pub struct AsyncSemaphore {
    inner: Arc<Semaphore>,
    max_permits: usize,
}

/// RAII guard: the permit is released when this is dropped.
#[derive(Debug)]
pub struct AsyncSemaphorePermit<'a> {
    _permit: tokio::sync::SemaphorePermit<'a>,
}

impl AsyncSemaphore {
    /// Create a limiter with the given maximum concurrent permits.
    ///
    /// # Panics
    /// Panics if `max_permits` is zero.
    pub fn new(max_permits: usize) -> Self {
        assert!(max_permits > 0, "max_permits must be > 0");
        Self {
            inner: Arc::new(Semaphore::new(max_permits)),
            max_permits,
        }
    }

    /// Acquire a permit, suspending until one becomes available.
    ///
    /// Waiters are resumed strictly in the order they started
    /// waiting (§4.4's FIFO ordering guarantee).
    pub async fn acquire(&self) -> AsyncSemaphorePermit<'_> {
        // Closing the semaphore is not part of this crate's surface;
        // `rankd` never calls `close()`, so this can't legitimately fail.
        let permit = self
            .inner
            .acquire()
            .await
            .expect("AsyncSemaphore is never closed");
        AsyncSemaphorePermit { _permit: permit }
    }

    /// Try to acquire a permit without suspending.
    pub fn try_acquire(&self) -> Result<AsyncSemaphorePermit<'_>, TryAcquireError> {
        self.inner
            .try_acquire()
            .map(|permit| AsyncSemaphorePermit { _permit: permit })
            .map_err(|_| TryAcquireError)
    }

    /// Maximum number of permits this limiter was created with.
    pub fn max_permits(&self) -> usize {
        self.max_permits
    }

    /// Number of permits currently available (not held by any guard).
    pub fn available_permits(&self) -> usize {
        self.inner.available_permits()
    }

    /// Acquire a permit whose guard does not borrow from `self`.
    ///
    /// Used where the guard must outlive the acquiring call's stack
    /// frame — e.g. `io_client` stashes a permit inside a pending
    /// command's state until its reply or timeout fires, which may
    /// happen on a different task than the one that called `acquire`.
    pub async fn acquire_owned(&self) -> AsyncSemaphorePermitOwned {
        let permit = Arc::clone(&self.inner)
            .acquire_owned()
            .await
            .expect("AsyncSemaphore is never closed");
        AsyncSemaphorePermitOwned { _permit: permit }
    }
}

/// RAII guard with no borrowed lifetime: releases the permit when
/// dropped, from any task or thread.
#[derive(Debug)]
pub struct AsyncSemaphorePermitOwned {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

/// Returned by [`AsyncSemaphore::try_acquire`] when no permit is free.
#[derive(Debug, snafu::Snafu)]
#[snafu(display("no permit available"))]
pub struct TryAcquireError;

// Re-exported for callers that want to match on the underlying tokio error
// type directly (e.g. to distinguish "closed" from "no permit").
pub type CloseError = AcquireError;
