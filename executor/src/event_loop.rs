//! Component A: the single-threaded cooperative event loop.
//!
//! One OS thread runs a `tokio` current-thread runtime driving a
//! `LocalSet`. Cross-thread "post a callback to run on the loop
//! thread" is implemented with an unbounded MPSC channel: sending on
//! it both enqueues the callback and wakes the loop (no separate
//! "async wake handle" is needed the way the original libuv-based
//! design needed a `uv_async_t` — the channel receiver's waker IS the
//! wake primitive).
use std::fmt;
use std::thread::{self, JoinHandle, ThreadId};

use observability_deps::tracing::{debug, warn};
use tokio::runtime::Builder;
use tokio::sync::mpsc;
use tokio::task::LocalSet;

type PostedFn = Box<dyn FnOnce() + Send + 'static>;

/// Error returned when [`EventLoopHandle::post`] is called after the
/// loop has begun stopping.
#[derive(Debug, snafu::Snafu)]
#[snafu(display("post after stop: event loop is not accepting callbacks"))]
pub struct PostError;

/// A cheap, `Send + Sync`, cloneable handle used to post callbacks to
/// the loop thread from any thread.
#[derive(Clone)]
pub struct EventLoopHandle {
    sender: mpsc::UnboundedSender<PostedFn>,
    loop_thread: ThreadId,
}

impl fmt::Debug for EventLoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoopHandle").field("loop_thread", &self.loop_thread).finish()
    }
}

impl EventLoopHandle {
    /// Post a callback to run on the loop thread.
    ///
    /// Thread-safe; callable from any thread, including the loop
    /// thread itself. Returns [`PostError`] if the loop has stopped
    /// (or never started) — per §4.1, the caller must then choose
    /// between propagating the error or accepting the work is
    /// dropped.
    pub fn post(&self, f: impl FnOnce() + Send + 'static) -> Result<(), PostError> {
        self.sender.send(Box::new(f)).map_err(|_| PostError)
    }

    /// True if this handle refers to the thread currently executing
    /// (i.e. the call site is already running on the loop thread).
    pub fn is_loop_thread(&self) -> bool {
        thread::current().id() == self.loop_thread
    }
}

/// Owns the event loop's background thread.
///
/// `EventLoop` itself is not `Clone` — only one object owns the
/// thread's lifecycle — but [`EventLoopHandle`]s (obtained via
/// [`EventLoop::handle`]) can be freely cloned and shared across
/// threads.
pub struct EventLoop {
    handle: EventLoopHandle,
    join: Option<JoinHandle<()>>,
    sender_close: Option<mpsc::UnboundedSender<PostedFn>>,
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop").field("handle", &self.handle).finish()
    }
}

impl EventLoop {
    /// Start the event loop thread. Each call creates a new loop;
    /// there is no idempotent "already started" state to check
    /// because construction and starting are the same operation here.
    pub fn start() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PostedFn>();
        let (thread_id_tx, thread_id_rx) = std::sync::mpsc::channel();

        let join = thread::Builder::new()
            .name("rankd-event-loop".into())
            .spawn(move || {
                thread_id_tx.send(thread::current().id()).ok();

                let rt = Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build event loop runtime");
                let local = LocalSet::new();

                local.block_on(&rt, async move {
                    debug!("event loop draining post queue");
                    while let Some(cb) = rx.recv().await {
                        cb();
                    }
                    debug!("event loop post queue closed, exiting");
                });
            })
            .expect("failed to spawn event loop thread");

        let loop_thread = thread_id_rx
            .recv()
            .expect("event loop thread died before reporting its id");

        Self {
            handle: EventLoopHandle {
                sender: tx.clone(),
                loop_thread,
            },
            join: Some(join),
            sender_close: Some(tx),
        }
    }

    /// Obtain a cloneable, `Send`-able handle for posting callbacks
    /// from other threads.
    pub fn handle(&self) -> EventLoopHandle {
        self.handle.clone()
    }

    /// True while the loop is accepting posts.
    pub fn is_running(&self) -> bool {
        self.sender_close
            .as_ref()
            .map(|s| !s.is_closed())
            .unwrap_or(false)
    }

    /// Stop the loop and join its thread.
    ///
    /// Idempotent: calling `stop` more than once is a no-op after the
    /// first call. If called from within a callback running on the
    /// loop thread itself, the thread is not joined (that would
    /// deadlock) — the loop handle is leaked rather than the thread
    /// torn down unsafely, per §4.1's "leak rather than crash"
    /// guidance.
    pub fn stop(&mut self) {
        // Dropping the sender closes the channel; `rx.recv()` then
        // returns `None` and the loop task exits on its own.
        self.sender_close.take();

        if self.handle.is_loop_thread() {
            warn!("EventLoop::stop called from the loop thread itself; leaking the join handle");
            self.join.take();
            return;
        }

        if let Some(join) = self.join.take() {
            join.join().ok();
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
