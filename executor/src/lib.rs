//! Components A and C of the engine: a single-threaded cooperative
//! event loop, and a dedicated CPU-offload pool that posts results
//! back to it.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self, clippy::future_not_send)]

mod dedicated;
mod event_loop;

pub use dedicated::{DedicatedExecutor, OffloadError};
pub use event_loop::{EventLoop, EventLoopHandle, PostError};
