//! Component G: the DAG scheduler, both variants.
//!
//! `async_scheduler` runs a plan entirely on one `LocalSet`-bound event
//! loop thread, suspending at I/O and CPU-offload boundaries (§4.7.2).
//! `sync_scheduler` is the alternative for a non-async-capable caller:
//! the same node pipeline driven by a mutex/condvar-guarded ready
//! queue over a plain thread pool (§4.7.6). Both return the same
//! [`ExecutionResult`] contract, and both honor fail-fast (§4.7.4) and
//! the precomputed topological order for `schema_deltas` (§4.7.5).
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self, clippy::future_not_send)]

mod async_scheduler;
pub mod error;
mod stats;
mod sync_scheduler;
mod topo;

pub use async_scheduler::{execute_plan_async, ExecutionResult};
pub use error::Error;
pub use sync_scheduler::{execute_plan_sync, DEFAULT_MAX_NODES_INFLIGHT};
pub use topo::TopoInfo;
