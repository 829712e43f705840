//! Component K: the task registry, parameter validation, and task
//! dispatch contract (§3.4).
//!
//! A [`TaskSpec`] is everything `dag_scheduler` needs to know about one
//! op to run it: its parameter schema, declared `reads`/`writes` key
//! sets, output contract, optional writes-effect expression, whether
//! it's I/O-bound, and the [`TaskImpl`] it dispatches to. [`TaskRegistry`]
//! is the flat name -> spec table those specs live in.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

pub mod builtin;
mod context;
mod param;
mod registry;
mod task_impl;

pub use context::{AsyncExecContext, ExecContext};
pub use param::{validate_params, ParamError, ParamField, ParamKind};
pub use registry::{TaskRegistry, TaskSpec, UnknownOp};
pub use task_impl::{TaskError, TaskImpl};
