//! Observability ecosystem dependencies for rankd.
//!
//! This crate exists so that every other crate in the workspace pulls
//! `tracing` through a single, version-pinned point rather than each
//! depending on it directly.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::explicit_iter_loop, clippy::use_self)]

pub use tracing;
