//! Component E: the async I/O client to a remote key/value store,
//! with persistent connections, command pipelining, per-command
//! timeout, and FIFO per-endpoint inflight limiting (§4.5).
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod client;
mod resp;

pub use client::{ClientError, Command, KvClient, KvReply};
pub use resp::{RespError, RespValue};
