//! Component H: the columnar data model.
//!
//! A [`ColumnBatch`] is an immutable table shared by reference across
//! a request's row-sets; a [`RowSet`] is a lightweight view (optional
//! selection and/or order) over one batch. Structural "updates"
//! (`with_float_column`, `with_string_column`) never mutate a batch in
//! place — they allocate a new batch that shares every untouched
//! column with its parent via `Arc`, so a long chain of per-node
//! transformations costs O(1) per added column rather than O(N) row
//! copies.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod batch;
mod row_set;

pub use batch::{BatchError, ColumnBatch, FloatColumn, IdColumn, StringColumn};
pub use row_set::{RowSet, RowSetError};
