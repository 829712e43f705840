//! The reference builtin ops: a small, additive set of test fixtures
//! exercising each [`crate::TaskSpec`] shape (native sync, native
//! async, single-input, dual-input, no-input) and each
//! [`output_contract::OutputPattern`]. Not a claim that any particular
//! application's op set (viewer/follow/media/vm or otherwise) is in
//! scope — callers register their own ops with [`crate::TaskRegistry`]
//! the same way.

mod concat;
mod sleep;
mod sort_by;
mod source;
mod stable_filter;
mod take;

use crate::registry::TaskSpec;

pub fn all() -> Vec<TaskSpec> {
    vec![
        source::spec(),
        take::spec(),
        concat::spec(),
        sleep::spec(),
        stable_filter::spec(),
        sort_by::spec(),
    ]
}
