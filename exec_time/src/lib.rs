//! Time provider abstraction, the way `iox_time` gives the rest of the
//! workspace a single `now()` seam to mock in tests.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod deadline;

pub use deadline::{compute_effective_deadline, deadline_exceeded, deadline_exceeded_at, ms_until_deadline};

use parking_lot::Mutex;
use std::fmt::Debug;
use std::time::{Duration, Instant};

/// A monotonic instant, wrapping [`std::time::Instant`].
///
/// Kept as a newtype (rather than using `Instant` directly everywhere)
/// so that [`TimeProvider`] implementors can be swapped without every
/// call site depending on `std::time` specifically.
pub type Time = Instant;

/// Something that can tell you the current time.
///
/// All scheduler/deadline code takes a `&dyn TimeProvider` instead of
/// calling `Instant::now()` directly, so tests can substitute
/// [`MockProvider`] and assert deadline behavior deterministically
/// instead of racing real wall-clock sleeps.
pub trait TimeProvider: Debug + Send + Sync {
    fn now(&self) -> Time;
}

/// Real wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProvider;

impl TimeProvider for SystemProvider {
    fn now(&self) -> Time {
        Instant::now()
    }
}

/// A controllable clock for deterministic tests.
#[derive(Debug)]
pub struct MockProvider {
    now: Mutex<Time>,
}

impl MockProvider {
    pub fn new(now: Time) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: Time) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl TimeProvider for MockProvider {
    fn now(&self) -> Time {
        *self.now.lock()
    }
}
