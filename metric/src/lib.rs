//! A small in-process metric registry.
//!
//! `rankd` does not ship a metrics exporter (that's an external
//! collaborator, per `spec.md` §1) but still wants a place to
//! accumulate per-request execution statistics — node counts, timeouts,
//! regex cache hits — the way [`ExecStats`] did in the original source.
//! This crate is that place.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A monotonically increasing counter, identified by name and a set of
/// label key/value pairs.
#[derive(Debug, Default)]
pub struct U64Counter(AtomicU64);

impl U64Counter {
    pub fn inc(&self, delta: u64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A crude duration histogram: just the count and total so average
/// latency can be derived. Good enough for execution-stats purposes;
/// a real percentile histogram is an external-exporter concern.
#[derive(Debug, Default)]
pub struct DurationHistogram {
    count: AtomicU64,
    total_nanos: AtomicU64,
}

impl DurationHistogram {
    pub fn record(&self, d: Duration) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_nanos
            .fetch_add(d.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> Duration {
        let count = self.count();
        if count == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed) / count)
    }
}

type MetricKey = (&'static str, Vec<(&'static str, String)>);

/// Process- or request-scoped collection of named counters/histograms.
///
/// Not thread-bound: a `Registry` can be shared across the event loop
/// and the CPU pool via `Arc`, same as the rest of the workspace's
/// `metric::Registry`.
#[derive(Debug, Default)]
pub struct Registry {
    counters: Mutex<HashMap<MetricKey, Arc<U64Counter>>>,
    histograms: Mutex<HashMap<MetricKey, Arc<DurationHistogram>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u64_counter(&self, name: &'static str, labels: &[(&'static str, &str)]) -> Arc<U64Counter> {
        let key = Self::key(name, labels);
        let mut counters = self.counters.lock();
        Arc::clone(counters.entry(key).or_insert_with(|| Arc::new(U64Counter::default())))
    }

    pub fn duration_histogram(
        &self,
        name: &'static str,
        labels: &[(&'static str, &str)],
    ) -> Arc<DurationHistogram> {
        let key = Self::key(name, labels);
        let mut histograms = self.histograms.lock();
        Arc::clone(
            histograms
                .entry(key)
                .or_insert_with(|| Arc::new(DurationHistogram::default())),
        )
    }

    fn key(name: &'static str, labels: &[(&'static str, &str)]) -> MetricKey {
        let mut labels: Vec<(&'static str, String)> =
            labels.iter().map(|(k, v)| (*k, v.to_string())).collect();
        labels.sort_unstable_by_key(|(k, _)| *k);
        (name, labels)
    }

    /// The sorted, deduplicated set of `op` label values recorded so
    /// far for the `nodes_executed` counter — used by `rankd::output`
    /// to enumerate which ops to report on without needing a separate
    /// side channel from the scheduler.
    pub fn known_ops(&self) -> Vec<String> {
        let counters = self.counters.lock();
        let mut ops: Vec<String> = counters
            .keys()
            .filter(|(name, _)| *name == "nodes_executed")
            .filter_map(|(_, labels)| labels.iter().find(|(k, _)| *k == "op").map(|(_, v)| v.clone()))
            .collect();
        ops.sort();
        ops.dedup();
        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates() {
        let registry = Registry::new();
        let c = registry.u64_counter("nodes_executed", &[("op", "take")]);
        c.inc(1);
        c.inc(2);
        assert_eq!(c.get(), 3);

        // Same name+labels returns the same counter.
        let c2 = registry.u64_counter("nodes_executed", &[("op", "take")]);
        assert_eq!(c2.get(), 3);
    }

    #[test]
    fn known_ops_is_sorted_and_deduplicated() {
        let registry = Registry::new();
        registry.u64_counter("nodes_executed", &[("op", "take")]).inc(1);
        registry.u64_counter("nodes_executed", &[("op", "concat")]).inc(1);
        registry.u64_counter("nodes_executed", &[("op", "take")]).inc(1);
        // A differently-named counter with an `op` label must not leak in.
        registry.u64_counter("nodes_failed", &[("op", "sort_by")]).inc(1);

        assert_eq!(registry.known_ops(), vec!["concat".to_string(), "take".to_string()]);
    }

    #[test]
    fn histogram_mean() {
        let h = DurationHistogram::default();
        h.record(Duration::from_millis(10));
        h.record(Duration::from_millis(20));
        assert_eq!(h.count(), 2);
        assert_eq!(h.mean(), Duration::from_millis(15));
    }
}
