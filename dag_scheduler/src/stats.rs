//! Component M (stats slice): per-node execution counters recorded
//! into a [`metric::Registry`], the `ExecStats` equivalent called out
//! in `SPEC_FULL.md`'s ambient-configuration notes.
//!
//! Both scheduler variants call [`record_outcome`] once per node,
//! whether or not a caller supplied a registry — `registry` is
//! `Option` throughout so a caller with no use for stats (e.g. the
//! `tests/end_to_end.rs` fixtures) pays nothing beyond a branch.
use std::time::Duration;

use metric::Registry;

/// Record one node's outcome: always a `nodes_executed` count, plus
/// either a `node_duration_ms` histogram sample (success) or a
/// `nodes_failed` count (failure), each labeled by `op`.
pub fn record_outcome(registry: Option<&Registry>, op: &str, elapsed: Duration, succeeded: bool) {
    let Some(registry) = registry else {
        return;
    };
    registry.u64_counter("nodes_executed", &[("op", op)]).inc(1);
    if succeeded {
        registry.duration_histogram("node_duration_ms", &[("op", op)]).record(elapsed);
    } else {
        registry.u64_counter("nodes_failed", &[("op", op)]).inc(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_registry_is_a_no_op() {
        record_outcome(None, "take", Duration::from_millis(1), true);
    }

    #[test]
    fn records_success_and_failure_separately() {
        let registry = Registry::new();
        record_outcome(Some(&registry), "take", Duration::from_millis(5), true);
        record_outcome(Some(&registry), "take", Duration::from_millis(15), true);
        record_outcome(Some(&registry), "take", Duration::from_millis(1), false);

        let executed = registry.u64_counter("nodes_executed", &[("op", "take")]);
        let failed = registry.u64_counter("nodes_failed", &[("op", "take")]);
        let hist = registry.duration_histogram("node_duration_ms", &[("op", "take")]);

        assert_eq!(executed.get(), 3);
        assert_eq!(failed.get(), 1);
        assert_eq!(hist.count(), 2);
        assert_eq!(hist.mean(), Duration::from_millis(10));
    }
}
