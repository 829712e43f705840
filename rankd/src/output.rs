//! Rendering an [`ExecutionResult`] to the process's stdout.
//!
//! `column_batch` types deliberately carry no `serde` impls of their
//! own (they are an internal, Arc-shared representation, not a wire
//! format) so this module hand-builds the printable `serde_json::Value`
//! the way `ioxd_common`'s HTTP handlers build ad hoc response bodies
//! around an internal data type rather than deriving `Serialize`
//! straight onto it.

use dag_scheduler::ExecutionResult;
use serde_json::{json, Value};

fn row_set_summary(row_set: &column_batch::RowSet, verbose: bool) -> Value {
    let active_rows = row_set.active_rows();
    let mut summary = json!({
        "logical_size": row_set.logical_size(),
    });
    if verbose {
        let ids: Vec<i64> = active_rows
            .iter()
            .map(|&row| row_set.batch().id().values[row as usize])
            .collect();
        summary["row_ids"] = json!(ids);
    }
    summary
}

fn schema_delta_summary(delta: &schema_delta::SchemaDelta) -> Value {
    json!({
        "node_id": delta.node_id,
        "out_keys": delta.out_keys,
        "new_keys": delta.new_keys,
        "removed_keys": delta.removed_keys,
    })
}

/// Build the JSON value printed to stdout for a successful request.
///
/// `metrics` carries the per-node execution counters/histograms
/// `dag_scheduler` recorded while running the plan (component M's
/// stats slice); only surfaced when `verbose`, the same gate that
/// controls whether row ids are spelled out.
pub fn render(result: &ExecutionResult, verbose: bool, metrics: &metric::Registry) -> Value {
    let mut rendered = json!({
        "outputs": result.outputs.iter().map(|rs| row_set_summary(rs, verbose)).collect::<Vec<_>>(),
        "schema_deltas": result.schema_deltas.iter().map(schema_delta_summary).collect::<Vec<_>>(),
    });
    if verbose {
        rendered["stats"] = stats_summary(metrics);
    }
    rendered
}

/// One `{op, executed, failed, mean_ms}` entry per op the scheduler
/// actually dispatched — `dag_scheduler::stats::record_outcome` only
/// ever creates a counter for an op once a node with that op has run,
/// so `metrics.known_ops()` is exactly the set worth reporting.
fn stats_summary(metrics: &metric::Registry) -> Value {
    let ops = metrics.known_ops();
    json!(ops
        .iter()
        .map(|op| {
            let executed = metrics.u64_counter("nodes_executed", &[("op", op)]).get();
            let failed = metrics.u64_counter("nodes_failed", &[("op", op)]).get();
            let mean_ms = metrics.duration_histogram("node_duration_ms", &[("op", op)]).mean().as_secs_f64() * 1000.0;
            json!({
                "op": op,
                "executed": executed,
                "failed": failed,
                "mean_ms": mean_ms,
            })
        })
        .collect::<Vec<_>>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use column_batch::ColumnBatch;
    use schema_delta::compute_schema_delta;
    use std::sync::Arc;

    #[test]
    fn renders_outputs_and_deltas() {
        let batch = Arc::new(ColumnBatch::new(vec![10, 20, 30], vec![true; 3]).unwrap());
        let row_set = column_batch::RowSet::new(batch);
        let delta = compute_schema_delta("n1", &[row_set.clone()], &row_set);

        let result = ExecutionResult {
            outputs: vec![row_set],
            schema_deltas: vec![delta],
        };

        let metrics = metric::Registry::new();
        metrics.u64_counter("nodes_executed", &[("op", "take")]).inc(1);

        let rendered = render(&result, true, &metrics);
        assert_eq!(rendered["outputs"][0]["logical_size"], 3);
        assert_eq!(rendered["outputs"][0]["row_ids"], json!([10, 20, 30]));
        assert_eq!(rendered["schema_deltas"][0]["node_id"], "n1");
        assert_eq!(rendered["stats"][0]["op"], "take");
        assert_eq!(rendered["stats"][0]["executed"], 1);
    }
}
