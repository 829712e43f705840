//! §8.4 end-to-end scenarios for the async scheduler, driven against
//! the reference builtin ops (`source`, `take`, `concat`, `sleep`).
//! Scenarios 4 (FIFO semaphore), 5 (command timeout), and 7
//! (writes-effect `SwitchEnum`) are exercised directly in
//! `tracker`, `io_client`, and `writes_effect` respectively, next to
//! the code they test; the scenarios below are the ones that need a
//! whole scheduler to observe (parallelism, sequencing, fail-fast).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use client_cache::ClientCache;
use dag_scheduler::execute_plan_async;
use executor::DedicatedExecutor;
use plan::{EndpointRegistry, Node, ParamValue, Plan, Request, UserId, CURRENT_SCHEMA_VERSION};
use task_registry::TaskRegistry;
use tokio::task::LocalSet;

fn node(id: &str, op: &str, inputs: &[&str], params: BTreeMap<String, ParamValue>) -> Node {
    Node {
        node_id: id.into(),
        op: op.into(),
        inputs: inputs.iter().map(|s| s.to_string()).collect(),
        params,
    }
}

fn int_params(pairs: &[(&str, i64)]) -> BTreeMap<String, ParamValue> {
    pairs.iter().map(|(k, v)| (k.to_string(), ParamValue::Int(*v))).collect()
}

fn plan_with(nodes: Vec<Node>, outputs: &[&str]) -> Plan {
    Plan {
        schema_version: CURRENT_SCHEMA_VERSION,
        plan_name: "e2e".into(),
        nodes,
        outputs: outputs.iter().map(|s| s.to_string()).collect(),
        expr_table: BTreeMap::new(),
        pred_table: BTreeMap::new(),
        capabilities_required: vec![],
        extensions: BTreeMap::new(),
    }
}

fn request(plan: Plan, id: &str) -> Request {
    Request {
        plan,
        param_overrides: BTreeMap::new(),
        user_id: UserId::new(1).unwrap(),
        request_id: id.into(),
    }
}

async fn run(request: Request) -> Result<dag_scheduler::ExecutionResult, dag_scheduler::Error> {
    let registry = Arc::new(TaskRegistry::with_builtins());
    let clients = Arc::new(ClientCache::new(EndpointRegistry::default()));
    let cpu_pool = Arc::new(DedicatedExecutor::new("e2e-cpu", 2));
    execute_plan_async(request, registry, clients, cpu_pool, None, None).await
}

/// §8.4 scenario 1: `source{fanout=5}` -> `take{count=3}` -> output.
#[tokio::test(flavor = "current_thread")]
async fn scenario_1_source_then_take() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let plan = plan_with(
                vec![
                    node("src", "source", &[], int_params(&[("fanout", 5)])),
                    node("t", "take", &["src"], int_params(&[("count", 3)])),
                ],
                &["t"],
            );
            let result = run(request(plan, "r1")).await.unwrap();
            assert_eq!(result.outputs.len(), 1);
            assert_eq!(result.outputs[0].active_rows(), vec![0, 1, 2]);
            assert_eq!(result.schema_deltas.len(), 2);
        })
        .await;
}

/// §8.4 scenario 2: two parallel `sleep{50ms}` branches joined by
/// `concat` complete in well under their serial sum, proving the
/// scheduler actually overlaps independent coroutines rather than
/// running them one after another.
#[tokio::test(flavor = "current_thread", start_paused = false)]
async fn scenario_2_parallel_sleeps_complete_concurrently() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let plan = plan_with(
                vec![
                    node("src_a", "source", &[], int_params(&[("fanout", 2)])),
                    node("src_b", "source", &[], int_params(&[("fanout", 3)])),
                    node("sleep_a", "sleep", &["src_a"], int_params(&[("ms", 50)])),
                    node("sleep_b", "sleep", &["src_b"], int_params(&[("ms", 50)])),
                    node("joined", "concat", &["sleep_a", "sleep_b"], BTreeMap::new()),
                ],
                &["joined"],
            );
            let start = Instant::now();
            let result = run(request(plan, "r2")).await.unwrap();
            let elapsed = start.elapsed();

            assert!(elapsed < Duration::from_millis(80), "branches should overlap, took {elapsed:?}");
            assert_eq!(result.outputs[0].logical_size(), 5);
        })
        .await;
}

/// §8.4 scenario 3: a linear chain `source -> sleep{30} -> sleep{30}`
/// is inherently sequential and must take at least the sum of both
/// sleeps.
#[tokio::test(flavor = "current_thread")]
async fn scenario_3_linear_chain_is_sequential() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let plan = plan_with(
                vec![
                    node("src", "source", &[], int_params(&[("fanout", 1)])),
                    node("s1", "sleep", &["src"], int_params(&[("ms", 30)])),
                    node("s2", "sleep", &["s1"], int_params(&[("ms", 30)])),
                ],
                &["s2"],
            );
            let start = Instant::now();
            run(request(plan, "r3")).await.unwrap();
            let elapsed = start.elapsed();

            assert!(elapsed >= Duration::from_millis(55), "chained sleeps must run sequentially, took {elapsed:?}");
        })
        .await;
}

/// §8.4 scenario 6: node `bad` fails (missing required `count`); `ok`
/// is an independent, already-inflight sibling. The request must
/// fail with `bad`'s error and must not crash or hang draining `ok`.
#[tokio::test(flavor = "current_thread")]
async fn scenario_6_mid_plan_failure_is_fail_fast() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let plan = plan_with(
                vec![
                    node("src", "source", &[], int_params(&[("fanout", 4)])),
                    // `take` with no `count` param: fails parameter validation.
                    node("bad", "take", &["src"], BTreeMap::new()),
                    node("ok", "sleep", &["src"], int_params(&[("ms", 40)])),
                ],
                &["ok"],
            );
            let err = run(request(plan, "r6")).await.unwrap_err();
            let message = err.to_string();
            assert!(message.contains("bad"), "error should name the failing node: {message}");
        })
        .await;
}

/// A plan whose output is produced by a node with no successors and
/// whose batch is untouched by any transform still round-trips a
/// zero-row result correctly (§8.3's "zero-row outputs are valid").
#[tokio::test(flavor = "current_thread")]
async fn zero_fanout_source_produces_empty_output() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let plan = plan_with(vec![node("src", "source", &[], int_params(&[("fanout", 0)]))], &["src"]);
            let result = run(request(plan, "r_empty")).await.unwrap();
            assert_eq!(result.outputs[0].logical_size(), 0);
        })
        .await;
}

/// §8.3: `concat` with one empty side returns the other side's rows
/// verbatim (restructured into a fresh dense batch, but the same ids).
#[tokio::test(flavor = "current_thread")]
async fn concat_with_one_empty_side_returns_other_side() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let plan = plan_with(
                vec![
                    node("empty", "source", &[], int_params(&[("fanout", 0)])),
                    node("full", "source", &[], int_params(&[("fanout", 3)])),
                    node("joined", "concat", &["empty", "full"], BTreeMap::new()),
                ],
                &["joined"],
            );
            let result = run(request(plan, "r_concat_empty")).await.unwrap();
            assert_eq!(result.outputs[0].logical_size(), 3);
        })
        .await;
}

/// Duplicate output ids produce duplicate result entries, verbatim,
/// per §6.5.
#[tokio::test(flavor = "current_thread")]
async fn duplicate_outputs_are_preserved() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let plan = plan_with(
                vec![node("src", "source", &[], int_params(&[("fanout", 2)]))],
                &["src", "src"],
            );
            let result = run(request(plan, "r_dup")).await.unwrap();
            assert_eq!(result.outputs.len(), 2);
            assert_eq!(result.outputs[0].active_rows(), result.outputs[1].active_rows());
        })
        .await;
}
