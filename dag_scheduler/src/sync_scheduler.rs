//! Component G, sync parallel variant (§4.7.6): the scheduler for
//! callers with no async-capable runtime around them.
//!
//! Where `async_scheduler` suspends a coroutine at every I/O/offload
//! boundary on one event-loop thread, this variant drives a plain
//! `std::thread` worker pool over `Mutex`+`Condvar`-guarded shared
//! state — the same `deps_remaining`/`ready_queue`/`results`/
//! `first_error`/`inflight` bookkeeping as the async variant, just
//! behind a lock instead of owned outright by one thread. Native sync
//! tasks run directly on a worker thread; a node whose only
//! implementation is `run_async` (e.g. the `sleep` reference fixture)
//! is driven to completion on a small per-worker-thread current-thread
//! Tokio runtime, kept lazily in a thread local rather than built once
//! per call.
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

use client_cache::ClientCache;
use column_batch::RowSet;
use observability_deps::tracing::{error, warn};
use plan::{Request, UserId};
use schema_delta::{compute_schema_delta, SchemaDelta};
use task_registry::{validate_params, AsyncExecContext, ExecContext, TaskRegistry};

use crate::async_scheduler::ExecutionResult;
use crate::error::Error;
use crate::topo;

/// Bounds how many nodes the sync scheduler will run concurrently.
///
/// §9's open question ("whether `inflight` should be a hard or soft
/// cap") is resolved here as a hard cap: the sync variant's worker
/// pool has a fixed thread count, so an unbounded dispatch would just
/// pile ready nodes up behind however many OS threads exist anyway.
pub const DEFAULT_MAX_NODES_INFLIGHT: usize = 8;

struct NodeOutcome {
    row_set: RowSet,
    delta: SchemaDelta,
}

struct Shared {
    results: Vec<Option<RowSet>>,
    deltas: Vec<Option<SchemaDelta>>,
    deps_remaining: Vec<usize>,
    ready_queue: VecDeque<usize>,
    first_error: Option<Error>,
    inflight: usize,
    completed: usize,
}

/// Run `request.plan` to completion using a bounded worker-thread
/// pool instead of the event-loop/coroutine machinery.
///
/// Blocks the calling thread until the plan finishes or fails. Native
/// async tasks (`supports_async() == true`) are driven via a small
/// per-worker current-thread runtime rather than suspended
/// cooperatively, since there is no shared event loop in this variant.
pub fn execute_plan_sync(
    request: Request,
    registry: &TaskRegistry,
    clients: &Arc<ClientCache>,
    max_nodes_inflight: usize,
    request_deadline: Option<Instant>,
    metrics: Option<&metric::Registry>,
) -> Result<ExecutionResult, Error> {
    let Request {
        plan,
        param_overrides,
        user_id,
        request_id,
    } = request;

    let deps = plan::validate_plan(&plan).map_err(|source| Error::Validation { source })?;
    let topo_info = topo::build(&plan, &deps);
    let n = plan.nodes.len();
    let max_nodes_inflight = max_nodes_inflight.max(1);

    let shared = Mutex::new(Shared {
        results: (0..n).map(|_| None).collect(),
        deltas: (0..n).map(|_| None).collect(),
        deps_remaining: topo_info.initial_deps_remaining.clone(),
        ready_queue: (0..n).filter(|&i| topo_info.initial_deps_remaining[i] == 0).collect(),
        first_error: None,
        inflight: 0,
        completed: 0,
    });
    let cv = Condvar::new();

    std::thread::scope(|scope| {
        for worker in 0..max_nodes_inflight {
            scope.spawn(|| {
                worker_loop(
                    worker,
                    &shared,
                    &cv,
                    n,
                    &plan,
                    &topo_info,
                    registry,
                    clients,
                    &param_overrides,
                    user_id,
                    &request_id,
                    request_deadline,
                    max_nodes_inflight,
                    metrics,
                );
            });
        }
    });

    let mut state = shared.into_inner().expect("no thread panicked while holding the lock");

    if let Some(err) = state.first_error.take() {
        return Err(err);
    }

    let outputs = plan
        .outputs
        .iter()
        .map(|output_id| {
            let idx = topo_info.index_of[output_id];
            state.results[idx]
                .clone()
                .expect("every node on the completion path has a stored result")
        })
        .collect();

    let schema_deltas = topo_info
        .order
        .iter()
        .map(|&idx| state.deltas[idx].take().expect("every node on the completion path has a stored delta"))
        .collect();

    Ok(ExecutionResult { outputs, schema_deltas })
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    _worker_id: usize,
    shared: &Mutex<Shared>,
    cv: &Condvar,
    n: usize,
    plan: &plan::Plan,
    topo_info: &topo::TopoInfo,
    registry: &TaskRegistry,
    clients: &Arc<ClientCache>,
    param_overrides: &plan::ParamOverrides,
    user_id: UserId,
    request_id: &str,
    request_deadline: Option<Instant>,
    max_nodes_inflight: usize,
    metrics: Option<&metric::Registry>,
) {
    loop {
        let idx = {
            let mut state = shared.lock().expect("scheduler mutex poisoned");
            loop {
                let done = state.completed == n || (state.first_error.is_some() && state.inflight == 0);
                if done {
                    cv.notify_all();
                    return;
                }
                if state.first_error.is_none() && state.inflight < max_nodes_inflight {
                    if let Some(idx) = state.ready_queue.pop_front() {
                        state.inflight += 1;
                        break idx;
                    }
                }
                state = cv.wait(state).expect("scheduler mutex poisoned");
            }
        };

        let op = &plan.nodes[idx].op;
        let start = Instant::now();
        let outcome = run_one_node(
            plan,
            idx,
            topo_info,
            registry,
            shared,
            clients,
            param_overrides,
            user_id,
            request_id,
            request_deadline,
        );
        crate::stats::record_outcome(metrics, op, start.elapsed(), outcome.is_ok());

        let mut state = shared.lock().expect("scheduler mutex poisoned");
        state.inflight -= 1;
        state.completed += 1;

        match outcome {
            Ok(NodeOutcome { row_set, delta }) => {
                state.results[idx] = Some(row_set);
                state.deltas[idx] = Some(delta);
                if state.first_error.is_none() {
                    for &succ in &topo_info.successors[idx] {
                        state.deps_remaining[succ] -= 1;
                        if state.deps_remaining[succ] == 0 {
                            state.ready_queue.push_back(succ);
                        }
                    }
                }
            }
            Err(e) => {
                if state.first_error.is_none() {
                    error!(?e, "node failed, sync scheduler switching to drain mode");
                    state.first_error = Some(e);
                } else {
                    warn!("additional node failure discarded after first_error was already recorded");
                }
            }
        }

        cv.notify_all();
    }
}

#[allow(clippy::too_many_arguments)]
fn run_one_node(
    plan: &plan::Plan,
    idx: usize,
    topo_info: &topo::TopoInfo,
    registry: &TaskRegistry,
    shared: &Mutex<Shared>,
    clients: &Arc<ClientCache>,
    param_overrides: &plan::ParamOverrides,
    user_id: UserId,
    request_id: &str,
    deadline: Option<Instant>,
) -> Result<NodeOutcome, Error> {
    let node = &plan.nodes[idx];

    let spec = registry
        .get(&node.op)
        .map_err(|source| Error::UnknownOp {
            node_id: node.node_id.clone(),
            source,
        })?
        .clone();

    let mut merged_params = node.params.clone();
    if let Some(node_overrides) = param_overrides.get(&node.node_id) {
        for (name, value) in node_overrides {
            merged_params.insert(name.clone(), value.clone());
        }
    }

    let effective_params = validate_params(&spec.params, &merged_params).map_err(|source| Error::Param {
        node_id: node.node_id.clone(),
        op: node.op.clone(),
        source,
    })?;

    let (inputs, node_refs) = {
        let state = shared.lock().expect("scheduler mutex poisoned");
        let inputs = node
            .inputs
            .iter()
            .map(|dep| {
                let dep_idx = topo_info.index_of[dep];
                state.results[dep_idx].clone().ok_or_else(|| Error::MissingInputResult {
                    node_id: node.node_id.clone(),
                    dep: dep.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut node_refs = std::collections::HashMap::new();
        for (param_name, target) in node.node_ref_params() {
            let target_idx = topo_info.index_of[target];
            let row_set = state.results[target_idx]
                .clone()
                .ok_or_else(|| Error::MissingNodeRefResult {
                    node_id: node.node_id.clone(),
                    op: node.op.clone(),
                    param: param_name.to_string(),
                    dep: target.clone(),
                })?;
            node_refs.insert(param_name.to_string(), row_set);
        }
        (inputs, node_refs)
    };

    if exec_time::deadline_exceeded(Instant::now(), deadline) {
        return Err(Error::DeadlineExceeded {
            node_id: node.node_id.clone(),
            op: node.op.clone(),
        });
    }

    let output = if spec.task.supports_async() {
        let ctx = AsyncExecContext {
            base: ExecContext {
                node_id: &node.node_id,
                op: &node.op,
                user_id,
                request_id,
                node_refs,
                deadline,
            },
            clients,
        };
        // Drive the native-async implementation to completion on a
        // lazily-built, per-worker-thread current-thread runtime;
        // there is no shared event loop to suspend back onto here.
        block_on_current_thread(spec.task.run_async(&inputs, &effective_params, &ctx))
            .map_err(|source| Error::Task {
                node_id: node.node_id.clone(),
                op: node.op.clone(),
                source,
            })?
    } else {
        let ctx = ExecContext {
            node_id: &node.node_id,
            op: &node.op,
            user_id,
            request_id,
            node_refs,
            deadline,
        };
        spec.task
            .run(&inputs, &effective_params, &ctx)
            .map_err(|source| Error::Task {
                node_id: node.node_id.clone(),
                op: node.op.clone(),
                source,
            })?
    };

    let pattern_params = output_contract::PatternParams {
        fanout: effective_params.get("fanout").and_then(plan::ParamValue::as_usize),
        count: effective_params.get("count").and_then(plan::ParamValue::as_usize),
    };

    output_contract::validate(spec.output_pattern, &node.node_id, &node.op, &inputs, &output, pattern_params)
        .map_err(|source| Error::Contract {
            node_id: node.node_id.clone(),
            op: node.op.clone(),
            source,
        })?;

    let delta = compute_schema_delta(node.node_id.clone(), &inputs, &output);

    Ok(NodeOutcome { row_set: output, delta })
}

thread_local! {
    static WORKER_RUNTIME: tokio::runtime::Runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("failed to build sync-scheduler worker runtime");
}

fn block_on_current_thread<F: std::future::Future>(fut: F) -> F::Output {
    WORKER_RUNTIME.with(|rt| rt.block_on(fut))
}
