//! Component G, async variant: the single-threaded cooperative DAG
//! scheduler (§4.7.1-§4.7.5).
//!
//! Grounded on `iox_query::exec::Executor`'s two-pool split (native
//! async nodes run inline on the caller's `LocalSet`; everything else
//! is offloaded to a `DedicatedExecutor`) and on
//! `service_common::planner::Planner`'s `ctx.run(async move {...}).await`
//! pattern for driving work on a specific executor. Scheduler state
//! (`deps_remaining`, `ready_queue`, `results`, `schema_deltas`,
//! `first_error`) lives entirely behind `Rc`/`RefCell` rather than
//! `Arc`/`Mutex`: it is only ever touched from the task that drives
//! this function, which must itself run inside a `LocalSet` (so that
//! `tracker::Job::spawn`'s `spawn_local` has somewhere to land).

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use client_cache::ClientCache;
use column_batch::RowSet;
use executor::DedicatedExecutor;
use observability_deps::tracing::{error, warn};
use plan::{NodeId, ParamValue, Plan, Request};
use schema_delta::{compute_schema_delta, SchemaDelta};
use task_registry::{validate_params, AsyncExecContext, ExecContext, TaskRegistry, TaskSpec};
use tokio::sync::mpsc;
use tracker::{log_join_error, Job};

use crate::error::Error;
use crate::topo::{self, TopoInfo};

/// `ExecutionResult = (outputs[], schema_deltas[])` (§3.5): one row
/// set per `plan.outputs` entry (duplicates preserved verbatim), and
/// one schema delta per node in precomputed topological order.
#[derive(Debug)]
pub struct ExecutionResult {
    pub outputs: Vec<RowSet>,
    pub schema_deltas: Vec<SchemaDelta>,
}

struct NodeOutcome {
    row_set: RowSet,
    delta: SchemaDelta,
}

/// Run `request.plan` to completion on the current `LocalSet`.
///
/// Must be called from within a `LocalSet` context (e.g. inside
/// `local.run_until(...)` or a `#[tokio::test]` that isn't
/// `flavor = "multi_thread"`), since node pipelines are spawned via
/// `Job::spawn`, which panics outside one.
pub async fn execute_plan_async(
    request: Request,
    registry: Arc<TaskRegistry>,
    clients: Arc<ClientCache>,
    cpu_pool: Arc<DedicatedExecutor>,
    request_deadline: Option<Instant>,
    metrics: Option<Arc<metric::Registry>>,
) -> Result<ExecutionResult, Error> {
    let Request {
        plan,
        param_overrides,
        user_id,
        request_id,
    } = request;

    let deps = plan::validate_plan(&plan).map_err(|source| Error::Validation { source })?;
    let topo = topo::build(&plan, &deps);

    let plan = Arc::new(plan);
    let param_overrides = Arc::new(param_overrides);
    let request_id = Arc::new(request_id);
    let n = plan.nodes.len();

    let results: Rc<RefCell<Vec<Option<RowSet>>>> = Rc::new(RefCell::new(vec![None; n]));
    let deltas: Rc<RefCell<Vec<Option<SchemaDelta>>>> = Rc::new(RefCell::new((0..n).map(|_| None).collect()));
    let deps_remaining: Rc<RefCell<Vec<usize>>> = Rc::new(RefCell::new(topo.initial_deps_remaining.clone()));
    let first_error: Rc<RefCell<Option<Error>>> = Rc::new(RefCell::new(None));

    let mut ready_queue: VecDeque<usize> = (0..n).filter(|&i| topo.initial_deps_remaining[i] == 0).collect();

    let (sender, mut receiver) = mpsc::unbounded_channel::<(usize, Result<NodeOutcome, Error>)>();
    let mut inflight: usize = 0;

    let dispatch_one = |idx: usize| -> Job<()> {
        let pipeline = build_pipeline(&plan, idx, &topo, &registry, &results.borrow(), &param_overrides);
        let op = plan.nodes[idx].op.clone();

        let clients = Arc::clone(&clients);
        let cpu_pool = Arc::clone(&cpu_pool);
        let request_id = Arc::clone(&request_id);
        let metrics = metrics.clone();
        let sender = sender.clone();

        Job::spawn(async move {
            let start = Instant::now();
            let outcome = match pipeline {
                Ok(input) => run_node(input, &clients, &cpu_pool, user_id, &request_id, request_deadline).await,
                Err(e) => Err(e),
            };
            crate::stats::record_outcome(metrics.as_deref(), &op, start.elapsed(), outcome.is_ok());
            sender.send((idx, outcome)).ok();
        })
    };

    let mut jobs: Vec<Job<()>> = Vec::new();

    macro_rules! dispatch_ready {
        () => {
            if first_error.borrow().is_none() {
                while let Some(idx) = ready_queue.pop_front() {
                    jobs.push(dispatch_one(idx));
                    inflight += 1;
                }
            }
        };
    }

    dispatch_ready!();

    while inflight > 0 {
        let (idx, outcome) = receiver
            .recv()
            .await
            .expect("sender kept alive by every still-running job");
        inflight -= 1;

        match outcome {
            Ok(NodeOutcome { row_set, delta }) => {
                results.borrow_mut()[idx] = Some(row_set);
                deltas.borrow_mut()[idx] = Some(delta);
                if first_error.borrow().is_none() {
                    let mut dr = deps_remaining.borrow_mut();
                    for &succ in &topo.successors[idx] {
                        dr[succ] -= 1;
                        if dr[succ] == 0 {
                            ready_queue.push_back(succ);
                        }
                    }
                }
            }
            Err(e) => {
                let mut fe = first_error.borrow_mut();
                if fe.is_none() {
                    error!(?e, "node failed, switching scheduler to drain mode");
                    *fe = Some(e);
                } else {
                    warn!("additional node failure discarded after first_error was already recorded");
                }
            }
        }

        dispatch_ready!();
    }

    for job in jobs {
        if let Err(join_err) = job.join().await {
            log_join_error("drain", join_err);
        }
    }

    if let Some(err) = first_error.borrow_mut().take() {
        return Err(err);
    }

    let results = results.borrow();
    let outputs = plan
        .outputs
        .iter()
        .map(|output_id| {
            let idx = topo.index_of[output_id];
            results[idx]
                .clone()
                .expect("every node on the completion path has a stored result")
        })
        .collect();

    let mut deltas = deltas.borrow_mut();
    let schema_deltas = topo
        .order
        .iter()
        .map(|&idx| deltas[idx].take().expect("every node on the completion path has a stored delta"))
        .collect();

    Ok(ExecutionResult { outputs, schema_deltas })
}

/// Everything a node's pipeline needs, assembled synchronously (while
/// still holding a borrow of `results`) before the node is spawned as
/// its own `Job` — §4.7.3 steps 1-4.
struct PipelineInput {
    node_id: NodeId,
    op: String,
    inputs: Vec<RowSet>,
    node_refs: HashMap<String, RowSet>,
    effective_params: BTreeMap<String, ParamValue>,
    spec: TaskSpec,
}

fn build_pipeline(
    plan: &Plan,
    idx: usize,
    topo: &TopoInfo,
    registry: &TaskRegistry,
    results: &[Option<RowSet>],
    param_overrides: &plan::ParamOverrides,
) -> Result<PipelineInput, Error> {
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

    let inputs = node
        .inputs
        .iter()
        .map(|dep| {
            let dep_idx = topo.index_of[dep];
            results[dep_idx].clone().ok_or_else(|| Error::MissingInputResult {
                node_id: node.node_id.clone(),
                dep: dep.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut node_refs = HashMap::new();
    for (param_name, target) in node.node_ref_params() {
        let target_idx = topo.index_of[target];
        let row_set = results[target_idx]
            .clone()
            .ok_or_else(|| Error::MissingNodeRefResult {
                node_id: node.node_id.clone(),
                op: node.op.clone(),
                param: param_name.to_string(),
                dep: target.clone(),
            })?;
        node_refs.insert(param_name.to_string(), row_set);
    }

    Ok(PipelineInput {
        node_id: node.node_id.clone(),
        op: node.op.clone(),
        inputs,
        node_refs,
        effective_params,
        spec,
    })
}

async fn run_node(
    input: PipelineInput,
    clients: &Arc<ClientCache>,
    cpu_pool: &Arc<DedicatedExecutor>,
    user_id: plan::UserId,
    request_id: &str,
    deadline: Option<Instant>,
) -> Result<NodeOutcome, Error> {
    let PipelineInput {
        node_id,
        op,
        inputs,
        node_refs,
        effective_params,
        spec,
    } = input;

    if exec_time::deadline_exceeded(Instant::now(), deadline) {
        return Err(Error::DeadlineExceeded { node_id, op });
    }

    let output = if spec.task.supports_async() {
        let ctx = AsyncExecContext {
            base: ExecContext {
                node_id: &node_id,
                op: &op,
                user_id,
                request_id,
                node_refs,
                deadline,
            },
            clients,
        };
        spec.task
            .run_async(&inputs, &effective_params, &ctx)
            .await
            .map_err(|source| Error::Task {
                node_id: node_id.clone(),
                op: op.clone(),
                source,
            })?
    } else {
        let task = Arc::clone(&spec.task);
        let owned_inputs = inputs.clone();
        let owned_params = effective_params.clone();
        let owned_node_id = node_id.clone();
        let owned_op = op.clone();
        let owned_request_id = request_id.to_string();

        cpu_pool
            .spawn(move || {
                let ctx = ExecContext {
                    node_id: &owned_node_id,
                    op: &owned_op,
                    user_id,
                    request_id: &owned_request_id,
                    node_refs,
                    deadline,
                };
                task.run(&owned_inputs, &owned_params, &ctx)
            })
            .await
            .map_err(|source| Error::Offload {
                node_id: node_id.clone(),
                op: op.clone(),
                source,
            })?
            .map_err(|source| Error::Task {
                node_id: node_id.clone(),
                op: op.clone(),
                source,
            })?
    };

    let pattern_params = output_contract::PatternParams {
        fanout: effective_params.get("fanout").and_then(ParamValue::as_usize),
        count: effective_params.get("count").and_then(ParamValue::as_usize),
    };

    output_contract::validate(spec.output_pattern, &node_id, &op, &inputs, &output, pattern_params)
        .map_err(|source| Error::Contract {
            node_id: node_id.clone(),
            op: op.clone(),
            source,
        })?;

    let delta = compute_schema_delta(node_id.clone(), &inputs, &output);

    Ok(NodeOutcome { row_set: output, delta })
}
