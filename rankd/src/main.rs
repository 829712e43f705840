//! `rankd`: a single-shot CLI driver for the ranking-request execution
//! engine, in the shape of `influxdb_iox`'s `main.rs` — parse a
//! `clap::Parser` config, wire up the handful of long-lived
//! collaborators (task registry, client cache, CPU-offload pool), run
//! one request to completion, and render the result.
//!
//! The async scheduler variant (§4.7.1) must run on a `LocalSet`, so
//! it is driven on `executor::EventLoop`'s dedicated thread rather
//! than on `main`'s own stack: `main` posts one callback that spawns
//! the request as a local task and reports the outcome back over a
//! plain channel, mirroring how `service_common::planner::Planner`
//! hands work to a specific executor and awaits the result.

use std::process::ExitCode;
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use client_cache::ClientCache;
use dag_scheduler::{execute_plan_async, execute_plan_sync, ExecutionResult};
use executor::{DedicatedExecutor, EventLoop};
use observability_deps::tracing::error;
use plan::{EndpointRegistry, Request};
use snafu::ResultExt;
use task_registry::TaskRegistry;

mod config;
mod endpoints;
mod error;
mod output;
mod request;

use config::{Config, SchedulerKind};
use error::{ExecutionSnafu, Result};

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let config = Config::parse();

    match run(config) {
        Ok(rendered) => {
            println!("{}", serde_json::to_string_pretty(&rendered).expect("JSON is always printable"));
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "request failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config) -> Result<serde_json::Value> {
    let request = request::build(&config)?;

    let endpoint_registry = match &config.endpoints {
        Some(path) => endpoints::load(path)?,
        None => EndpointRegistry::default(),
    };

    let registry = Arc::new(TaskRegistry::with_builtins());
    let clients = Arc::new(ClientCache::new(endpoint_registry));
    let cpu_threads = config.cpu_threads.unwrap_or_else(num_cpus::get);
    let cpu_pool = Arc::new(DedicatedExecutor::new("rankd-cpu", cpu_threads));
    let metrics = Arc::new(metric::Registry::new());

    let request_deadline = config
        .deadline_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));

    let result = match config.scheduler {
        SchedulerKind::Async => run_on_event_loop(request, registry, clients, cpu_pool, request_deadline, Arc::clone(&metrics))?,
        SchedulerKind::Sync => execute_plan_sync(
            request,
            &registry,
            &clients,
            config.max_nodes_inflight,
            request_deadline,
            Some(&metrics),
        )
        .context(ExecutionSnafu)?,
    };

    Ok(output::render(&result, config.verbose, &metrics))
}

/// Drive [`execute_plan_async`] to completion on a dedicated
/// [`EventLoop`] thread, blocking this (non-async) thread until it
/// reports back.
fn run_on_event_loop(
    request: Request,
    registry: Arc<TaskRegistry>,
    clients: Arc<ClientCache>,
    cpu_pool: Arc<DedicatedExecutor>,
    request_deadline: Option<Instant>,
    metrics: Arc<metric::Registry>,
) -> Result<ExecutionResult> {
    let mut event_loop = EventLoop::start();
    let handle = event_loop.handle();
    let (tx, rx) = std_mpsc::channel();

    handle
        .post(move || {
            tokio::task::spawn_local(async move {
                let result = execute_plan_async(request, registry, clients, cpu_pool, request_deadline, Some(metrics)).await;
                tx.send(result).ok();
            });
        })
        .expect("event loop was just started and cannot have stopped yet");

    let result = rx
        .recv()
        .expect("event loop thread dropped the reply sender without completing the request")
        .context(ExecutionSnafu);

    event_loop.stop();
    result
}
