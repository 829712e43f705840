//! CLI surface, in the shape of `influxdb_iox::commands::run::Config`:
//! a single `clap::Parser` struct read once at startup and threaded
//! through to the rest of the program. Plan JSON parsing, endpoint
//! config loading, and param-override loading are external
//! collaborators per `spec.md` §1 — this struct only names where to
//! find them; `crate::request` does the loading.

use std::path::PathBuf;

use clap::Parser;

/// Which of the two interchangeable `dag_scheduler` variants executes
/// the plan (§4.7.6): the default single-threaded async scheduler, or
/// the mutex/condvar-driven parallel variant for callers that can't
/// offer an async runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ArgEnum)]
pub enum SchedulerKind {
    Async,
    Sync,
}

#[derive(Debug, Parser)]
#[clap(name = "rankd", about = "Execute a ranking-request plan to completion")]
pub struct Config {
    /// Path to the plan JSON file (§6.3).
    #[clap(long, env = "RANKD_PLAN")]
    pub plan: PathBuf,

    /// Path to an endpoint registry JSON file (§6.2). If omitted, the
    /// plan must not reference any endpoint (e.g. a plan built only
    /// from in-memory reference ops like `source`/`take`/`concat`).
    #[clap(long, env = "RANKD_ENDPOINTS")]
    pub endpoints: Option<PathBuf>,

    /// Path to a per-node parameter overrides JSON file: `{node_id:
    /// {param_name: value}}` (§6.1).
    #[clap(long, env = "RANKD_PARAM_OVERRIDES")]
    pub param_overrides: Option<PathBuf>,

    /// The requesting user id: a positive integer, or a decimal-only
    /// string within `[1, 2^32-1]` (§6.1).
    #[clap(long, env = "RANKD_USER_ID")]
    pub user_id: String,

    /// Opaque request id. Generated (a random UUID) if absent.
    #[clap(long, env = "RANKD_REQUEST_ID")]
    pub request_id: Option<String>,

    /// Overall request deadline in milliseconds, measured from
    /// dispatch. Unset means no deadline.
    #[clap(long, env = "RANKD_DEADLINE_MS")]
    pub deadline_ms: Option<u64>,

    /// Which scheduler variant to run the plan on.
    #[clap(long, arg_enum, default_value = "async")]
    pub scheduler: SchedulerKind,

    /// Worker thread count for the CPU-offload pool (component C).
    /// Defaults to the number of logical CPUs.
    #[clap(long)]
    pub cpu_threads: Option<usize>,

    /// Maximum nodes dispatched concurrently by the sync scheduler
    /// variant (ignored by the async variant, which has no such cap —
    /// see §9's open question on hard vs soft `inflight` caps).
    #[clap(long, default_value_t = dag_scheduler::DEFAULT_MAX_NODES_INFLIGHT)]
    pub max_nodes_inflight: usize,

    /// Print the full ExecutionResult (ids per output row set) rather
    /// than just a summary.
    #[clap(long)]
    pub verbose: bool,
}
