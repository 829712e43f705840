use std::collections::HashMap;
use std::sync::Arc;

use output_contract::OutputPattern;
use writes_effect::WritesExpr;

use crate::param::ParamField;
use crate::task_impl::TaskImpl;

/// Everything `dag_scheduler` needs to know about one op: its
/// parameter schema, declared `reads`/`writes` key sets, output
/// contract pattern, optional writes-effect expression, whether it is
/// I/O-bound, and the implementation itself (§3.4).
#[derive(Clone)]
pub struct TaskSpec {
    pub op: &'static str,
    pub params: Vec<ParamField>,
    pub reads: Vec<u32>,
    pub writes: Vec<u32>,
    pub output_pattern: OutputPattern,
    pub writes_effect: Option<WritesExpr>,
    pub is_io: bool,
    pub task: Arc<dyn TaskImpl>,
}

impl std::fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSpec")
            .field("op", &self.op)
            .field("is_io", &self.is_io)
            .field("output_pattern", &self.output_pattern)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, snafu::Snafu)]
#[snafu(display("unknown op {op:?}"))]
pub struct UnknownOp {
    pub op: String,
}

/// A fixed table of named task kinds, populated at construction — the
/// way `query_functions` registers its named functions.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    specs: HashMap<&'static str, TaskSpec>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spec, overwriting any previous registration under
    /// the same op name. Intended for test fixtures and plugin
    /// bring-up; op names are a flat namespace, not versioned.
    pub fn register(&mut self, spec: TaskSpec) {
        self.specs.insert(spec.op, spec);
    }

    pub fn get(&self, op: &str) -> Result<&TaskSpec, UnknownOp> {
        self.specs.get(op).ok_or_else(|| UnknownOp { op: op.to_string() })
    }

    pub fn contains(&self, op: &str) -> bool {
        self.specs.contains_key(op)
    }

    /// A registry pre-populated with the reference builtin ops
    /// (§1's "small set of reference builtin ops... additive test
    /// fixtures, not a claim that the real viewer/follow/media/vm
    /// stack is in scope").
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for spec in crate::builtin::all() {
            registry.register(spec);
        }
        registry
    }
}
