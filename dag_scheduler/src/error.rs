//! The unified error type both scheduler variants return: every
//! variant carries the node id and op of the node that failed, so a
//! caller sees a single message naming where and why (§7's "a single
//! error message carrying node id, op, and a human-readable cause").

#[derive(Debug, snafu::Snafu)]
pub enum Error {
    #[snafu(display("plan validation failed: {source}"))]
    Validation { source: plan::ValidationError },

    #[snafu(display("node {node_id} (op {op}): parameter error: {source}"))]
    Param {
        node_id: String,
        op: String,
        source: task_registry::ParamError,
    },

    #[snafu(display("node {node_id}: {source}"))]
    UnknownOp {
        node_id: String,
        source: task_registry::UnknownOp,
    },

    #[snafu(display("node {node_id} (op {op}) failed: {source}"))]
    Task {
        node_id: String,
        op: String,
        source: task_registry::TaskError,
    },

    #[snafu(display("node {node_id} (op {op}): output contract violated: {source}"))]
    Contract {
        node_id: String,
        op: String,
        source: output_contract::ContractError,
    },

    #[snafu(display("node {node_id} (op {op}): CPU offload failed: {source}"))]
    Offload {
        node_id: String,
        op: String,
        source: executor::OffloadError,
    },

    #[snafu(display("node {node_id} (op {op}): request deadline exceeded before dispatch"))]
    DeadlineExceeded { node_id: String, op: String },

    #[snafu(display("node {node_id}: required input {dep} has no recorded result"))]
    MissingInputResult { node_id: String, dep: String },

    #[snafu(display("node {node_id} (op {op}): NodeRef parameter {param} targets {dep}, which has no recorded result"))]
    MissingNodeRefResult {
        node_id: String,
        op: String,
        param: String,
        dep: String,
    },

    #[snafu(display("node {node_id} panicked during drain after an earlier node failed"))]
    DrainJoin { node_id: String },
}
