//! The CLI-level error type: everything that can go wrong before or
//! after the core runs, wrapping `dag_scheduler::Error` for the run
//! itself. Mirrors `influxdb_iox::commands::run::Error`'s shape of one
//! context-tagged variant per subcommand/stage.

use std::path::PathBuf;

#[derive(Debug, snafu::Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("failed to read plan file {path:?}: {source}"))]
    ReadPlanFile { path: PathBuf, source: std::io::Error },

    #[snafu(display("failed to parse plan file {path:?} as JSON: {source}"))]
    ParsePlanFile { path: PathBuf, source: serde_json::Error },

    #[snafu(display("failed to read param overrides file {path:?}: {source}"))]
    ReadParamOverridesFile { path: PathBuf, source: std::io::Error },

    #[snafu(display("failed to parse param overrides file {path:?} as JSON: {source}"))]
    ParseParamOverridesFile { path: PathBuf, source: serde_json::Error },

    #[snafu(display("failed to read endpoint registry file {path:?}: {source}"))]
    ReadEndpointsFile { path: PathBuf, source: std::io::Error },

    #[snafu(display("failed to parse endpoint registry file {path:?}: {source}"))]
    ParseEndpointsFile { path: PathBuf, source: serde_json::Error },

    #[snafu(display("endpoint {endpoint:?} has unknown kind {kind:?} (expected \"redis\" or \"http\")"))]
    UnknownEndpointKind { endpoint: String, kind: String },

    #[snafu(display("invalid user_id {raw:?}: {source}"))]
    InvalidUserId { raw: String, source: plan::UserIdError },

    #[snafu(display("request failed: {source}"))]
    Execution { source: dag_scheduler::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
