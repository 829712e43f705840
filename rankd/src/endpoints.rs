//! Loading an [`EndpointRegistry`] from a JSON file.
//!
//! `plan::EndpointSpec` deliberately carries no `serde` impls — §6.2
//! treats endpoint configuration as a read-only value the core is
//! handed, and loading it from disk is an external collaborator's job
//! (`spec.md` §1's "endpoint configuration loading" Non-goal). `rankd`
//! is that collaborator: it owns a minimal on-disk shape and builds
//! `EndpointSpec` values from it by hand, the same division of labor
//! `influxdb_iox_client`'s config loading keeps from the core data
//! types it populates.

use std::collections::HashMap;
use std::path::Path;

use plan::{EndpointId, EndpointKind, EndpointRegistry, EndpointSpec};
use serde::Deserialize;
use snafu::ResultExt;

use crate::error::{ParseEndpointsFileSnafu, ReadEndpointsFileSnafu, Result, UnknownEndpointKindSnafu};

#[derive(Debug, Deserialize)]
struct RawEndpoint {
    kind: String,
    host: String,
    port: u16,
    #[serde(default = "default_max_inflight")]
    max_inflight: usize,
    #[serde(default = "default_connect_timeout_ms")]
    connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,
}

fn default_max_inflight() -> usize {
    64
}

fn default_connect_timeout_ms() -> u64 {
    250
}

fn default_request_timeout_ms() -> u64 {
    100
}

fn endpoint_kind(endpoint: &str, raw: &str) -> Result<EndpointKind> {
    match raw {
        "redis" => Ok(EndpointKind::Redis),
        "http" => Ok(EndpointKind::Http),
        other => UnknownEndpointKindSnafu {
            endpoint: endpoint.to_string(),
            kind: other.to_string(),
        }
        .fail(),
    }
}

/// Parse `{endpoint_id: {kind, host, port, ...}}` into an
/// [`EndpointRegistry`].
pub fn load(path: &Path) -> Result<EndpointRegistry> {
    let text = std::fs::read_to_string(path).context(ReadEndpointsFileSnafu { path: path.to_path_buf() })?;
    let raw: HashMap<String, RawEndpoint> =
        serde_json::from_str(&text).context(ParseEndpointsFileSnafu { path: path.to_path_buf() })?;

    let mut specs = Vec::with_capacity(raw.len());
    for (id, entry) in raw {
        let kind = endpoint_kind(&id, &entry.kind)?;
        specs.push((
            EndpointId::from(id),
            EndpointSpec {
                kind,
                host: entry.host,
                port: entry.port,
                max_inflight: entry.max_inflight,
                connect_timeout_ms: entry.connect_timeout_ms,
                request_timeout_ms: entry.request_timeout_ms,
            },
        ));
    }
    Ok(EndpointRegistry::from_specs(specs))
}
