//! Shared plain data model for a validated ranking plan (§3.3/§3.4),
//! the endpoint registry it references (§6.2), and the request
//! envelope at the core's boundary (§6.1).
//!
//! Parsing plan JSON into these types, loading the parameter/key
//! registries that give `params`/`key_ids` their names, and loading
//! endpoint configuration from a file are all explicitly out of scope
//! (`spec.md` §1) — this crate only holds the data model those
//! external collaborators would produce and the core consumes.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod endpoint;
mod node;
mod request;
mod validate;

pub use endpoint::{EndpointId, EndpointKind, EndpointRegistry, EndpointSpec};
pub use node::{Node, NodeId, ParamValue, Plan, CURRENT_SCHEMA_VERSION};
pub use request::{ParamOverrides, Request, UserId, UserIdError};
pub use validate::{validate_plan, Dependencies, ValidationError};
