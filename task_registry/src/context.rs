use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use client_cache::ClientCache;
use column_batch::RowSet;
use plan::UserId;

/// The per-request, per-node pipeline context assembled by
/// `dag_scheduler` at step 4 of §4.7.3: the base request context plus
/// the resolved `param_name -> row_set` map for this node's NodeRef
/// parameters.
#[derive(Debug)]
pub struct ExecContext<'a> {
    pub node_id: &'a str,
    pub op: &'a str,
    pub user_id: UserId,
    pub request_id: &'a str,
    pub node_refs: HashMap<String, RowSet>,
    pub deadline: Option<Instant>,
}

impl<'a> ExecContext<'a> {
    pub fn node_ref(&self, param_name: &str) -> Option<&RowSet> {
        self.node_refs.get(param_name)
    }
}

/// The same context, plus access to the request's shared I/O client
/// cache — only native-async tasks (`is_io: true`, with a
/// `run_async`) ever see this; sync tasks run on the CPU pool and get
/// a plain [`ExecContext`].
#[derive(Debug)]
pub struct AsyncExecContext<'a> {
    pub base: ExecContext<'a>,
    pub clients: &'a Arc<ClientCache>,
}

impl<'a> AsyncExecContext<'a> {
    pub fn node_ref(&self, param_name: &str) -> Option<&RowSet> {
        self.base.node_ref(param_name)
    }
}
