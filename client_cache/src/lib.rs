//! Component F: the per-request client cache.
//!
//! Mirrors `cache_system::cache::driver::CacheDriver`'s "check cache,
//! else construct and insert" shape, minus the shared/in-flight-dedup
//! machinery that crate needs for cross-request sharing — this cache
//! is private to one request (`spec.md` §1's Non-goal: "no
//! cross-request sharing of per-request client caches"), so there is
//! no need for the `Shared<BoxFuture<..>>` dance `CacheDriver` uses to
//! let concurrent callers await the same in-flight load.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

use std::collections::HashMap;
use std::sync::Arc;

use observability_deps::tracing::{debug, warn};
use plan::{EndpointId, EndpointKind, EndpointRegistry};
use tokio::sync::Mutex as AsyncMutex;

use io_client::KvClient;

#[derive(Debug, snafu::Snafu)]
pub enum ClientCacheError {
    #[snafu(display("endpoint {endpoint} is not present in the endpoint registry"))]
    UnknownEndpoint { endpoint: EndpointId },
    #[snafu(display("endpoint {endpoint} is a {actual:?} endpoint, not the {expected:?} this task requires"))]
    WrongEndpointKind {
        endpoint: EndpointId,
        expected: EndpointKind,
        actual: EndpointKind,
    },
    #[snafu(display("connecting to {endpoint} failed: {source}"))]
    ConnectFailed {
        endpoint: EndpointId,
        source: io_client::ClientError,
    },
}

#[derive(Default)]
struct State {
    clients: HashMap<EndpointId, Arc<KvClient>>,
    /// Insertion order, so the cache can close clients in reverse
    /// order on teardown (§4.6).
    order: Vec<EndpointId>,
}

/// A mapping from endpoint id to a live [`KvClient`], owned for the
/// duration of one request and shared by reference across its
/// coroutines.
///
/// Single-threaded per request: every `get_or_connect` call for a
/// not-yet-cached endpoint holds the cache's lock across the
/// connection attempt, so two nodes racing to be first to talk to a
/// brand-new endpoint still only open one connection — the same
/// guarantee `CacheDriver` gives its callers, just without the
/// cross-request sharing this crate's Non-goal excludes.
pub struct ClientCache {
    registry: EndpointRegistry,
    state: AsyncMutex<State>,
}

impl std::fmt::Debug for ClientCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCache").finish_non_exhaustive()
    }
}

impl ClientCache {
    pub fn new(registry: EndpointRegistry) -> Self {
        Self {
            registry,
            state: AsyncMutex::new(State::default()),
        }
    }

    /// Look up (or lazily create) the client for `endpoint_id`.
    ///
    /// Rejects unknown endpoints and endpoints of the wrong kind per
    /// §4.6 step 2 — this engine only ever speaks the RESP protocol,
    /// so `expected` is always [`EndpointKind::Redis`].
    pub async fn get_or_connect(&self, endpoint_id: &EndpointId) -> Result<Arc<KvClient>, ClientCacheError> {
        let mut state = self.state.lock().await;

        if let Some(client) = state.clients.get(endpoint_id) {
            return Ok(Arc::clone(client));
        }

        let spec = self
            .registry
            .get(endpoint_id)
            .ok_or_else(|| ClientCacheError::UnknownEndpoint {
                endpoint: endpoint_id.clone(),
            })?;

        if spec.kind != EndpointKind::Redis {
            return Err(ClientCacheError::WrongEndpointKind {
                endpoint: endpoint_id.clone(),
                expected: EndpointKind::Redis,
                actual: spec.kind,
            });
        }

        let client = KvClient::connect(endpoint_id.clone(), spec)
            .await
            .map_err(|source| ClientCacheError::ConnectFailed {
                endpoint: endpoint_id.clone(),
                source,
            })?;
        let client = Arc::new(client);
        state.clients.insert(endpoint_id.clone(), Arc::clone(&client));
        state.order.push(endpoint_id.clone());

        Ok(client)
    }

    /// Number of distinct endpoints this request has connected to so
    /// far.
    pub async fn len(&self) -> usize {
        self.state.lock().await.clients.len()
    }
}

impl Drop for ClientCache {
    fn drop(&mut self) {
        // `try_lock` rather than a blocking lock: by the time
        // `ClientCache` is dropped, the request's coroutines holding
        // references to it have already completed, so the lock is
        // uncontended, and a blocking acquire risks panicking inside
        // a current-thread Tokio runtime.
        let Ok(mut state) = self.state.try_lock() else {
            warn!("ClientCache dropped while still locked; clients will close in arbitrary order");
            return;
        };
        let order = std::mem::take(&mut state.order);
        for endpoint_id in order.into_iter().rev() {
            if let Some(client) = state.clients.remove(&endpoint_id) {
                debug!(endpoint = %endpoint_id, "closing kv client on request teardown");
                drop(client);
            }
        }
    }
}
