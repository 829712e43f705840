//! Component E: the persistent, pipelining KV client.
//!
//! §4.5's command lifecycle table describes a C++ coroutine/callback
//! dance built around a heap-allocated "command state" kept alive by
//! a self-reference, with a `completed` flag guarding against a
//! double-wake race between a late reply and an already-fired
//! timeout. In Rust the same guarantees fall out of ownership and
//! channel semantics instead of being hand-built:
//!
//! - the command's `oneshot::Sender` lives inside this client's
//!   `pending` queue entry — exactly the "self-reference that keeps
//!   the state alive until the wire callback fires" from §4.5 phase
//!   3, except the reader task's ownership of the queue *is* the
//!   keep-alive, not a manual refcount;
//! - racing the reply against the timeout is `tokio::select!` over
//!   the oneshot receiver and a `sleep` future — whichever resolves
//!   first wins, and the loser is simply dropped;
//! - a reply that arrives after its command's `command()` call has
//!   already returned (because the timeout won the race) finds the
//!   `oneshot::Receiver` gone; `Sender::send` then just returns
//!   `Err` harmlessly, which is the `completed`-flag check of §4.5
//!   phase 6b for free.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use observability_deps::tracing::{debug, warn};
use plan::{EndpointId, EndpointSpec};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::resp::{encode_command, read_reply, RespValue};
use tracker::AsyncSemaphore;

/// A typed KV command. Only the handful of shapes §6.4 names are
/// modelled; task plugins build one of these rather than hand-rolling
/// RESP arrays.
#[derive(Debug, Clone)]
pub enum Command {
    HGet { key: String, field: String },
    HGetAll { key: String },
    LRange { key: String, start: i64, end: i64 },
}

impl Command {
    fn to_args(&self) -> Vec<String> {
        match self {
            Command::HGet { key, field } => vec!["HGET".into(), key.clone(), field.clone()],
            Command::HGetAll { key } => vec!["HGETALL".into(), key.clone()],
            Command::LRange { key, start, end } => {
                vec!["LRANGE".into(), key.clone(), start.to_string(), end.to_string()]
            }
        }
    }
}

/// A typed reply, translated from [`RespValue`] per §4.5's "deliver
/// typed results: optional string, string array, error".
#[derive(Debug, Clone, PartialEq)]
pub enum KvReply {
    OptionalString(Option<String>),
    StringArray(Vec<String>),
}

#[derive(Debug, snafu::Snafu)]
pub enum ClientError {
    #[snafu(display("connection to {endpoint} could not be established: {source}"))]
    ConnectFailed { endpoint: EndpointId, source: std::io::Error },
    #[snafu(display("connection to {endpoint} is not established"))]
    NotConnected { endpoint: EndpointId },
    #[snafu(display("connection to {endpoint} was lost while waiting for a permit or reply"))]
    ConnectionLost { endpoint: EndpointId },
    #[snafu(display("command to {endpoint} failed to enqueue: {source}"))]
    QueueFailure { endpoint: EndpointId, source: std::io::Error },
    #[snafu(display("command to {endpoint} timed out"))]
    Timeout { endpoint: EndpointId },
    #[snafu(display("{endpoint} returned an error reply: {message}"))]
    RemoteError { endpoint: EndpointId, message: String },
    #[snafu(display("{endpoint} returned an unexpected reply shape for this command"))]
    UnexpectedReplyShape { endpoint: EndpointId },
}

struct PendingCommand {
    tx: oneshot::Sender<Result<RespValue, String>>,
}

struct WriteState {
    write_half: OwnedWriteHalf,
    pending: VecDeque<PendingCommand>,
}

struct Inner {
    endpoint: EndpointId,
    connected: AtomicBool,
    semaphore: AsyncSemaphore,
    write_state: AsyncMutex<WriteState>,
}

/// A persistent connection to one remote KV endpoint, with pipelined
/// commands and FIFO per-endpoint inflight limiting (§4.5).
///
/// One `KvClient` is bound to a single endpoint for the lifetime of a
/// request; `client_cache` owns exactly one per endpoint actually
/// used.
pub struct KvClient {
    inner: Arc<Inner>,
    reader_task: JoinHandle<()>,
}

impl std::fmt::Debug for KvClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvClient")
            .field("endpoint", &self.inner.endpoint)
            .field("connected", &self.inner.connected.load(Ordering::Relaxed))
            .finish()
    }
}

impl KvClient {
    /// Establish a connection to `endpoint` per `spec`'s resolver and
    /// connect-timeout policy.
    pub async fn connect(endpoint: EndpointId, spec: &EndpointSpec) -> Result<Self, ClientError> {
        let addr = format!("{}:{}", spec.host, spec.port);
        let stream = tokio::time::timeout(
            Duration::from_millis(spec.connect_timeout_ms),
            TcpStream::connect(&addr),
        )
        .await
        .map_err(|_| ClientError::ConnectFailed {
            endpoint: endpoint.clone(),
            source: std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
        })?
        .map_err(|source| ClientError::ConnectFailed {
            endpoint: endpoint.clone(),
            source,
        })?;

        let (read_half, write_half) = stream.into_split();
        let inner = Arc::new(Inner {
            endpoint: endpoint.clone(),
            connected: AtomicBool::new(true),
            semaphore: AsyncSemaphore::new(spec.max_inflight),
            write_state: AsyncMutex::new(WriteState {
                write_half,
                pending: VecDeque::new(),
            }),
        });

        let reader_task = tokio::spawn(reader_loop(Arc::clone(&inner), read_half));

        debug!(endpoint = %endpoint, "kv client connected");
        Ok(Self { inner, reader_task })
    }

    pub fn endpoint(&self) -> &EndpointId {
        &self.inner.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Relaxed)
    }

    /// Run one command through the full lifecycle of §4.5's table:
    /// acquire a FIFO inflight permit, re-check connectivity, enqueue
    /// the wire bytes, then race the reply against `timeout`.
    pub async fn command(&self, cmd: Command, timeout: Option<Duration>) -> Result<KvReply, ClientError> {
        let endpoint = self.inner.endpoint.clone();

        if !self.is_connected() {
            return Err(ClientError::NotConnected { endpoint });
        }

        // Phase 1: acquire an inflight permit, FIFO among waiters on
        // this endpoint.
        let permit = self.inner.semaphore.acquire_owned().await;

        // Phase 2: re-check connectivity after the (possibly long)
        // wait — the connection may have dropped while we queued.
        if !self.is_connected() {
            drop(permit);
            return Err(ClientError::ConnectionLost { endpoint });
        }

        // Phase 3/4/5: allocate the command state (the oneshot
        // sender, kept alive by the pending queue entry) and issue
        // the wire bytes.
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.inner.write_state.lock().await;
            let bytes = encode_command(&cmd.to_args());
            if let Err(source) = state.write_half.write_all(&bytes).await {
                self.inner.connected.store(false, Ordering::Relaxed);
                drop(permit);
                return Err(ClientError::QueueFailure { endpoint, source });
            }
            state.pending.push_back(PendingCommand { tx });
        }

        // Phase 6a/6b: race the reply against the timeout. Whichever
        // branch wins releases the permit immediately; the loser's
        // future is simply dropped by `select!`.
        let raw = match timeout {
            Some(d) => {
                tokio::select! {
                    biased;
                    reply = rx => {
                        drop(permit);
                        reply.map_err(|_| ClientError::ConnectionLost { endpoint: endpoint.clone() })?
                    }
                    _ = tokio::time::sleep(d) => {
                        drop(permit);
                        warn!(endpoint = %endpoint, "command timed out, permit released");
                        return Err(ClientError::Timeout { endpoint });
                    }
                }
            }
            None => {
                let reply = rx.await.map_err(|_| ClientError::ConnectionLost { endpoint: endpoint.clone() })?;
                drop(permit);
                reply
            }
        };

        let resp = raw.map_err(|message| ClientError::RemoteError {
            endpoint: endpoint.clone(),
            message,
        })?;

        translate_reply(resp, &endpoint)
    }
}

impl Drop for KvClient {
    fn drop(&mut self) {
        // Rust ownership already gives us the "clear the back-pointer
        // before initiating disconnect" property §4.5/§9 ask for by
        // hand in C++: setting `connected = false` up front means the
        // reader task, if it races this drop, will see the flag
        // before it could ever dereference something freed — there is
        // nothing for it to dereference, since it only holds an
        // `Arc<Inner>` that keeps `Inner` alive until it's done with
        // it regardless of what `KvClient` does.
        self.inner.connected.store(false, Ordering::Relaxed);
        self.reader_task.abort();
    }
}

async fn reader_loop(inner: Arc<Inner>, read_half: OwnedReadHalf) {
    let mut reader = BufReader::new(read_half);
    loop {
        match read_reply(&mut reader).await {
            Ok(value) => {
                let front = {
                    let mut state = inner.write_state.lock().await;
                    state.pending.pop_front()
                };
                match front {
                    Some(pending) => {
                        let result = match &value {
                            RespValue::Error(message) => Err(message.clone()),
                            other => Ok(other.clone()),
                        };
                        // If the waiter already gave up (timeout won
                        // the race), `send` returns `Err` harmlessly —
                        // this is the "late reply is discarded" case.
                        let _ = pending.tx.send(result);
                    }
                    None => {
                        warn!(endpoint = %inner.endpoint, "reply received with no pending command");
                    }
                }
            }
            Err(_) => {
                debug!(endpoint = %inner.endpoint, "connection closed or errored, no automatic reconnection");
                inner.connected.store(false, Ordering::Relaxed);
                let mut state = inner.write_state.lock().await;
                while let Some(pending) = state.pending.pop_front() {
                    let _ = pending.tx.send(Err("connection lost".to_string()));
                }
                return;
            }
        }
    }
}

fn translate_reply(resp: RespValue, endpoint: &EndpointId) -> Result<KvReply, ClientError> {
    match resp {
        RespValue::Bulk(None) => Ok(KvReply::OptionalString(None)),
        RespValue::Bulk(Some(bytes)) => Ok(KvReply::OptionalString(Some(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))),
        RespValue::Simple(s) => Ok(KvReply::OptionalString(Some(s))),
        RespValue::Array(None) => Ok(KvReply::StringArray(Vec::new())),
        RespValue::Array(Some(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    RespValue::Bulk(Some(bytes)) => out.push(String::from_utf8_lossy(&bytes).into_owned()),
                    RespValue::Bulk(None) => out.push(String::new()),
                    RespValue::Simple(s) => out.push(s),
                    _ => return Err(ClientError::UnexpectedReplyShape { endpoint: endpoint.clone() }),
                }
            }
            Ok(KvReply::StringArray(out))
        }
        RespValue::Integer(n) => Ok(KvReply::OptionalString(Some(n.to_string()))),
        RespValue::Error(message) => Err(ClientError::RemoteError {
            endpoint: endpoint.clone(),
            message,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn spawn_echo_server() -> (std::net::SocketAddr, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(_) => {
                        // Always answer with a bulk string "pong", regardless of the command.
                        socket.write_all(b"$4\r\npong\r\n").await.ok();
                    }
                }
            }
        });
        (addr, task)
    }

    #[tokio::test]
    async fn command_round_trips_through_echo_server() {
        let (addr, _server) = spawn_echo_server().await;
        let spec = EndpointSpec::redis(addr.ip().to_string(), addr.port());
        let client = KvClient::connect(EndpointId::from("ep_0001"), &spec).await.unwrap();

        let reply = client
            .command(Command::HGet { key: "k".into(), field: "f".into() }, Some(Duration::from_millis(200)))
            .await
            .unwrap();
        assert_eq!(reply, KvReply::OptionalString(Some("pong".into())));
    }

    #[tokio::test]
    async fn pipelined_commands_receive_replies_in_fifo_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            // Read everything pipelined in, then answer 3 times in order.
            let _ = socket.read(&mut buf).await;
            for i in 0..3 {
                let body = format!("item{i}");
                let frame = format!("${}\r\n{}\r\n", body.len(), body);
                socket.write_all(frame.as_bytes()).await.unwrap();
            }
        });

        let spec = EndpointSpec::redis(addr.ip().to_string(), addr.port()).with_max_inflight(8);
        let client = Arc::new(KvClient::connect(EndpointId::from("ep_0002"), &spec).await.unwrap());

        let mut handles = Vec::new();
        for _ in 0..3 {
            let client = Arc::clone(&client);
            handles.push(tokio::spawn(async move {
                client
                    .command(Command::HGetAll { key: "k".into() }, Some(Duration::from_millis(500)))
                    .await
                    .unwrap()
            }));
        }

        let mut results = Vec::new();
        for h in handles {
            results.push(h.await.unwrap());
        }
        assert_eq!(
            results,
            vec![
                KvReply::OptionalString(Some("item0".into())),
                KvReply::OptionalString(Some("item1".into())),
                KvReply::OptionalString(Some("item2".into())),
            ]
        );
    }

    #[tokio::test]
    async fn timeout_releases_permit_and_discards_late_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            // Reply arrives well after the client's timeout.
            tokio::time::sleep(Duration::from_millis(100)).await;
            socket.write_all(b"$4\r\nlate\r\n").await.ok();
        });

        let spec = EndpointSpec::redis(addr.ip().to_string(), addr.port()).with_max_inflight(1);
        let client = KvClient::connect(EndpointId::from("ep_0003"), &spec).await.unwrap();

        let result = client
            .command(Command::HGet { key: "k".into(), field: "f".into() }, Some(Duration::from_millis(20)))
            .await;
        assert!(matches!(result, Err(ClientError::Timeout { .. })));

        // The permit must already be back: a second command, issued
        // immediately, does not have to wait behind the timed-out one.
        let started = std::time::Instant::now();
        let _ = tokio::time::timeout(
            Duration::from_millis(50),
            client.command(Command::HGet { key: "k2".into(), field: "f".into() }, Some(Duration::from_millis(300))),
        )
        .await;
        assert!(started.elapsed() < Duration::from_millis(50), "second command should not queue behind the timed-out permit");
    }

    #[tokio::test]
    async fn disconnect_fails_pending_commands_without_panicking() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let spec = EndpointSpec::redis(addr.ip().to_string(), addr.port());
        let client = KvClient::connect(EndpointId::from("ep_0004"), &spec).await.unwrap();

        let result = client
            .command(Command::HGet { key: "k".into(), field: "f".into() }, Some(Duration::from_millis(200)))
            .await;
        assert!(result.is_err());
    }
}
