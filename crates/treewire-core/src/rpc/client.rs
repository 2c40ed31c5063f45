//! Orchestrator-side client.
//!
//! A [`RemoteConnection`] serializes framed JSON-RPC calls over one TCP
//! stream. A [`RemotingClient`] layers the tree-synchronization surface on
//! top: it owns the receiver-side cache, obtains its live connection from
//! a [`ConnectionProvider`] (the explicit replacement for a per-thread
//! connection singleton), retries a lost exchange once after a restart,
//! and forces a full both-side reset whenever cached state becomes
//! untrustworthy.

use crate::codec::CodecRegistry;
use crate::config::RpcConfig;
use crate::engine::{ReceiveQueue, RemoteObjectCache};
use crate::error::{RemotingError, Result};
use crate::rpc::protocol::{read_frame, write_frame, RpcRequest, RpcResponse};
use crate::rpc::service::{GetObjectResult, ParseResult};
use crate::tree::{NodeId, Tree};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// One framed JSON-RPC connection to a remote language process.
///
/// A tokio `Mutex` serializes access to the stream, so one request/response
/// exchange is in flight at a time.
#[derive(Debug)]
pub struct RemoteConnection {
    stream: Mutex<TcpStream>,
    addr: SocketAddr,
    next_id: AtomicU64,
}

impl RemoteConnection {
    /// Connect to a remote process's server.
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = tokio::time::timeout(RpcConfig::CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| RemotingError::ConnectionLost {
                message: format!("connect to {addr} timed out"),
            })?
            .map_err(|e| RemotingError::ConnectionLost {
                message: format!("connect to {addr} failed: {e}"),
            })?;

        debug!("connected to remote process at {}", addr);

        Ok(Self {
            stream: Mutex::new(stream),
            addr,
            next_id: AtomicU64::new(1),
        })
    }

    /// Call a JSON-RPC method, waiting up to `timeout` for the response.
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value> {
        tokio::time::timeout(timeout, self.call_inner(method, params))
            .await
            .map_err(|_| RemotingError::Timeout(timeout))?
    }

    /// Call a JSON-RPC method with the default call timeout.
    pub async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        self.call_with_timeout(method, params, RpcConfig::CALL_TIMEOUT)
            .await
    }

    async fn call_inner(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(method, params, id);
        let request_bytes = serde_json::to_vec(&request)?;

        let mut stream = self.stream.lock().await;
        let (mut reader, mut writer) = stream.split();

        write_frame(&mut writer, &request_bytes)
            .await
            .map_err(|e| RemotingError::ConnectionLost {
                message: format!("write to {} failed: {e}", self.addr),
            })?;

        let response_bytes = read_frame(&mut reader)
            .await
            .map_err(|e| RemotingError::ConnectionLost {
                message: format!("read from {} failed: {e}", self.addr),
            })?
            .ok_or_else(|| RemotingError::ConnectionLost {
                message: format!("{} closed the connection", self.addr),
            })?;

        let response: RpcResponse = serde_json::from_slice(&response_bytes)?;

        // A stale frame left queued by a timed-out call would otherwise be
        // consumed as this call's response.
        let expected_id = serde_json::Value::Number(id.into());
        if response.id.as_ref() != Some(&expected_id) {
            return Err(RemotingError::ConnectionLost {
                message: format!(
                    "response from {} answers a different request (expected id {id})",
                    self.addr
                ),
            });
        }

        if let Some(err) = response.error {
            return Err(RemotingError::Remote {
                code: err.code,
                message: err.message,
            });
        }

        response.result.ok_or_else(|| {
            RemotingError::desync("response carries neither result nor error")
        })
    }

    /// Liveness check.
    pub async fn ping(&self) -> Result<()> {
        self.call_with_timeout("ping", serde_json::json!({}), RpcConfig::PING_TIMEOUT)
            .await
            .map(|_| ())
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Entry point for "the current live connection for language L".
///
/// Owns get-or-start and restart-on-failure; actual process launching is
/// the implementor's concern, never this crate's.
#[async_trait::async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// The current live connection, starting the remote process on first
    /// use.
    async fn connection(&self) -> Result<Arc<RemoteConnection>>;

    /// Tear down and re-establish the connection after a failure.
    async fn restart(&self) -> Result<Arc<RemoteConnection>>;
}

/// Provider for a remote process that is already listening on a known
/// address (e.g. started by surrounding tooling).
pub struct TcpConnectionProvider {
    addr: SocketAddr,
    current: Mutex<Option<Arc<RemoteConnection>>>,
}

impl TcpConnectionProvider {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            current: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl ConnectionProvider for TcpConnectionProvider {
    async fn connection(&self) -> Result<Arc<RemoteConnection>> {
        let mut current = self.current.lock().await;
        if let Some(conn) = current.as_ref() {
            if conn.ping().await.is_ok() {
                return Ok(conn.clone());
            }
            warn!("connection to {} failed liveness check", self.addr);
        }
        let conn = Arc::new(RemoteConnection::connect(self.addr).await?);
        *current = Some(conn.clone());
        Ok(conn)
    }

    async fn restart(&self) -> Result<Arc<RemoteConnection>> {
        let mut current = self.current.lock().await;
        *current = None;
        let conn = Arc::new(RemoteConnection::connect(self.addr).await?);
        *current = Some(conn.clone());
        Ok(conn)
    }
}

/// Orchestrator-side handle to one remote language process.
pub struct RemotingClient {
    provider: Arc<dyn ConnectionProvider>,
    registry: Arc<CodecRegistry>,
    language: String,
    /// Receiver-side cache: last materialized value per id. The lock also
    /// serializes exchanges, one tree synchronization in flight at a time.
    cache: Mutex<RemoteObjectCache>,
}

impl RemotingClient {
    pub fn new(provider: Arc<dyn ConnectionProvider>, registry: Arc<CodecRegistry>) -> Self {
        let language = registry.source_kind().to_string();
        Self {
            provider,
            registry,
            language,
            cache: Mutex::new(RemoteObjectCache::new()),
        }
    }

    async fn call_raw(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let conn = self.provider.connection().await?;
        conn.call(method, params).await
    }

    /// Call with the recovery policy for subprocess failure: on a lost
    /// connection or timeout, restart once, clear the local cache (partial
    /// state from the aborted exchange cannot be trusted), and retry. The
    /// retried exchange then requests a full snapshot.
    async fn call_with_retry(
        &self,
        method: &str,
        params: serde_json::Value,
        cache: &mut RemoteObjectCache,
    ) -> Result<serde_json::Value> {
        let conn = self.provider.connection().await?;
        let mut result = conn.call(method, params.clone()).await;
        for _ in 0..RpcConfig::RESTART_RETRIES {
            match &result {
                Err(e) if e.is_retryable() => {
                    warn!("exchange failed ({e}), restarting remote process");
                    let conn = self.provider.restart().await?;
                    // The remote may have survived the connection loss with
                    // its sender cache intact; both sides must forget the
                    // aborted exchange or the retried stream diffs against
                    // state this client no longer holds.
                    conn.call("reset", serde_json::json!({})).await?;
                    cache.reset();
                    result = conn.call(method, params.clone()).await;
                }
                _ => break,
            }
        }
        result
    }

    /// Parse source files in the remote process, returning one root id per
    /// path. Trees are materialized lazily via [`Self::get_object`].
    pub async fn parse(&self, paths: &[&str]) -> Result<Vec<NodeId>> {
        let mut cache = self.cache.lock().await;
        let result = self
            .call_with_retry(
                "parse",
                serde_json::json!({"paths": paths, "language": self.language}),
                &mut cache,
            )
            .await?;
        let result: ParseResult = serde_json::from_value(result)?;
        Ok(result.root_ids)
    }

    /// Materialize the current value of a remote object.
    ///
    /// The remote side sends a diff against what this client last
    /// received for the id; replaying it against the local cache yields
    /// the up-to-date tree without retransmission of unchanged subtrees.
    pub async fn get_object(&self, id: NodeId, expected_kind: &str) -> Result<Tree> {
        let mut cache = self.cache.lock().await;
        let result = self
            .call_with_retry(
                "get_object",
                serde_json::json!({"id": id, "kind": expected_kind, "language": self.language}),
                &mut cache,
            )
            .await?;
        let result: GetObjectResult = serde_json::from_value(result)?;

        match ReceiveQueue::apply(&mut cache, &self.registry, Some(id), result.events) {
            Ok(tree) => Ok(tree),
            Err(e) if e.requires_reset() => {
                // The caches on the two sides can no longer be assumed to
                // agree; clear ours and tell the remote to clear its own
                // before any further exchange.
                warn!("exchange for {id} failed ({e}), forcing full reset");
                cache.reset();
                if let Err(reset_err) = self.call_raw("reset", serde_json::json!({})).await {
                    warn!("remote reset after failed exchange also failed: {reset_err}");
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Clear cached state on both sides. Used between independent units of
    /// work to bound memory growth.
    pub async fn reset(&self) -> Result<()> {
        let mut cache = self.cache.lock().await;
        self.call_raw("reset", serde_json::json!({})).await?;
        cache.reset();
        Ok(())
    }

    /// Liveness check against the current connection.
    pub async fn ping(&self) -> Result<()> {
        self.provider.connection().await?.ping().await
    }

    /// Ask the remote process to shut down.
    pub async fn shutdown(&self) -> Result<()> {
        self.call_raw("shutdown", serde_json::json!({})).await?;
        Ok(())
    }

    /// Number of node identities currently cached locally.
    pub async fn cached_nodes(&self) -> usize {
        self.cache.lock().await.node_count()
    }
}
