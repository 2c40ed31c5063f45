//! Framed JSON-RPC server hosting the subprocess side of the protocol.
//!
//! Listens on `127.0.0.1:0` (OS-assigned port), accepts orchestrator
//! connections, and dispatches method calls to an [`RpcDispatch`]
//! implementation. Each connection is handled in its own task; requests on
//! one connection are processed strictly in order, which is what
//! serializes diff exchanges per connection.

use super::protocol::{read_frame, write_frame, RpcRequest, RpcResponse};
use crate::config::ProtocolConfig;
use crate::error::{RemotingError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info};

/// Handle to a running server. Dropping shuts down the server.
pub struct RemoteServerHandle {
    pub addr: SocketAddr,
    pub port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
    conn_shutdown_tx: watch::Sender<bool>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl RemoteServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and signal active handlers to close.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.conn_shutdown_tx.send(true);
    }
}

impl Drop for RemoteServerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

/// Dispatches RPC method calls on the subprocess side.
#[async_trait::async_trait]
pub trait RpcDispatch: Send + Sync + 'static {
    async fn dispatch(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, RemotingError>;
}

/// Framed JSON-RPC server.
pub struct RemoteServer;

impl RemoteServer {
    /// Start the server on a random local port.
    pub async fn start<D: RpcDispatch>(dispatch: Arc<D>) -> Result<RemoteServerHandle> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let port = addr.port();

        info!("remote server listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (conn_shutdown_tx, conn_shutdown_rx) = watch::channel(false);

        let task_handle = tokio::spawn(Self::accept_loop(
            listener,
            dispatch,
            shutdown_rx,
            conn_shutdown_rx,
        ));

        Ok(RemoteServerHandle {
            addr,
            port,
            shutdown_tx: Some(shutdown_tx),
            conn_shutdown_tx,
            task_handle: Some(task_handle),
        })
    }

    async fn accept_loop<D: RpcDispatch>(
        listener: TcpListener,
        dispatch: Arc<D>,
        mut shutdown_rx: oneshot::Receiver<()>,
        conn_shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("remote server shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            let dispatch = dispatch.clone();
                            let mut conn_shutdown = conn_shutdown_rx.clone();
                            tokio::spawn(async move {
                                debug!("connection from {}", peer_addr);
                                if let Err(e) = Self::handle_connection(stream, &*dispatch, &mut conn_shutdown).await {
                                    debug!("connection {} ended: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("accept error: {}", e);
                        }
                    }
                }
            }
        }
    }

    async fn handle_connection<D: RpcDispatch>(
        mut stream: TcpStream,
        dispatch: &D,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let (mut reader, mut writer) = stream.split();

        loop {
            let frame = tokio::select! {
                result = read_frame(&mut reader) => {
                    match result? {
                        Some(f) => f,
                        None => return Ok(()), // Clean disconnect
                    }
                }
                _ = shutdown_rx.changed() => {
                    return Ok(());
                }
            };

            let request_str = String::from_utf8(frame).map_err(|_| RemotingError::InvalidParams {
                message: "invalid UTF-8 in frame".to_string(),
            })?;

            let response = Self::process_request(&request_str, dispatch).await;

            let response_bytes = serde_json::to_vec(&response)?;
            write_frame(&mut writer, &response_bytes).await?;
        }
    }

    async fn process_request<D: RpcDispatch>(request_str: &str, dispatch: &D) -> RpcResponse {
        let request: RpcRequest = match serde_json::from_str(request_str) {
            Ok(req) => req,
            Err(e) => {
                return RpcResponse::error(None, -32700, format!("Parse error: {}", e));
            }
        };

        if request.jsonrpc != ProtocolConfig::JSONRPC_VERSION {
            return RpcResponse::error(
                request.id,
                -32600,
                "Invalid Request: expected jsonrpc 2.0".to_string(),
            );
        }

        let params = request
            .params
            .unwrap_or(serde_json::Value::Object(Default::default()));

        match dispatch.dispatch(&request.method, params).await {
            Ok(result) => RpcResponse::success(request.id, result),
            Err(e) => {
                let code = e.to_rpc_error_code();
                RpcResponse::error(request.id, code, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoDispatch;

    #[async_trait::async_trait]
    impl RpcDispatch for EchoDispatch {
        async fn dispatch(
            &self,
            method: &str,
            params: serde_json::Value,
        ) -> std::result::Result<serde_json::Value, RemotingError> {
            match method {
                "echo" => Ok(params),
                "fail" => Err(RemotingError::Other("test failure".to_string())),
                _ => Err(RemotingError::InvalidParams {
                    message: format!("Unknown method: {}", method),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_server_start_and_shutdown() {
        let mut handle = RemoteServer::start(Arc::new(EchoDispatch)).await.unwrap();

        assert!(handle.port > 0);
        assert_eq!(handle.addr.ip(), std::net::Ipv4Addr::LOCALHOST);

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_server_echo_roundtrip() {
        let mut handle = RemoteServer::start(Arc::new(EchoDispatch)).await.unwrap();

        let mut stream = TcpStream::connect(handle.addr()).await.unwrap();
        let (mut reader, mut writer) = stream.split();

        let request = RpcRequest::new("echo", serde_json::json!({"hello": "world"}), 1);
        write_frame(&mut writer, &serde_json::to_vec(&request).unwrap())
            .await
            .unwrap();

        let response_bytes = read_frame(&mut reader).await.unwrap().unwrap();
        let response: RpcResponse = serde_json::from_slice(&response_bytes).unwrap();

        assert!(response.error.is_none());
        assert_eq!(response.result, Some(serde_json::json!({"hello": "world"})));

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_server_error_response() {
        let mut handle = RemoteServer::start(Arc::new(EchoDispatch)).await.unwrap();

        let mut stream = TcpStream::connect(handle.addr()).await.unwrap();
        let (mut reader, mut writer) = stream.split();

        let request = RpcRequest::new("fail", serde_json::json!({}), 2);
        write_frame(&mut writer, &serde_json::to_vec(&request).unwrap())
            .await
            .unwrap();

        let response_bytes = read_frame(&mut reader).await.unwrap().unwrap();
        let response: RpcResponse = serde_json::from_slice(&response_bytes).unwrap();

        let err = response.error.unwrap();
        assert_eq!(err.code, -32603);
        assert!(err.message.contains("test failure"));

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_server_invalid_json_returns_parse_error() {
        let mut handle = RemoteServer::start(Arc::new(EchoDispatch)).await.unwrap();

        let mut stream = TcpStream::connect(handle.addr()).await.unwrap();
        let (mut reader, mut writer) = stream.split();

        write_frame(&mut writer, b"not valid json").await.unwrap();

        let response_bytes = read_frame(&mut reader).await.unwrap().unwrap();
        let response: RpcResponse = serde_json::from_slice(&response_bytes).unwrap();

        assert_eq!(response.error.unwrap().code, -32700);

        handle.shutdown();
    }
}
