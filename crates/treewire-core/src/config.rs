//! Centralized configuration for the treewire RPC shell.

use std::time::Duration;

/// Limits and timings for the framed wire protocol.
pub struct ProtocolConfig;

impl ProtocolConfig {
    /// Maximum size of a single framed message. One diff stream travels in
    /// one frame, so this bounds the largest single exchange.
    pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024; // 64MB

    /// JSON-RPC protocol version carried on every request and response.
    pub const JSONRPC_VERSION: &'static str = "2.0";
}

/// Timings for the orchestrator-side client.
pub struct RpcConfig;

impl RpcConfig {
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const CALL_TIMEOUT: Duration = Duration::from_secs(60);
    pub const PING_TIMEOUT: Duration = Duration::from_secs(3);

    /// How many times a failed exchange is retried after a subprocess
    /// restart before the failure is surfaced to the caller.
    pub const RESTART_RETRIES: u32 = 1;
}
