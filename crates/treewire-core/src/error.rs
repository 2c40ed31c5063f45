//! Error types for the treewire engine and RPC shell.
//!
//! Diff-stream errors abort the current exchange only; errors for which
//! [`RemotingError::requires_reset`] returns true additionally mark the
//! remote object caches untrustworthy and force a full reset before any
//! further exchange.

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Main error type for treewire operations.
#[derive(Debug, Error)]
pub enum RemotingError {
    // Protocol errors
    #[error("Protocol desync: {message}")]
    ProtocolDesync { message: String },

    #[error("Identity collision for {id}: cached kind {cached}, incoming kind {incoming}")]
    IdentityCollision {
        id: Uuid,
        cached: String,
        incoming: String,
    },

    #[error("Unknown node kind {kind} in registry {registry}")]
    UnknownKind { kind: String, registry: String },

    #[error("Failed to decode {field}: {message}")]
    Decode { field: String, message: String },

    // Connection errors
    #[error("Connection to remote process lost: {message}")]
    ConnectionLost { message: String },

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    // Remote-side failures surfaced through the JSON-RPC error object
    #[error("Remote error {code}: {message}")]
    Remote { code: i32, message: String },

    #[error("Parse failed for {path}: {message}")]
    ParseFailed { path: String, message: String },

    #[error("Object not found: {id}")]
    ObjectNotFound { id: Uuid },

    // Request validation
    #[error("Invalid params: {message}")]
    InvalidParams { message: String },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Transport I/O
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for treewire operations.
pub type Result<T> = std::result::Result<T, RemotingError>;

impl From<std::io::Error> for RemotingError {
    fn from(err: std::io::Error) -> Self {
        RemotingError::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for RemotingError {
    fn from(err: serde_json::Error) -> Self {
        RemotingError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl RemotingError {
    /// Shorthand for a [`RemotingError::ProtocolDesync`].
    pub fn desync(message: impl Into<String>) -> Self {
        RemotingError::ProtocolDesync {
            message: message.into(),
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Standard JSON-RPC error codes:
    /// - -32700: Parse error
    /// - -32600: Invalid Request
    /// - -32601: Method not found
    /// - -32602: Invalid params
    /// - -32603: Internal error
    ///
    /// Custom error codes (application-defined, -32000 to -32099):
    /// - -32000: Connection/transport error
    /// - -32001: Protocol desync
    /// - -32002: Identity collision
    /// - -32003: Unknown node kind
    /// - -32004: Object not found
    /// - -32005: Parse failure
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            RemotingError::InvalidParams { .. } => -32602,

            RemotingError::ConnectionLost { .. } | RemotingError::Timeout(_) => -32000,

            RemotingError::ProtocolDesync { .. } | RemotingError::Decode { .. } => -32001,

            RemotingError::IdentityCollision { .. } => -32002,

            RemotingError::UnknownKind { .. } => -32003,

            RemotingError::ObjectNotFound { .. } => -32004,

            RemotingError::ParseFailed { .. } => -32005,

            // All other errors are internal errors
            _ => -32603,
        }
    }

    /// Check if this error should trigger a single automatic retry after a
    /// subprocess restart.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemotingError::ConnectionLost { .. } | RemotingError::Timeout(_)
        )
    }

    /// Check if this error leaves cached state untrustworthy, forcing a full
    /// cache reset before the next exchange.
    pub fn requires_reset(&self) -> bool {
        matches!(
            self,
            RemotingError::ProtocolDesync { .. }
                | RemotingError::IdentityCollision { .. }
                | RemotingError::Decode { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RemotingError::UnknownKind {
            kind: "props.entry".into(),
            registry: "base".into(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown node kind props.entry in registry base"
        );
    }

    #[test]
    fn test_rpc_error_codes() {
        assert_eq!(
            RemotingError::desync("unexpected tag").to_rpc_error_code(),
            -32001
        );
        assert_eq!(
            RemotingError::UnknownKind {
                kind: "x".into(),
                registry: "base".into()
            }
            .to_rpc_error_code(),
            -32003
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(RemotingError::ConnectionLost {
            message: "broken pipe".into()
        }
        .is_retryable());
        assert!(!RemotingError::desync("bad tag").is_retryable());
    }

    #[test]
    fn test_reset_policy() {
        assert!(RemotingError::desync("bad tag").requires_reset());
        assert!(RemotingError::IdentityCollision {
            id: Uuid::new_v4(),
            cached: "Identifier".into(),
            incoming: "Literal".into(),
        }
        .requires_reset());
        assert!(!RemotingError::Timeout(Duration::from_secs(5)).requires_reset());
    }
}
