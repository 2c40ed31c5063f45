//! Treewire Core - incremental tree synchronization between processes.
//!
//! Keeps a richly-typed, whitespace-preserving syntax tree consistent
//! between two processes that each hold a local copy, transmitting only
//! what changed since the last exchange. Per-language parser front-ends
//! produce trees behind the [`rpc::Parser`] seam; this crate owns the diff
//! engine, the codec dispatch, the per-side object caches and the framed
//! JSON-RPC shell.
//!
//! # Example
//!
//! ```rust,ignore
//! use treewire_core::codec::base_registry;
//! use treewire_core::rpc::{RemotingClient, TcpConnectionProvider};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> treewire_core::Result<()> {
//!     let provider = Arc::new(TcpConnectionProvider::new(addr));
//!     let client = RemotingClient::new(provider, base_registry());
//!
//!     let roots = client.parse(&["src/main.x"]).await?;
//!     let tree = client.get_object(roots[0], "SourceFile").await?;
//!
//!     // Later calls transmit only what changed.
//!     let tree = client.get_object(roots[0], "SourceFile").await?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod rpc;
pub mod tree;

// Re-export commonly used types
pub use codec::{base_registry, BaseCodec, CodecRegistry, NodeCodec};
pub use engine::{DiffEvent, DiffOp, NodeHeader, ReceiveQueue, RemoteObjectCache, SendQueue};
pub use error::{RemotingError, Result};
pub use rpc::{
    ConnectionProvider, Parser, RemoteConnection, RemoteServer, RemoteServerHandle, RemotingClient,
    RpcDispatch, TcpConnectionProvider, TreeService,
};
pub use tree::{
    Assignment, Block, Call, Comment, Container, ExtNode, ExtensionNode, Identifier, LeftPadded,
    Literal, Marker, Markers, NodeId, RefId, Reference, RightPadded, SourceFile, Space, Tree,
    TypeDescriptor,
};
