//! The RPC shell around the diff engine.
//!
//! One logical message is one RPC call or one diff stream, carried over an
//! ordered, reliable, length-prefixed channel. The subprocess side hosts a
//! [`TreeService`] behind a [`RemoteServer`]; the orchestrator side drives
//! a [`RemotingClient`] over a connection obtained from a
//! [`ConnectionProvider`]. Process launching itself lives outside this
//! crate, behind the provider.

mod client;
mod protocol;
mod server;
mod service;

pub use client::{ConnectionProvider, RemoteConnection, RemotingClient, TcpConnectionProvider};
pub use protocol::{read_frame, write_frame, RpcError, RpcRequest, RpcResponse};
pub use server::{RemoteServer, RemoteServerHandle, RpcDispatch};
pub use service::{GetObjectResult, ParseResult, Parser, TreeService};
