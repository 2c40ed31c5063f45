//! In-process demonstration of a full synchronization session.
//!
//! Starts a [`TreeService`] behind a TCP server, connects a
//! [`RemotingClient`] to it, and walks through parse, materialize, edit
//! and incremental refetch.
//!
//! Run with: cargo run --example sync_demo

use std::sync::Arc;
use treewire_core::codec::base_registry;
use treewire_core::error::Result;
use treewire_core::rpc::{Parser, RemoteServer, RemotingClient, TcpConnectionProvider, TreeService};
use treewire_core::tree::{
    Assignment, Identifier, LeftPadded, Literal, RightPadded, SourceFile, Space, Tree,
};
use tracing::info;

/// Stands in for a real language front-end: every path parses to
/// `count = 0`.
struct DemoParser;

impl Parser for DemoParser {
    fn parse(&self, path: &str) -> Result<Tree> {
        let assignment = Assignment::new(
            Tree::Identifier(Identifier::new("count")),
            LeftPadded::new(Space::of(" "), Tree::Literal(Literal::new("0"))),
        );
        Ok(Tree::SourceFile(SourceFile::new(
            path,
            vec![RightPadded::new(
                Tree::Assignment(assignment),
                Space::of("\n"),
            )],
        )))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,treewire_core=debug".into()),
        )
        .init();

    // Subprocess side: the service owns the trees and the sender cache.
    let service = Arc::new(TreeService::new(DemoParser, base_registry()));
    let mut handle = RemoteServer::start(service.clone()).await?;
    info!("service listening on {}", handle.addr());

    // Orchestrator side.
    let provider = Arc::new(TcpConnectionProvider::new(handle.addr()));
    let client = RemotingClient::new(provider, base_registry());

    let roots = client.parse(&["demo/counter.x"]).await?;
    info!("parsed 1 file, root id {}", roots[0]);

    let tree = client.get_object(roots[0], "SourceFile").await?;
    info!(kind = tree.kind(), "materialized initial snapshot");

    // Simulate an edit on the remote side: same node ids, new literal.
    let Tree::SourceFile(mut file) = tree else {
        unreachable!("demo parser produces source files");
    };
    if let Tree::Assignment(assignment) = &mut file.statements[0].element {
        if let Tree::Literal(literal) = &mut assignment.value.element {
            literal.value_source = Some("42".into());
        }
    }
    service.update_tree(Tree::SourceFile(file)).await;

    // Only the changed literal crosses the wire this time.
    let refetched = client.get_object(roots[0], "SourceFile").await?;
    if let Tree::SourceFile(file) = &refetched {
        if let Tree::Assignment(assignment) = &file.statements[0].element {
            if let Tree::Literal(literal) = &assignment.value.element {
                info!("literal after incremental refetch: {:?}", literal.value_source);
            }
        }
    }

    client.shutdown().await?;
    handle.shutdown();
    Ok(())
}
