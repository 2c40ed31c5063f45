//! The subprocess-side request surface.
//!
//! A [`TreeService`] owns the trees produced by its language front-end,
//! the sender-side [`RemoteObjectCache`], and the codec registry for its
//! source file kind. It answers the minimum surface an orchestrator
//! needs: `parse`, `get_object`, `reset`, `ping`, `shutdown`.

use crate::codec::CodecRegistry;
use crate::engine::{DiffEvent, RemoteObjectCache, SendQueue};
use crate::error::{RemotingError, Result};
use crate::rpc::server::RpcDispatch;
use crate::tree::{NodeId, Tree};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info};

/// Language front-end boundary: produces the first tree snapshot for a
/// source path. Grammars and lexers live behind this seam, outside this
/// crate.
pub trait Parser: Send + Sync + 'static {
    fn parse(&self, path: &str) -> Result<Tree>;
}

#[derive(Debug, Deserialize)]
struct ParseParams {
    paths: Vec<String>,
    #[serde(default)]
    language: Option<String>,
}

/// Result of a `parse` call: one root id per requested path.
#[derive(Debug, Serialize, Deserialize)]
pub struct ParseResult {
    pub root_ids: Vec<NodeId>,
}

#[derive(Debug, Deserialize)]
struct GetObjectParams {
    id: NodeId,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    language: Option<String>,
}

/// Result of a `get_object` call: one whole diff stream.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetObjectResult {
    pub events: Vec<DiffEvent>,
}

/// Subprocess-side dispatcher for one language.
pub struct TreeService<P: Parser> {
    parser: P,
    registry: Arc<CodecRegistry>,
    trees: RwLock<HashMap<NodeId, Tree>>,
    /// Sender-side cache: last value sent to the orchestrator per id.
    cache: Mutex<RemoteObjectCache>,
    shutdown_tx: watch::Sender<bool>,
}

impl<P: Parser> TreeService<P> {
    pub fn new(parser: P, registry: Arc<CodecRegistry>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            parser,
            registry,
            trees: RwLock::new(HashMap::new()),
            cache: Mutex::new(RemoteObjectCache::new()),
            shutdown_tx,
        }
    }

    /// Signal observed by the process owner when a `shutdown` call arrives.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    fn check_language(&self, language: Option<&str>) -> Result<()> {
        match language {
            Some(l) if l != self.registry.source_kind() => Err(RemotingError::InvalidParams {
                message: format!(
                    "language {l} does not match this service's {}",
                    self.registry.source_kind()
                ),
            }),
            _ => Ok(()),
        }
    }

    async fn parse(&self, params: serde_json::Value) -> Result<serde_json::Value> {
        let params: ParseParams =
            serde_json::from_value(params).map_err(|e| RemotingError::InvalidParams {
                message: format!("invalid parse params: {e}"),
            })?;
        self.check_language(params.language.as_deref())?;

        let mut root_ids = Vec::with_capacity(params.paths.len());
        let mut trees = self.trees.write().await;
        for path in &params.paths {
            let tree = self.parser.parse(path)?;
            debug!(path, id = %tree.id(), "parsed source file");
            root_ids.push(tree.id());
            trees.insert(tree.id(), tree);
        }
        Ok(serde_json::to_value(ParseResult { root_ids })?)
    }

    async fn get_object(&self, params: serde_json::Value) -> Result<serde_json::Value> {
        let params: GetObjectParams =
            serde_json::from_value(params).map_err(|e| RemotingError::InvalidParams {
                message: format!("invalid get_object params: {e}"),
            })?;
        self.check_language(params.language.as_deref())?;

        let tree = self
            .trees
            .read()
            .await
            .get(&params.id)
            .cloned()
            .ok_or(RemotingError::ObjectNotFound { id: params.id })?;

        if let Some(expected) = &params.kind {
            if expected != tree.kind() {
                return Err(RemotingError::InvalidParams {
                    message: format!(
                        "object {} has kind {}, caller expected {expected}",
                        params.id,
                        tree.kind()
                    ),
                });
            }
        }

        let mut cache = self.cache.lock().await;
        let events = SendQueue::diff(&mut cache, &self.registry, &tree)?;
        Ok(serde_json::to_value(GetObjectResult { events })?)
    }

    async fn reset(&self) -> Result<serde_json::Value> {
        self.cache.lock().await.reset();
        info!("sender-side object cache reset");
        Ok(serde_json::json!(true))
    }

    /// Replace the stored tree for an id, e.g. after the front-end re-reads
    /// an edited file. The next `get_object` diffs against what was last
    /// sent, so the orchestrator receives only the changes.
    pub async fn update_tree(&self, tree: Tree) {
        self.trees.write().await.insert(tree.id(), tree);
    }
}

#[async_trait::async_trait]
impl<P: Parser> RpcDispatch for TreeService<P> {
    async fn dispatch(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, RemotingError> {
        match method {
            "ping" => Ok(serde_json::json!("pong")),
            "parse" => self.parse(params).await,
            "get_object" => self.get_object(params).await,
            "reset" => self.reset().await,
            "shutdown" => {
                let _ = self.shutdown_tx.send(true);
                Ok(serde_json::json!(true))
            }
            _ => Err(RemotingError::InvalidParams {
                message: format!("Unknown method: {method}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::base_registry;
    use crate::tree::{Identifier, SourceFile};

    struct StubParser;

    impl Parser for StubParser {
        fn parse(&self, path: &str) -> Result<Tree> {
            if path.ends_with(".bad") {
                return Err(RemotingError::ParseFailed {
                    path: path.to_string(),
                    message: "unreadable".to_string(),
                });
            }
            Ok(Tree::SourceFile(SourceFile::new(path, Vec::new())))
        }
    }

    #[tokio::test]
    async fn test_parse_returns_root_ids() {
        let service = TreeService::new(StubParser, base_registry());
        let result = service
            .dispatch("parse", serde_json::json!({"paths": ["a.src", "b.src"]}))
            .await
            .unwrap();
        let result: ParseResult = serde_json::from_value(result).unwrap();
        assert_eq!(result.root_ids.len(), 2);
    }

    #[tokio::test]
    async fn test_parse_failure_is_surfaced() {
        let service = TreeService::new(StubParser, base_registry());
        let err = service
            .dispatch("parse", serde_json::json!({"paths": ["broken.bad"]}))
            .await
            .unwrap_err();
        assert!(matches!(err, RemotingError::ParseFailed { .. }));
    }

    #[tokio::test]
    async fn test_get_object_unknown_id() {
        let service = TreeService::new(StubParser, base_registry());
        let err = service
            .dispatch(
                "get_object",
                serde_json::json!({"id": uuid::Uuid::new_v4()}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RemotingError::ObjectNotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_object_kind_check() {
        let service = TreeService::new(StubParser, base_registry());
        let tree = Tree::Identifier(Identifier::new("x"));
        let id = tree.id();
        service.update_tree(tree).await;

        let err = service
            .dispatch(
                "get_object",
                serde_json::json!({"id": id, "kind": "SourceFile"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RemotingError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn test_language_mismatch_rejected() {
        let service = TreeService::new(StubParser, base_registry());
        let err = service
            .dispatch(
                "parse",
                serde_json::json!({"paths": ["a.src"], "language": "props"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RemotingError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn test_shutdown_signals_owner() {
        let service = TreeService::new(StubParser, base_registry());
        let mut signal = service.shutdown_signal();
        assert!(!*signal.borrow());

        service
            .dispatch("shutdown", serde_json::json!({}))
            .await
            .unwrap();
        signal.changed().await.unwrap();
        assert!(*signal.borrow());
    }
}
