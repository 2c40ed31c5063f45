//! Per-side store of the last materialized value for each identity.
//!
//! Each side of an exchange owns its cache exclusively: the sender's cache
//! holds the last value it successfully sent per node id, the receiver's
//! holds the last value it materialized. Reference entries record which
//! shared identities have already crossed the wire in the current session.
//!
//! Entries are never evicted within a session; `reset()` purges everything
//! wholesale between independent units of work. This is a deliberate
//! simplicity/memory-growth tradeoff, not an LRU cache.

use crate::error::{RemotingError, Result};
use crate::tree::{NodeId, RefId, Tree};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

struct CachedRef {
    kind: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

/// Identity-keyed store backing one side of the protocol.
#[derive(Default)]
pub struct RemoteObjectCache {
    nodes: HashMap<NodeId, Tree>,
    refs: HashMap<RefId, CachedRef>,
}

impl RemoteObjectCache {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            refs: HashMap::new(),
        }
    }

    /// Last known value for a node identity, if any.
    pub fn get_node(&self, id: NodeId) -> Option<&Tree> {
        self.nodes.get(&id)
    }

    /// Record the latest value for a node identity, replacing any prior one.
    pub fn put_node(&mut self, tree: Tree) {
        self.nodes.insert(tree.id(), tree);
    }

    /// Whether a shared identity has already crossed the wire this session.
    pub fn has_ref(&self, id: RefId) -> bool {
        self.refs.contains_key(&id)
    }

    /// Record a fully-transmitted shared value.
    ///
    /// Fails with [`RemotingError::IdentityCollision`] if the identity is
    /// already cached under a different kind.
    pub fn put_ref<T: Any + Send + Sync>(&mut self, id: RefId, value: Arc<T>) -> Result<()> {
        let kind = std::any::type_name::<T>();
        if let Some(existing) = self.refs.get(&id) {
            if existing.kind != kind {
                return Err(RemotingError::IdentityCollision {
                    id,
                    cached: existing.kind.to_string(),
                    incoming: kind.to_string(),
                });
            }
        }
        self.refs.insert(id, CachedRef { kind, value });
        Ok(())
    }

    /// Resolve an identity-only payload to the one materialized copy.
    pub fn resolve_ref<T: Any + Send + Sync>(&self, id: RefId) -> Result<Arc<T>> {
        let entry = self
            .refs
            .get(&id)
            .ok_or_else(|| RemotingError::desync(format!("reference {id} is not cached")))?;
        let kind = std::any::type_name::<T>();
        if entry.kind != kind {
            return Err(RemotingError::IdentityCollision {
                id,
                cached: entry.kind.to_string(),
                incoming: kind.to_string(),
            });
        }
        entry
            .value
            .clone()
            .downcast::<T>()
            .map_err(|_| RemotingError::IdentityCollision {
                id,
                cached: entry.kind.to_string(),
                incoming: kind.to_string(),
            })
    }

    /// Clear all cached state. Used between independent units of work and
    /// after any failure that leaves cached state untrustworthy.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.refs.clear();
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn ref_count(&self) -> usize {
        self.refs.len()
    }
}
