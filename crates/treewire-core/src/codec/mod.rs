//! Kind-to-codec dispatch.
//!
//! Each language extension owns a [`CodecRegistry`] holding codecs for its
//! own node kinds and chained onto the shared base registry for the kinds
//! it reuses unmodified. Dispatch prefers the most specific registration:
//! the session's own registry first, then the base chain. A lookup miss is
//! fatal and names the offending kind, since it indicates the two sides
//! disagree on the supported node catalog.

mod base;

pub use base::{base_registry, BaseCodec};

use crate::engine::{NodeHeader, ReceiveQueue, SendQueue};
use crate::error::{RemotingError, Result};
use crate::tree::Tree;
use std::collections::HashMap;
use std::sync::Arc;

/// Encode/decode logic for one or more node kinds.
///
/// `send` and `receive` must visit a node's fields in one canonical fixed
/// order — prefix, markers, kind-specific fields in declaration order,
/// resolved type reference — which is the implicit contract between the
/// two sides of the wire.
pub trait NodeCodec: Send + Sync {
    fn send(&self, before: Option<&Tree>, after: &Tree, q: &mut SendQueue<'_>) -> Result<()>;

    fn receive(
        &self,
        header: NodeHeader,
        before: Option<&Tree>,
        q: &mut ReceiveQueue<'_>,
    ) -> Result<Tree>;
}

/// Maps node kinds to codecs for one source file kind.
pub struct CodecRegistry {
    source_kind: String,
    codecs: HashMap<String, Arc<dyn NodeCodec>>,
    base: Option<Arc<CodecRegistry>>,
}

impl CodecRegistry {
    /// A root registry with no delegation target.
    pub fn new(source_kind: impl Into<String>) -> Self {
        Self {
            source_kind: source_kind.into(),
            codecs: HashMap::new(),
            base: None,
        }
    }

    /// An extension registry that falls through to `base` for node kinds
    /// it does not specialize.
    pub fn with_base(source_kind: impl Into<String>, base: Arc<CodecRegistry>) -> Self {
        Self {
            source_kind: source_kind.into(),
            codecs: HashMap::new(),
            base: Some(base),
        }
    }

    /// The source file kind tag this registry serves, carried in the
    /// session so both sides consult the same catalog.
    pub fn source_kind(&self) -> &str {
        &self.source_kind
    }

    pub fn register(&mut self, kind: impl Into<String>, codec: Arc<dyn NodeCodec>) {
        self.codecs.insert(kind.into(), codec);
    }

    /// Look up the codec for a node kind, preferring this registry's own
    /// registrations over the base chain.
    pub fn dispatch(&self, kind: &str) -> Result<Arc<dyn NodeCodec>> {
        if let Some(codec) = self.codecs.get(kind) {
            return Ok(codec.clone());
        }
        if let Some(base) = &self.base {
            if let Ok(codec) = base.dispatch(kind) {
                return Ok(codec);
            }
        }
        Err(RemotingError::UnknownKind {
            kind: kind.to_string(),
            registry: self.source_kind.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Identifier;

    #[test]
    fn test_base_registry_dispatch() {
        let registry = base_registry();
        assert!(registry.dispatch(Identifier::KIND).is_ok());
    }

    #[test]
    fn test_unknown_kind_names_offender_and_registry() {
        let registry = base_registry();
        let err = registry.dispatch("mystery.node").err().unwrap();
        match err {
            RemotingError::UnknownKind { kind, registry } => {
                assert_eq!(kind, "mystery.node");
                assert_eq!(registry, "base");
            }
            other => panic!("expected UnknownKind, got: {other:?}"),
        }
    }

    #[test]
    fn test_extension_registry_falls_through_to_base() {
        let ext = CodecRegistry::with_base("ext", base_registry());
        assert!(ext.dispatch(Identifier::KIND).is_ok());

        let err = ext.dispatch("mystery.node").err().unwrap();
        match err {
            RemotingError::UnknownKind { registry, .. } => assert_eq!(registry, "ext"),
            other => panic!("expected UnknownKind, got: {other:?}"),
        }
    }
}
