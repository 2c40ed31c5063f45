//! Properties-file language extension.
//!
//! A small but complete language extension: two node kinds of its own
//! (`props.file` and `props.entry`), reusing the base catalog's
//! `Identifier` and `Literal` for keys and values. Its registry chains
//! onto the base registry, so a properties tree can mix extension and
//! base nodes freely and the codec for each node is found by kind.

use std::any::Any;
use std::sync::Arc;
use treewire_core::codec::{base_registry, CodecRegistry, NodeCodec};
use treewire_core::engine::{NodeHeader, ReceiveQueue, SendQueue};
use treewire_core::error::{RemotingError, Result};
use treewire_core::tree::{
    ExtNode, ExtensionNode, LeftPadded, Markers, NodeId, RightPadded, Space, Tree,
};
use uuid::Uuid;

/// A whole properties file: an ordered run of entries plus trailing space.
#[derive(Debug, Clone, PartialEq)]
pub struct PropsFile {
    pub id: NodeId,
    pub prefix: Space,
    pub markers: Markers,
    pub source_path: String,
    pub entries: Vec<RightPadded<Tree>>,
    pub eof: Space,
}

impl PropsFile {
    pub const KIND: &'static str = "props.file";

    pub fn new(source_path: impl Into<String>, entries: Vec<RightPadded<Tree>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prefix: Space::empty(),
            markers: Markers::empty(),
            source_path: source_path.into(),
            entries,
            eof: Space::empty(),
        }
    }

    pub fn into_tree(self) -> Tree {
        Tree::Ext(ExtNode::new(self))
    }
}

impl ExtensionNode for PropsFile {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn prefix(&self) -> &Space {
        &self.prefix
    }

    fn markers(&self) -> &Markers {
        &self.markers
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_node(&self, other: &dyn ExtensionNode) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .map_or(false, |o| o == self)
    }
}

/// One `key = value` entry. The key is a base `Identifier`, the value a
/// base `Literal`; the space around `=` lives in the value's padding.
#[derive(Debug, Clone, PartialEq)]
pub struct PropsEntry {
    pub id: NodeId,
    pub prefix: Space,
    pub markers: Markers,
    pub key: Box<Tree>,
    pub value: Box<LeftPadded<Tree>>,
}

impl PropsEntry {
    pub const KIND: &'static str = "props.entry";

    pub fn new(key: Tree, value: LeftPadded<Tree>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prefix: Space::empty(),
            markers: Markers::empty(),
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn into_tree(self) -> Tree {
        Tree::Ext(ExtNode::new(self))
    }
}

impl ExtensionNode for PropsEntry {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn prefix(&self) -> &Space {
        &self.prefix
    }

    fn markers(&self) -> &Markers {
        &self.markers
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_node(&self, other: &dyn ExtensionNode) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .map_or(false, |o| o == self)
    }
}

/// Codec for the extension's own kinds. Base kinds inside a properties
/// tree never reach this codec; dispatch resolves them to the base
/// registry.
pub struct PropsCodec;

impl NodeCodec for PropsCodec {
    fn send(&self, before: Option<&Tree>, after: &Tree, q: &mut SendQueue<'_>) -> Result<()> {
        let Tree::Ext(ext) = after else {
            return Err(unknown_kind(after.kind()));
        };
        if let Some(a) = ext.downcast::<PropsFile>() {
            send_file(before_file(before)?, a, q)
        } else if let Some(a) = ext.downcast::<PropsEntry>() {
            send_entry(before_entry(before)?, a, q)
        } else {
            Err(unknown_kind(ext.kind()))
        }
    }

    fn receive(
        &self,
        header: NodeHeader,
        before: Option<&Tree>,
        q: &mut ReceiveQueue<'_>,
    ) -> Result<Tree> {
        match header.kind.as_str() {
            PropsFile::KIND => {
                receive_file(header, before_file(before)?, q).map(PropsFile::into_tree)
            }
            PropsEntry::KIND => {
                receive_entry(header, before_entry(before)?, q).map(PropsEntry::into_tree)
            }
            other => Err(unknown_kind(other)),
        }
    }
}

/// Registry for properties-file sessions: the extension's kinds plus the
/// whole base catalog by delegation.
pub fn props_registry() -> Arc<CodecRegistry> {
    let mut registry = CodecRegistry::with_base("props", base_registry());
    let codec: Arc<dyn NodeCodec> = Arc::new(PropsCodec);
    registry.register(PropsFile::KIND, codec.clone());
    registry.register(PropsEntry::KIND, codec);
    Arc::new(registry)
}

fn unknown_kind(kind: &str) -> RemotingError {
    RemotingError::UnknownKind {
        kind: kind.to_string(),
        registry: "props".to_string(),
    }
}

fn kind_mismatch(expected: &str, found: &str) -> RemotingError {
    RemotingError::desync(format!("expected a {expected} before value, found {found}"))
}

fn before_file(before: Option<&Tree>) -> Result<Option<&PropsFile>> {
    match before {
        None => Ok(None),
        Some(Tree::Ext(n)) => match n.downcast::<PropsFile>() {
            Some(f) => Ok(Some(f)),
            None => Err(kind_mismatch(PropsFile::KIND, n.kind())),
        },
        Some(other) => Err(kind_mismatch(PropsFile::KIND, other.kind())),
    }
}

fn before_entry(before: Option<&Tree>) -> Result<Option<&PropsEntry>> {
    match before {
        None => Ok(None),
        Some(Tree::Ext(n)) => match n.downcast::<PropsEntry>() {
            Some(e) => Ok(Some(e)),
            None => Err(kind_mismatch(PropsEntry::KIND, n.kind())),
        },
        Some(other) => Err(kind_mismatch(PropsEntry::KIND, other.kind())),
    }
}

fn send_file(b: Option<&PropsFile>, a: &PropsFile, q: &mut SendQueue<'_>) -> Result<()> {
    q.space(b.map(|x| &x.prefix), &a.prefix)?;
    q.markers(b.map(|x| &x.markers), &a.markers)?;
    q.scalar(b.map(|x| &x.source_path), &a.source_path)?;
    q.tree_list(b.map(|x| x.entries.as_slice()), &a.entries)?;
    q.space(b.map(|x| &x.eof), &a.eof)
}

fn receive_file(
    header: NodeHeader,
    b: Option<&PropsFile>,
    q: &mut ReceiveQueue<'_>,
) -> Result<PropsFile> {
    let prefix = q.space(b.map(|x| &x.prefix))?;
    let markers = q.markers(b.map(|x| &x.markers))?;
    let source_path = q.scalar(b.map(|x| &x.source_path), "props_file.source_path")?;
    let entries = q.tree_list(b.map(|x| x.entries.as_slice()))?;
    let eof = q.space(b.map(|x| &x.eof))?;
    Ok(PropsFile {
        id: header.id,
        prefix,
        markers,
        source_path,
        entries,
        eof,
    })
}

fn send_entry(b: Option<&PropsEntry>, a: &PropsEntry, q: &mut SendQueue<'_>) -> Result<()> {
    q.space(b.map(|x| &x.prefix), &a.prefix)?;
    q.markers(b.map(|x| &x.markers), &a.markers)?;
    q.node(b.map(|x| x.key.as_ref()), &a.key)?;
    q.left_padded_node(b.map(|x| x.value.as_ref()), &a.value)
}

fn receive_entry(
    header: NodeHeader,
    b: Option<&PropsEntry>,
    q: &mut ReceiveQueue<'_>,
) -> Result<PropsEntry> {
    let prefix = q.space(b.map(|x| &x.prefix))?;
    let markers = q.markers(b.map(|x| &x.markers))?;
    let key = q.node(b.map(|x| x.key.as_ref()))?;
    let value = q.left_padded_node(b.map(|x| x.value.as_ref()))?;
    Ok(PropsEntry {
        id: header.id,
        prefix,
        markers,
        key: Box::new(key),
        value: Box::new(value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use treewire_core::tree::Identifier;

    #[test]
    fn test_kind_tags() {
        let entry = PropsEntry::new(
            Tree::Identifier(Identifier::new("host")),
            LeftPadded::new(
                Space::of(" "),
                Tree::Literal(treewire_core::tree::Literal::new("localhost")),
            ),
        );
        let tree = entry.into_tree();
        assert_eq!(tree.kind(), "props.entry");
    }

    #[test]
    fn test_ext_node_equality_is_by_value() {
        let file = PropsFile::new("app.properties", Vec::new());
        let a = file.clone().into_tree();
        let b = file.into_tree();
        // Distinct Arcs, same value.
        assert_eq!(a, b);

        let other = PropsFile::new("other.properties", Vec::new()).into_tree();
        assert_ne!(a, other);
    }

    #[test]
    fn test_registry_serves_own_and_base_kinds() {
        let registry = props_registry();
        assert_eq!(registry.source_kind(), "props");
        assert!(registry.dispatch(PropsFile::KIND).is_ok());
        assert!(registry.dispatch(PropsEntry::KIND).is_ok());
        assert!(registry.dispatch(Identifier::KIND).is_ok());

        let err = registry.dispatch("yaml.document").err().unwrap();
        match err {
            RemotingError::UnknownKind { registry, .. } => assert_eq!(registry, "props"),
            other => panic!("expected UnknownKind, got: {other:?}"),
        }
    }
}
