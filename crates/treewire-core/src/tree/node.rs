//! The base-language node catalog and the open-extension hook.
//!
//! [`Tree`] is the value universe flowing through the diff engine: a closed
//! set of base kinds shared across languages plus an [`ExtNode`] arm through
//! which language extensions contribute their own kinds without modifying
//! this crate. A single tree can legitimately mix base and extension nodes.

use crate::tree::{Container, LeftPadded, Markers, NodeId, Reference, RightPadded, Space, TypeDescriptor};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// An identified, typed unit of the synchronized tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Tree {
    SourceFile(SourceFile),
    Block(Block),
    Identifier(Identifier),
    Literal(Literal),
    Call(Call),
    Assignment(Assignment),
    /// A node kind contributed by a language extension.
    Ext(ExtNode),
}

impl Tree {
    pub fn id(&self) -> NodeId {
        match self {
            Tree::SourceFile(n) => n.id,
            Tree::Block(n) => n.id,
            Tree::Identifier(n) => n.id,
            Tree::Literal(n) => n.id,
            Tree::Call(n) => n.id,
            Tree::Assignment(n) => n.id,
            Tree::Ext(n) => n.id(),
        }
    }

    /// Kind tag used for codec dispatch and node headers on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Tree::SourceFile(_) => SourceFile::KIND,
            Tree::Block(_) => Block::KIND,
            Tree::Identifier(_) => Identifier::KIND,
            Tree::Literal(_) => Literal::KIND,
            Tree::Call(_) => Call::KIND,
            Tree::Assignment(_) => Assignment::KIND,
            Tree::Ext(n) => n.kind(),
        }
    }

    pub fn prefix(&self) -> &Space {
        match self {
            Tree::SourceFile(n) => &n.prefix,
            Tree::Block(n) => &n.prefix,
            Tree::Identifier(n) => &n.prefix,
            Tree::Literal(n) => &n.prefix,
            Tree::Call(n) => &n.prefix,
            Tree::Assignment(n) => &n.prefix,
            Tree::Ext(n) => n.prefix(),
        }
    }

    pub fn markers(&self) -> &Markers {
        match self {
            Tree::SourceFile(n) => &n.markers,
            Tree::Block(n) => &n.markers,
            Tree::Identifier(n) => &n.markers,
            Tree::Literal(n) => &n.markers,
            Tree::Call(n) => &n.markers,
            Tree::Assignment(n) => &n.markers,
            Tree::Ext(n) => n.markers(),
        }
    }
}

/// A whole parsed source file: the unit handed out by `parse` and requested
/// through `get_object`.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub id: NodeId,
    pub prefix: Space,
    pub markers: Markers,
    pub source_path: String,
    pub statements: Vec<RightPadded<Tree>>,
    pub eof: Space,
}

impl SourceFile {
    pub const KIND: &'static str = "SourceFile";

    pub fn new(source_path: impl Into<String>, statements: Vec<RightPadded<Tree>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prefix: Space::empty(),
            markers: Markers::empty(),
            source_path: source_path.into(),
            statements,
            eof: Space::empty(),
        }
    }
}

/// A braced statement group.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: NodeId,
    pub prefix: Space,
    pub markers: Markers,
    pub statements: Vec<RightPadded<Tree>>,
    pub end: Space,
}

impl Block {
    pub const KIND: &'static str = "Block";

    pub fn new(statements: Vec<RightPadded<Tree>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prefix: Space::empty(),
            markers: Markers::empty(),
            statements,
            end: Space::empty(),
        }
    }
}

/// A simple name, possibly attributed with a resolved type.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub id: NodeId,
    pub prefix: Space,
    pub markers: Markers,
    pub name: String,
    pub type_ref: Option<Reference<TypeDescriptor>>,
}

impl Identifier {
    pub const KIND: &'static str = "Identifier";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prefix: Space::empty(),
            markers: Markers::empty(),
            name: name.into(),
            type_ref: None,
        }
    }

    pub fn typed(name: impl Into<String>, type_ref: Reference<TypeDescriptor>) -> Self {
        Self {
            type_ref: Some(type_ref),
            ..Self::new(name)
        }
    }
}

/// A literal value, kept as its source text so formatting survives.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub id: NodeId,
    pub prefix: Space,
    pub markers: Markers,
    /// Source text of the literal; absent for e.g. a null literal.
    pub value_source: Option<String>,
    pub type_ref: Option<Reference<TypeDescriptor>>,
}

impl Literal {
    pub const KIND: &'static str = "Literal";

    pub fn new(value_source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prefix: Space::empty(),
            markers: Markers::empty(),
            value_source: Some(value_source.into()),
            type_ref: None,
        }
    }
}

/// An invocation with a parenthesized argument list.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub id: NodeId,
    pub prefix: Space,
    pub markers: Markers,
    pub callee: Box<Tree>,
    pub arguments: Container<Tree>,
    pub type_ref: Option<Reference<TypeDescriptor>>,
}

impl Call {
    pub const KIND: &'static str = "Call";

    pub fn new(callee: Tree, arguments: Container<Tree>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prefix: Space::empty(),
            markers: Markers::empty(),
            callee: Box::new(callee),
            arguments,
            type_ref: None,
        }
    }
}

/// `target = value`, with the space around `=` preserved by the padding.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub id: NodeId,
    pub prefix: Space,
    pub markers: Markers,
    pub target: Box<Tree>,
    pub value: Box<LeftPadded<Tree>>,
}

impl Assignment {
    pub const KIND: &'static str = "Assignment";

    pub fn new(target: Tree, value: LeftPadded<Tree>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prefix: Space::empty(),
            markers: Markers::empty(),
            target: Box::new(target),
            value: Box::new(value),
        }
    }
}

/// A node kind owned by a language extension.
///
/// Implementors live in extension crates; the engine only needs identity,
/// the kind tag for codec dispatch, and downcast access for the extension's
/// own codec.
pub trait ExtensionNode: fmt::Debug + Send + Sync {
    fn id(&self) -> NodeId;
    fn kind(&self) -> &'static str;
    fn prefix(&self) -> &Space;
    fn markers(&self) -> &Markers;
    fn as_any(&self) -> &dyn Any;
    fn eq_node(&self, other: &dyn ExtensionNode) -> bool;
}

/// Shared handle to an extension node inside a [`Tree`].
#[derive(Debug, Clone)]
pub struct ExtNode(Arc<dyn ExtensionNode>);

impl ExtNode {
    pub fn new(node: impl ExtensionNode + 'static) -> Self {
        Self(Arc::new(node))
    }

    pub fn downcast<T: ExtensionNode + 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

impl std::ops::Deref for ExtNode {
    type Target = dyn ExtensionNode;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl PartialEq for ExtNode {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_node(other.0.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        let ident = Tree::Identifier(Identifier::new("x"));
        assert_eq!(ident.kind(), "Identifier");

        let file = Tree::SourceFile(SourceFile::new("a.src", Vec::new()));
        assert_eq!(file.kind(), "SourceFile");
    }

    #[test]
    fn test_same_content_different_id_is_not_equal() {
        let a = Tree::Identifier(Identifier::new("x"));
        let b = Tree::Identifier(Identifier::new("x"));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
