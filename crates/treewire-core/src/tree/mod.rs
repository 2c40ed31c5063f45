//! The synchronized tree data model.
//!
//! Every node carries a stable [`NodeId`] (the diff key), a structured
//! [`Space`] prefix and an ordered [`Markers`] collection, followed by its
//! kind-specific fields. Formatting is attached to logical values through
//! the padding wrappers rather than the values' own types, and resolved
//! type descriptors are shared by identity through [`Reference`].

mod marker;
mod node;
mod padding;
mod reference;
mod space;

pub use marker::{Marker, Markers};
pub use node::{
    Assignment, Block, Call, ExtNode, ExtensionNode, Identifier, Literal, SourceFile, Tree,
};
pub use padding::{Container, LeftPadded, RightPadded};
pub use reference::{RefId, Reference, TypeDescriptor};
pub use space::{Comment, Space};

/// Process-wide-unique identity of a node.
///
/// Stable across edits to the same logical node; a new id denotes a
/// structurally new node, not a mutation.
pub type NodeId = uuid::Uuid;
