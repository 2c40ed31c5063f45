//! Metadata markers attached to nodes.
//!
//! Markers are polymorphic and separately versioned from the node that
//! carries them: on the wire each marker travels as a whole tagged payload,
//! and the collection diffs as an id-keyed list.

use crate::tree::NodeId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ordered, insertion-order-significant collection of markers on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Markers {
    pub id: NodeId,
    pub markers: Vec<Marker>,
}

impl Markers {
    /// A fresh, empty marker collection.
    pub fn empty() -> Self {
        Self {
            id: Uuid::new_v4(),
            markers: Vec::new(),
        }
    }

    /// Return a copy with `marker` appended.
    pub fn with(&self, marker: Marker) -> Self {
        let mut markers = self.markers.clone();
        markers.push(marker);
        Self {
            id: self.id,
            markers,
        }
    }
}

/// A single piece of metadata attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Marker {
    /// Flags a node as matching a search/recipe query.
    SearchResult {
        id: NodeId,
        description: Option<String>,
    },
    /// Records where a node came from.
    Provenance { id: NodeId, origin: String },
}

impl Marker {
    pub fn id(&self) -> NodeId {
        match self {
            Marker::SearchResult { id, .. } | Marker::Provenance { id, .. } => *id,
        }
    }

    pub fn search_result(description: Option<&str>) -> Self {
        Marker::SearchResult {
            id: Uuid::new_v4(),
            description: description.map(str::to_string),
        }
    }

    pub fn provenance(origin: impl Into<String>) -> Self {
        Marker::Provenance {
            id: Uuid::new_v4(),
            origin: origin.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_tagged_serialization() {
        let marker = Marker::provenance("parser-7");
        let json = serde_json::to_value(&marker).unwrap();
        assert_eq!(json["type"], "provenance");

        let parsed: Marker = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, marker);
    }

    #[test]
    fn test_with_preserves_collection_id() {
        let markers = Markers::empty();
        let extended = markers.with(Marker::search_result(Some("hit")));
        assert_eq!(extended.id, markers.id);
        assert_eq!(extended.markers.len(), 1);
    }
}
