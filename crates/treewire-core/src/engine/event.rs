//! Wire records of the diff stream.

use crate::tree::NodeId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One primitive diff operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffOp {
    NoChange,
    Add,
    Change,
    Delete,
}

/// One tagged operation in a diff stream.
///
/// `payload` carries the new value for changed leaves, a `{kind, id}`
/// header for added nodes, the after-length for changed lists, or a full
/// shared value on its first transmission. `reference` carries an identity
/// where pairing by id is needed: list slots, delete markers and
/// by-reference values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEvent {
    pub op: DiffOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Uuid>,
}

impl DiffEvent {
    pub fn no_change() -> Self {
        Self {
            op: DiffOp::NoChange,
            payload: None,
            reference: None,
        }
    }

    pub fn change(payload: Option<serde_json::Value>) -> Self {
        Self {
            op: DiffOp::Change,
            payload,
            reference: None,
        }
    }

    pub fn add(payload: Option<serde_json::Value>) -> Self {
        Self {
            op: DiffOp::Add,
            payload,
            reference: None,
        }
    }

    pub fn delete(reference: Option<Uuid>) -> Self {
        Self {
            op: DiffOp::Delete,
            payload: None,
            reference,
        }
    }

    pub fn with_reference(mut self, reference: Option<Uuid>) -> Self {
        self.reference = reference;
        self
    }
}

/// Identity and kind of a node entering the wire, sent once per added node
/// ahead of its positionally-encoded fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeHeader {
    pub kind: String,
    pub id: NodeId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&DiffOp::NoChange).unwrap(),
            "\"no_change\""
        );
        assert_eq!(serde_json::to_string(&DiffOp::Delete).unwrap(), "\"delete\"");
    }

    #[test]
    fn test_event_omits_empty_fields() {
        let json = serde_json::to_string(&DiffEvent::no_change()).unwrap();
        assert!(!json.contains("payload"));
        assert!(!json.contains("reference"));
    }

    #[test]
    fn test_event_roundtrip() {
        let event = DiffEvent::change(Some(serde_json::json!(3))).with_reference(Some(Uuid::new_v4()));
        let json = serde_json::to_string(&event).unwrap();
        let parsed: DiffEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
