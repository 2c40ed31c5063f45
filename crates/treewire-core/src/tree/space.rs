//! Formatting space attached to nodes and padded values.

use serde::{Deserialize, Serialize};

/// Leading or trailing formatting around a value.
///
/// Structured rather than a raw string so that whitespace and comments can
/// be diffed independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub whitespace: String,
    pub comments: Vec<Comment>,
}

impl Space {
    /// Empty space: no whitespace, no comments.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Space consisting of whitespace only.
    pub fn of(whitespace: impl Into<String>) -> Self {
        Self {
            whitespace: whitespace.into(),
            comments: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.whitespace.is_empty() && self.comments.is_empty()
    }
}

/// A comment plus the whitespace that follows it, preserved through edits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    pub suffix: String,
}

impl Comment {
    pub fn new(text: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            suffix: suffix.into(),
        }
    }
}
