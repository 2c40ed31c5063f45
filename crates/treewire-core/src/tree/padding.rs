//! Structural wrappers that attach formatting to a logical value.
//!
//! The wrappers keep punctuation and trailing-comment placement out of the
//! element's own type. On the wire they emit no operation of their own:
//! their space and element are diffed in a fixed positional order
//! (space-then-element for `LeftPadded`, element-then-space for
//! `RightPadded`, before-space-then-elements for `Container`).

use crate::tree::Space;
use serde::{Deserialize, Serialize};

/// A value preceded by formatting space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeftPadded<T> {
    pub before: Space,
    pub element: T,
}

impl<T> LeftPadded<T> {
    pub fn new(before: Space, element: T) -> Self {
        Self { before, element }
    }
}

/// A value followed by formatting space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RightPadded<T> {
    pub element: T,
    pub after: Space,
}

impl<T> RightPadded<T> {
    pub fn new(element: T, after: Space) -> Self {
        Self { element, after }
    }
}

/// An ordered sequence of right-padded elements plus the space preceding
/// the whole container (e.g. the space before an opening parenthesis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container<T> {
    pub before: Space,
    pub elements: Vec<RightPadded<T>>,
}

impl<T> Container<T> {
    pub fn new(before: Space, elements: Vec<RightPadded<T>>) -> Self {
        Self { before, elements }
    }

    pub fn empty() -> Self {
        Self {
            before: Space::empty(),
            elements: Vec::new(),
        }
    }
}
