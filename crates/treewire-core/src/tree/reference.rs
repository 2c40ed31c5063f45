//! Shared-by-identity values.
//!
//! A [`Reference`] marks a value as shared by identity rather than owned by
//! any one node. The first time an identity crosses the wire the full value
//! is sent and cached on both sides; every later occurrence carries only
//! the identity, so thousands of nodes pointing at one resolved type cost
//! one payload and resolve to one cached object on the receiving side.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Process-wide-unique identity of a shared value.
pub type RefId = Uuid;

/// A value shared by identity across the synchronized tree.
///
/// Equality is by identity only; two references with the same id are the
/// same shared value regardless of how they were materialized.
#[derive(Debug)]
pub struct Reference<T> {
    id: RefId,
    value: Arc<T>,
}

// Not derived: cloning copies the handle, never the value, so no `T: Clone`
// bound is wanted.
impl<T> Clone for Reference<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: self.value.clone(),
        }
    }
}

impl<T> Reference<T> {
    /// Wrap a value under a fresh identity.
    pub fn new(value: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            value: Arc::new(value),
        }
    }

    /// Wrap an already-materialized value under a known identity, e.g. when
    /// the receive side resolves an identity-only payload from its cache.
    pub fn with_id(id: RefId, value: Arc<T>) -> Self {
        Self { id, value }
    }

    pub fn id(&self) -> RefId {
        self.id
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// The shared allocation behind this reference.
    pub fn value_arc(&self) -> Arc<T> {
        self.value.clone()
    }
}

impl<T> PartialEq for Reference<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Reference<T> {}

/// A resolved type, attributed to identifiers, literals and calls.
///
/// The on-disk type-table format that produces these lives outside this
/// crate; the engine only moves them across the wire and shares them by
/// identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_params: Vec<String>,
}

impl TypeDescriptor {
    pub fn named(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            type_params: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_equality_is_by_id() {
        let a = Reference::new(TypeDescriptor::named("lang.String"));
        let b = Reference::new(TypeDescriptor::named("lang.String"));
        assert_ne!(a, b);

        let resolved = Reference::with_id(a.id(), a.value_arc());
        assert_eq!(a, resolved);
    }

    #[test]
    fn test_clone_shares_the_value_without_a_clone_bound() {
        struct Opaque;

        let a = Reference::new(Opaque);
        let b = a.clone();
        assert_eq!(a.id(), b.id());
        assert!(Arc::ptr_eq(&a.value_arc(), &b.value_arc()));
    }

    #[test]
    fn test_value_arc_is_shared() {
        let a = Reference::new(TypeDescriptor::named("lang.Int"));
        let b = Reference::with_id(a.id(), a.value_arc());
        assert!(Arc::ptr_eq(&a.value_arc(), &b.value_arc()));
    }
}
