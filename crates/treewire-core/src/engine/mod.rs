//! The generic diff engine.
//!
//! A [`SendQueue`] walks a "before" (last-acknowledged) value and an
//! "after" (current) value in lock-step and emits a minimal positional
//! stream of [`DiffEvent`]s; a [`ReceiveQueue`] replays that stream against
//! the receiver's own cached "before" to reconstruct the "after". Both
//! sides must visit fields in the exact same order — there are no field
//! names on the wire, only position and, where pairing needs it, identity.

mod cache;
mod event;
mod receive;
mod send;

pub use cache::RemoteObjectCache;
pub use event::{DiffEvent, DiffOp, NodeHeader};
pub use receive::ReceiveQueue;
pub use send::SendQueue;
