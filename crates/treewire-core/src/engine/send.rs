//! The sending half of a tree-synchronization exchange.

use crate::codec::CodecRegistry;
use crate::engine::{DiffEvent, NodeHeader, RemoteObjectCache};
use crate::error::{RemotingError, Result};
use crate::tree::{Container, LeftPadded, Markers, NodeId, Reference, RightPadded, Space, Tree};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Walks a before/after value pair in lock-step and emits the minimal
/// positional diff stream.
///
/// One queue walk forms one ordered, non-interleaved stream; concurrent
/// walks over the same cache must be serialized by the caller. The queue
/// mutates only its own side's [`RemoteObjectCache`].
pub struct SendQueue<'a> {
    events: Vec<DiffEvent>,
    cache: &'a mut RemoteObjectCache,
    codecs: &'a CodecRegistry,
}

impl<'a> SendQueue<'a> {
    /// Diff `after` against the cache's last-sent value for its identity,
    /// then record `after` as the new last-sent value so the next exchange
    /// diffs from this result.
    pub fn diff(
        cache: &'a mut RemoteObjectCache,
        codecs: &'a CodecRegistry,
        after: &Tree,
    ) -> Result<Vec<DiffEvent>> {
        let before = cache.get_node(after.id()).cloned();
        let mut queue = SendQueue {
            events: Vec::new(),
            cache,
            codecs,
        };
        queue.node(before.as_ref(), after)?;
        queue.cache.put_node(after.clone());
        debug!(
            id = %after.id(),
            kind = after.kind(),
            events = queue.events.len(),
            incremental = before.is_some(),
            "diff stream produced"
        );
        Ok(queue.events)
    }

    fn push(&mut self, event: DiffEvent) {
        self.events.push(event);
    }

    /// Diff a scalar field: `NoChange` iff equal, else `Change` carrying
    /// the new value. Optional scalars serialize `None` as an explicit
    /// JSON null payload.
    pub fn scalar<T: Serialize + PartialEq>(&mut self, before: Option<&T>, after: &T) -> Result<()> {
        if before == Some(after) {
            self.push(DiffEvent::no_change());
        } else {
            self.push(DiffEvent::change(Some(serde_json::to_value(after)?)));
        }
        Ok(())
    }

    /// Diff a formatting space: whitespace as a scalar, comments as a
    /// positional list. An unchanged space collapses to one `NoChange`.
    pub fn space(&mut self, before: Option<&Space>, after: &Space) -> Result<()> {
        if before == Some(after) {
            self.push(DiffEvent::no_change());
            return Ok(());
        }
        self.push(DiffEvent::change(None));
        self.scalar(before.map(|b| &b.whitespace), &after.whitespace)?;
        self.list(
            before.map(|b| b.comments.as_slice()),
            &after.comments,
            |_| None,
            |q, b, a| q.scalar(b, a),
        )
    }

    /// Diff a marker collection: collection id as a scalar, then an
    /// id-keyed list whose elements travel as whole payloads.
    pub fn markers(&mut self, before: Option<&Markers>, after: &Markers) -> Result<()> {
        if before == Some(after) {
            self.push(DiffEvent::no_change());
            return Ok(());
        }
        self.push(DiffEvent::change(None));
        self.scalar(before.map(|b| &b.id), &after.id)?;
        self.list(
            before.map(|b| b.markers.as_slice()),
            &after.markers,
            |m| Some(m.id()),
            |q, b, a| q.scalar(b, a),
        )
    }

    /// Diff a node. The node's id is the diff key: an unchanged node is a
    /// single `NoChange`; the same id re-sends only what changed; a new id
    /// forces a full `Add` regardless of structural similarity. A kind
    /// switch under an unchanged id is a protocol invariant violation and
    /// fails fast.
    pub fn node(&mut self, before: Option<&Tree>, after: &Tree) -> Result<()> {
        match before {
            Some(b) if b == after => {
                self.push(DiffEvent::no_change());
                Ok(())
            }
            Some(b) if b.id() == after.id() => {
                if b.kind() != after.kind() {
                    return Err(RemotingError::IdentityCollision {
                        id: after.id(),
                        cached: b.kind().to_string(),
                        incoming: after.kind().to_string(),
                    });
                }
                self.push(DiffEvent::change(None));
                let codec = self.codecs.dispatch(after.kind())?;
                codec.send(Some(b), after, self)
            }
            _ => {
                let header = NodeHeader {
                    kind: after.kind().to_string(),
                    id: after.id(),
                };
                self.push(DiffEvent::add(Some(serde_json::to_value(&header)?)));
                let codec = self.codecs.dispatch(after.kind())?;
                codec.send(None, after, self)
            }
        }
    }

    /// Diff an ordered list. `key` yields an element's identity, or `None`
    /// for value lists aligned positionally.
    ///
    /// Emits one header event for the list itself, one event per after
    /// slot (`NoChange`/`Change` referencing the matched element's
    /// identity, `Add` for insertions), then one explicit `Delete` per
    /// before element with no counterpart, preserving after order.
    pub fn list<T, K, F>(
        &mut self,
        before: Option<&[T]>,
        after: &[T],
        key: K,
        mut f: F,
    ) -> Result<()>
    where
        T: PartialEq,
        K: Fn(&T) -> Option<NodeId>,
        F: FnMut(&mut Self, Option<&T>, &T) -> Result<()>,
    {
        match before {
            Some(b) if b == after => {
                self.push(DiffEvent::no_change());
                return Ok(());
            }
            Some(_) => self.push(DiffEvent::change(Some(serde_json::json!(after.len())))),
            None => self.push(DiffEvent::add(Some(serde_json::json!(after.len())))),
        }

        let before_slice = before.unwrap_or(&[]);
        let mut by_id: HashMap<NodeId, usize> = HashMap::new();
        for (i, item) in before_slice.iter().enumerate() {
            if let Some(id) = key(item) {
                by_id.insert(id, i);
            }
        }

        let mut matched = vec![false; before_slice.len()];
        for (idx, item) in after.iter().enumerate() {
            let id = key(item);
            let counterpart = match id {
                Some(id) => by_id.get(&id).copied(),
                None => (idx < before_slice.len()).then_some(idx),
            };
            match counterpart {
                Some(bi) => {
                    matched[bi] = true;
                    let existing = &before_slice[bi];
                    if existing == item {
                        self.push(DiffEvent::no_change().with_reference(id));
                    } else {
                        self.push(DiffEvent::change(None).with_reference(id));
                        f(self, Some(existing), item)?;
                    }
                }
                None => {
                    self.push(DiffEvent::add(None).with_reference(id));
                    f(self, None, item)?;
                }
            }
        }

        for (bi, item) in before_slice.iter().enumerate() {
            if !matched[bi] {
                self.push(DiffEvent::delete(key(item)));
            }
        }
        Ok(())
    }

    /// Diff a list of right-padded nodes, keyed by the element node's id.
    /// Each changed element sends its node then its trailing space.
    pub fn tree_list(
        &mut self,
        before: Option<&[RightPadded<Tree>]>,
        after: &[RightPadded<Tree>],
    ) -> Result<()> {
        self.list(
            before,
            after,
            |rp| Some(rp.element.id()),
            |q, b, a| {
                q.node(b.map(|x| &x.element), &a.element)?;
                q.space(b.map(|x| &x.after), &a.after)
            },
        )
    }

    /// Diff a container: its leading space, then its element list.
    pub fn container(
        &mut self,
        before: Option<&Container<Tree>>,
        after: &Container<Tree>,
    ) -> Result<()> {
        self.space(before.map(|b| &b.before), &after.before)?;
        self.tree_list(before.map(|b| b.elements.as_slice()), &after.elements)
    }

    /// Diff a left-padded node: its space, then its element.
    pub fn left_padded_node(
        &mut self,
        before: Option<&LeftPadded<Tree>>,
        after: &LeftPadded<Tree>,
    ) -> Result<()> {
        self.space(before.map(|b| &b.before), &after.before)?;
        self.node(before.map(|b| &b.element), &after.element)
    }

    /// Diff an optional by-reference value.
    ///
    /// The first time an identity is sent in the session the full value
    /// travels and the identity is marked as sent; afterwards only the
    /// identity travels. A `Change` with neither payload nor reference
    /// clears the value.
    pub fn opt_reference<T>(
        &mut self,
        before: Option<&Option<Reference<T>>>,
        after: &Option<Reference<T>>,
    ) -> Result<()>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let prior = before.and_then(|b| b.as_ref());
        match after {
            None => {
                if before.is_some() && prior.is_none() {
                    self.push(DiffEvent::no_change());
                } else {
                    self.push(DiffEvent::change(None));
                }
            }
            Some(r) => {
                if prior == Some(r) {
                    self.push(DiffEvent::no_change());
                } else if self.cache.has_ref(r.id()) {
                    self.push(DiffEvent::change(None).with_reference(Some(r.id())));
                } else {
                    self.cache.put_ref(r.id(), r.value_arc())?;
                    let payload = serde_json::to_value(r.value())?;
                    self.push(DiffEvent::change(Some(payload)).with_reference(Some(r.id())));
                }
            }
        }
        Ok(())
    }

    /// Count of events emitted so far.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
