//! The receiving half of a tree-synchronization exchange.

use crate::codec::CodecRegistry;
use crate::engine::{DiffEvent, DiffOp, NodeHeader, RemoteObjectCache};
use crate::error::{RemotingError, Result};
use crate::tree::{Container, LeftPadded, Markers, NodeId, Reference, RightPadded, Space, Tree};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Consumes a diff stream against the receiver's cached "before" value and
/// reconstructs the "after" value.
///
/// Receive order must exactly mirror send order; the queue cannot recover
/// from a desynchronized stream except by failing on an unexpected tag or
/// type, which marks the cache untrustworthy.
pub struct ReceiveQueue<'a> {
    events: VecDeque<DiffEvent>,
    cache: &'a mut RemoteObjectCache,
    codecs: &'a CodecRegistry,
}

impl<'a> ReceiveQueue<'a> {
    /// Replay a diff stream for the object `before_id` against the cache
    /// and record the reconstructed value as the new cached state.
    ///
    /// The whole stream must be consumed exactly; trailing events are a
    /// desync.
    pub fn apply(
        cache: &'a mut RemoteObjectCache,
        codecs: &'a CodecRegistry,
        before_id: Option<NodeId>,
        events: Vec<DiffEvent>,
    ) -> Result<Tree> {
        let event_count = events.len();
        let before = before_id.and_then(|id| cache.get_node(id).cloned());
        let mut queue = ReceiveQueue {
            events: events.into(),
            cache,
            codecs,
        };
        let tree = queue.node(before.as_ref())?;
        queue.finish()?;
        queue.cache.put_node(tree.clone());
        debug!(
            id = %tree.id(),
            kind = tree.kind(),
            events = event_count,
            "diff stream applied"
        );
        Ok(tree)
    }

    fn next_event(&mut self) -> Result<DiffEvent> {
        self.events
            .pop_front()
            .ok_or_else(|| RemotingError::desync("diff stream exhausted mid-value"))
    }

    fn finish(&mut self) -> Result<()> {
        if self.events.is_empty() {
            Ok(())
        } else {
            Err(RemotingError::desync(format!(
                "{} trailing events after root value",
                self.events.len()
            )))
        }
    }

    /// Receive a scalar field.
    pub fn scalar<T>(&mut self, before: Option<&T>, field: &'static str) -> Result<T>
    where
        T: DeserializeOwned + Clone,
    {
        let event = self.next_event()?;
        match event.op {
            DiffOp::NoChange => before.cloned().ok_or_else(|| {
                RemotingError::desync(format!("no_change for {field} without a prior value"))
            }),
            DiffOp::Change | DiffOp::Add => {
                let payload = event.payload.unwrap_or(serde_json::Value::Null);
                serde_json::from_value(payload).map_err(|e| RemotingError::Decode {
                    field: field.to_string(),
                    message: e.to_string(),
                })
            }
            DiffOp::Delete => Err(RemotingError::desync(format!(
                "unexpected delete at scalar field {field}"
            ))),
        }
    }

    /// Receive a formatting space.
    pub fn space(&mut self, before: Option<&Space>) -> Result<Space> {
        let event = self.next_event()?;
        match event.op {
            DiffOp::NoChange => before
                .cloned()
                .ok_or_else(|| RemotingError::desync("no_change space without a prior value")),
            DiffOp::Change | DiffOp::Add => {
                let whitespace = self.scalar(before.map(|b| &b.whitespace), "space.whitespace")?;
                let comments = self.list(
                    before.map(|b| b.comments.as_slice()),
                    |_| None,
                    |q, b| q.scalar(b, "space.comment"),
                )?;
                Ok(Space {
                    whitespace,
                    comments,
                })
            }
            DiffOp::Delete => Err(RemotingError::desync("unexpected delete at space position")),
        }
    }

    /// Receive a marker collection.
    pub fn markers(&mut self, before: Option<&Markers>) -> Result<Markers> {
        let event = self.next_event()?;
        match event.op {
            DiffOp::NoChange => before
                .cloned()
                .ok_or_else(|| RemotingError::desync("no_change markers without a prior value")),
            DiffOp::Change | DiffOp::Add => {
                let id = self.scalar(before.map(|b| &b.id), "markers.id")?;
                let markers = self.list(
                    before.map(|b| b.markers.as_slice()),
                    |m: &crate::tree::Marker| Some(m.id()),
                    |q, b| q.scalar(b, "marker"),
                )?;
                Ok(Markers { id, markers })
            }
            DiffOp::Delete => Err(RemotingError::desync("unexpected delete at markers position")),
        }
    }

    /// Receive a node, dispatching its field walk to the codec for its
    /// kind. For `Change` the identity and kind come from the receiver's
    /// own before value; for `Add` they come from the header payload.
    pub fn node(&mut self, before: Option<&Tree>) -> Result<Tree> {
        let event = self.next_event()?;
        match event.op {
            DiffOp::NoChange => before
                .cloned()
                .ok_or_else(|| RemotingError::desync("no_change node without a prior value")),
            DiffOp::Change => {
                let b = before.ok_or_else(|| {
                    RemotingError::desync("change node without a prior value")
                })?;
                let header = NodeHeader {
                    kind: b.kind().to_string(),
                    id: b.id(),
                };
                let codec = self.codecs.dispatch(&header.kind)?;
                codec.receive(header, Some(b), self)
            }
            DiffOp::Add => {
                let payload = event.payload.unwrap_or(serde_json::Value::Null);
                let header: NodeHeader =
                    serde_json::from_value(payload).map_err(|e| RemotingError::Decode {
                        field: "node.header".to_string(),
                        message: e.to_string(),
                    })?;
                let codec = self.codecs.dispatch(&header.kind)?;
                codec.receive(header, None, self)
            }
            DiffOp::Delete => Err(RemotingError::desync("unexpected delete at node position")),
        }
    }

    /// Receive an ordered list, pairing slots to before elements by the
    /// identity in each event's `reference` (or positionally for value
    /// lists), then consuming the explicit delete markers.
    pub fn list<T, K, F>(&mut self, before: Option<&[T]>, key: K, mut f: F) -> Result<Vec<T>>
    where
        T: Clone,
        K: Fn(&T) -> Option<NodeId>,
        F: FnMut(&mut Self, Option<&T>) -> Result<T>,
    {
        let header = self.next_event()?;
        match header.op {
            DiffOp::NoChange => {
                return before
                    .map(|b| b.to_vec())
                    .ok_or_else(|| RemotingError::desync("no_change list without a prior value"));
            }
            DiffOp::Change | DiffOp::Add => {}
            DiffOp::Delete => {
                return Err(RemotingError::desync("unexpected delete at list position"));
            }
        }

        let len: usize = serde_json::from_value(header.payload.unwrap_or(serde_json::Value::Null))
            .map_err(|e| RemotingError::Decode {
                field: "list.len".to_string(),
                message: e.to_string(),
            })?;

        let before_slice = before.unwrap_or(&[]);
        let mut by_id: HashMap<NodeId, usize> = HashMap::new();
        for (i, item) in before_slice.iter().enumerate() {
            if let Some(id) = key(item) {
                by_id.insert(id, i);
            }
        }

        let mut matched = vec![false; before_slice.len()];
        let mut out = Vec::with_capacity(len);
        for idx in 0..len {
            let event = self.next_event()?;
            let counterpart = |reference: Option<NodeId>| -> Result<usize> {
                match reference {
                    Some(id) => by_id.get(&id).copied().ok_or_else(|| {
                        RemotingError::desync(format!("list slot references unknown element {id}"))
                    }),
                    None if idx < before_slice.len() => Ok(idx),
                    None => Err(RemotingError::desync("positional list slot out of range")),
                }
            };
            match event.op {
                DiffOp::NoChange => {
                    let bi = counterpart(event.reference)?;
                    matched[bi] = true;
                    out.push(before_slice[bi].clone());
                }
                DiffOp::Change => {
                    let bi = counterpart(event.reference)?;
                    matched[bi] = true;
                    let existing = before_slice[bi].clone();
                    out.push(f(self, Some(&existing))?);
                }
                DiffOp::Add => {
                    out.push(f(self, None)?);
                }
                DiffOp::Delete => {
                    return Err(RemotingError::desync("delete marker inside list slots"));
                }
            }
        }

        // One explicit delete marker per unmatched before element, in
        // before order.
        for (bi, item) in before_slice.iter().enumerate() {
            if matched[bi] {
                continue;
            }
            let event = self.next_event()?;
            if event.op != DiffOp::Delete {
                return Err(RemotingError::desync(format!(
                    "expected delete marker, found {:?}",
                    event.op
                )));
            }
            if event.reference != key(item) {
                return Err(RemotingError::desync(
                    "delete marker names an unexpected element",
                ));
            }
        }
        Ok(out)
    }

    /// Receive a list of right-padded nodes.
    pub fn tree_list(
        &mut self,
        before: Option<&[RightPadded<Tree>]>,
    ) -> Result<Vec<RightPadded<Tree>>> {
        self.list(
            before,
            |rp| Some(rp.element.id()),
            |q, b| {
                let element = q.node(b.map(|x| &x.element))?;
                let after = q.space(b.map(|x| &x.after))?;
                Ok(RightPadded { element, after })
            },
        )
    }

    /// Receive a container: leading space, then elements.
    pub fn container(&mut self, before: Option<&Container<Tree>>) -> Result<Container<Tree>> {
        let space = self.space(before.map(|b| &b.before))?;
        let elements = self.tree_list(before.map(|b| b.elements.as_slice()))?;
        Ok(Container {
            before: space,
            elements,
        })
    }

    /// Receive a left-padded node.
    pub fn left_padded_node(
        &mut self,
        before: Option<&LeftPadded<Tree>>,
    ) -> Result<LeftPadded<Tree>> {
        let space = self.space(before.map(|b| &b.before))?;
        let element = self.node(before.map(|b| &b.element))?;
        Ok(LeftPadded {
            before: space,
            element,
        })
    }

    /// Receive an optional by-reference value. A full payload populates
    /// the cache; an identity-only event resolves to the one cached copy;
    /// an event with neither clears the value.
    pub fn opt_reference<T>(
        &mut self,
        before: Option<&Option<Reference<T>>>,
    ) -> Result<Option<Reference<T>>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let event = self.next_event()?;
        match event.op {
            DiffOp::NoChange => before
                .cloned()
                .ok_or_else(|| RemotingError::desync("no_change reference without a prior value")),
            DiffOp::Change | DiffOp::Add => match (event.reference, event.payload) {
                (Some(id), Some(payload)) => {
                    let value: T =
                        serde_json::from_value(payload).map_err(|e| RemotingError::Decode {
                            field: "reference".to_string(),
                            message: e.to_string(),
                        })?;
                    let value = Arc::new(value);
                    self.cache.put_ref(id, value.clone())?;
                    Ok(Some(Reference::with_id(id, value)))
                }
                (Some(id), None) => {
                    let value = self.cache.resolve_ref::<T>(id)?;
                    Ok(Some(Reference::with_id(id, value)))
                }
                (None, _) => Ok(None),
            },
            DiffOp::Delete => Err(RemotingError::desync(
                "unexpected delete at reference position",
            )),
        }
    }
}
