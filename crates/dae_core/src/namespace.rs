//! Global (`id`) and ancestor-scoped (`sid`) identifier resolution.
//!
//! Bindings are made when an element opens, so a later declaration of the
//! same `id` replaces an earlier one. A binding points at a slot owned by
//! the declaring frame; the slot receives the frame's final value when the
//! element closes.

use std::collections::{BTreeMap, HashMap};

use crate::context::Frame;
use crate::document::Document;
use crate::error::{ParseError, ParseResult};
use crate::schema::Binding;
use crate::value::{Attributes, Value};

pub(crate) type SlotId = usize;

/// Identifier tables for one parse session.
#[derive(Debug, Default)]
pub struct Namespace {
    slots: Vec<Value>,
    ids: HashMap<String, SlotId>,
    scopes: BTreeMap<String, BTreeMap<String, SlotId>>,
    anonymous: usize,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the binding of the frame at `index`.
    ///
    /// Fails if a scoped element lacks `sid` or has no scoping ancestor.
    pub(crate) fn register(
        &mut self,
        frames: &mut [Frame],
        index: usize,
        binding: Binding,
        attributes: &Attributes,
    ) -> ParseResult<()> {
        if binding == Binding::None {
            return Ok(());
        }

        if let Some(map) = frames[index].data.as_map_mut() {
            for (key, value) in attributes {
                map.insert(key.clone(), Value::String(value.clone()));
            }
        }

        if binding == Binding::Scoped {
            let Some(sid) = attributes.get("sid") else {
                return Err(ParseError::MissingAttribute {
                    tag: frames[index].tag.clone(),
                    attribute: "sid".to_string(),
                });
            };
            let Some(scope) = enclosing_scope(frames, frames[index].parent) else {
                return Err(ParseError::NoEnclosingScope {
                    tag: frames[index].tag.clone(),
                    sid: sid.clone(),
                });
            };
            let slot = self.slot_for(&mut frames[index]);
            if let Some(entries) = frames[scope].scope.as_mut() {
                entries.insert(sid.clone(), slot);
            }
        }

        if matches!(binding, Binding::Global | Binding::Scope | Binding::Scoped) {
            if let Some(id) = attributes.get("id") {
                let slot = self.slot_for(&mut frames[index]);
                self.bind_global(id, slot);
            }
        }

        if binding == Binding::Scope {
            frames[index].scope = Some(BTreeMap::new());
        }

        Ok(())
    }

    fn slot_for(&mut self, frame: &mut Frame) -> SlotId {
        *frame.slot.get_or_insert_with(|| {
            self.slots.push(Value::Null);
            self.slots.len() - 1
        })
    }

    fn bind_global(&mut self, id: &str, slot: SlotId) {
        if self.ids.insert(id.to_string(), slot).is_some() {
            log::debug!("Identifier \"{}\" declared again; the later declaration wins", id);
        }
    }

    /// Store a closed frame's final value in its slot.
    pub(crate) fn fill(&mut self, slot: SlotId, value: Value) {
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = value;
        }
    }

    /// Retain a closed scope, keyed by its owner's `id` or a generated name.
    pub(crate) fn close_scope(
        &mut self,
        tag: &str,
        id: Option<&str>,
        entries: BTreeMap<String, SlotId>,
    ) {
        let owner = match id {
            Some(id) => id.to_string(),
            None => {
                self.anonymous += 1;
                format!("{}#{}", tag, self.anonymous)
            }
        };
        if self.scopes.insert(owner.clone(), entries).is_some() {
            log::debug!("Scope \"{}\" declared again; the later scope wins", owner);
        }
    }

    /// Current value bound to a global identifier.
    ///
    /// Elements that are still open resolve to `Null` until they close.
    pub fn lookup(&self, id: &str) -> Option<&Value> {
        self.ids.get(id).and_then(|slot| self.slots.get(*slot))
    }

    pub(crate) fn into_document(self, root: Value) -> Document {
        let resolve = |slot: &SlotId| self.slots.get(*slot).cloned().unwrap_or_default();
        let ids = self
            .ids
            .iter()
            .map(|(id, slot)| (id.clone(), resolve(slot)))
            .collect();
        let scopes = self
            .scopes
            .iter()
            .map(|(owner, entries)| {
                let entries = entries
                    .iter()
                    .map(|(sid, slot)| (sid.clone(), resolve(slot)))
                    .collect();
                (owner.clone(), entries)
            })
            .collect();
        Document::new(root, ids, scopes)
    }
}

/// Nearest frame at or above `start` that opened a scope.
fn enclosing_scope(frames: &[Frame], mut start: Option<usize>) -> Option<usize> {
    while let Some(index) = start {
        let frame = frames.get(index)?;
        if frame.scope.is_some() {
            return Some(index);
        }
        start = frame.parent;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{hierarchy, SchemaNode};
    use std::sync::Arc;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn push(frames: &mut Vec<Frame>, tag: &str) -> usize {
        let parent = frames.len().checked_sub(1);
        let node: Arc<SchemaNode> = Arc::new(hierarchy(Vec::new()));
        frames.push(Frame::element(tag, node, Value::map(), None, parent));
        frames.len() - 1
    }

    #[test]
    fn test_scoped_binding_lands_in_nearest_scope() {
        let mut ns = Namespace::new();
        let mut frames = Vec::new();
        let effect = push(&mut frames, "effect");
        ns.register(&mut frames, effect, Binding::Scope, &attrs(&[("id", "fx")])).unwrap();
        let profile = push(&mut frames, "profile_COMMON");
        ns.register(&mut frames, profile, Binding::Scope, &attrs(&[])).unwrap();
        let param = push(&mut frames, "newparam");
        ns.register(&mut frames, param, Binding::Scoped, &attrs(&[("sid", "surf")]))
            .unwrap();

        assert!(frames[profile].scope.as_ref().unwrap().contains_key("surf"));
        assert!(frames[effect].scope.as_ref().unwrap().is_empty());
        assert_eq!(frames[effect].data.get("id").and_then(Value::as_str), Some("fx"));
    }

    #[test]
    fn test_scoped_binding_without_scope_fails() {
        let mut ns = Namespace::new();
        let mut frames = Vec::new();
        push(&mut frames, "library_effects");
        let param = push(&mut frames, "newparam");
        let err = ns
            .register(&mut frames, param, Binding::Scoped, &attrs(&[("sid", "s")]))
            .unwrap_err();
        assert!(matches!(err, ParseError::NoEnclosingScope { .. }));
    }

    #[test]
    fn test_scoped_binding_requires_sid() {
        let mut ns = Namespace::new();
        let mut frames = Vec::new();
        let scope = push(&mut frames, "effect");
        ns.register(&mut frames, scope, Binding::Scope, &attrs(&[])).unwrap();
        let param = push(&mut frames, "newparam");
        let err = ns
            .register(&mut frames, param, Binding::Scoped, &attrs(&[("id", "p")]))
            .unwrap_err();
        assert!(
            matches!(err, ParseError::MissingAttribute { attribute, .. } if attribute == "sid")
        );
    }

    #[test]
    fn test_global_redeclaration_last_wins() {
        let mut ns = Namespace::new();
        let mut frames = Vec::new();
        let first = push(&mut frames, "image");
        ns.register(&mut frames, first, Binding::Global, &attrs(&[("id", "img")])).unwrap();
        let second = push(&mut frames, "image");
        ns.register(&mut frames, second, Binding::Global, &attrs(&[("id", "img")])).unwrap();

        ns.fill(frames[first].slot.unwrap(), "first".into());
        ns.fill(frames[second].slot.unwrap(), "second".into());
        assert_eq!(ns.lookup("img").and_then(Value::as_str), Some("second"));
    }

    #[test]
    fn test_anonymous_scopes_get_distinct_names() {
        let mut ns = Namespace::new();
        ns.close_scope("node", None, BTreeMap::new());
        ns.close_scope("node", None, BTreeMap::new());
        ns.close_scope("node", Some("root"), BTreeMap::new());
        let doc = ns.into_document(Value::map());
        assert!(doc.scope("node#1").is_some());
        assert!(doc.scope("node#2").is_some());
        assert!(doc.scope("root").is_some());
    }
}
