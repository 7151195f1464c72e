//! The finished result of a parse.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::value::Value;

/// A fully assembled document together with its identifier tables.
///
/// Top-level keys of [`root`](Document::root) are the library names
/// (`asset`, `images`, `effects`, ...). Identifier lookups return the final
/// value of the element that declared the identifier.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Document {
    root: Value,
    ids: BTreeMap<String, Value>,
    scopes: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Document {
    pub(crate) fn new(
        root: Value,
        ids: BTreeMap<String, Value>,
        scopes: BTreeMap<String, BTreeMap<String, Value>>,
    ) -> Self {
        Self { root, ids, scopes }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn into_root(self) -> Value {
        self.root
    }

    /// Top-level entry, e.g. `doc.get("effects")`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    /// Element declared with `id="..."` anywhere in the document.
    pub fn lookup(&self, id: &str) -> Option<&Value> {
        self.ids.get(id)
    }

    /// Resolve a local URL such as `#material-0`.
    pub fn resolve_url(&self, url: &str) -> Option<&Value> {
        url.strip_prefix('#').and_then(|id| self.lookup(id))
    }

    /// All global identifiers.
    pub fn ids(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.ids.iter().map(|(id, value)| (id.as_str(), value))
    }

    /// `sid` table of the scope owned by `owner` (its `id`, or a generated
    /// `"<tag>#<n>"` name for anonymous scopes).
    pub fn scope(&self, owner: &str) -> Option<&BTreeMap<String, Value>> {
        self.scopes.get(owner)
    }

    pub fn lookup_scoped(&self, owner: &str, sid: &str) -> Option<&Value> {
        self.scope(owner).and_then(|entries| entries.get(sid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url_requires_fragment() {
        let mut ids = BTreeMap::new();
        ids.insert("mat".to_string(), Value::from("material"));
        let doc = Document::new(Value::map(), ids, BTreeMap::new());

        assert_eq!(doc.resolve_url("#mat").and_then(Value::as_str), Some("material"));
        assert!(doc.resolve_url("mat").is_none());
        assert_eq!(doc.ids().count(), 1);
    }
}
