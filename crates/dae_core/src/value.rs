//! Dynamic values assembled while parsing.
//!
//! The shape of a [`Value`] tree mirrors the schema graph that produced it:
//! hierarchies become maps, libraries and `multiple` children become lists,
//! and text schemas produce scalars or numeric buffers.

use std::collections::BTreeMap;

use serde::Serialize;

/// Attribute set of an open tag, keyed by attribute name.
pub type Attributes = BTreeMap<String, String>;

/// A node of the assembled document.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Nothing was produced (skipped element or empty text)
    #[default]
    Null,

    Bool(bool),

    Float(f64),

    String(String),

    /// Whitespace-separated tokens
    Strings(Vec<String>),

    /// Packed float buffer (vertex data, colors, matrices)
    Floats(Vec<f32>),

    /// Packed integer buffer (primitive indices, vertex counts)
    Ints(Vec<i64>),

    /// Ordered sequence of records
    List(Vec<Value>),

    /// Keyed record
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Create an empty map value.
    pub fn map() -> Self {
        Value::Map(BTreeMap::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Look up a key in a map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Follow a `/`-separated path of map keys and list indices.
    ///
    /// ```ignore
    /// doc.root().path("effects/0/diffuse");
    /// ```
    pub fn path(&self, path: &str) -> Option<&Value> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |value, segment| match value {
                Value::Map(map) => map.get(segment),
                Value::List(list) => segment.parse::<usize>().ok().and_then(|i| list.get(i)),
                _ => None,
            })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f32]> {
        match self {
            Value::Floats(floats) => Some(floats),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            Value::Ints(ints) => Some(ints),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            Value::Strings(strings) => Some(strings),
            _ => None,
        }
    }

    /// Number of entries for containers and buffers, 0 for scalars.
    pub fn len(&self) -> usize {
        match self {
            Value::Strings(v) => v.len(),
            Value::Floats(v) => v.len(),
            Value::Ints(v) => v.len(),
            Value::List(v) => v.len(),
            Value::Map(v) => v.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert into a map value. Does nothing for other variants.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        if let Value::Map(map) = self {
            map.insert(key.into(), value);
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&Attributes> for Value {
    fn from(attributes: &Attributes) -> Self {
        Value::Map(
            attributes
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }
}
