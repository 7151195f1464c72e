//! Declarative schema combinators.
//!
//! A schema is a graph of [`SchemaNode`]s describing how each element kind is
//! interpreted. Nodes refer to their children through [`SchemaRef`] handles,
//! which may name another registered schema. Named handles are only resolved
//! when an element actually routes through them, so schemas can contain
//! themselves (nested `<animation>`, `<node>`) or each other.
//!
//! # Combinators
//!
//! - [`hierarchy`]: map keyed by child target names
//! - [`hoist`]: adopt the single recognized child's value
//! - [`library`]: ordered list of homogeneous items
//! - [`attributes`] / [`attributes_with`]: value taken from the open tag
//! - [`text_value`]: value parsed from character data
//! - [`rename`] / [`multiple`]: lazy wrappers changing how the parent stores a child
//! - [`noop`]: skip a subtree

mod registry;

pub use registry::SchemaRegistry;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::ParseResult;
use crate::value::{Attributes, Value};

/// Hook run when a frame is pushed, after attribute binding.
pub type EnterFn = dyn Fn(&Attributes, &mut Value) -> ParseResult<()> + Send + Sync;

/// Hook rewriting a frame's final value.
pub type CloseFn = dyn Fn(Value) -> ParseResult<Value> + Send + Sync;

/// Transform from an attribute set to a value.
pub type AttributesFn = dyn Fn(&Attributes) -> ParseResult<Value> + Send + Sync;

/// Transform from captured text to a value.
pub type TextFn = dyn Fn(&str) -> ParseResult<Value> + Send + Sync;

/// How a parent combines a repeated child value under the same key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// Last value wins
    #[default]
    Replace,
    /// Collect every occurrence into a list, in encounter order
    Append,
    /// Concatenate lists (repeated libraries)
    Concat,
    /// Merge maps key by key (repeated attribute sets)
    Union,
}

impl MergePolicy {
    /// Combine the value already stored (if any) with a newly closed one.
    pub fn merge(self, previous: Option<Value>, current: Value) -> Value {
        match self {
            MergePolicy::Replace => current,
            MergePolicy::Append => {
                let mut list = match previous {
                    Some(Value::List(list)) => list,
                    Some(other) => vec![other],
                    None => Vec::new(),
                };
                list.push(current);
                Value::List(list)
            }
            MergePolicy::Concat => {
                let mut list = match previous {
                    Some(Value::List(list)) => list,
                    Some(other) => vec![other],
                    None => Vec::new(),
                };
                match current {
                    Value::List(items) => list.extend(items),
                    other => list.push(other),
                }
                Value::List(list)
            }
            MergePolicy::Union => match (previous, current) {
                (Some(Value::Map(mut previous)), Value::Map(current)) => {
                    previous.extend(current);
                    Value::Map(previous)
                }
                (_, current) => current,
            },
        }
    }
}

/// Identifier registration performed when an element is opened.
///
/// Every variant except `None` copies the tag's attributes into a
/// map-valued frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Binding {
    #[default]
    None,
    /// Copy attributes only
    Attributes,
    /// Bind `id` document-wide
    Global,
    /// Bind `id` and open a scope for descendant `sid`s
    Scope,
    /// Require `sid` and bind it in the nearest enclosing scope; bind `id` too
    Scoped,
}

/// The combinator a node was built from.
#[derive(Clone)]
pub enum NodeKind {
    Hierarchy {
        children: BTreeMap<String, SchemaRef>,
    },
    Hoist {
        children: BTreeMap<String, SchemaRef>,
    },
    Library {
        item_tag: String,
        item: SchemaRef,
    },
    Attributes {
        proc: Option<Arc<AttributesFn>>,
    },
    TextValue {
        proc: Arc<TextFn>,
    },
    NoOp,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Hierarchy { .. } => "hierarchy",
            NodeKind::Hoist { .. } => "hoist",
            NodeKind::Library { .. } => "library",
            NodeKind::Attributes { .. } => "attributes",
            NodeKind::TextValue { .. } => "text",
            NodeKind::NoOp => "noop",
        }
    }

    /// Schema handle for a child tag, if this kind recognizes it.
    pub fn child(&self, tag: &str) -> Option<&SchemaRef> {
        match self {
            NodeKind::Hierarchy { children } | NodeKind::Hoist { children } => children.get(tag),
            NodeKind::Library { item_tag, item } if item_tag == tag => Some(item),
            _ => None,
        }
    }

    fn children(&self) -> Vec<&SchemaRef> {
        match self {
            NodeKind::Hierarchy { children } | NodeKind::Hoist { children } => {
                children.values().collect()
            }
            NodeKind::Library { item, .. } => vec![item],
            _ => Vec::new(),
        }
    }
}

/// A rule describing how to interpret one kind of element.
#[derive(Clone)]
pub struct SchemaNode {
    pub kind: NodeKind,
    /// Key the parent stores this value under (defaults to the tag name)
    pub target: Option<String>,
    /// Policy the parent applies when this node's key repeats
    pub merge: Option<MergePolicy>,
    pub binding: Binding,
    pub enter: Option<Arc<EnterFn>>,
    pub close: Option<Arc<CloseFn>>,
}

impl SchemaNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            target: None,
            merge: None,
            binding: Binding::None,
            enter: None,
            close: None,
        }
    }

    /// Set the identifier registration performed on open.
    pub fn bind(mut self, binding: Binding) -> Self {
        self.binding = binding;
        self
    }

    /// Run `hook` on the frame's value right after it is pushed.
    pub fn on_enter<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Attributes, &mut Value) -> ParseResult<()> + Send + Sync + 'static,
    {
        self.enter = Some(Arc::new(hook));
        self
    }

    /// Rewrite the frame's final value with `hook`.
    pub fn on_close<F>(mut self, hook: F) -> Self
    where
        F: Fn(Value) -> ParseResult<Value> + Send + Sync + 'static,
    {
        self.close = Some(Arc::new(hook));
        self
    }

    pub fn is_noop(&self) -> bool {
        matches!(self.kind, NodeKind::NoOp)
    }
}

impl fmt::Debug for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("SchemaNode");
        s.field("kind", &self.kind.name());
        match &self.kind {
            NodeKind::Hierarchy { children } | NodeKind::Hoist { children } => {
                s.field("children", &children.keys().collect::<Vec<_>>());
            }
            NodeKind::Library { item_tag, .. } => {
                s.field("item_tag", item_tag);
            }
            _ => {}
        }
        s.field("target", &self.target)
            .field("merge", &self.merge)
            .field("binding", &self.binding)
            .finish()
    }
}

/// A lazily applied `rename`/`multiple` overlay.
#[derive(Debug)]
pub struct Wrapped {
    inner: SchemaRef,
    target: Option<String>,
    merge: Option<MergePolicy>,
    resolved: OnceLock<Arc<SchemaNode>>,
}

/// Handle to a schema: by name, inline, or wrapped.
#[derive(Clone, Debug)]
pub enum SchemaRef {
    /// A name resolved through the registry on first use
    Named(String),
    Node(Arc<SchemaNode>),
    Wrapped(Arc<Wrapped>),
}

impl SchemaRef {
    fn wrap(inner: SchemaRef, target: Option<String>, merge: Option<MergePolicy>) -> Self {
        SchemaRef::Wrapped(Arc::new(Wrapped {
            inner,
            target,
            merge,
            resolved: OnceLock::new(),
        }))
    }

    fn dependencies(&self) -> Vec<&SchemaRef> {
        match self {
            SchemaRef::Named(_) => Vec::new(),
            SchemaRef::Node(node) => node.kind.children(),
            SchemaRef::Wrapped(wrapped) => vec![&wrapped.inner],
        }
    }
}

impl From<&str> for SchemaRef {
    fn from(name: &str) -> Self {
        SchemaRef::Named(name.to_string())
    }
}

impl From<String> for SchemaRef {
    fn from(name: String) -> Self {
        SchemaRef::Named(name)
    }
}

impl From<SchemaNode> for SchemaRef {
    fn from(node: SchemaNode) -> Self {
        SchemaRef::Node(Arc::new(node))
    }
}

/// Build a child table for [`hierarchy`] and [`hoist`].
///
/// ```ignore
/// hierarchy(children! {
///     "created" => "date",
///     "up_axis" => rename("upAxis", "string"),
/// })
/// ```
#[macro_export]
macro_rules! children {
    ($($tag:expr => $schema:expr),* $(,)?) => {
        vec![$(($tag.to_string(), $crate::schema::SchemaRef::from($schema))),*]
    };
}

/// Map keyed by each child's target name.
pub fn hierarchy(children: Vec<(String, SchemaRef)>) -> SchemaNode {
    SchemaNode::new(NodeKind::Hierarchy {
        children: children.into_iter().collect(),
    })
}

/// Collapse one level: the value is whichever recognized child produced one.
pub fn hoist(children: Vec<(String, SchemaRef)>) -> SchemaNode {
    SchemaNode::new(NodeKind::Hoist {
        children: children.into_iter().collect(),
    })
}

/// Ordered list of `item_tag` children; other tags are skipped.
pub fn library(item_tag: &str, item: impl Into<SchemaRef>) -> SchemaNode {
    let mut node = SchemaNode::new(NodeKind::Library {
        item_tag: item_tag.to_string(),
        item: item.into(),
    });
    node.merge = Some(MergePolicy::Concat);
    node
}

/// The open tag's attribute map.
pub fn attributes() -> SchemaNode {
    let mut node = SchemaNode::new(NodeKind::Attributes { proc: None });
    node.merge = Some(MergePolicy::Union);
    node
}

/// A value computed from the open tag's attributes.
pub fn attributes_with<F>(proc: F) -> SchemaNode
where
    F: Fn(&Attributes) -> ParseResult<Value> + Send + Sync + 'static,
{
    SchemaNode::new(NodeKind::Attributes {
        proc: Some(Arc::new(proc)),
    })
}

/// A value parsed from the last non-blank text chunk.
pub fn text_value<F>(proc: F) -> SchemaNode
where
    F: Fn(&str) -> ParseResult<Value> + Send + Sync + 'static,
{
    SchemaNode::new(NodeKind::TextValue {
        proc: Arc::new(proc),
    })
}

/// Skip the element and everything below it.
pub fn noop() -> SchemaNode {
    SchemaNode::new(NodeKind::NoOp)
}

/// Store the wrapped schema's value under `target` instead of the tag name.
pub fn rename(target: &str, schema: impl Into<SchemaRef>) -> SchemaRef {
    SchemaRef::wrap(schema.into(), Some(target.to_string()), None)
}

/// Accumulate repeated occurrences into a list instead of overwriting.
pub fn multiple(schema: impl Into<SchemaRef>) -> SchemaRef {
    SchemaRef::wrap(schema.into(), None, Some(MergePolicy::Append))
}
