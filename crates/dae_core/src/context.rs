//! The stack machine interpreting open/text/close events against a schema.
//!
//! One [`Frame`] exists per open element. Frames live in a dense stack and
//! refer to their parent by index. Closing an element computes the frame's
//! final value and merges it into the new top frame, so values flow upward
//! until the document sentinel at the bottom retains the root's value.

use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;

use crate::dialect::Dialect;
use crate::document::Document;
use crate::error::{ParseError, ParseResult};
use crate::namespace::{Namespace, SlotId};
use crate::schema::{MergePolicy, NodeKind, SchemaNode, SchemaRegistry};
use crate::trace::Tracer;
use crate::value::{Attributes, Value};

/// What drives a frame.
#[derive(Clone, Debug)]
pub(crate) enum FrameRule {
    /// Bottom of the stack; accepts exactly one root element
    Document,
    Schema(Arc<SchemaNode>),
}

/// Key and merge policy for the child currently open under a hierarchy.
#[derive(Debug)]
struct Pending {
    key: String,
    merge: MergePolicy,
}

/// Per-element parse state.
#[derive(Debug)]
pub(crate) struct Frame {
    pub(crate) tag: String,
    pub(crate) rule: FrameRule,
    pub(crate) data: Value,
    /// Last non-blank text chunk (text schemas only)
    text: Option<String>,
    pub(crate) id: Option<String>,
    pub(crate) slot: Option<SlotId>,
    /// Present on frames that open a `sid` scope
    pub(crate) scope: Option<BTreeMap<String, SlotId>>,
    pub(crate) parent: Option<usize>,
    pending: Option<Pending>,
}

impl Frame {
    fn document() -> Self {
        Self {
            tag: String::new(),
            rule: FrameRule::Document,
            data: Value::Null,
            text: None,
            id: None,
            slot: None,
            scope: None,
            parent: None,
            pending: None,
        }
    }

    pub(crate) fn element(
        tag: &str,
        node: Arc<SchemaNode>,
        data: Value,
        id: Option<String>,
        parent: Option<usize>,
    ) -> Self {
        Self {
            tag: tag.to_string(),
            rule: FrameRule::Schema(node),
            data,
            text: None,
            id,
            slot: None,
            scope: None,
            parent,
            pending: None,
        }
    }

    /// Compute the value handed to the parent on close.
    fn final_value(&mut self) -> ParseResult<Value> {
        let FrameRule::Schema(node) = &self.rule else {
            return Ok(mem::take(&mut self.data));
        };
        let value = match &node.kind {
            NodeKind::NoOp => return Ok(Value::Null),
            NodeKind::TextValue { proc } => match self.text.take() {
                Some(text) => proc(&text)?,
                None => Value::Null,
            },
            _ => mem::take(&mut self.data),
        };
        match &node.close {
            Some(hook) => hook(value),
            None => Ok(value),
        }
    }

    /// Merge a closed child's value into this frame.
    fn child_closed(&mut self, value: Value) {
        let pending = self.pending.take();
        let FrameRule::Schema(node) = &self.rule else {
            self.data = value;
            return;
        };
        if value.is_null() {
            return;
        }
        match &node.kind {
            NodeKind::Hierarchy { .. } => {
                if let (Some(pending), Some(map)) = (pending, self.data.as_map_mut()) {
                    let previous = map.remove(&pending.key);
                    map.insert(pending.key, pending.merge.merge(previous, value));
                }
            }
            NodeKind::Hoist { .. } => self.data = value,
            NodeKind::Library { .. } => {
                if let Value::List(items) = &mut self.data {
                    items.push(value);
                }
            }
            _ => {}
        }
    }
}

fn initial_value(node: &SchemaNode, attributes: &Attributes) -> ParseResult<Value> {
    match &node.kind {
        NodeKind::Hierarchy { .. } | NodeKind::Hoist { .. } => Ok(Value::map()),
        NodeKind::Library { .. } => Ok(Value::List(Vec::new())),
        NodeKind::Attributes { proc: Some(proc) } => proc(attributes),
        NodeKind::Attributes { proc: None } => Ok(Value::from(attributes)),
        NodeKind::TextValue { .. } | NodeKind::NoOp => Ok(Value::Null),
    }
}

/// Parse state for a single document.
///
/// Feed events in arrival order, then call [`end`](Context::end). Any error
/// leaves the context unusable; drop it.
pub struct Context<'r> {
    registry: &'r SchemaRegistry,
    dialect: Dialect,
    strict: bool,
    stack: Vec<Frame>,
    namespace: Namespace,
    root_seen: bool,
    tracer: Option<Box<dyn Tracer>>,
}

impl<'r> Context<'r> {
    /// Create a context whose stack holds only the document sentinel.
    ///
    /// With `strict` set, elements no schema recognizes and schema names
    /// the registry cannot resolve are errors instead of skipped subtrees.
    pub fn new(registry: &'r SchemaRegistry, dialect: Dialect, strict: bool) -> Self {
        Self {
            registry,
            dialect,
            strict,
            stack: vec![Frame::document()],
            namespace: Namespace::new(),
            root_seen: false,
            tracer: None,
        }
    }

    pub fn set_tracer(&mut self, tracer: Box<dyn Tracer>) {
        self.tracer = Some(tracer);
    }

    /// Number of open elements.
    pub fn depth(&self) -> usize {
        self.stack.len().saturating_sub(1)
    }

    /// Current value bound to a global identifier.
    pub fn lookup(&self, id: &str) -> Option<&Value> {
        self.namespace.lookup(id)
    }

    /// Handle an open tag.
    pub fn open(&mut self, tag: &str, attributes: Attributes) -> ParseResult<()> {
        let parent = self.stack.len().checked_sub(1).ok_or(ParseError::StackUnderflow)?;
        let node = self.route(parent, tag, &attributes)?;

        let index = self.stack.len();
        let data = initial_value(&node, &attributes)?;
        let id = attributes.get("id").cloned();
        self.stack
            .push(Frame::element(tag, node.clone(), data, id, Some(parent)));

        self.namespace
            .register(&mut self.stack, index, node.binding, &attributes)?;
        if let Some(enter) = &node.enter {
            enter(&attributes, &mut self.stack[index].data)?;
        }

        if let Some(tracer) = self.tracer.as_mut() {
            tracer.opened(index, tag, node.kind.name());
            if self.stack[index].slot.is_some() {
                tracer.bound(
                    index,
                    tag,
                    attributes.get("id").map(String::as_str),
                    attributes.get("sid").map(String::as_str),
                );
            }
        }
        Ok(())
    }

    /// Pick the schema for `tag` under the frame at `parent`.
    fn route(
        &mut self,
        parent: usize,
        tag: &str,
        attributes: &Attributes,
    ) -> ParseResult<Arc<SchemaNode>> {
        let frame = &mut self.stack[parent];
        frame.pending = None;

        let schema = match &frame.rule {
            FrameRule::Document => {
                if self.root_seen {
                    return Err(ParseError::MultipleRoots(tag.to_string()));
                }
                if tag != self.dialect.root_tag {
                    return Err(ParseError::UnexpectedRoot {
                        expected: self.dialect.root_tag.clone(),
                        found: tag.to_string(),
                    });
                }
                self.dialect.check_version(attributes)?;
                self.root_seen = true;
                self.dialect.root.clone()
            }
            FrameRule::Schema(node) => match node.kind.child(tag) {
                Some(child) => child.clone(),
                None if node.is_noop() => return Ok(self.registry.noop()),
                None if self.strict => {
                    return Err(ParseError::UnknownElement {
                        parent: frame.tag.clone(),
                        tag: tag.to_string(),
                    });
                }
                None => {
                    log::debug!("Skipping <{}> inside <{}>", tag, frame.tag);
                    return Ok(self.registry.noop());
                }
            },
        };

        let node = match self.registry.resolve(&schema) {
            Ok(node) => node,
            Err(ParseError::UnknownSchema(name)) if !self.strict => {
                log::warn!("No schema named \"{}\" for <{}>, skipping", name, tag);
                return Ok(self.registry.noop());
            }
            Err(err) => return Err(err),
        };

        let frame = &mut self.stack[parent];
        if let FrameRule::Schema(parent_node) = &frame.rule {
            if matches!(parent_node.kind, NodeKind::Hierarchy { .. }) && !node.is_noop() {
                frame.pending = Some(Pending {
                    key: node.target.clone().unwrap_or_else(|| tag.to_string()),
                    merge: node.merge.unwrap_or_default(),
                });
            }
        }
        Ok(node)
    }

    /// Handle character data. Ignored unless the open element is a text schema.
    pub fn text(&mut self, text: &str) {
        let Some(frame) = self.stack.last_mut() else {
            return;
        };
        if let FrameRule::Schema(node) = &frame.rule {
            if matches!(node.kind, NodeKind::TextValue { .. }) {
                let text = text.trim();
                if !text.is_empty() {
                    frame.text = Some(text.to_string());
                }
            }
        }
    }

    /// Handle a close tag: finish the top frame and merge it into its parent.
    pub fn close(&mut self) -> ParseResult<()> {
        if self.stack.len() <= 1 {
            return Err(ParseError::StackUnderflow);
        }
        let mut frame = self.stack.pop().ok_or(ParseError::StackUnderflow)?;
        let value = frame.final_value()?;

        if let Some(slot) = frame.slot {
            self.namespace.fill(slot, value.clone());
        }
        if let Some(scope) = frame.scope.take() {
            self.namespace.close_scope(&frame.tag, frame.id.as_deref(), scope);
        }
        if let Some(tracer) = self.tracer.as_mut() {
            tracer.closed(self.stack.len(), &frame.tag, &value);
        }

        let parent = self.stack.last_mut().ok_or(ParseError::StackUnderflow)?;
        parent.child_closed(value);
        Ok(())
    }

    /// Finish the parse and hand out the document.
    pub fn end(mut self) -> ParseResult<Document> {
        if self.stack.len() != 1 {
            return Err(ParseError::UnclosedElements(self.depth()));
        }
        if !self.root_seen {
            return Err(ParseError::EmptyDocument);
        }
        let root = self.stack.pop().map(|frame| frame.data).unwrap_or_default();
        Ok(self.namespace.into_document(root))
    }
}
