//! Named schema definitions with resolve-on-first-use memoization.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use super::{noop, SchemaNode, SchemaRef};
use crate::error::{ParseError, ParseResult};

struct Definition {
    schema: SchemaRef,
    resolved: OnceLock<Arc<SchemaNode>>,
}

/// A set of named schemas.
///
/// Definitions may reference names that are defined later, or themselves.
/// Nothing is resolved at definition time; each name is resolved the first
/// time an element routes through it and the result is cached.
pub struct SchemaRegistry {
    definitions: HashMap<String, Definition>,
    noop: Arc<SchemaNode>,
}

impl SchemaRegistry {
    /// Create a registry containing only the `noop` schema.
    pub fn new() -> Self {
        let mut registry = Self {
            definitions: HashMap::new(),
            noop: Arc::new(noop()),
        };
        registry.define("noop", SchemaRef::Node(registry.noop.clone()));
        registry
    }

    /// Register `schema` under `name`, replacing any previous definition.
    pub fn define(&mut self, name: &str, schema: impl Into<SchemaRef>) -> &mut Self {
        self.definitions.insert(
            name.to_string(),
            Definition {
                schema: schema.into(),
                resolved: OnceLock::new(),
            },
        );
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Whether `name` has been resolved (and cached) yet.
    pub fn is_resolved(&self, name: &str) -> bool {
        self.definitions
            .get(name)
            .is_some_and(|def| def.resolved.get().is_some())
    }

    /// The shared skip-everything node.
    pub fn noop(&self) -> Arc<SchemaNode> {
        self.noop.clone()
    }

    /// Resolve a handle to a concrete node.
    pub fn resolve(&self, schema: &SchemaRef) -> ParseResult<Arc<SchemaNode>> {
        self.resolve_inner(schema, &mut Vec::new())
    }

    fn resolve_inner(
        &self,
        schema: &SchemaRef,
        aliases: &mut Vec<String>,
    ) -> ParseResult<Arc<SchemaNode>> {
        match schema {
            SchemaRef::Node(node) => Ok(node.clone()),
            SchemaRef::Named(name) => {
                let def = self
                    .definitions
                    .get(name)
                    .ok_or_else(|| ParseError::UnknownSchema(name.clone()))?;
                if let Some(node) = def.resolved.get() {
                    return Ok(node.clone());
                }
                // A name met again before reaching a node only aliases itself
                if aliases.contains(name) {
                    return Err(ParseError::AliasCycle(name.clone()));
                }
                aliases.push(name.clone());
                let node = self.resolve_inner(&def.schema, aliases)?;
                log::trace!("Resolved schema \"{}\" ({})", name, node.kind.name());
                Ok(def.resolved.get_or_init(|| node).clone())
            }
            SchemaRef::Wrapped(wrapped) => {
                if let Some(node) = wrapped.resolved.get() {
                    return Ok(node.clone());
                }
                let inner = self.resolve_inner(&wrapped.inner, aliases)?;
                let mut node = SchemaNode::clone(&inner);
                if wrapped.target.is_some() {
                    node.target = wrapped.target.clone();
                }
                if wrapped.merge.is_some() {
                    node.merge = wrapped.merge;
                }
                Ok(wrapped.resolved.get_or_init(|| Arc::new(node)).clone())
            }
        }
    }

    /// Check that every name reachable from any definition is defined.
    ///
    /// Walks the graph without resolving (and caching) anything.
    pub fn validate(&self) -> ParseResult<()> {
        let mut visited = HashSet::new();
        let mut names: Vec<&String> = self.definitions.keys().collect();
        names.sort();
        for name in names {
            self.visit_name(name, &mut visited)?;
        }
        Ok(())
    }

    fn visit_name<'a>(&'a self, name: &'a str, visited: &mut HashSet<&'a str>) -> ParseResult<()> {
        if !visited.insert(name) {
            return Ok(());
        }
        let def = self
            .definitions
            .get(name)
            .ok_or_else(|| ParseError::UnknownSchema(name.to_string()))?;
        self.visit_ref(&def.schema, visited)
    }

    fn visit_ref<'a>(
        &'a self,
        schema: &'a SchemaRef,
        visited: &mut HashSet<&'a str>,
    ) -> ParseResult<()> {
        if let SchemaRef::Named(name) = schema {
            return self.visit_name(name, visited);
        }
        for dependency in schema.dependencies() {
            self.visit_ref(dependency, visited)?;
        }
        Ok(())
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::children;
    use crate::schema::{hierarchy, multiple, rename, text_value, MergePolicy, NodeKind};
    use crate::value::Value;

    fn string() -> SchemaNode {
        text_value(|s| Ok(Value::from(s)))
    }

    #[test]
    fn test_self_reference_resolves() {
        let mut registry = SchemaRegistry::new();
        registry.define(
            "animation",
            hierarchy(children! { "animation" => rename("children", multiple("animation")) }),
        );

        let animation = registry.resolve(&"animation".into()).unwrap();
        let child = animation.kind.child("animation").unwrap();
        let nested = registry.resolve(child).unwrap();
        assert_eq!(nested.target.as_deref(), Some("children"));
        assert_eq!(nested.merge, Some(MergePolicy::Append));
        assert!(matches!(nested.kind, NodeKind::Hierarchy { .. }));
    }

    #[test]
    fn test_resolution_is_memoized() {
        let mut registry = SchemaRegistry::new();
        registry.define("string", string());
        registry.define("title", "string");

        assert!(registry.contains("title"));
        assert!(registry.contains("noop"));
        assert!(!registry.contains("subject"));
        assert!(!registry.is_resolved("title"));
        let first = registry.resolve(&"title".into()).unwrap();
        assert!(registry.is_resolved("title"));
        assert!(registry.is_resolved("string"));
        let second = registry.resolve(&"title".into()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_wrapper_is_memoized() {
        let mut registry = SchemaRegistry::new();
        registry.define("string", string());
        let wrapped = rename("upAxis", "string");

        let first = registry.resolve(&wrapped).unwrap();
        let second = registry.resolve(&wrapped).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.target.as_deref(), Some("upAxis"));
    }

    #[test]
    fn test_nested_wrappers_compose() {
        let mut registry = SchemaRegistry::new();
        registry.define("string", string());
        let node = registry
            .resolve(&rename("outer", rename("inner", multiple("string"))))
            .unwrap();
        assert_eq!(node.target.as_deref(), Some("outer"));
        assert_eq!(node.merge, Some(MergePolicy::Append));
    }

    #[test]
    fn test_unknown_name() {
        let registry = SchemaRegistry::new();
        let err = registry.resolve(&"geometry".into()).unwrap_err();
        assert!(matches!(err, ParseError::UnknownSchema(name) if name == "geometry"));
    }

    #[test]
    fn test_alias_cycle_detected() {
        let mut registry = SchemaRegistry::new();
        registry.define("a", "b");
        registry.define("b", rename("x", "a"));
        let err = registry.resolve(&"a".into()).unwrap_err();
        assert!(matches!(err, ParseError::AliasCycle(_)));
    }

    #[test]
    fn test_validate_reports_missing_names() {
        let mut registry = SchemaRegistry::new();
        registry.define("asset", hierarchy(children! { "title" => "string" }));
        assert!(matches!(
            registry.validate(),
            Err(ParseError::UnknownSchema(name)) if name == "string"
        ));

        registry.define("string", string());
        registry.validate().unwrap();
        assert!(!registry.is_resolved("asset"));
    }
}
