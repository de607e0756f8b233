//! Reference resolution - inlines internal `$ref` pointers of an OpenAPI document.
//!
//! A [`RefResolver`] is a session over one document. It caches every reference
//! it resolved completely and records every failure it contained, so one
//! extraction run never pays for the same component twice and never aborts on
//! a bad pointer.
//!
//! # Failure containment
//!
//! | Failure | Result |
//! |---------|--------|
//! | non-internal ref (`other.yaml#/Pet`) | placeholder node |
//! | missing target | placeholder node |
//! | ref already on the active chain | placeholder node |
//! | depth above [`MAX_DEPTH`] | node returned unexpanded |
//!
//! A reference is circular only relative to the chain currently being expanded:
//! two sibling branches may both expand the same component.
//!
//! Nesting depth restarts at every ref hop; the chain alone bounds how many
//! components one expansion may pass through. Every successful resolution is
//! cached, so each component is expanded at most once per document.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ResolveError;
use crate::types::MAX_DEPTH;

/// Per-document resolution session.
///
/// Construct one per document and discard it afterwards; the cache is never
/// shared between documents.
#[derive(Debug)]
pub struct RefResolver<'a> {
    document: &'a Value,
    cache: HashMap<String, Value>,
    diagnostics: Vec<ResolveError>,
}

impl<'a> RefResolver<'a> {
    /// Create a resolver over `document` with an empty cache.
    pub fn new(document: &'a Value) -> Self {
        Self {
            document,
            cache: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Every distinct failure contained so far, in the order first seen.
    pub fn diagnostics(&self) -> &[ResolveError] {
        &self.diagnostics
    }

    /// Drain the recorded failures.
    pub fn take_diagnostics(&mut self) -> Vec<ResolveError> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Returns the cached expansion of `reference`, if it was resolved before.
    pub fn cached(&self, reference: &str) -> Option<&Value> {
        self.cache.get(reference)
    }

    /// Recursively replace every `$ref` in `node` with its resolved form.
    ///
    /// Starts a fresh resolution chain at depth 0. Never fails: unresolvable
    /// references become placeholders.
    pub fn dereference(&mut self, node: &Value) -> Value {
        let mut chain = Vec::new();
        self.dereference_tree(node, &mut chain, 0)
    }

    /// Resolve a single reference relative to the active `chain`.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedReferenceKind` for anything but `#/...` pointers,
    /// `ReferenceNotFound` when a segment is missing, and `CircularReference`
    /// when `reference` is already on `chain`.
    pub fn resolve(
        &mut self,
        reference: &str,
        chain: &mut Vec<String>,
    ) -> Result<Value, ResolveError> {
        if chain.iter().any(|r| r == reference) {
            return Err(ResolveError::CircularReference {
                reference: reference.to_string(),
            });
        }

        if let Some(hit) = self.cache.get(reference) {
            return Ok(hit.clone());
        }

        let target = lookup(self.document, reference)?;

        chain.push(reference.to_string());
        let resolved = self.dereference_tree(target, chain, 0);
        chain.pop();

        debug!(reference, "resolved reference");
        self.cache.insert(reference.to_string(), resolved.clone());

        Ok(resolved)
    }

    fn record(&mut self, error: ResolveError) {
        if !self.diagnostics.contains(&error) {
            self.diagnostics.push(error);
        }
    }

    fn dereference_tree(&mut self, node: &Value, chain: &mut Vec<String>, depth: usize) -> Value {
        if depth > MAX_DEPTH {
            warn!(depth, "dereference depth exceeded, leaving node unexpanded");
            self.record(ResolveError::DepthExceeded { depth: MAX_DEPTH });
            return node.clone();
        }

        match node {
            Value::Object(map) => {
                if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                    return match self.resolve(reference, chain) {
                        Ok(resolved) => resolved,
                        Err(err) => {
                            warn!(reference, error = %err, "substituting placeholder");
                            let placeholder = err.placeholder();
                            self.record(err);
                            placeholder
                        }
                    };
                }

                let expanded: Map<String, Value> = map
                    .iter()
                    .map(|(key, value)| (key.clone(), self.dereference_tree(value, chain, depth + 1)))
                    .collect();
                Value::Object(expanded)
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.dereference_tree(item, chain, depth + 1))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

/// Walk `document` along an internal pointer such as `#/components/schemas/Pet`.
///
/// Segments use JSON Pointer escaping (`~1` = `/`, `~0` = `~`); numeric segments
/// index into sequences.
///
/// # Errors
///
/// `UnsupportedReferenceKind` unless the pointer starts with `#/`,
/// `ReferenceNotFound` when any segment is missing.
pub fn lookup<'v>(document: &'v Value, reference: &str) -> Result<&'v Value, ResolveError> {
    let Some(pointer) = reference.strip_prefix("#/") else {
        return Err(ResolveError::UnsupportedReferenceKind {
            reference: reference.to_string(),
        });
    };

    let not_found = || ResolveError::ReferenceNotFound {
        reference: reference.to_string(),
    };

    let mut current = document;
    for part in pointer.split('/') {
        let key = part.replace("~1", "/").replace("~0", "~");
        current = match current {
            Value::Object(map) => map.get(&key).ok_or_else(not_found)?,
            Value::Array(items) => key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .ok_or_else(not_found)?,
            _ => return Err(not_found()),
        };
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn petstore() -> Value {
        json!({
            "components": {
                "schemas": {
                    "Pet": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer" },
                            "owner": { "$ref": "#/components/schemas/Owner" }
                        }
                    },
                    "Owner": {
                        "type": "object",
                        "properties": { "name": { "type": "string" } }
                    },
                    "A": { "type": "object", "properties": { "b": { "$ref": "#/components/schemas/B" } } },
                    "B": { "type": "object", "properties": { "a": { "$ref": "#/components/schemas/A" } } }
                }
            }
        })
    }

    #[test]
    fn lookup_walks_segments() {
        let doc = petstore();
        let owner = lookup(&doc, "#/components/schemas/Owner").unwrap();
        assert_eq!(owner["type"], "object");
    }

    #[test]
    fn lookup_decodes_escapes_and_indexes() {
        let doc = json!({
            "paths": {
                "/pets/{id}": { "parameters": [{ "name": "id" }, { "name": "verbose" }] }
            }
        });
        let param = lookup(&doc, "#/paths/~1pets~1{id}/parameters/1").unwrap();
        assert_eq!(param["name"], "verbose");
    }

    #[test]
    fn lookup_rejects_external() {
        let doc = petstore();
        assert!(matches!(
            lookup(&doc, "common.yaml#/Pet"),
            Err(ResolveError::UnsupportedReferenceKind { .. })
        ));
    }

    #[test]
    fn lookup_missing_segment() {
        let doc = petstore();
        assert!(matches!(
            lookup(&doc, "#/components/schemas/Missing"),
            Err(ResolveError::ReferenceNotFound { .. })
        ));
        assert!(matches!(
            lookup(&doc, "#/components/schemas/Pet/type/deeper"),
            Err(ResolveError::ReferenceNotFound { .. })
        ));
    }

    #[test]
    fn resolve_inlines_nested_refs() {
        let doc = petstore();
        let mut resolver = RefResolver::new(&doc);
        let pet = resolver
            .resolve("#/components/schemas/Pet", &mut Vec::new())
            .unwrap();
        assert_eq!(pet["properties"]["owner"]["properties"]["name"]["type"], "string");
        assert!(resolver.diagnostics().is_empty());
    }

    #[test]
    fn resolve_detects_cycle_on_chain() {
        let doc = petstore();
        let mut resolver = RefResolver::new(&doc);
        let a = resolver
            .resolve("#/components/schemas/A", &mut Vec::new())
            .unwrap();
        assert_eq!(
            a["properties"]["b"]["properties"]["a"],
            json!({
                "type": "object",
                "description": "Circular reference to #/components/schemas/A"
            })
        );
        assert_eq!(
            resolver.diagnostics(),
            &[ResolveError::CircularReference {
                reference: "#/components/schemas/A".into()
            }]
        );
    }

    #[test]
    fn resolve_with_ref_on_chain_is_circular() {
        let doc = petstore();
        let mut resolver = RefResolver::new(&doc);
        let mut chain = vec!["#/components/schemas/Owner".to_string()];
        let result = resolver.resolve("#/components/schemas/Owner", &mut chain);
        assert!(matches!(
            result,
            Err(ResolveError::CircularReference { .. })
        ));
    }

    #[test]
    fn cyclic_resolutions_are_cached() {
        let doc = petstore();
        let mut resolver = RefResolver::new(&doc);
        resolver.dereference(&json!({ "$ref": "#/components/schemas/A" }));

        let b = resolver.cached("#/components/schemas/B").unwrap();
        assert_eq!(
            b["properties"]["a"]["description"],
            "Circular reference to #/components/schemas/A"
        );
        assert!(resolver.cached("#/components/schemas/A").is_some());
    }

    #[test]
    fn repeated_failures_are_recorded_once() {
        let doc = petstore();
        let mut resolver = RefResolver::new(&doc);
        resolver.dereference(&json!({
            "one": { "$ref": "#/components/schemas/Nope" },
            "two": { "$ref": "#/components/schemas/Nope" }
        }));
        assert_eq!(
            resolver.diagnostics(),
            &[ResolveError::ReferenceNotFound {
                reference: "#/components/schemas/Nope".into()
            }]
        );
    }

    #[test]
    fn depth_restarts_at_each_ref() {
        let mut schemas = serde_json::Map::new();
        for i in 0..30 {
            let node = if i < 29 {
                json!({ "$ref": format!("#/components/schemas/L{}", i + 1) })
            } else {
                json!({ "type": "string" })
            };
            // Each link nests a few levels so the whole chain exceeds MAX_DEPTH
            schemas.insert(
                format!("L{}", i),
                json!({ "type": "object", "properties": { "next": { "allOf": [node] } } }),
            );
        }
        let doc = json!({ "components": { "schemas": schemas } });
        let mut resolver = RefResolver::new(&doc);
        let tree = resolver.dereference(&json!({ "$ref": "#/components/schemas/L0" }));

        let mut cursor = &tree;
        let mut levels = 0;
        while let Some(next) = cursor.pointer("/properties/next/allOf/0") {
            cursor = next;
            levels += 1;
        }
        assert_eq!(levels, 30);
        assert_eq!(cursor["type"], "string");
        assert!(resolver.diagnostics().is_empty());
    }

    #[test]
    fn complete_resolutions_are_cached() {
        let doc = petstore();
        let mut resolver = RefResolver::new(&doc);
        resolver.dereference(&json!({ "$ref": "#/components/schemas/Pet" }));

        assert!(resolver.cached("#/components/schemas/Pet").is_some());
        assert!(resolver.cached("#/components/schemas/Owner").is_some());
    }

    #[test]
    fn resolve_is_idempotent() {
        let doc = petstore();
        let mut resolver = RefResolver::new(&doc);
        let first = resolver.dereference(&json!({ "$ref": "#/components/schemas/A" }));
        let second = resolver.dereference(&json!({ "$ref": "#/components/schemas/A" }));
        assert_eq!(first, second);

        let first = resolver.dereference(&json!({ "$ref": "#/components/schemas/Pet" }));
        let second = resolver.dereference(&json!({ "$ref": "#/components/schemas/Pet" }));
        assert_eq!(first, second);
    }

    #[test]
    fn sibling_branches_may_share_a_ref() {
        let doc = petstore();
        let mut resolver = RefResolver::new(&doc);
        let tree = resolver.dereference(&json!({
            "left": { "$ref": "#/components/schemas/Owner" },
            "right": { "$ref": "#/components/schemas/Owner" }
        }));
        assert_eq!(tree["left"], tree["right"]);
        assert_eq!(tree["right"]["properties"]["name"]["type"], "string");
        assert!(resolver.diagnostics().is_empty());
    }

    #[test]
    fn missing_ref_becomes_placeholder() {
        let doc = petstore();
        let mut resolver = RefResolver::new(&doc);
        let tree = resolver.dereference(&json!({
            "schema": { "$ref": "#/components/schemas/Nope" }
        }));
        assert_eq!(
            tree["schema"]["description"],
            "Unresolved reference: #/components/schemas/Nope"
        );
    }

    #[test]
    fn external_ref_becomes_placeholder() {
        let doc = petstore();
        let mut resolver = RefResolver::new(&doc);
        let tree = resolver.dereference(&json!({ "$ref": "https://example.com/pet.json" }));
        assert_eq!(
            tree["description"],
            "Failed to resolve: https://example.com/pet.json"
        );
        assert_eq!(tree["type"], "object");
    }

    #[test]
    fn depth_bound_returns_node_unexpanded() {
        let mut deep = json!({ "$ref": "#/components/schemas/Owner" });
        for _ in 0..(MAX_DEPTH + 5) {
            deep = json!({ "inner": deep });
        }
        let doc = petstore();
        let mut resolver = RefResolver::new(&doc);
        let tree = resolver.dereference(&deep);

        let mut cursor = &tree;
        while let Some(next) = cursor.get("inner") {
            cursor = next;
        }
        assert_eq!(cursor["$ref"], "#/components/schemas/Owner");
        assert!(resolver
            .diagnostics()
            .iter()
            .any(|e| matches!(e, ResolveError::DepthExceeded { .. })));
    }

    #[test]
    fn non_string_ref_is_plain_data() {
        let doc = petstore();
        let mut resolver = RefResolver::new(&doc);
        let tree = resolver.dereference(&json!({ "$ref": 7, "type": "string" }));
        assert_eq!(tree, json!({ "$ref": 7, "type": "string" }));
    }
}
