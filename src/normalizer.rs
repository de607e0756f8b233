//! Schema normalization - turns arbitrary OpenAPI schema nodes into simplified JSON Schema.
//!
//! Input is expected to be dereferenced already. Output always carries a
//! `type`, inferred when the source omits it:
//!
//! | Source has | Inferred `type` |
//! |------------|-----------------|
//! | `properties` or `additionalProperties` | `object` |
//! | `items` | `array` |
//! | `enum` | kind of the first value |
//! | none of the above | `string` |
//!
//! A sub-node that cannot be normalized degrades to `{"type": "string"}`
//! without affecting its siblings or parent.

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::error::SchemaError;
use crate::types::MAX_DEPTH;

/// Keywords copied verbatim when present.
const PASSTHROUGH: &[&str] = &[
    "minimum",
    "maximum",
    "minLength",
    "maxLength",
    "pattern",
    "default",
    "example",
];

/// Convert a schema node into its canonical form.
///
/// Non-object input yields `{"type": "string"}`.
pub fn convert(node: &Value) -> Value {
    let mut diagnostics = Vec::new();
    convert_with_diagnostics(node, &mut diagnostics)
}

/// Like [`convert`], recording every degraded sub-node in `diagnostics`.
pub fn convert_with_diagnostics(node: &Value, diagnostics: &mut Vec<SchemaError>) -> Value {
    convert_node(node, "", 0, diagnostics)
}

fn string_schema() -> Value {
    json!({ "type": "string" })
}

fn malformed(path: &str, message: impl Into<String>) -> SchemaError {
    SchemaError {
        path: if path.is_empty() {
            "/".to_string()
        } else {
            path.to_string()
        },
        message: message.into(),
    }
}

/// Empty strings and arrays count as absent for optional annotations.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        _ => true,
    }
}

fn convert_node(
    node: &Value,
    path: &str,
    depth: usize,
    diagnostics: &mut Vec<SchemaError>,
) -> Value {
    match try_convert(node, path, depth, diagnostics) {
        Ok(converted) => converted,
        Err(err) => {
            warn!(path = %err.path, error = %err.message, "degrading schema node to string");
            diagnostics.push(err);
            string_schema()
        }
    }
}

fn try_convert(
    node: &Value,
    path: &str,
    depth: usize,
    diagnostics: &mut Vec<SchemaError>,
) -> Result<Value, SchemaError> {
    if depth > MAX_DEPTH {
        return Err(malformed(
            path,
            format!("nesting deeper than {}", MAX_DEPTH),
        ));
    }

    let Some(source) = node.as_object() else {
        return Ok(string_schema());
    };

    let merged;
    let source = match source.get("allOf") {
        Some(branches) => {
            merged = merge_all_of(source, branches, path, depth)?;
            &merged
        }
        None => source,
    };

    let schema_type = schema_type(source, path)?;
    let mut result = Map::new();
    result.insert("type".into(), Value::String(schema_type.clone()));

    if let Some(description) = source.get("description").filter(|v| is_present(v)) {
        result.insert("description".into(), description.clone());
    }

    if let Some(values) = source.get("enum") {
        let values = values
            .as_array()
            .ok_or_else(|| malformed(path, "'enum' must be an array"))?;
        if !values.is_empty() {
            result.insert("enum".into(), Value::Array(values.clone()));
        }
    }

    if let Some(format) = source.get("format").filter(|v| is_present(v)) {
        result.insert("format".into(), format.clone());
    }

    match schema_type.as_str() {
        "array" => {
            let empty = Value::Object(Map::new());
            let items = source.get("items").unwrap_or(&empty);
            let items_path = format!("{}/items", path);
            result.insert(
                "items".into(),
                convert_node(items, &items_path, depth + 1, diagnostics),
            );
        }
        "object" => {
            if let Some(properties) = source.get("properties") {
                let properties = properties
                    .as_object()
                    .ok_or_else(|| malformed(path, "'properties' must be an object"))?;
                if !properties.is_empty() {
                    let mut converted = Map::new();
                    for (name, property) in properties {
                        let property_path = format!("{}/properties/{}", path, name);
                        converted.insert(
                            name.clone(),
                            convert_node(property, &property_path, depth + 1, diagnostics),
                        );
                    }
                    result.insert("properties".into(), Value::Object(converted));
                }
            }

            // Copied verbatim, not checked against the declared properties
            if let Some(required) = source.get("required") {
                let required = required
                    .as_array()
                    .ok_or_else(|| malformed(path, "'required' must be an array"))?;
                if !required.is_empty() {
                    result.insert("required".into(), Value::Array(required.clone()));
                }
            }

            match source.get("additionalProperties") {
                None | Some(Value::Null) => {}
                Some(nested @ Value::Object(_)) => {
                    let nested_path = format!("{}/additionalProperties", path);
                    result.insert(
                        "additionalProperties".into(),
                        convert_node(nested, &nested_path, depth + 1, diagnostics),
                    );
                }
                Some(other) => {
                    result.insert("additionalProperties".into(), other.clone());
                }
            }
        }
        _ => {}
    }

    for &keyword in PASSTHROUGH {
        if let Some(value) = source.get(keyword).filter(|v| !v.is_null()) {
            result.insert(keyword.into(), value.clone());
        }
    }

    Ok(Value::Object(result))
}

/// Determine the node's type, declared or inferred.
fn schema_type(source: &Map<String, Value>, path: &str) -> Result<String, SchemaError> {
    match source.get("type") {
        Some(Value::String(declared)) if !declared.is_empty() => return Ok(declared.clone()),
        // OpenAPI 3.1 style: ["string", "null"]
        Some(Value::Array(declared)) if !declared.is_empty() => {
            let names: Vec<&str> = declared.iter().filter_map(Value::as_str).collect();
            if names.len() != declared.len() {
                return Err(malformed(path, "'type' array must contain only strings"));
            }
            let chosen = names
                .iter()
                .find(|name| **name != "null")
                .or_else(|| names.first())
                .copied()
                .unwrap_or("string");
            return Ok(chosen.to_string());
        }
        None | Some(Value::Null) | Some(Value::String(_)) | Some(Value::Array(_)) => {}
        Some(_) => return Err(malformed(path, "'type' must be a string or array")),
    }

    let inferred = if source.contains_key("properties") || source.contains_key("additionalProperties")
    {
        "object"
    } else if source.contains_key("items") {
        "array"
    } else if let Some(first) = source
        .get("enum")
        .and_then(Value::as_array)
        .and_then(|values| values.first())
    {
        match first {
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            _ => "string",
        }
    } else {
        "string"
    };
    Ok(inferred.to_string())
}

/// Flatten `allOf` branches into a single node.
///
/// Branch properties are unioned in order (later wins), `required` is unioned
/// without duplicates, and the first non-object branch type wins. Keys on the
/// node itself override anything merged from branches.
fn merge_all_of(
    source: &Map<String, Value>,
    branches: &Value,
    path: &str,
    depth: usize,
) -> Result<Map<String, Value>, SchemaError> {
    if depth > MAX_DEPTH {
        return Err(malformed(path, format!("nesting deeper than {}", MAX_DEPTH)));
    }
    let branches = branches
        .as_array()
        .ok_or_else(|| malformed(path, "'allOf' must be an array"))?;

    let mut merged = Map::new();
    let mut properties = Map::new();
    let mut required: Vec<Value> = Vec::new();
    let mut branch_type: Option<Value> = None;
    let mut saw_object = false;

    for branch in branches {
        let Some(branch) = branch.as_object() else {
            continue;
        };
        let flattened;
        let branch = match branch.get("allOf") {
            Some(nested) => {
                flattened = merge_all_of(branch, nested, path, depth + 1)?;
                &flattened
            }
            None => branch,
        };

        for (key, value) in branch {
            if key == "type" {
                if value == "object" {
                    saw_object = true;
                } else if branch_type.is_none() {
                    branch_type = Some(value.clone());
                }
                continue;
            }
            absorb(key, value, &mut merged, &mut properties, &mut required);
        }
    }

    if let Some(declared) = branch_type {
        merged.insert("type".into(), declared);
    } else if saw_object {
        merged.insert("type".into(), Value::String("object".into()));
    }

    for (key, value) in source {
        absorb(key, value, &mut merged, &mut properties, &mut required);
    }

    if !properties.is_empty() {
        merged.insert("properties".into(), Value::Object(properties));
    }
    if !required.is_empty() {
        merged.insert("required".into(), Value::Array(required));
    }

    Ok(merged)
}

fn absorb(
    key: &str,
    value: &Value,
    merged: &mut Map<String, Value>,
    properties: &mut Map<String, Value>,
    required: &mut Vec<Value>,
) {
    match (key, value) {
        ("allOf", _) => {}
        ("properties", Value::Object(props)) => {
            for (name, schema) in props {
                properties.insert(name.clone(), schema.clone());
            }
        }
        ("required", Value::Array(names)) => {
            for name in names {
                if !required.contains(name) {
                    required.push(name.clone());
                }
            }
        }
        _ => {
            merged.insert(key.to_string(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_object_yields_string() {
        assert_eq!(convert(&json!("weird")), json!({ "type": "string" }));
        assert_eq!(convert(&json!(null)), json!({ "type": "string" }));
        assert_eq!(convert(&json!([1, 2])), json!({ "type": "string" }));
    }

    #[test]
    fn infers_array_from_items() {
        let converted = convert(&json!({ "items": { "type": "string" } }));
        assert_eq!(
            converted,
            json!({ "type": "array", "items": { "type": "string" } })
        );
    }

    #[test]
    fn infers_object_from_properties() {
        assert_eq!(convert(&json!({ "properties": {} }))["type"], "object");
        assert_eq!(
            convert(&json!({ "additionalProperties": true }))["type"],
            "object"
        );
    }

    #[test]
    fn infers_from_enum_literal() {
        assert_eq!(convert(&json!({ "enum": [1, 2] }))["type"], "number");
        assert_eq!(convert(&json!({ "enum": ["a"] }))["type"], "string");
        assert_eq!(convert(&json!({ "enum": [true] }))["type"], "boolean");
    }

    #[test]
    fn properties_take_priority_over_items() {
        let converted = convert(&json!({ "properties": { "a": {} }, "items": {} }));
        assert_eq!(converted["type"], "object");
        assert!(converted.get("items").is_none());
    }

    #[test]
    fn defaults_to_string() {
        assert_eq!(convert(&json!({})), json!({ "type": "string" }));
        assert_eq!(
            convert(&json!({ "description": "free text" })),
            json!({ "type": "string", "description": "free text" })
        );
    }

    #[test]
    fn array_without_items_gets_string_items() {
        assert_eq!(
            convert(&json!({ "type": "array" })),
            json!({ "type": "array", "items": { "type": "string" } })
        );
    }

    #[test]
    fn object_copies_required_verbatim() {
        let converted = convert(&json!({
            "type": "object",
            "properties": { "id": { "type": "integer" } },
            "required": ["id", "undeclared"]
        }));
        assert_eq!(converted["required"], json!(["id", "undeclared"]));
        assert_eq!(converted["properties"]["id"], json!({ "type": "integer" }));
    }

    #[test]
    fn additional_properties_bool_and_schema() {
        let closed = convert(&json!({ "type": "object", "additionalProperties": false }));
        assert_eq!(closed["additionalProperties"], false);

        let map = convert(&json!({ "additionalProperties": { "enum": [1] } }));
        assert_eq!(
            map["additionalProperties"],
            json!({ "type": "number", "enum": [1] })
        );
    }

    #[test]
    fn constraints_pass_through() {
        let converted = convert(&json!({
            "type": "string",
            "format": "email",
            "minLength": 3,
            "maxLength": 64,
            "pattern": "^.+@.+$",
            "default": "a@b.c",
            "example": "x@y.z",
            "x-internal": true,
            "nullable": true
        }));
        assert_eq!(
            converted,
            json!({
                "type": "string",
                "format": "email",
                "minLength": 3,
                "maxLength": 64,
                "pattern": "^.+@.+$",
                "default": "a@b.c",
                "example": "x@y.z"
            })
        );
    }

    #[test]
    fn numeric_bounds_pass_through() {
        let converted = convert(&json!({ "type": "integer", "minimum": 0, "maximum": 100, "default": 0 }));
        assert_eq!(converted["minimum"], 0);
        assert_eq!(converted["maximum"], 100);
        assert_eq!(converted["default"], 0);
    }

    #[test]
    fn malformed_sub_node_is_contained() {
        let mut diagnostics = Vec::new();
        let converted = convert_with_diagnostics(
            &json!({
                "type": "object",
                "properties": {
                    "bad": { "type": "object", "properties": ["not", "a", "map"] },
                    "good": { "type": "integer" }
                }
            }),
            &mut diagnostics,
        );
        assert_eq!(converted["properties"]["bad"], json!({ "type": "string" }));
        assert_eq!(converted["properties"]["good"], json!({ "type": "integer" }));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].path, "/properties/bad");
    }

    #[test]
    fn malformed_type_degrades() {
        let mut diagnostics = Vec::new();
        let converted = convert_with_diagnostics(&json!({ "type": 42 }), &mut diagnostics);
        assert_eq!(converted, json!({ "type": "string" }));
        assert_eq!(diagnostics[0].path, "/");
    }

    #[test]
    fn type_array_picks_first_non_null() {
        assert_eq!(convert(&json!({ "type": ["null", "integer"] }))["type"], "integer");
        assert_eq!(convert(&json!({ "type": ["null"] }))["type"], "null");
    }

    #[test]
    fn all_of_branches_are_merged() {
        let converted = convert(&json!({
            "description": "A dog",
            "allOf": [
                {
                    "type": "object",
                    "properties": { "id": { "type": "integer" } },
                    "required": ["id"]
                },
                {
                    "properties": { "bark": { "type": "boolean" } },
                    "required": ["id", "bark"]
                }
            ]
        }));
        assert_eq!(converted["type"], "object");
        assert_eq!(converted["description"], "A dog");
        assert_eq!(converted["required"], json!(["id", "bark"]));
        assert_eq!(converted["properties"]["bark"], json!({ "type": "boolean" }));
    }

    #[test]
    fn all_of_non_object_type_wins() {
        let converted = convert(&json!({
            "allOf": [{ "type": "object" }, { "type": "string", "format": "uuid" }]
        }));
        assert_eq!(converted, json!({ "type": "string", "format": "uuid" }));
    }

    #[test]
    fn deep_nesting_degrades_at_bound() {
        let mut node = json!({ "type": "string" });
        for _ in 0..(MAX_DEPTH + 2) {
            node = json!({ "type": "array", "items": node });
        }
        let mut diagnostics = Vec::new();
        let converted = convert_with_diagnostics(&node, &mut diagnostics);
        assert_eq!(converted["type"], "array");
        assert_eq!(diagnostics.len(), 1);
    }
}
