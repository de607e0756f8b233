//! Descriptor shape validation.
//!
//! Post-checks an already built descriptor before it is published. The rules
//! are expressed as a JSON Schema and evaluated with `jsonschema`:
//!
//! - `name`, `description`, `method`, `endpoint` are non-blank strings
//! - every header has a string `name`, an optional boolean `required`, nothing else
//! - non-empty `parameters` / `body` are objects with `type` and `properties`
//!   (plus optional `description` and `required`), and every nested property
//!   has a string `type`
//!
//! `response` is not checked.

use serde::Serialize;
use serde_json::{json, Value};

use crate::types::EndpointDescriptor;

/// Outcome of validating one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// JSON Schema describing a publishable descriptor.
pub fn descriptor_shape() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["name", "description", "method", "endpoint"],
        "properties": {
            "name": { "$ref": "#/$defs/text" },
            "description": { "$ref": "#/$defs/text" },
            "method": { "$ref": "#/$defs/text" },
            "endpoint": { "$ref": "#/$defs/text" },
            "headers": {
                "type": "array",
                "items": { "$ref": "#/$defs/header" }
            },
            "parameters": { "$ref": "#/$defs/rootSchema" },
            "body": { "$ref": "#/$defs/rootSchema" }
        },
        "$defs": {
            "text": { "type": "string", "pattern": "\\S" },
            "header": {
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": { "type": "string" },
                    "required": { "type": "boolean" }
                },
                "additionalProperties": false
            },
            "empty": {
                "anyOf": [
                    { "type": "null" },
                    { "const": false },
                    { "const": 0 },
                    { "const": "" },
                    { "type": "array", "maxItems": 0 },
                    { "type": "object", "maxProperties": 0 }
                ]
            },
            "rootSchema": {
                "if": { "$ref": "#/$defs/empty" },
                "else": {
                    "type": "object",
                    "required": ["type", "properties"],
                    "properties": {
                        "type": { "type": "string" },
                        "description": { "type": "string" },
                        "properties": {
                            "type": "object",
                            "additionalProperties": { "$ref": "#/$defs/property" }
                        },
                        "required": true
                    },
                    "additionalProperties": false
                }
            },
            "property": {
                "type": "object",
                "required": ["type"],
                "properties": {
                    "type": { "type": "string" },
                    "description": { "type": "string" }
                },
                "allOf": [
                    {
                        "if": {
                            "properties": { "type": { "const": "object" } },
                            "required": ["type", "properties"]
                        },
                        "then": {
                            "properties": {
                                "properties": {
                                    "type": "object",
                                    "additionalProperties": { "$ref": "#/$defs/property" }
                                }
                            }
                        }
                    },
                    {
                        "if": {
                            "properties": { "type": { "const": "array" } },
                            "required": ["type", "items"]
                        },
                        "then": {
                            "properties": { "items": { "$ref": "#/$defs/property" } }
                        }
                    }
                ]
            }
        }
    })
}

/// Validate a descriptor in its serialized JSON form.
pub fn validate(descriptor: &Value) -> ValidationReport {
    let shape = descriptor_shape();
    let validator = match jsonschema::validator_for(&shape) {
        Ok(validator) => validator,
        Err(e) => {
            return ValidationReport::from_errors(vec![format!("invalid shape schema: {}", e)])
        }
    };

    let errors: Vec<String> = validator
        .iter_errors(descriptor)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{}: {}", path, e)
            }
        })
        .collect();

    ValidationReport::from_errors(errors)
}

/// Validate a typed descriptor.
pub fn validate_descriptor(descriptor: &EndpointDescriptor) -> ValidationReport {
    match serde_json::to_value(descriptor) {
        Ok(value) => validate(&value),
        Err(e) => ValidationReport::from_errors(vec![format!("cannot serialize descriptor: {}", e)]),
    }
}
