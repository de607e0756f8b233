//! Core types for OpenAPI manifest extraction.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Nesting bound within one component when dereferencing, and within one schema when converting.
pub const MAX_DEPTH: usize = 50;

/// Tag assigned to operations that declare none.
pub const UNTAGGED: &str = "untagged";

/// Name of the synthetic header carried by every descriptor.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Get a field from a mapping node; `None` on a missing key or a non-mapping node.
pub fn field<'a>(node: &'a Value, key: &str) -> Option<&'a Value> {
    node.as_object().and_then(|map| map.get(key))
}

/// Get a string field, ignoring values of any other kind.
pub fn str_field<'a>(node: &'a Value, key: &str) -> Option<&'a str> {
    field(node, key).and_then(Value::as_str)
}

/// Get a sequence field, ignoring values of any other kind.
pub fn array_field<'a>(node: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    field(node, key).and_then(Value::as_array)
}

/// Get a mapping field, ignoring values of any other kind.
pub fn object_field<'a>(node: &'a Value, key: &str) -> Option<&'a Map<String, Value>> {
    field(node, key).and_then(Value::as_object)
}

/// Get a boolean field, falling back to `default`.
pub fn bool_field(node: &Value, key: &str, default: bool) -> bool {
    field(node, key).and_then(Value::as_bool).unwrap_or(default)
}

/// The empty schema `{}` used when nothing could be selected.
pub fn empty_schema() -> Value {
    Value::Object(Map::new())
}

/// HTTP methods an OpenAPI path item may declare, in extraction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    /// All methods in the order operations are visited within a path item.
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
        HttpMethod::Head,
        HttpMethod::Options,
        HttpMethod::Trace,
    ];

    /// Returns the lowercase key used in a path item.
    pub fn key(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
            HttpMethod::Patch => "patch",
            HttpMethod::Head => "head",
            HttpMethod::Options => "options",
            HttpMethod::Trace => "trace",
        }
    }

    /// Parse a method name case-insensitively.
    ///
    /// Returns `None` for anything outside the eight path item verbs.
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.to_ascii_lowercase();
        HttpMethod::ALL.into_iter().find(|m| m.key() == lower)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key().to_ascii_uppercase())
    }
}

/// A header every caller must supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub required: bool,
}

impl Header {
    /// The fixed `Authorization` header attached to every descriptor.
    pub fn authorization() -> Self {
        Self {
            name: AUTHORIZATION_HEADER.to_string(),
            required: true,
        }
    }
}

/// One operation's manifest entry.
///
/// Serializes to the downstream shape
/// `{name, description, method, endpoint, headers, parameters, body, response}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub name: String,
    pub description: String,
    pub method: HttpMethod,
    /// Full URL: base server URL joined with the raw path template.
    pub endpoint: String,
    pub headers: Vec<Header>,
    /// JSON Schema object for all parameters, or `{}`.
    pub parameters: Value,
    /// JSON Schema for the request body, or `{}`.
    pub body: Value,
    /// JSON Schema for the selected success response, or `{}`.
    pub response: Value,
}

/// Resolved base-URL record for one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    pub url: String,
    pub description: String,
    pub variables: Map<String, Value>,
}

impl ServerDescriptor {
    /// Placeholder used when no scope declares a server.
    pub fn placeholder() -> Self {
        Self {
            url: String::new(),
            description: "No server information available".to_string(),
            variables: Map::new(),
        }
    }

    /// Build from a server object, tolerating missing or mistyped fields.
    ///
    /// Returns `None` when the node is not a mapping.
    pub fn from_node(node: &Value) -> Option<Self> {
        node.as_object()?;
        Some(Self {
            url: str_field(node, "url").unwrap_or_default().to_string(),
            description: str_field(node, "description")
                .unwrap_or_default()
                .to_string(),
            variables: object_field(node, "variables").cloned().unwrap_or_default(),
        })
    }

    /// Substitute every `{name}` in the URL with that variable's `default`.
    ///
    /// Variables without a string default are left untouched.
    pub fn expanded_url(&self) -> String {
        let mut url = self.url.clone();
        for (name, variable) in &self.variables {
            if let Some(default) = str_field(variable, "default") {
                url = url.replace(&format!("{{{}}}", name), default);
            }
        }
        url
    }
}

/// Options for a single extraction run.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Forces every server URL to this value when set.
    pub base_url: Option<String>,
    /// Substitute server variable defaults into server URLs.
    pub expand_server_variables: bool,
}

impl ExtractOptions {
    /// Create options with no override and variable expansion disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base-URL override. Empty strings clear it.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.base_url = if base_url.is_empty() {
            None
        } else {
            Some(base_url)
        };
        self
    }

    /// Enable or disable server variable expansion.
    pub fn expand_server_variables(mut self, expand: bool) -> Self {
        self.expand_server_variables = expand;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_parse_is_case_insensitive() {
        assert_eq!(HttpMethod::parse("GET"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::parse("patch"), Some(HttpMethod::Patch));
        assert_eq!(HttpMethod::parse("Trace"), Some(HttpMethod::Trace));
    }

    #[test]
    fn method_parse_rejects_non_verbs() {
        assert_eq!(HttpMethod::parse("parameters"), None);
        assert_eq!(HttpMethod::parse("servers"), None);
        assert_eq!(HttpMethod::parse(""), None);
    }

    #[test]
    fn method_serializes_uppercase() {
        assert_eq!(serde_json::to_value(HttpMethod::Delete).unwrap(), "DELETE");
        assert_eq!(HttpMethod::Options.to_string(), "OPTIONS");
    }

    #[test]
    fn field_accessors_default_on_wrong_kind() {
        let node = json!({ "name": 5, "tags": "x", "required": "yes" });
        assert_eq!(str_field(&node, "name"), None);
        assert_eq!(array_field(&node, "tags"), None);
        assert!(!bool_field(&node, "required", false));
        assert_eq!(field(&json!([1, 2]), "name"), None);
    }

    #[test]
    fn server_from_node_tolerates_missing_fields() {
        let server = ServerDescriptor::from_node(&json!({ "url": "https://a.io" })).unwrap();
        assert_eq!(server.url, "https://a.io");
        assert_eq!(server.description, "");
        assert!(server.variables.is_empty());

        assert!(ServerDescriptor::from_node(&json!("https://a.io")).is_none());
    }

    #[test]
    fn server_expanded_url_uses_defaults() {
        let server = ServerDescriptor::from_node(&json!({
            "url": "https://{region}.example.com/{version}",
            "variables": {
                "region": { "default": "eu" },
                "version": { "enum": ["v1", "v2"] }
            }
        }))
        .unwrap();
        assert_eq!(server.expanded_url(), "https://eu.example.com/{version}");
    }

    #[test]
    fn extract_options_empty_base_url_is_unset() {
        assert_eq!(ExtractOptions::new().base_url("").base_url, None);
        assert_eq!(
            ExtractOptions::new().base_url("https://x.io").base_url,
            Some("https://x.io".to_string())
        );
    }

    #[test]
    fn descriptor_serializes_downstream_shape() {
        let descriptor = EndpointDescriptor {
            name: "listUsers".into(),
            description: "List users".into(),
            method: HttpMethod::Get,
            endpoint: "https://api.example.com/users".into(),
            headers: vec![Header::authorization()],
            parameters: empty_schema(),
            body: empty_schema(),
            response: json!({ "type": "array", "items": { "type": "string" } }),
        };
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["method"], "GET");
        assert_eq!(
            value["headers"],
            json!([{ "name": "Authorization", "required": true }])
        );
        assert_eq!(value["parameters"], json!({}));
    }
}
