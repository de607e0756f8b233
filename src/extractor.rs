//! Operation extraction - one endpoint descriptor per (path, method) of an OpenAPI document.
//!
//! Paths are visited in document order and methods in [`HttpMethod::ALL`] order.
//! Each path item is dereferenced in full before its operations are read, so
//! everything below works on plain, ref-free trees.
//!
//! # Precedence rules
//!
//! | Concern | Rule |
//! |---------|------|
//! | parameters | path-level first, operation-level appended; last write wins by name |
//! | servers | root, replaced by a non-empty path list, replaced by a non-empty operation list |
//! | request body | `application/json`, form-urlencoded, multipart, else first media type |
//! | response | first of `200`..`299` (then `2XX`), `application/json`, `text/plain`, `application/xml`, else first |
//!
//! Failures are contained per parameter, per operation and per path; they are
//! reported in [`Extraction::issues`] instead of aborting the run.

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::{ExtractError, ResolveError, SchemaError};
use crate::normalizer::convert_with_diagnostics;
use crate::resolver::RefResolver;
use crate::types::{
    array_field, bool_field, empty_schema, field, json_type_name, object_field, str_field,
    EndpointDescriptor, ExtractOptions, Header, HttpMethod, ServerDescriptor, UNTAGGED,
};

/// Request body media types, most preferred first.
pub const REQUEST_MEDIA_TYPES: &[&str] = &[
    "application/json",
    "application/x-www-form-urlencoded",
    "multipart/form-data",
];

/// Response media types, most preferred first.
pub const RESPONSE_MEDIA_TYPES: &[&str] = &["application/json", "text/plain", "application/xml"];

/// A descriptor together with the tags of its operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedEndpoint {
    #[serde(rename = "tool")]
    pub descriptor: EndpointDescriptor,
    /// Never empty; `["untagged"]` when the operation declares no tags.
    pub tags: Vec<String>,
}

impl ExtractedEndpoint {
    /// The first tag, used as the grouping key.
    pub fn primary_tag(&self) -> &str {
        self.tags.first().map(String::as_str).unwrap_or(UNTAGGED)
    }
}

/// A contained failure, located by path index in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub index: usize,
    pub path: Option<String>,
    pub method: Option<HttpMethod>,
    pub error: ExtractError,
}

/// Output of one extraction run.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Successfully built descriptors, in document order.
    pub endpoints: Vec<ExtractedEndpoint>,
    /// Skipped paths, operations, and parameters.
    pub issues: Vec<Issue>,
    /// References replaced by placeholders or left unexpanded.
    pub reference_diagnostics: Vec<ResolveError>,
    /// Schema nodes degraded to `{"type": "string"}`.
    pub schema_diagnostics: Vec<SchemaError>,
}

impl Extraction {
    /// Returns true when nothing was skipped or degraded.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
            && self.reference_diagnostics.is_empty()
            && self.schema_diagnostics.is_empty()
    }

    /// Split into `(descriptor, tags)` pairs.
    pub fn into_pairs(self) -> Vec<(EndpointDescriptor, Vec<String>)> {
        self.endpoints
            .into_iter()
            .map(|e| (e.descriptor, e.tags))
            .collect()
    }
}

/// Extract every operation of `document`.
///
/// Shorthand for `Extractor::new(document, options).extract()`.
pub fn extract(document: &Value, options: ExtractOptions) -> Extraction {
    Extractor::new(document, options).extract()
}

/// Single-use extraction session over one document.
///
/// Owns the reference cache for the run; create a fresh one per document.
pub struct Extractor<'a> {
    document: &'a Value,
    options: ExtractOptions,
    resolver: RefResolver<'a>,
    issues: Vec<Issue>,
    schema_diagnostics: Vec<SchemaError>,
}

impl<'a> Extractor<'a> {
    pub fn new(document: &'a Value, options: ExtractOptions) -> Self {
        Self {
            document,
            options,
            resolver: RefResolver::new(document),
            issues: Vec::new(),
            schema_diagnostics: Vec::new(),
        }
    }

    /// Run the extraction, consuming the session.
    pub fn extract(mut self) -> Extraction {
        let endpoints = self.extract_paths();
        debug!(count = endpoints.len(), "extraction finished");
        Extraction {
            endpoints,
            issues: self.issues,
            reference_diagnostics: self.resolver.take_diagnostics(),
            schema_diagnostics: self.schema_diagnostics,
        }
    }

    fn record(&mut self, index: usize, path: Option<&str>, method: Option<HttpMethod>, error: ExtractError) {
        warn!(error = %error, "skipping");
        self.issues.push(Issue {
            index,
            path: path.map(str::to_string),
            method,
            error,
        });
    }

    fn extract_paths(&mut self) -> Vec<ExtractedEndpoint> {
        let document = self.document;
        let mut endpoints = Vec::new();

        if !document.is_object() {
            self.record(
                0,
                None,
                None,
                ExtractError::NotADocument {
                    actual: json_type_name(document).to_string(),
                },
            );
            return endpoints;
        }

        let paths = match field(document, "paths") {
            None | Some(Value::Null) => return endpoints,
            Some(Value::Object(paths)) => paths,
            Some(other) => {
                self.record(
                    0,
                    None,
                    None,
                    ExtractError::MalformedPaths {
                        actual: json_type_name(other).to_string(),
                    },
                );
                return endpoints;
            }
        };

        for (index, (path, raw_item)) in paths.iter().enumerate() {
            debug!(path = %path, "processing path");
            let path_item = self.resolver.dereference(raw_item);
            if !path_item.is_object() {
                self.record(
                    index,
                    Some(path.as_str()),
                    None,
                    ExtractError::MalformedPathItem {
                        path: path.clone(),
                        actual: json_type_name(&path_item).to_string(),
                    },
                );
                continue;
            }

            for method in HttpMethod::ALL {
                let Some(operation) = field(&path_item, method.key()) else {
                    continue;
                };
                match self.build_operation(index, path, method, &path_item, operation) {
                    Ok(endpoint) => {
                        debug!(path = %path, method = %method, name = %endpoint.descriptor.name, "extracted operation");
                        endpoints.push(endpoint);
                    }
                    Err(error) => self.record(index, Some(path.as_str()), Some(method), error),
                }
            }
        }

        endpoints
    }

    fn build_operation(
        &mut self,
        index: usize,
        path: &str,
        method: HttpMethod,
        path_item: &Value,
        operation: &Value,
    ) -> Result<ExtractedEndpoint, ExtractError> {
        if !operation.is_object() {
            return Err(ExtractError::MalformedOperation {
                path: path.to_string(),
                method,
                actual: json_type_name(operation).to_string(),
            });
        }

        let mut parameters: Vec<&Value> = Vec::new();
        parameters.extend(array_field(path_item, "parameters").into_iter().flatten());
        parameters.extend(array_field(operation, "parameters").into_iter().flatten());

        let servers = self.resolve_servers(path_item, operation);

        let descriptor = EndpointDescriptor {
            name: operation_name(method, path, str_field(operation, "operationId")),
            description: str_field(operation, "description")
                .or_else(|| str_field(operation, "summary"))
                .unwrap_or_default()
                .to_string(),
            method,
            endpoint: endpoint_url(&servers, path),
            headers: vec![Header::authorization()],
            parameters: self.parameters_schema(index, path, method, &parameters),
            body: self.request_body_schema(field(operation, "requestBody")),
            response: self.response_schema(field(operation, "responses")),
        };

        Ok(ExtractedEndpoint {
            descriptor,
            tags: operation_tags(operation),
        })
    }

    /// Servers for one operation: operation over path over root, never empty.
    pub fn resolve_servers(&mut self, path_item: &Value, operation: &Value) -> Vec<ServerDescriptor> {
        let mut declared: &[Value] = array_field(self.document, "servers")
            .map(Vec::as_slice)
            .unwrap_or_default();
        if let Some(servers) = array_field(path_item, "servers").filter(|s| !s.is_empty()) {
            declared = servers;
        }
        if let Some(servers) = array_field(operation, "servers").filter(|s| !s.is_empty()) {
            declared = servers;
        }

        let mut servers: Vec<ServerDescriptor> = declared
            .iter()
            .filter_map(|server| ServerDescriptor::from_node(&self.resolver.dereference(server)))
            .collect();

        if servers.is_empty() {
            servers.push(ServerDescriptor::placeholder());
        }

        if self.options.expand_server_variables {
            for server in &mut servers {
                server.url = server.expanded_url();
            }
        }

        if let Some(base_url) = &self.options.base_url {
            for server in &mut servers {
                server.url = base_url.clone();
                server.description = format!("Base URL override: {}", base_url);
            }
        }

        servers
    }

    /// Merge parameters into one object schema keyed by parameter name.
    fn parameters_schema(
        &mut self,
        index: usize,
        path: &str,
        method: HttpMethod,
        parameters: &[&Value],
    ) -> Value {
        let mut properties = Map::new();
        let mut required: Vec<String> = Vec::new();

        for (position, parameter) in parameters.iter().enumerate() {
            let name = match str_field(parameter, "name") {
                Some(name) if !name.is_empty() => name,
                _ => {
                    let message = if parameter.is_object() {
                        "missing 'name'".to_string()
                    } else {
                        format!("expected object, got {}", json_type_name(parameter))
                    };
                    self.record(
                        index,
                        Some(path),
                        Some(method),
                        ExtractError::MalformedParameter {
                            index: position,
                            message,
                        },
                    );
                    continue;
                }
            };

            let mut property = match parameter_schema(parameter) {
                Some(schema) => convert_with_diagnostics(schema, &mut self.schema_diagnostics),
                None => convert_with_diagnostics(&empty_schema(), &mut self.schema_diagnostics),
            };
            if let Some(description) = str_field(parameter, "description").filter(|d| !d.is_empty()) {
                if let Value::Object(map) = &mut property {
                    map.insert("description".into(), Value::String(description.to_string()));
                }
            }

            // Duplicates: the later declaration replaces the earlier one
            properties.insert(name.to_string(), property);
            required.retain(|r| r != name);
            if bool_field(parameter, "required", false) {
                required.push(name.to_string());
            }
        }

        if properties.is_empty() {
            return empty_schema();
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    fn request_body_schema(&mut self, request_body: Option<&Value>) -> Value {
        let Some(content) = request_body.and_then(|body| object_field(body, "content")) else {
            return empty_schema();
        };
        match select_media_schema(content, REQUEST_MEDIA_TYPES) {
            Some(schema) => convert_with_diagnostics(schema, &mut self.schema_diagnostics),
            None => empty_schema(),
        }
    }

    fn response_schema(&mut self, responses: Option<&Value>) -> Value {
        let Some(responses) = responses.and_then(Value::as_object) else {
            return empty_schema();
        };
        let Some(response) = select_success_response(responses) else {
            return empty_schema();
        };
        let Some(content) = object_field(response, "content") else {
            return empty_schema();
        };
        match select_media_schema(content, RESPONSE_MEDIA_TYPES) {
            Some(schema) => convert_with_diagnostics(schema, &mut self.schema_diagnostics),
            None => empty_schema(),
        }
    }
}

/// Build the tool name for an operation.
///
/// Names made only of ASCII alphanumerics are kept as-is; anything else is
/// converted to camelCase. Without an `operationId` the name is synthesized
/// from the method and path, e.g. `GET /a/{b}` becomes `getAB`.
pub fn operation_name(method: HttpMethod, path: &str, operation_id: Option<&str>) -> String {
    let synthesized = || {
        let flat = path.replace('/', "_").replace('{', "").replace('}', "");
        format!("{}_{}", method.key(), flat)
    };

    let name = match operation_id.filter(|id| !id.is_empty()) {
        Some(id) => normalize_name(id),
        None => normalize_name(&synthesized()),
    };
    if name.is_empty() {
        normalize_name(&synthesized())
    } else {
        name
    }
}

/// Apply the camelCase convention unless `raw` is already purely alphanumeric.
pub fn normalize_name(raw: &str) -> String {
    if raw.chars().all(|c| c.is_ascii_alphanumeric()) {
        return raw.to_string();
    }
    to_camel_case(raw)
}

/// `security-advisories/get-global-advisory` → `securityAdvisoriesGetGlobalAdvisory`.
fn to_camel_case(text: &str) -> String {
    let mut words = text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty());

    let Some(first) = words.next() else {
        return String::new();
    };
    let mut result = first.to_ascii_lowercase();
    for word in words {
        let mut chars = word.chars();
        if let Some(initial) = chars.next() {
            result.push(initial.to_ascii_uppercase());
            result.push_str(&chars.as_str().to_ascii_lowercase());
        }
    }
    result
}

/// Join the first server URL with the raw path template.
pub fn endpoint_url(servers: &[ServerDescriptor], path: &str) -> String {
    let base = servers
        .first()
        .map(|s| s.url.trim_end_matches('/'))
        .unwrap_or_default();
    format!("{}{}", base, path)
}

fn operation_tags(operation: &Value) -> Vec<String> {
    let tags: Vec<String> = array_field(operation, "tags")
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    if tags.is_empty() {
        vec![UNTAGGED.to_string()]
    } else {
        tags
    }
}

/// A parameter's schema, falling back to the first `content` entry.
fn parameter_schema(parameter: &Value) -> Option<&Value> {
    field(parameter, "schema").or_else(|| {
        object_field(parameter, "content")
            .and_then(|content| content.values().next())
            .and_then(|media| field(media, "schema"))
    })
}

fn has_schema(schema: &&Value) -> bool {
    match schema {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

/// Pick a schema from a `content` map by media type preference.
///
/// The first preferred type present wins; if it carries no schema, the first
/// declared media type is used instead.
pub fn select_media_schema<'v>(content: &'v Map<String, Value>, preferred: &[&str]) -> Option<&'v Value> {
    preferred
        .iter()
        .find_map(|media_type| content.get(*media_type))
        .and_then(|media| field(media, "schema"))
        .filter(has_schema)
        .or_else(|| {
            content
                .values()
                .next()
                .and_then(|media| field(media, "schema"))
                .filter(has_schema)
        })
}

/// The first response declared for `200`..=`299`, then the `2XX` range key.
pub fn select_success_response(responses: &Map<String, Value>) -> Option<&Value> {
    (200..300)
        .find_map(|code: u16| responses.get(&code.to_string()))
        .or_else(|| responses.get("2XX"))
        .or_else(|| responses.get("2xx"))
        .filter(|response| has_schema(response))
}
