//! OpenAPI Tool Manifests
//!
//! Turns an OpenAPI 3.x document into a flat list of endpoint descriptors that
//! automated callers (for example LLM tool-calling clients) can consume: one
//! descriptor per (method, path) with a name, description, URL, headers, and
//! JSON-Schema-shaped parameters, body, and response.
//!
//! # Example
//!
//! ```
//! use openapi_manifest::{extract, ExtractOptions, HttpMethod};
//! use serde_json::json;
//!
//! let document = json!({
//!     "openapi": "3.0.3",
//!     "servers": [{ "url": "https://api.example.com/" }],
//!     "paths": {
//!         "/users/{id}": {
//!             "parameters": [
//!                 { "name": "id", "in": "path", "required": true, "schema": { "type": "string" } }
//!             ],
//!             "get": {
//!                 "operationId": "getUser",
//!                 "summary": "Fetch a user",
//!                 "responses": {
//!                     "200": {
//!                         "content": {
//!                             "application/json": { "schema": { "$ref": "#/components/schemas/User" } }
//!                         }
//!                     }
//!                 }
//!             }
//!         }
//!     },
//!     "components": {
//!         "schemas": {
//!             "User": { "properties": { "name": { "type": "string" } } }
//!         }
//!     }
//! });
//!
//! let extraction = extract(&document, ExtractOptions::new());
//! let user = &extraction.endpoints[0].descriptor;
//!
//! assert_eq!(user.name, "getUser");
//! assert_eq!(user.method, HttpMethod::Get);
//! assert_eq!(user.endpoint, "https://api.example.com/users/{id}");
//! assert_eq!(user.parameters["required"], json!(["id"]));
//! assert_eq!(user.response["type"], "object");
//! ```
//!
//! # Failure containment
//!
//! Extraction never fails as a whole. Bad references become placeholder nodes,
//! malformed schema nodes become `{"type": "string"}`, and broken operations or
//! paths are skipped; each case is recorded on the returned [`Extraction`].

mod error;
mod extractor;
mod loader;
mod manifest;
mod normalizer;
mod resolver;
mod types;
mod validator;

pub use error::{ExtractError, LoadError, ResolveError, SchemaError};
pub use extractor::{
    endpoint_url, extract, normalize_name, operation_name, select_media_schema,
    select_success_response, ExtractedEndpoint, Extraction, Extractor, Issue,
    REQUEST_MEDIA_TYPES, RESPONSE_MEDIA_TYPES,
};
pub use loader::{is_url, load_document, load_document_auto, load_document_str, parse_document, Format};
pub use manifest::{GroupRef, Manifest, ToolGroup};
pub use normalizer::{convert, convert_with_diagnostics};
pub use resolver::{lookup, RefResolver};
pub use types::{
    json_type_name, EndpointDescriptor, ExtractOptions, Header, HttpMethod, ServerDescriptor,
    MAX_DEPTH, UNTAGGED,
};
pub use validator::{descriptor_shape, validate, validate_descriptor, ValidationReport};

#[cfg(feature = "remote")]
pub use loader::load_document_url;
