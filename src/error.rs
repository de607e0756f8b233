//! Error types for manifest extraction, loading, and validation.

use std::path::PathBuf;

use serde_json::{json, Value};
use thiserror::Error;

use crate::types::HttpMethod;

/// Errors while resolving a `$ref` pointer.
///
/// None of these abort extraction: each is replaced by a placeholder
/// node (see [`ResolveError::placeholder`]) or a partially expanded tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("only internal references are supported: {reference}")]
    UnsupportedReferenceKind { reference: String },

    #[error("reference not found: {reference}")]
    ReferenceNotFound { reference: String },

    #[error("circular reference: {reference}")]
    CircularReference { reference: String },

    #[error("maximum dereference depth {depth} exceeded")]
    DepthExceeded { depth: usize },
}

impl ResolveError {
    /// Human-readable note stored in the placeholder's description.
    pub fn note(&self) -> String {
        match self {
            Self::UnsupportedReferenceKind { reference } => {
                format!("Failed to resolve: {}", reference)
            }
            Self::ReferenceNotFound { reference } => format!("Unresolved reference: {}", reference),
            Self::CircularReference { reference } => {
                format!("Circular reference to {}", reference)
            }
            Self::DepthExceeded { depth } => format!("Maximum depth {} exceeded", depth),
        }
    }

    /// Placeholder node substituted for an unresolvable reference.
    pub fn placeholder(&self) -> Value {
        json!({
            "type": "object",
            "description": self.note(),
        })
    }
}

/// A schema node that could not be normalized and was degraded to `{type: string}`.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize)]
#[error("malformed schema at {path}: {message}")]
pub struct SchemaError {
    /// Path of the node inside the schema being converted.
    pub path: String,
    pub message: String,
}

/// Errors that cause a single path or operation to be skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("document root must be an object, got {actual}")]
    NotADocument { actual: String },

    #[error("'paths' must be an object, got {actual}")]
    MalformedPaths { actual: String },

    #[error("path item for {path} must be an object, got {actual}")]
    MalformedPathItem { path: String, actual: String },

    #[error("operation {method} {path} must be an object, got {actual}")]
    MalformedOperation {
        path: String,
        method: HttpMethod,
        actual: String,
    },

    #[error("parameter {index} skipped: {message}")]
    MalformedParameter { index: usize, message: String },
}

/// Errors while loading a document from disk, a string, or the network.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML: {source}")]
    InvalidYaml {
        #[source]
        source: serde_yaml::Error,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}
