//! The loaded API description: expanded tree plus semantic index.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::context::{expand_curies, normalize_vendor_keys, SemanticIndex};
use crate::error::LoadError;
use crate::expander::expand_document;
use crate::loader::{load_document, load_document_auto, load_document_str};
use crate::types::{json_type_name, Method, OperationDescriptor};

/// An OpenAPI document, normalized, curie-expanded, indexed and expanded.
///
/// Built once per API description and read-only afterwards.
#[derive(Debug, Clone)]
pub struct ApiDocument {
    document: Value,
    index: SemanticIndex,
}

impl ApiDocument {
    /// Run the load pipeline over a parsed document.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::InvalidDocument` when the root is not an object,
    /// or any expansion error.
    pub fn from_value(raw: &Value) -> Result<Self, LoadError> {
        if !raw.is_object() {
            return Err(LoadError::InvalidDocument {
                message: format!("expected an object at the root, found {}", json_type_name(raw)),
            });
        }
        if let Some(paths) = raw.get("paths") {
            if !paths.is_object() {
                return Err(LoadError::InvalidDocument {
                    message: format!("\"paths\" must be an object, found {}", json_type_name(paths)),
                });
            }
        }

        let normalized = normalize_vendor_keys(raw)?;
        let normalized = expand_curies(&normalized);
        let index = SemanticIndex::from_document(&normalized);
        let document = expand_document(&normalized, &index)?;

        let path_count = document
            .get("paths")
            .and_then(|paths| paths.as_object())
            .map_or(0, |paths| paths.len());
        debug!(paths = path_count, "expanded API description");
        Ok(Self { document, index })
    }

    /// Parse JSON or YAML text and expand it.
    pub fn parse(content: &str) -> Result<Self, LoadError> {
        Self::from_value(&load_document_str(content)?)
    }

    /// Load and expand a document from a file.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        Self::from_value(&load_document(path)?)
    }

    /// Load and expand a document from a file path or URL.
    pub fn load_auto(source: &str) -> Result<Self, LoadError> {
        Self::from_value(&load_document_auto(source)?)
    }

    /// Fetch and expand a document over HTTP.
    #[cfg(feature = "remote")]
    pub fn load_url(url: &str) -> Result<Self, LoadError> {
        Self::from_value(&crate::loader::load_document_url(url)?)
    }

    /// The expanded tree.
    pub fn expanded(&self) -> &Value {
        &self.document
    }

    pub fn index(&self) -> &SemanticIndex {
        &self.index
    }

    /// `servers[0].url` with its variables replaced by their defaults.
    pub fn server_url(&self) -> Option<String> {
        let server = self.document.get("servers")?.get(0)?;
        let mut url = server.get("url")?.as_str()?.to_string();
        if let Some(variables) = server.get("variables").and_then(Value::as_object) {
            for (name, variable) in variables {
                if let Some(default) = variable.get("default").and_then(Value::as_str) {
                    url = url.replace(&format!("{{{}}}", name), default);
                }
            }
        }
        if url.is_empty() {
            None
        } else {
            Some(url)
        }
    }

    /// Every operation in document order (paths, then verbs within a path).
    pub fn operations(&self, authenticated: bool) -> Vec<OperationDescriptor> {
        let Some(paths) = self.document.get("paths").and_then(Value::as_object) else {
            return Vec::new();
        };

        let mut operations = Vec::new();
        for (path, item) in paths {
            let Some(entries) = item.as_object() else {
                continue;
            };
            for (key, operation) in entries {
                let Some(verb) = Method::parse(key) else {
                    continue;
                };
                if operation.is_object() {
                    operations.push(OperationDescriptor::from_parts(
                        verb,
                        path,
                        item,
                        operation,
                        authenticated,
                    ));
                }
            }
        }
        operations
    }

    /// Operation whose `operationId` or `@id` equals `id`.
    pub fn operation_by_id(&self, id: &str, authenticated: bool) -> Option<OperationDescriptor> {
        self.operations(authenticated)
            .into_iter()
            .find(|op| op.is_identified_by(id))
    }

    /// Operation addressed by a pointer of the form `#/paths/<path>/<verb>`.
    ///
    /// Anything before `#` (a document URL) is ignored.
    pub fn operation_by_ref(&self, reference: &str, authenticated: bool) -> Option<OperationDescriptor> {
        let pointer = reference
            .split_once('#')
            .map(|(_, fragment)| fragment)
            .unwrap_or(reference);
        let segments: Vec<String> = pointer
            .trim_start_matches('/')
            .split('/')
            .map(|s| s.replace("~1", "/").replace("~0", "~"))
            .collect();
        let [root, path, verb_key] = segments.as_slice() else {
            return None;
        };
        if root != "paths" {
            return None;
        }
        let verb = Method::parse(verb_key)?;
        let item = self.document.get("paths")?.get(path)?;
        let operation = item.get(verb_key)?;
        Some(OperationDescriptor::from_parts(verb, path, item, operation, authenticated))
    }
}
