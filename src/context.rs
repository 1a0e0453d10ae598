//! JSON-LD `@context` handling.
//!
//! An annotated API description carries a `@context` mapping property and
//! operation keys to semantic identifiers:
//!
//! ```json
//! {
//!   "@context": {
//!     "schema": "http://schema.org/",
//!     "Order": "schema:Order",
//!     "customer": { "@id": "schema:customer", "@type": "schema:Person" }
//!   }
//! }
//! ```
//!
//! Entries whose value is an `http(s)://` IRI are namespaces; compact IRIs
//! (`schema:Order`) anywhere in the document are expanded against them.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::LoadError;

/// Vendor-extension spellings of the JSON-LD keywords, with their native form.
const VENDOR_KEYWORDS: &[(&str, &str)] = &[
    ("x-@id", "@id"),
    ("x-@type", "@type"),
    ("x-@context", "@context"),
    ("x-@relation", "@relation"),
];

/// Key → semantic lookups derived once from a document's `@context`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SemanticIndex {
    identifiers: HashMap<String, String>,
    types: HashMap<String, String>,
}

impl SemanticIndex {
    /// Build the index from a document whose curies are already expanded.
    ///
    /// A context entry contributes an identifier when its value is a string
    /// (or an object with `@id`), and a type when it is an object with
    /// `@type` or a string entry whose key starts with an upper-case letter.
    pub fn from_document(document: &Value) -> Self {
        let Some(context) = document.get("@context").and_then(Value::as_object) else {
            return Self::default();
        };

        let mut identifiers = HashMap::new();
        let mut types = HashMap::new();

        for (key, value) in context {
            let identifier = match value {
                Value::Object(entry) => entry.get("@id").and_then(first_string),
                other => first_string(other),
            };
            if let Some(id) = identifier {
                identifiers.insert(key.clone(), id);
            }

            let semantic_type = match value {
                Value::Object(entry) => entry.get("@type").and_then(first_string),
                other if starts_with_uppercase(key) => first_string(other),
                _ => None,
            };
            if let Some(t) = semantic_type {
                types.insert(key.clone(), t);
            }
        }

        Self { identifiers, types }
    }

    /// Semantic identifier for a property, parameter or schema key.
    pub fn identifier(&self, key: &str) -> Option<&str> {
        self.identifiers.get(key).map(String::as_str)
    }

    /// Semantic type for a key.
    pub fn semantic_type(&self, key: &str) -> Option<&str> {
        self.types.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty() && self.types.is_empty()
    }
}

fn first_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first().and_then(Value::as_str).map(String::from),
        _ => None,
    }
}

fn starts_with_uppercase(s: &str) -> bool {
    s.chars().next().map(char::is_uppercase).unwrap_or(false)
}

/// Replace `x-@id`, `x-@type`, `x-@context` and `x-@relation` with their
/// native JSON-LD keywords.
///
/// The substitution is literal and applies to the serialized document, so
/// string values spelling a vendor keyword are rewritten too.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the rewritten text no longer parses.
pub fn normalize_vendor_keys(document: &Value) -> Result<Value, LoadError> {
    let mut text =
        serde_json::to_string(document).map_err(|source| LoadError::InvalidJson { source })?;
    for (vendor, native) in VENDOR_KEYWORDS {
        text = text.replace(vendor, native);
    }
    serde_json::from_str(&text).map_err(|source| LoadError::InvalidJson { source })
}

/// Namespace prefix → IRI for every `@context` entry whose value is an IRI.
pub fn namespaces(document: &Value) -> HashMap<String, String> {
    document
        .get("@context")
        .and_then(Value::as_object)
        .map(|context| {
            context
                .iter()
                .filter_map(|(key, value)| {
                    value
                        .as_str()
                        .filter(|v| v.starts_with("http://") || v.starts_with("https://"))
                        .map(|iri| (key.clone(), iri.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Expand every compact IRI (`prefix:rest`) whose prefix is a declared
/// namespace. Keys are left untouched; only string values change.
pub fn expand_curies(document: &Value) -> Value {
    let namespaces = namespaces(document);
    if namespaces.is_empty() {
        return document.clone();
    }
    expand_curies_recursive(document, &namespaces)
}

fn expand_curies_recursive(value: &Value, namespaces: &HashMap<String, String>) -> Value {
    match value {
        Value::String(s) => Value::String(expand_curie(s, namespaces)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| expand_curies_recursive(item, namespaces))
                .collect(),
        ),
        Value::Object(map) => {
            let mut result = Map::new();
            for (k, v) in map {
                result.insert(k.clone(), expand_curies_recursive(v, namespaces));
            }
            Value::Object(result)
        }
        other => other.clone(),
    }
}

fn expand_curie(value: &str, namespaces: &HashMap<String, String>) -> String {
    let Some((prefix, rest)) = value.split_once(':') else {
        return value.to_string();
    };
    match namespaces.get(prefix) {
        Some(iri) => format!("{}{}", iri, rest),
        None => value.to_string(),
    }
}
