//! API description loading from various sources.
//!
//! Handles loading OpenAPI documents (JSON or YAML) from files, strings, and
//! HTTP URLs.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::LoadError;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Load a document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or a parse error if the file is neither JSON nor YAML.
pub fn load_document(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        parse_yaml(&content)
    } else {
        load_document_str(&content)
    }
}

/// Load a document from a string.
///
/// JSON is tried first; anything that isn't JSON is parsed as YAML. When both
/// fail the JSON error is reported for input that looks like JSON.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` or `LoadError::InvalidYaml`.
pub fn load_document_str(content: &str) -> Result<Value, LoadError> {
    match serde_json::from_str(content) {
        Ok(value) => Ok(value),
        Err(source) => {
            let trimmed = content.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                Err(LoadError::InvalidJson { source })
            } else {
                parse_yaml(content)
            }
        }
    }
}

fn parse_yaml(content: &str) -> Result<Value, LoadError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|source| LoadError::InvalidYaml { source })?;
    Ok(yaml_to_json(yaml))
}

/// Convert a YAML tree to JSON.
///
/// Mapping keys that are not strings (`200:` under `responses`) are
/// stringified instead of rejected.
fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(seq) => Value::Array(seq.into_iter().map(yaml_to_json).collect()),
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::new();
            for (k, v) in mapping {
                let key = match k {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => serde_yaml::to_string(&other)
                        .map(|s| s.trim().to_string())
                        .unwrap_or_default(),
                };
                map.insert(key, yaml_to_json(v));
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

/// Load a document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails,
/// or a parse error if the response isn't JSON or YAML.
#[cfg(feature = "remote")]
pub fn load_document_url(url: &str) -> Result<Value, LoadError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    let response = client
        .get(url)
        .send()
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    // Check for HTTP errors before parsing
    let response = response
        .error_for_status()
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    let content = response.text().map_err(|source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    })?;

    load_document_str(&content)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Navigate a JSON Pointer fragment (e.g., "#/components/schemas/Order").
///
/// Returns the value at the given JSON Pointer path within the document.
/// The fragment should start with '#'.
pub fn navigate_fragment<'a>(document: &'a Value, fragment: &str) -> Result<&'a Value, LoadError> {
    let path = fragment.trim_start_matches('#').trim_start_matches('/');
    if path.is_empty() {
        return Ok(document);
    }

    let mut current = document;
    for part in path.split('/') {
        // Unescape JSON Pointer encoding (~1 = /, ~0 = ~)
        let key = part.replace("~1", "/").replace("~0", "~");
        let next = match current {
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            other => other.get(&key),
        };
        current = next.ok_or_else(|| LoadError::UnresolvedReference {
            reference: fragment.to_string(),
        })?;
    }
    Ok(current)
}

/// Load a document from a file path or URL.
///
/// Automatically detects whether the source is a URL or file path.
/// URL loading requires the `remote` feature.
///
/// # Errors
///
/// Returns appropriate errors based on the source type.
pub fn load_document_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_document_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_document(Path::new(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    #[test]
    fn load_document_valid_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"openapi": "3.0.3"}}"#).unwrap();

        let doc = load_document(file.path()).unwrap();
        assert_eq!(doc["openapi"], "3.0.3");
    }

    #[test]
    fn load_document_yaml_file() {
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "openapi: 3.0.3\npaths:\n  /orders:\n    get:\n      responses:\n        200:\n          description: ok").unwrap();

        let doc = load_document(file.path()).unwrap();
        assert_eq!(doc["openapi"], "3.0.3");
        // Integer response codes become string keys
        assert_eq!(
            doc["paths"]["/orders"]["get"]["responses"]["200"]["description"],
            "ok"
        );
    }

    #[test]
    fn load_document_file_not_found() {
        let result = load_document(Path::new("/nonexistent/api.json"));
        assert!(matches!(result, Err(LoadError::FileNotFound { .. })));
    }

    #[test]
    fn load_document_str_invalid_json() {
        let result = load_document_str("{ not json");
        assert!(matches!(result, Err(LoadError::InvalidJson { .. })));
    }

    #[test]
    fn load_document_str_falls_back_to_yaml() {
        let doc = load_document_str("info:\n  title: Orders").unwrap();
        assert_eq!(doc["info"]["title"], "Orders");
    }

    #[test]
    fn is_url_detection() {
        assert!(is_url("https://example.com/openapi.json"));
        assert!(is_url("http://example.com/openapi.json"));
        assert!(!is_url("./openapi.json"));
    }

    #[test]
    fn navigate_fragment_unescapes_pointer() {
        let doc = json!({
            "paths": { "/orders/{id}": { "get": { "operationId": "getOrder" } } }
        });
        let op = navigate_fragment(&doc, "#/paths/~1orders~1{id}/get").unwrap();
        assert_eq!(op["operationId"], "getOrder");
    }

    #[test]
    fn navigate_fragment_into_arrays() {
        let doc = json!({ "servers": [{ "url": "https://api.example.com" }] });
        let server = navigate_fragment(&doc, "#/servers/0").unwrap();
        assert_eq!(server["url"], "https://api.example.com");
    }

    #[test]
    fn navigate_fragment_missing() {
        let doc = json!({ "components": {} });
        let result = navigate_fragment(&doc, "#/components/schemas/Order");
        assert!(matches!(
            result,
            Err(LoadError::UnresolvedReference { reference }) if reference == "#/components/schemas/Order"
        ));
    }

    #[test]
    fn load_document_auto_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"openapi": "3.1.0"}}"#).unwrap();

        let doc = load_document_auto(file.path().to_str().unwrap()).unwrap();
        assert_eq!(doc["openapi"], "3.1.0");
    }
}
