//! Document expansion - turns an annotated OpenAPI document into a
//! reference-free tree where every meaningful node carries its semantics.
//!
//! Three things happen in one recursive walk:
//!
//! - local `$ref` pointers are replaced by the expansion of their target
//! - `allOf` compositions are merged into a single schema
//! - entries of `parameters` and `properties` maps that lack `@id`/`@type`
//!   are back-filled from the [`SemanticIndex`] using their key
//!
//! `oneOf` branches are expanded in place and keep their own semantics.

use serde_json::{Map, Value};

use crate::context::SemanticIndex;
use crate::error::LoadError;
use crate::loader::navigate_fragment;

/// Expand a whole document.
///
/// # Errors
///
/// Returns `LoadError::UnsupportedReference` for references outside the
/// document, `LoadError::UnresolvedReference` for pointers to nothing, and
/// `LoadError::CyclicReference` when a reference re-enters a node that is
/// still being expanded.
pub fn expand_document(document: &Value, index: &SemanticIndex) -> Result<Value, LoadError> {
    DocumentExpander::new(document, index).expand(document)
}

/// Merge two schemas, `base` extended by `extension`.
///
/// - an empty side yields the other side
/// - two object schemas union their `properties` (the base wins on key
///   collisions), concatenate `required` and union `@id`/`@type`
/// - two array schemas get `items: { allOf: [base.items, extension.items] }`,
///   left for the expander to merge
/// - schemas of different kinds keep `base` unchanged
pub fn merge_schemas(base: &Value, extension: &Value) -> Value {
    if is_empty_schema(base) {
        return extension.clone();
    }
    if is_empty_schema(extension) {
        return base.clone();
    }

    match (base, extension) {
        (Value::Object(b), Value::Object(e)) => match (schema_kind(b), schema_kind(e)) {
            (Some("object"), Some("object")) => Value::Object(merge_object_schemas(b, e)),
            (Some("array"), Some("array")) => Value::Object(merge_array_schemas(b, e)),
            _ => base.clone(),
        },
        _ => base.clone(),
    }
}

struct DocumentExpander<'a> {
    document: &'a Value,
    index: &'a SemanticIndex,
    /// References currently being expanded, outermost first.
    chain: Vec<String>,
}

impl<'a> DocumentExpander<'a> {
    fn new(document: &'a Value, index: &'a SemanticIndex) -> Self {
        Self {
            document,
            index,
            chain: Vec::new(),
        }
    }

    fn expand(&mut self, value: &Value) -> Result<Value, LoadError> {
        match value {
            Value::Object(map) => self.expand_object(map),
            Value::Array(items) => items
                .iter()
                .map(|item| self.expand(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            // Primitives pass through unchanged
            other => Ok(other.clone()),
        }
    }

    fn expand_object(&mut self, map: &Map<String, Value>) -> Result<Value, LoadError> {
        if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
            return self.expand_reference(reference);
        }
        if let Some(members) = map.get("allOf").and_then(Value::as_array) {
            return self.expand_all_of(map, members);
        }

        let mut result = Map::new();
        for (key, value) in map {
            let expanded = self.expand(value)?;
            let expanded = match key.as_str() {
                "parameters" | "properties" => self.with_semantics_entries(expanded),
                _ => expanded,
            };
            result.insert(key.clone(), expanded);
        }
        Ok(Value::Object(result))
    }

    fn expand_reference(&mut self, reference: &str) -> Result<Value, LoadError> {
        if !reference.starts_with('#') {
            return Err(LoadError::UnsupportedReference {
                reference: reference.to_string(),
            });
        }
        if self.chain.iter().any(|r| r == reference) {
            let mut chain = self.chain.clone();
            chain.push(reference.to_string());
            return Err(LoadError::CyclicReference {
                reference: reference.to_string(),
                chain,
            });
        }

        let mut target = navigate_fragment(self.document, reference)?.clone();

        // A referenced definition is named by its last pointer segment
        if let Value::Object(obj) = &mut target {
            if !obj.contains_key("@id") {
                let name = last_segment(reference);
                if let Some(id) = self.index.identifier(&name) {
                    obj.insert("@id".to_string(), Value::String(id.to_string()));
                }
            }
        }

        self.chain.push(reference.to_string());
        let expanded = self.expand(&target);
        self.chain.pop();
        expanded
    }

    fn expand_all_of(
        &mut self,
        node: &Map<String, Value>,
        members: &[Value],
    ) -> Result<Value, LoadError> {
        let mut merged = Value::Object(Map::new());
        for member in members {
            let expanded = self.expand(member)?;
            merged = merge_schemas(&merged, &expanded);
        }

        // Array merges defer their items to a nested allOf
        if merged.get("items").and_then(|i| i.get("allOf")).is_some() {
            merged = self.expand(&merged)?;
        }

        let Value::Object(mut merged) = merged else {
            return Ok(merged);
        };
        for keyword in ["@id", "@type", "description"] {
            if let Some(own) = node.get(keyword) {
                merged.insert(keyword.to_string(), own.clone());
            }
        }
        Ok(Value::Object(merged))
    }

    /// Back-fill semantics on every entry of a `parameters` list (keyed by
    /// `name`) or `properties` map (keyed by property name).
    fn with_semantics_entries(&self, value: Value) -> Value {
        match value {
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| {
                        let name = item.get("name").and_then(Value::as_str).map(String::from);
                        match name {
                            Some(name) => self.with_semantics(&name, item),
                            None => item,
                        }
                    })
                    .collect(),
            ),
            Value::Object(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(key, entry)| {
                        let entry = self.with_semantics(&key, entry);
                        (key, entry)
                    })
                    .collect(),
            ),
            other => other,
        }
    }

    fn with_semantics(&self, key: &str, value: Value) -> Value {
        let Value::Object(mut map) = value else {
            return value;
        };
        if !map.contains_key("@id") {
            if let Some(id) = self.index.identifier(key) {
                map.insert("@id".to_string(), Value::String(id.to_string()));
            }
        }
        if !map.contains_key("@type") {
            if let Some(t) = self.index.semantic_type(key) {
                map.insert("@type".to_string(), Value::String(t.to_string()));
            }
        }
        Value::Object(map)
    }
}

fn last_segment(reference: &str) -> String {
    reference
        .rsplit('/')
        .next()
        .unwrap_or("")
        .replace("~1", "/")
        .replace("~0", "~")
}

fn is_empty_schema(schema: &Value) -> bool {
    schema.as_object().map(Map::is_empty).unwrap_or(true)
}

/// `type` of a schema, inferred from `properties`/`items` when absent.
fn schema_kind(schema: &Map<String, Value>) -> Option<&str> {
    let declared = match schema.get("type") {
        Some(Value::String(t)) => Some(t.as_str()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null"),
        _ => None,
    };
    declared.or_else(|| {
        if schema.contains_key("properties") {
            Some("object")
        } else if schema.contains_key("items") {
            Some("array")
        } else {
            None
        }
    })
}

fn merge_object_schemas(base: &Map<String, Value>, extension: &Map<String, Value>) -> Map<String, Value> {
    let mut result = base.clone();

    // Keywords only the extension declares
    for (key, value) in extension {
        if !matches!(key.as_str(), "properties" | "required" | "@id" | "@type") {
            result.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    let mut properties = base
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    if let Some(extra) = extension.get("properties").and_then(Value::as_object) {
        for (name, schema) in extra {
            properties.entry(name.clone()).or_insert_with(|| schema.clone());
        }
    }
    if !properties.is_empty() {
        result.insert("properties".to_string(), Value::Object(properties));
    }

    let mut required: Vec<Value> = Vec::new();
    for side in [base, extension] {
        for name in side.get("required").and_then(Value::as_array).into_iter().flatten() {
            if !required.contains(name) {
                required.push(name.clone());
            }
        }
    }
    if !required.is_empty() {
        result.insert("required".to_string(), Value::Array(required));
    }

    for keyword in ["@id", "@type"] {
        match union_semantics(base.get(keyword), extension.get(keyword)) {
            Some(value) => {
                result.insert(keyword.to_string(), value);
            }
            None => {
                result.remove(keyword);
            }
        }
    }

    result
}

fn merge_array_schemas(base: &Map<String, Value>, extension: &Map<String, Value>) -> Map<String, Value> {
    let mut result = base.clone();
    let items = match (base.get("items"), extension.get("items")) {
        (Some(b), Some(e)) => serde_json::json!({ "allOf": [b, e] }),
        (Some(b), None) => b.clone(),
        (None, Some(e)) => e.clone(),
        (None, None) => return result,
    };
    result.insert("items".to_string(), items);
    result
}

/// Union of two `@id`/`@type` values: one string when a single value
/// remains, an array when several do.
fn union_semantics(a: Option<&Value>, b: Option<&Value>) -> Option<Value> {
    let mut values: Vec<String> = Vec::new();
    for side in [a, b].into_iter().flatten() {
        let found: Vec<&str> = match side {
            Value::String(s) => vec![s.as_str()],
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        for s in found {
            if !values.iter().any(|v| v == s) {
                values.push(s.to_string());
            }
        }
    }
    match values.len() {
        0 => None,
        1 => values.pop().map(Value::String),
        _ => Some(Value::Array(values.into_iter().map(Value::String).collect())),
    }
}
