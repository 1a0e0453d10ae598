//! Semantic lookups inside response schemas.
//!
//! A property whose schema carries `x-affiliation: parent` lends its own
//! properties to its parent, so `{ "address": { "x-affiliation": "parent",
//! "properties": { "city": … } } }` makes `city` addressable from the outer
//! object through the path `["address", "city"]`.

use serde_json::Value;

use crate::types::{schema_matches, AFFILIATION};

/// One property reachable from a schema, with the path leading to it.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatProperty<'a> {
    pub path: Vec<String>,
    pub schema: &'a Value,
}

impl FlatProperty<'_> {
    /// The top-level property the path starts from.
    pub fn root(&self) -> &str {
        self.path.first().map(String::as_str).unwrap_or("")
    }
}

pub fn is_parent_affiliated(schema: &Value) -> bool {
    schema.get(AFFILIATION).and_then(Value::as_str) == Some("parent")
}

/// Every property of `schema`, parent-affiliated children included,
/// shallowest first.
pub fn flatten_properties(schema: &Value) -> Vec<FlatProperty<'_>> {
    let mut flat = Vec::new();
    flatten_into(schema, &[], &mut flat);
    // Stable: document order within a depth
    flat.sort_by_key(|p| p.path.len());
    flat
}

fn flatten_into<'a>(schema: &'a Value, prefix: &[String], out: &mut Vec<FlatProperty<'a>>) {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return;
    };
    for (name, property) in properties {
        let mut path = prefix.to_vec();
        path.push(name.clone());
        if is_parent_affiliated(property) {
            flatten_into(property, &path, out);
        }
        out.push(FlatProperty {
            path,
            schema: property,
        });
    }
}

/// Find the property whose `@id` or `@type` is `key`.
///
/// Looks through the schema's own (flattened) properties, then its `oneOf`
/// branches, then the `items` of an array schema.
pub fn find_property<'a>(schema: &'a Value, key: &str) -> Option<FlatProperty<'a>> {
    if let Some(found) = flatten_properties(schema)
        .into_iter()
        .find(|p| schema_matches(p.schema, key))
    {
        return Some(found);
    }
    if let Some(branches) = schema.get("oneOf").and_then(Value::as_array) {
        if let Some(found) = branches.iter().find_map(|b| find_property(b, key)) {
            return Some(found);
        }
    }
    schema.get("items").and_then(|items| find_property(items, key))
}

/// Value at `path` inside `data`; `null` counts as absent.
pub fn value_at<'a>(data: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = data;
    for segment in path {
        current = current.get(segment.as_str())?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "@id": "identifier" },
                "delivery": {
                    "type": "object",
                    "x-affiliation": "parent",
                    "properties": {
                        "city": { "type": "string", "@id": "addressLocality" },
                        "geo": {
                            "type": "object",
                            "x-affiliation": "parent",
                            "properties": { "lat": { "type": "number", "@id": "latitude" } }
                        }
                    }
                },
                "customer": {
                    "type": "object",
                    "@type": "Person",
                    "properties": { "name": { "type": "string", "@id": "name" } }
                }
            }
        })
    }

    #[test]
    fn flattening_lifts_parent_affiliated_children() {
        let schema = order_schema();
        let paths: Vec<Vec<String>> = flatten_properties(&schema).into_iter().map(|p| p.path).collect();
        assert!(paths.contains(&vec!["delivery".to_string(), "city".to_string()]));
        assert!(paths.contains(&vec!["delivery".to_string(), "geo".to_string(), "lat".to_string()]));
        // Non-affiliated objects keep their children to themselves
        assert!(!paths.contains(&vec!["customer".to_string(), "name".to_string()]));
    }

    #[test]
    fn find_property_by_id_and_type() {
        let schema = order_schema();
        let city = find_property(&schema, "addressLocality").unwrap();
        assert_eq!(city.path, vec!["delivery", "city"]);
        assert_eq!(city.root(), "delivery");

        let customer = find_property(&schema, "Person").unwrap();
        assert_eq!(customer.path, vec!["customer"]);
        assert!(find_property(&schema, "name").is_none());
    }

    #[test]
    fn find_property_in_branches_and_items() {
        let schema = json!({
            "type": "array",
            "items": {
                "oneOf": [
                    { "properties": { "a": { "@id": "A" } } },
                    { "properties": { "b": { "@id": "B" } } }
                ]
            }
        });
        assert_eq!(find_property(&schema, "B").unwrap().path, vec!["b"]);
    }

    #[test]
    fn value_at_treats_null_as_missing() {
        let data = json!({ "delivery": { "city": "Lyon", "zip": null } });
        let city = vec!["delivery".to_string(), "city".to_string()];
        let zip = vec!["delivery".to_string(), "zip".to_string()];
        assert_eq!(value_at(&data, &city), Some(&json!("Lyon")));
        assert_eq!(value_at(&data, &zip), None);
    }
}
