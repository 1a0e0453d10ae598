//! Hypermedia controls found in response bodies (`_links`) and headers
//! (`Link`).

use serde::Serialize;
use serde_json::{Map, Value};

/// Key of the hypermedia envelope in response bodies.
pub const LINKS_KEY: &str = "_links";

/// One control advertised by a response.
#[derive(Debug, Clone, PartialEq)]
pub enum HypermediaControl {
    /// A bare link name: `"cancel"`.
    Key(String),
    /// A link name with values bound by the server:
    /// `{ "relation": "cancel", "parameters": { "reason": "late" } }`.
    Bound {
        relation: String,
        parameters: Map<String, Value>,
    },
}

impl HypermediaControl {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(key) => Some(HypermediaControl::Key(key.clone())),
            Value::Object(object) => {
                let relation = object.get("relation").and_then(Value::as_str)?;
                Some(HypermediaControl::Bound {
                    relation: relation.to_string(),
                    parameters: object
                        .get("parameters")
                        .and_then(Value::as_object)
                        .cloned()
                        .unwrap_or_default(),
                })
            }
            _ => None,
        }
    }

    /// The link name this control refers to.
    pub fn relation(&self) -> &str {
        match self {
            HypermediaControl::Key(key) => key,
            HypermediaControl::Bound { relation, .. } => relation,
        }
    }

    /// Values bound by the server, if any.
    pub fn parameters(&self) -> Option<&Map<String, Value>> {
        match self {
            HypermediaControl::Key(_) => None,
            HypermediaControl::Bound { parameters, .. } => Some(parameters),
        }
    }
}

/// Controls listed in a body's `_links`.
///
/// The array form holds bare keys or `{relation, parameters}` objects. In the
/// object form each key is a link name and its value may carry `parameters`.
pub fn controls_of(body: &Value) -> Vec<HypermediaControl> {
    match body.get(LINKS_KEY) {
        Some(Value::Array(items)) => items.iter().filter_map(HypermediaControl::from_value).collect(),
        Some(Value::Object(entries)) => entries
            .iter()
            .map(|(key, entry)| match entry.get("parameters").and_then(Value::as_object) {
                Some(parameters) => HypermediaControl::Bound {
                    relation: key.clone(),
                    parameters: parameters.clone(),
                },
                None => HypermediaControl::Key(key.clone()),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// A header value reduced to `{value, relation, attributes}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedHeader {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    pub attributes: Vec<(String, String)>,
}

impl NormalizedHeader {
    /// Does this header advertise `key`? A `rel` token also matches the
    /// fragment of an IRI key (`rel="next"` for `…#next`).
    pub fn has_relation(&self, key: &str) -> bool {
        let Some(relation) = self.relation.as_deref() else {
            return false;
        };
        relation == key
            || key
                .rsplit_once('#')
                .map(|(_, fragment)| fragment == relation)
                .unwrap_or(false)
    }
}

/// Parse an RFC 8288 `Link` header:
/// `<https://…/orders?page=2>; rel="next", <…>; rel="prev"`.
///
/// Commas inside `<…>` do not split entries; `rel` becomes `relation`,
/// every other parameter is kept as an attribute with quotes stripped.
pub fn parse_link_header(header: &str) -> Vec<NormalizedHeader> {
    split_outside_brackets(header, ',')
        .into_iter()
        .filter_map(|entry| parse_link_entry(entry.trim()))
        .collect()
}

fn parse_link_entry(entry: &str) -> Option<NormalizedHeader> {
    if entry.is_empty() {
        return None;
    }
    let (value, params) = match entry.strip_prefix('<') {
        Some(rest) => {
            let end = rest.find('>')?;
            (&rest[..end], &rest[end + 1..])
        }
        None => entry.split_once(';').unwrap_or((entry, "")),
    };

    let mut link = NormalizedHeader {
        value: value.trim().to_string(),
        relation: None,
        operation_id: None,
        attributes: Vec::new(),
    };
    for param in params.split(';') {
        let param = param.trim();
        if param.is_empty() {
            continue;
        }
        let (name, raw) = param.split_once('=').unwrap_or((param, ""));
        let name = name.trim();
        let raw = raw.trim().trim_matches('"').to_string();
        match name {
            "rel" => link.relation = Some(raw),
            "operationId" => link.operation_id = Some(raw),
            _ => link.attributes.push((name.to_string(), raw)),
        }
    }
    Some(link)
}

fn split_outside_brackets(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            c if c == separator && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn controls_from_array_envelope() {
        let body = json!({
            "_links": ["cancel", { "relation": "pay", "parameters": { "amount": 10 } }, 42]
        });
        let controls = controls_of(&body);
        assert_eq!(controls.len(), 2);
        assert_eq!(controls[0], HypermediaControl::Key("cancel".into()));
        assert_eq!(controls[1].relation(), "pay");
        assert_eq!(controls[1].parameters().unwrap()["amount"], 10);
    }

    #[test]
    fn controls_from_object_envelope() {
        let body = json!({
            "_links": { "self": { "href": "/orders/1" }, "refund": { "parameters": { "reason": "late" } } }
        });
        let controls = controls_of(&body);
        assert_eq!(controls[0], HypermediaControl::Key("self".into()));
        assert_eq!(controls[1].parameters().unwrap()["reason"], "late");
    }

    #[test]
    fn no_envelope_no_controls() {
        assert!(controls_of(&json!({ "id": 1 })).is_empty());
        assert!(controls_of(&json!([1, 2])).is_empty());
    }

    #[test]
    fn link_header_entries() {
        let links = parse_link_header(
            r#"<https://api.example.com/orders?page=2&tags=a,b>; rel="next"; title="Next page", </orders?page=0>; rel=prev"#,
        );
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].value, "https://api.example.com/orders?page=2&tags=a,b");
        assert_eq!(links[0].relation.as_deref(), Some("next"));
        assert_eq!(links[0].attributes, vec![("title".to_string(), "Next page".to_string())]);
        assert_eq!(links[1].value, "/orders?page=0");
        assert_eq!(links[1].relation.as_deref(), Some("prev"));
    }

    #[test]
    fn relation_matches_iri_fragment() {
        let link = &parse_link_header(r#"</orders?page=2>; rel="next""#)[0];
        assert!(link.has_relation("next"));
        assert!(link.has_relation("http://example.com/vocab#next"));
        assert!(!link.has_relation("http://example.com/vocab#prev"));
    }
}
