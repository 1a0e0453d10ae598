//! Core types: operation, parameter, response and link descriptors read off
//! the expanded document, plus semantic matching helpers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keyword marking a nested object or link as belonging to its parent.
pub const AFFILIATION: &str = "x-affiliation";

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

/// Semantic values of a JSON-LD keyword (`@id`, `@type`, `@relation`).
///
/// The keyword may hold a single string or an array of strings.
pub fn semantics_of(value: &Value, keyword: &str) -> Vec<String> {
    match value.get(keyword) {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

fn schema_has(schema: &Value, keyword: &str, key: &str) -> bool {
    let direct = semantics_of(schema, keyword).iter().any(|s| s == key);
    direct
        || schema
            .get("oneOf")
            .and_then(Value::as_array)
            .map(|branches| {
                branches
                    .iter()
                    .any(|b| semantics_of(b, keyword).iter().any(|s| s == key))
            })
            .unwrap_or(false)
}

/// True when the schema (or one of its `oneOf` branches) has `key` as `@id`.
pub fn schema_has_semantic_id(schema: &Value, key: &str) -> bool {
    schema_has(schema, "@id", key)
}

/// True when the schema (or one of its `oneOf` branches) has `key` as `@type`.
pub fn schema_has_semantic_type(schema: &Value, key: &str) -> bool {
    schema_has(schema, "@type", key)
}

/// True when `key` is either the semantic id or the semantic type of the schema.
pub fn schema_matches(schema: &Value, key: &str) -> bool {
    schema_has_semantic_id(schema, key) || schema_has_semantic_type(schema, key)
}

/// Pick the media type to use from an OpenAPI `content` map:
/// `application/json`, then any `+json` type, then the first entry.
pub fn select_media(content: &Map<String, Value>) -> Option<(&String, &Value)> {
    content
        .get_key_value("application/json")
        .or_else(|| content.iter().find(|(media, _)| is_json_media(media)))
        .or_else(|| content.iter().next())
}

/// True for `application/json` and structured-syntax `+json` types.
pub fn is_json_media(media: &str) -> bool {
    let essence = media.split(';').next().unwrap_or("").trim();
    essence.eq_ignore_ascii_case("application/json") || essence.ends_with("+json")
}

/// HTTP method of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl Method {
    /// Parse a path-item key (case-insensitive). Returns `None` for
    /// non-verb keys such as `parameters` or `summary`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Some(Method::Get),
            "put" => Some(Method::Put),
            "post" => Some(Method::Post),
            "delete" => Some(Method::Delete),
            "options" => Some(Method::Options),
            "head" => Some(Method::Head),
            "patch" => Some(Method::Patch),
            "trace" => Some(Method::Trace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Head => "HEAD",
            Method::Patch => "PATCH",
            Method::Trace => "TRACE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a parameter travels. `Body` marks request-body properties projected
/// as parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
    Body,
}

impl ParameterLocation {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "path" => Some(ParameterLocation::Path),
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            "cookie" => Some(ParameterLocation::Cookie),
            "body" => Some(ParameterLocation::Body),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
            ParameterLocation::Body => "body",
        }
    }
}

/// One operation parameter, or one request-body property seen as a parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Value,
    pub semantics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterDescriptor {
    /// Read an OpenAPI parameter object. Returns `None` when `name` or `in`
    /// is missing or unknown.
    pub fn from_value(value: &Value) -> Option<Self> {
        let name = value.get("name")?.as_str()?.to_string();
        let location = ParameterLocation::parse(value.get("in")?.as_str()?)?;
        let schema = value.get("schema").cloned().unwrap_or(Value::Null);
        let mut semantics = semantics_of(value, "@id");
        if semantics.is_empty() {
            semantics = semantics_of(&schema, "@id");
        }
        Some(Self {
            required: value
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            description: value
                .get("description")
                .and_then(Value::as_str)
                .map(String::from),
            name,
            location,
            schema,
            semantics,
        })
    }

    /// Project a request-body property as a `Body` parameter.
    pub fn from_body_property(name: &str, schema: &Value, required: bool) -> Self {
        Self {
            name: name.to_string(),
            location: ParameterLocation::Body,
            required,
            schema: schema.clone(),
            semantics: semantics_of(schema, "@id"),
            description: schema
                .get("description")
                .and_then(Value::as_str)
                .map(String::from),
        }
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.schema.get("default")
    }

    /// Set the schema default, creating the schema object when absent.
    pub fn set_default(&mut self, value: Value) {
        if !self.schema.is_object() {
            self.schema = Value::Object(Map::new());
        }
        if let Value::Object(schema) = &mut self.schema {
            schema.insert("default".to_string(), value);
        }
    }

    /// True when any of the parameter's semantic ids is in `ids`.
    pub fn accepts_any(&self, ids: &[String]) -> bool {
        self.semantics.iter().any(|s| ids.contains(s))
    }
}

/// A request body: media type → schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBodyDescriptor {
    pub required: bool,
    pub content: Map<String, Value>,
}

impl RequestBodyDescriptor {
    pub fn from_value(value: &Value) -> Self {
        Self {
            required: value
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            content: media_schemas(value),
        }
    }

    /// Media type the body would be sent as.
    pub fn media_type(&self) -> Option<&str> {
        select_media(&self.content).map(|(media, _)| media.as_str())
    }

    pub fn schema(&self) -> Option<&Value> {
        select_media(&self.content).map(|(_, schema)| schema)
    }

    /// Replace the schema of the selected media type.
    pub fn set_schema(&mut self, schema: Value) {
        let Some(media) = self.media_type().map(String::from) else {
            return;
        };
        self.content.insert(media, schema);
    }

    pub fn schema_mut(&mut self) -> Option<&mut Value> {
        let media = self.media_type()?.to_string();
        self.content.get_mut(&media)
    }

    pub fn accepts_json(&self) -> bool {
        self.content.keys().any(|media| is_json_media(media))
    }
}

/// `content` of a request body or response flattened to media type → schema.
fn media_schemas(value: &Value) -> Map<String, Value> {
    value
        .get("content")
        .and_then(Value::as_object)
        .map(|content| {
            content
                .iter()
                .map(|(media, object)| {
                    let schema = object.get("schema").cloned().unwrap_or(Value::Null);
                    (media.clone(), schema)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// A documented response header.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderDescriptor {
    pub semantics: Vec<String>,
    pub operation_id: Option<String>,
    pub schema: Option<Value>,
}

impl HeaderDescriptor {
    pub fn from_value(value: &Value) -> Self {
        Self {
            semantics: semantics_of(value, "@id"),
            operation_id: value
                .get("operationId")
                .and_then(Value::as_str)
                .map(String::from),
            schema: value.get("schema").cloned(),
        }
    }
}

/// A documented response link (OpenAPI Link Object plus semantic keywords).
#[derive(Debug, Clone, PartialEq)]
pub struct LinkDescriptor {
    pub operation_id: Option<String>,
    pub operation_ref: Option<String>,
    pub relation: Vec<String>,
    pub affiliation: Option<String>,
    /// Parameter name → runtime expression or constant.
    pub parameters: Map<String, Value>,
    pub request_body: Option<Value>,
}

impl LinkDescriptor {
    pub fn from_value(value: &Value) -> Self {
        let string = |key: &str| value.get(key).and_then(Value::as_str).map(String::from);
        Self {
            operation_id: string("operationId"),
            operation_ref: string("operationRef"),
            relation: semantics_of(value, "@relation"),
            affiliation: string(AFFILIATION),
            parameters: value
                .get("parameters")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            request_body: value.get("requestBody").cloned(),
        }
    }

    pub fn has_relation(&self, key: &str) -> bool {
        self.relation.iter().any(|r| r == key)
    }

    pub fn is_parent_affiliated(&self) -> bool {
        self.affiliation.as_deref() == Some("parent")
    }
}

/// A documented response: body schemas, headers and links.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseDescriptor {
    pub content: Map<String, Value>,
    pub headers: Vec<(String, HeaderDescriptor)>,
    pub links: Vec<(String, LinkDescriptor)>,
}

impl ResponseDescriptor {
    pub fn from_value(value: &Value) -> Self {
        let headers = value
            .get("headers")
            .and_then(Value::as_object)
            .map(|headers| {
                headers
                    .iter()
                    .map(|(name, h)| (name.clone(), HeaderDescriptor::from_value(h)))
                    .collect()
            })
            .unwrap_or_default();
        let links = value
            .get("links")
            .and_then(Value::as_object)
            .map(|links| {
                links
                    .iter()
                    .map(|(name, l)| (name.clone(), LinkDescriptor::from_value(l)))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            content: media_schemas(value),
            headers,
            links,
        }
    }

    /// Body schema of the preferred media type.
    pub fn body_schema(&self) -> Option<&Value> {
        select_media(&self.content)
            .map(|(_, schema)| schema)
            .filter(|schema| !schema.is_null())
    }

    /// Body schema for a `content-type` value, falling back to the preferred
    /// media type.
    pub fn schema_for_content_type(&self, content_type: Option<&str>) -> Option<&Value> {
        let exact = content_type
            .map(|ct| ct.split(';').next().unwrap_or("").trim())
            .and_then(|media| self.content.get(media))
            .filter(|schema| !schema.is_null());
        exact.or_else(|| self.body_schema())
    }

    /// Header documentation, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&HeaderDescriptor> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, h)| h)
    }

    pub fn link(&self, name: &str) -> Option<&LinkDescriptor> {
        self.links.iter().find(|(key, _)| key == name).map(|(_, l)| l)
    }
}

/// One operation of the expanded document, merged with its path-level
/// parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    pub verb: Method,
    /// Raw, unfilled path template (`/orders/{id}`).
    pub path: String,
    pub operation_id: Option<String>,
    pub semantics: Vec<String>,
    pub summary: Option<String>,
    pub parameters: Vec<ParameterDescriptor>,
    pub request_body: Option<RequestBodyDescriptor>,
    pub responses: Vec<(String, ResponseDescriptor)>,
    /// The operation declares a `security` field, even an empty one.
    pub has_security: bool,
    /// `has_security` and the caller was not authenticated when matched.
    pub security_required: bool,
}

impl OperationDescriptor {
    /// Build a descriptor from a path item and one of its operations.
    ///
    /// Path-level parameters come first, operation-level ones are appended
    /// after them without de-duplication.
    pub fn from_parts(
        verb: Method,
        path: &str,
        path_item: &Value,
        operation: &Value,
        authenticated: bool,
    ) -> Self {
        let parameters = path_item
            .get("parameters")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .chain(
                operation
                    .get("parameters")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten(),
            )
            .filter_map(ParameterDescriptor::from_value)
            .collect();

        let responses = operation
            .get("responses")
            .and_then(Value::as_object)
            .map(|responses| {
                responses
                    .iter()
                    .map(|(status, r)| (status.clone(), ResponseDescriptor::from_value(r)))
                    .collect()
            })
            .unwrap_or_default();

        let has_security = operation.get("security").is_some();

        Self {
            verb,
            path: path.to_string(),
            operation_id: operation
                .get("operationId")
                .and_then(Value::as_str)
                .map(String::from),
            semantics: semantics_of(operation, "@id"),
            summary: operation
                .get("summary")
                .and_then(Value::as_str)
                .map(String::from),
            parameters,
            request_body: operation
                .get("requestBody")
                .map(RequestBodyDescriptor::from_value),
            responses,
            has_security,
            security_required: has_security && !authenticated,
        }
    }

    /// True when `identifier` is the operation id or one of its semantic ids.
    pub fn is_identified_by(&self, identifier: &str) -> bool {
        self.operation_id.as_deref() == Some(identifier)
            || self.semantics.iter().any(|s| s == identifier)
    }

    /// Response documented for a status: exact code, then `NXX`, then `default`.
    pub fn response(&self, status: u16) -> Option<&ResponseDescriptor> {
        let exact = status.to_string();
        let range = format!("{}XX", status / 100);
        self.find_response(|code| code == exact)
            .or_else(|| self.find_response(|code| code.eq_ignore_ascii_case(&range)))
            .or_else(|| self.find_response(|code| code == "default"))
    }

    /// The success response: `200`, then `201`, then any other 2xx.
    pub fn primary_response(&self) -> Option<&ResponseDescriptor> {
        self.find_response(|code| code == "200")
            .or_else(|| self.find_response(|code| code == "201"))
            .or_else(|| self.find_response(|code| code.starts_with('2')))
    }

    pub fn response_body_schema(&self) -> Option<&Value> {
        self.primary_response().and_then(ResponseDescriptor::body_schema)
    }

    pub fn request_body_schema(&self) -> Option<&Value> {
        self.request_body
            .as_ref()
            .and_then(RequestBodyDescriptor::schema)
            .filter(|schema| !schema.is_null())
    }

    fn find_response(&self, predicate: impl Fn(&str) -> bool) -> Option<&ResponseDescriptor> {
        self.responses
            .iter()
            .find(|(code, _)| predicate(code))
            .map(|(_, r)| r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_parse_and_display() {
        assert_eq!(Method::parse("get"), Some(Method::Get));
        assert_eq!(Method::parse("PATCH"), Some(Method::Patch));
        assert_eq!(Method::parse("parameters"), None);
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[test]
    fn semantics_of_string_and_array() {
        let value = json!({ "@id": "a", "@type": ["b", "c", 3] });
        assert_eq!(semantics_of(&value, "@id"), vec!["a"]);
        assert_eq!(semantics_of(&value, "@type"), vec!["b", "c"]);
        assert!(semantics_of(&value, "@relation").is_empty());
    }

    #[test]
    fn schema_matches_one_of_branches() {
        let schema = json!({
            "oneOf": [
                { "@id": "Order" },
                { "@id": "Invoice", "@type": "Document" }
            ]
        });
        assert!(schema_has_semantic_id(&schema, "Invoice"));
        assert!(schema_has_semantic_type(&schema, "Document"));
        assert!(schema_matches(&schema, "Order"));
        assert!(!schema_matches(&schema, "Customer"));
    }

    #[test]
    fn select_media_prefers_json() {
        let content = json!({
            "text/plain": { "type": "string" },
            "application/hal+json": { "type": "object" }
        });
        let content = content.as_object().unwrap();
        let (media, _) = select_media(content).unwrap();
        assert_eq!(media, "application/hal+json");

        let content = json!({ "text/csv": {}, "application/xml": {} });
        let (media, _) = select_media(content.as_object().unwrap()).unwrap();
        assert_eq!(media, "text/csv");
    }

    #[test]
    fn parameter_semantics_fall_back_to_schema() {
        let param = ParameterDescriptor::from_value(&json!({
            "name": "id",
            "in": "path",
            "required": true,
            "schema": { "type": "string", "@id": "http://schema.org/identifier" }
        }))
        .unwrap();
        assert_eq!(param.location, ParameterLocation::Path);
        assert_eq!(param.semantics, vec!["http://schema.org/identifier"]);
        assert!(param.required);
    }

    #[test]
    fn parameter_without_location_is_skipped() {
        assert!(ParameterDescriptor::from_value(&json!({ "name": "id" })).is_none());
    }

    #[test]
    fn set_default_creates_schema() {
        let mut param = ParameterDescriptor::from_value(&json!({ "name": "q", "in": "query" })).unwrap();
        param.set_default(json!("shoes"));
        assert_eq!(param.default_value(), Some(&json!("shoes")));
    }

    #[test]
    fn operation_merges_path_parameters_first() {
        let path_item = json!({
            "parameters": [{ "name": "id", "in": "path", "required": true }]
        });
        let operation = json!({
            "operationId": "getOrder",
            "parameters": [{ "name": "id", "in": "query" }],
            "responses": {}
        });
        let op = OperationDescriptor::from_parts(Method::Get, "/orders/{id}", &path_item, &operation, false);
        let locations: Vec<_> = op.parameters.iter().map(|p| p.location).collect();
        // Same name twice: no de-duplication
        assert_eq!(locations, vec![ParameterLocation::Path, ParameterLocation::Query]);
    }

    #[test]
    fn operation_security_requirement() {
        let op = json!({ "security": [{ "bearer": [] }], "responses": {} });
        let anonymous = OperationDescriptor::from_parts(Method::Get, "/me", &json!({}), &op, false);
        assert!(anonymous.security_required);
        let authenticated = OperationDescriptor::from_parts(Method::Get, "/me", &json!({}), &op, true);
        assert!(authenticated.has_security);
        assert!(!authenticated.security_required);

        // An empty list still counts as declared
        let empty = json!({ "security": [], "responses": {} });
        let op = OperationDescriptor::from_parts(Method::Get, "/ping", &json!({}), &empty, false);
        assert!(op.security_required);

        let open = json!({ "responses": {} });
        let op = OperationDescriptor::from_parts(Method::Get, "/ping", &json!({}), &open, false);
        assert!(!op.has_security);
        assert!(!op.security_required);
    }

    #[test]
    fn response_lookup_by_status() {
        let op = json!({
            "responses": {
                "201": { "description": "created" },
                "4XX": { "description": "client error", "content": { "application/json": { "schema": { "@id": "Problem" } } } },
                "default": { "description": "other" }
            }
        });
        let op = OperationDescriptor::from_parts(Method::Post, "/orders", &json!({}), &op, false);
        assert!(op.response(201).is_some());
        assert_eq!(op.response(404).and_then(|r| r.body_schema()), Some(&json!({ "@id": "Problem" })));
        assert!(op.response(500).is_some());
        assert!(op.primary_response().is_some());
    }

    #[test]
    fn link_descriptor_reads_semantic_keywords() {
        let link = LinkDescriptor::from_value(&json!({
            "operationId": "cancelOrder",
            "@relation": "http://example.com/vocab#cancel",
            "x-affiliation": "parent",
            "parameters": { "id": "$response.body#/id" }
        }));
        assert!(link.has_relation("http://example.com/vocab#cancel"));
        assert!(link.is_parent_affiliated());
        assert_eq!(link.parameters["id"], "$response.body#/id");
    }
}
