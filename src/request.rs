//! Request Synthesizer: turns an [`OperationSchema`] and a value bag into a
//! concrete HTTP request, and reads parameter values back out of one.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::RequestError;
use crate::operation::OperationSchema;
use crate::types::{Method, ParameterDescriptor, ParameterLocation};

/// Everything but RFC 3986 unreserved characters.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// A request ready for a [`Transport`](crate::Transport).
///
/// `url` is relative to the API base URL unless it is absolute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// First header with this name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Build the request for an operation.
///
/// # Errors
///
/// Returns `RequestError::MissingRequiredParameters` when a required path,
/// query, header or body parameter has neither a value nor a default, and
/// `RequestError::UnsupportedMediaType` when the operation only accepts
/// non-JSON bodies.
pub fn build_request(schema: &OperationSchema, values: &Value) -> Result<HttpRequest, RequestError> {
    let missing: Vec<String> = schema
        .missing_parameters(values, true)
        .into_iter()
        .filter(|p| p.location != ParameterLocation::Cookie)
        .map(|p| p.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(RequestError::MissingRequiredParameters { names: missing });
    }

    let operation = schema.operation();
    if let Some(body) = &operation.request_body {
        if !body.content.is_empty() && !body.accepts_json() {
            return Err(RequestError::UnsupportedMediaType {
                media_type: body.media_type().unwrap_or_default().to_string(),
            });
        }
    }

    let mut url = operation.path.clone();
    for parameter in schema.parameters_in(ParameterLocation::Path) {
        if let Some(value) = schema.value_for(parameter, values) {
            let encoded = utf8_percent_encode(&scalar_to_string(&value), COMPONENT).to_string();
            url = url.replace(&format!("{{{}}}", parameter.name), &encoded);
        }
    }

    let mut query = Vec::new();
    for parameter in schema.parameters_in(ParameterLocation::Query) {
        let Some(value) = schema.value_for(parameter, values) else {
            continue;
        };
        let name = utf8_percent_encode(&parameter.name, COMPONENT).to_string();
        let repeated = match value {
            Value::Array(items) => items,
            single => vec![single],
        };
        for item in repeated {
            let text = scalar_to_string(&item);
            query.push(format!("{}={}", name, utf8_percent_encode(&text, COMPONENT)));
        }
    }
    if !query.is_empty() {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&query.join("&"));
    }

    let mut request = HttpRequest::new(operation.verb, url);
    for parameter in schema.parameters_in(ParameterLocation::Header) {
        if let Some(value) = schema.value_for(parameter, values) {
            request
                .headers
                .push((parameter.name.clone(), scalar_to_string(&value)));
        }
    }

    request.body = build_body(schema, values);
    if request.body.is_some() {
        let media = operation
            .request_body
            .as_ref()
            .and_then(|b| b.media_type())
            .unwrap_or("application/json");
        request
            .headers
            .push(("Content-Type".to_string(), media.to_string()));
    }
    Ok(request)
}

fn build_body(schema: &OperationSchema, values: &Value) -> Option<Value> {
    let body_schema = schema.request_body_schema()?;
    if body_schema.get("properties").is_none() {
        // Arrays and scalars can only be sent as their documented default
        return body_schema.get("default").cloned();
    }
    let body: Map<String, Value> = schema
        .parameters_in(ParameterLocation::Body)
        .filter_map(|p| schema.value_for(p, values).map(|v| (p.name.clone(), v)))
        .collect();
    Some(Value::Object(body))
}

/// Read path, query and header values back out of a built request, keyed by
/// parameter name and coerced to each parameter's schema type.
pub fn extract_parameters(schema: &OperationSchema, request: &HttpRequest) -> Map<String, Value> {
    let mut values = values_from_url(schema, &request.url);
    for parameter in schema.parameters_in(ParameterLocation::Header) {
        if let Some(raw) = request.header(&parameter.name) {
            values.insert(parameter.name.clone(), coerce(raw, &parameter.schema));
        }
    }
    values
}

/// Path and query parameter values found in a URL for this operation.
///
/// The URL may be absolute or carry a base path: placeholders are aligned
/// from the end of the path.
pub fn values_from_url(schema: &OperationSchema, url: &str) -> Map<String, Value> {
    let mut values = Map::new();
    let (path, query) = split_url(url);

    let template: Vec<&str> = schema
        .operation()
        .path
        .trim_matches('/')
        .split('/')
        .collect();
    let actual: Vec<&str> = path.trim_matches('/').split('/').collect();
    if actual.len() >= template.len() {
        let offset = actual.len() - template.len();
        for (segment, value) in template.iter().zip(&actual[offset..]) {
            let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
                continue;
            };
            let Some(parameter) = schema
                .parameters_in(ParameterLocation::Path)
                .find(|p| p.name == name)
            else {
                continue;
            };
            values.insert(name.to_string(), coerce(&decode(value), &parameter.schema));
        }
    }

    let pairs: Vec<(String, String)> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode(k), decode(v)),
            None => (decode(pair), String::new()),
        })
        .collect();
    for parameter in schema.parameters_in(ParameterLocation::Query) {
        let found: Vec<&str> = pairs
            .iter()
            .filter(|(k, _)| *k == parameter.name)
            .map(|(_, v)| v.as_str())
            .collect();
        if found.is_empty() {
            continue;
        }
        values.insert(parameter.name.clone(), coerce_many(&found, parameter));
    }
    values
}

/// Path (origin stripped) and query string of a URL.
pub(crate) fn split_url(url: &str) -> (&str, &str) {
    let (rest, query) = url.split_once('?').unwrap_or((url, ""));
    let path = match rest.split_once("://") {
        Some((_, after_scheme)) => after_scheme
            .find('/')
            .map(|i| &after_scheme[i..])
            .unwrap_or("/"),
        None => rest,
    };
    (path, query)
}

fn decode(s: &str) -> String {
    percent_decode_str(&s.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

fn coerce_many(raw: &[&str], parameter: &ParameterDescriptor) -> Value {
    let is_array = parameter.schema.get("type").and_then(Value::as_str) == Some("array");
    if is_array {
        let items = parameter.schema.get("items").unwrap_or(&Value::Null);
        Value::Array(raw.iter().map(|r| coerce(r, items)).collect())
    } else {
        coerce(raw[0], &parameter.schema)
    }
}

/// Interpret a raw string according to a schema's `type`; anything that
/// does not parse stays a string.
fn coerce(raw: &str, schema: &Value) -> Value {
    let parsed = match schema.get("type").and_then(Value::as_str) {
        Some("integer") => raw.parse::<i64>().ok().map(Value::from),
        Some("number") => raw
            .parse::<i64>()
            .map(Value::from)
            .ok()
            .or_else(|| raw.parse::<f64>().ok().map(Value::from)),
        Some("boolean") => raw.parse::<bool>().ok().map(Value::Bool),
        _ => None,
    };
    parsed.unwrap_or_else(|| Value::String(raw.to_string()))
}

/// Text form of a parameter value: strings unquoted, everything else as JSON.
pub(crate) fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
