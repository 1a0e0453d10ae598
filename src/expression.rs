//! OpenAPI runtime expressions (`$response.body#/id`, `$statusCode`, …)
//! evaluated against the response a link was found on.

use serde_json::Value;

use crate::transport::HttpResponse;

/// A parsed runtime expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeExpression {
    Url,
    Method,
    StatusCode,
    ResponseHeader(String),
    /// `$response.body`, optionally followed by `#<json-pointer>`.
    ResponseBody(Option<String>),
    ResponseQuery(String),
    ResponsePath(String),
    Request(String),
    Unknown(String),
}

impl RuntimeExpression {
    /// Parse an expression. Returns `None` for strings that do not start
    /// with `$`; those are constants, not expressions.
    pub fn parse(expression: &str) -> Option<Self> {
        if !expression.starts_with('$') {
            return None;
        }
        let parsed = match expression {
            "$url" => RuntimeExpression::Url,
            "$method" => RuntimeExpression::Method,
            "$statusCode" => RuntimeExpression::StatusCode,
            "$response.body" => RuntimeExpression::ResponseBody(None),
            other => {
                if let Some(pointer) = other.strip_prefix("$response.body#") {
                    RuntimeExpression::ResponseBody(Some(pointer.to_string()))
                } else if let Some(name) = other.strip_prefix("$response.header.") {
                    RuntimeExpression::ResponseHeader(name.to_string())
                } else if let Some(name) = other.strip_prefix("$response.query.") {
                    RuntimeExpression::ResponseQuery(name.to_string())
                } else if let Some(name) = other.strip_prefix("$response.path.") {
                    RuntimeExpression::ResponsePath(name.to_string())
                } else if let Some(rest) = other.strip_prefix("$request.") {
                    RuntimeExpression::Request(rest.to_string())
                } else {
                    RuntimeExpression::Unknown(other.to_string())
                }
            }
        };
        Some(parsed)
    }

    /// Value of the expression for `response`. Unsupported and unknown
    /// expressions have no value.
    pub fn evaluate(&self, response: &HttpResponse) -> Option<Value> {
        match self {
            RuntimeExpression::Url => Some(Value::String(response.url.clone())),
            RuntimeExpression::Method => Some(Value::String(response.method.as_str().to_string())),
            RuntimeExpression::StatusCode => Some(Value::from(response.status)),
            RuntimeExpression::ResponseHeader(name) => response
                .header(name)
                .map(|value| Value::String(value.to_string())),
            RuntimeExpression::ResponseBody(pointer) => {
                if response.body.is_array() {
                    return None;
                }
                let found = match pointer.as_deref() {
                    None | Some("") => Some(&response.body),
                    Some(pointer) => response.body.pointer(pointer),
                };
                found.filter(|v| !v.is_null()).cloned()
            }
            RuntimeExpression::ResponseQuery(_)
            | RuntimeExpression::ResponsePath(_)
            | RuntimeExpression::Request(_)
            | RuntimeExpression::Unknown(_) => None,
        }
    }
}

/// Value of a link parameter or request body entry.
///
/// - `"$…"` strings are evaluated as expressions
/// - strings embedding `{$…}` are templates; every embedded expression must
///   resolve
/// - anything else is a constant
pub fn evaluate_value(value: &Value, response: &HttpResponse) -> Option<Value> {
    let Value::String(text) = value else {
        return Some(value.clone());
    };
    if let Some(expression) = RuntimeExpression::parse(text) {
        return expression.evaluate(response);
    }
    if text.contains("{$") {
        return evaluate_template(text, response).map(Value::String);
    }
    Some(value.clone())
}

fn evaluate_template(template: &str, response: &HttpResponse) -> Option<String> {
    let mut output = String::new();
    let mut rest = template;
    while let Some(start) = rest.find("{$") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}')?;
        let expression = RuntimeExpression::parse(&after[..end])?;
        let value = expression.evaluate(response)?;
        match value {
            Value::String(s) => output.push_str(&s),
            other => output.push_str(&other.to_string()),
        }
        rest = &after[end + 1..];
    }
    output.push_str(rest);
    Some(output)
}
