//! Operation Matcher: pick the operation that best answers a semantic query.

use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::document::ApiDocument;
use crate::operation::OperationSchema;
use crate::request::split_url;
use crate::schema::find_property;
use crate::types::{schema_matches, Method, OperationDescriptor};

/// What the caller is looking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationQuery {
    /// An operation whose `operationId` or `@id` is this value.
    Action(String),
    /// A GET whose response body is of this semantic type.
    Returns(String),
    /// A GET whose response body is an array of this semantic type.
    Lists(String),
    /// A GET whose path template matches this URL.
    Path(String),
}

impl fmt::Display for OperationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationQuery::Action(id) => write!(f, "action {}", id),
            OperationQuery::Returns(t) => write!(f, "returns {}", t),
            OperationQuery::Lists(t) => write!(f, "lists {}", t),
            OperationQuery::Path(url) => write!(f, "path {}", url),
        }
    }
}

/// Optional filters and ranking input for [`find_operation`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Semantic fields the response must be able to provide.
    pub required_returned_fields: Vec<String>,
    /// Semantic ids of the parameters the caller can supply.
    pub with_parameters: Vec<String>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only keep operations whose response contains this semantic field.
    pub fn require_field(mut self, key: impl Into<String>) -> Self {
        self.required_returned_fields.push(key.into());
        self
    }

    /// Prefer operations accepting a parameter with this semantic id.
    pub fn with_parameter(mut self, key: impl Into<String>) -> Self {
        self.with_parameters.push(key.into());
        self
    }
}

/// Find the best operation for `query`.
///
/// Candidates are ranked by how many of their parameters (body properties
/// included) accept one of `options.with_parameters`. Ties keep document
/// order. Returns `None` when nothing qualifies.
pub fn find_operation(
    document: &ApiDocument,
    query: &OperationQuery,
    options: &SearchOptions,
    authenticated: bool,
) -> Option<OperationDescriptor> {
    let mut best: Option<(usize, OperationDescriptor)> = None;

    for operation in document.operations(authenticated) {
        if !matches_query(&operation, query) {
            continue;
        }
        if !provides_fields(&operation, query, &options.required_returned_fields) {
            continue;
        }

        let score = score(&operation, &options.with_parameters);
        debug!(
            query = %query,
            verb = %operation.verb,
            path = %operation.path,
            score,
            "operation candidate"
        );
        let better = match &best {
            Some((top, _)) => score > *top,
            None => true,
        };
        if better {
            best = Some((score, operation));
        }
    }

    if best.is_none() {
        debug!(query = %query, "no operation found");
    }
    best.map(|(_, operation)| operation)
}

fn matches_query(operation: &OperationDescriptor, query: &OperationQuery) -> bool {
    match query {
        OperationQuery::Action(id) => operation.is_identified_by(id),
        OperationQuery::Returns(key) => {
            operation.verb == Method::Get
                && operation
                    .response_body_schema()
                    .map(|schema| schema_matches(schema, key))
                    .unwrap_or(false)
        }
        OperationQuery::Lists(key) => {
            operation.verb == Method::Get
                && operation
                    .response_body_schema()
                    .and_then(list_items)
                    .map(|items| schema_matches(items, key))
                    .unwrap_or(false)
        }
        OperationQuery::Path(url) => {
            operation.verb == Method::Get && match_url_pattern(url, &operation.path)
        }
    }
}

fn list_items(schema: &Value) -> Option<&Value> {
    if schema.get("type").and_then(Value::as_str) == Some("array") || schema.get("items").is_some() {
        schema.get("items")
    } else {
        None
    }
}

fn provides_fields(operation: &OperationDescriptor, query: &OperationQuery, fields: &[String]) -> bool {
    if fields.is_empty() {
        return true;
    }
    let Some(schema) = operation.response_body_schema() else {
        return false;
    };
    let schema = match query {
        OperationQuery::Lists(_) => list_items(schema).unwrap_or(schema),
        _ => schema,
    };
    fields.iter().all(|field| find_property(schema, field).is_some())
}

fn score(operation: &OperationDescriptor, with_parameters: &[String]) -> usize {
    if with_parameters.is_empty() {
        return 0;
    }
    OperationSchema::new(operation.clone())
        .parameters()
        .iter()
        .filter(|p| p.accepts_any(with_parameters))
        .count()
}

/// True when `url` fits the path template `pattern`.
///
/// Query strings, trailing slashes and the origin of an absolute URL are
/// ignored. Both must have the same number of segments; a `{placeholder}`
/// segment matches any non-empty segment.
pub fn match_url_pattern(url: &str, pattern: &str) -> bool {
    let (path, _) = split_url(url);
    let (template, _) = split_url(pattern);
    let actual: Vec<&str> = path.trim_end_matches('/').split('/').collect();
    let expected: Vec<&str> = template.trim_end_matches('/').split('/').collect();
    if actual.len() != expected.len() {
        return false;
    }
    expected.iter().zip(&actual).all(|(fragment, segment)| {
        if fragment.starts_with('{') && fragment.ends_with('}') {
            !segment.is_empty()
        } else {
            fragment == segment
        }
    })
}
