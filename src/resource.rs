//! Resource Navigator: a response payload read by meaning.
//!
//! A [`SemanticResource`] pairs a payload with the schema it was returned
//! under. Fields are looked up by semantic key inside the payload first; when
//! the payload does not hold the value, parent-affiliated links are followed.
//! Relations advertised in `_links` or in response headers are bound to
//! operations with their parameter defaults pre-filled.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::client::{ApiOperation, SemanticClient};
use crate::error::ClientError;
use crate::expression::evaluate_value;
use crate::hypermedia::{controls_of, parse_link_header, HypermediaControl, NormalizedHeader, LINKS_KEY};
use crate::matcher::{find_operation, OperationQuery, SearchOptions};
use crate::schema::{find_property, flatten_properties, value_at};
use crate::transport::HttpResponse;
use crate::types::{
    schema_matches, semantics_of, LinkDescriptor, Method, OperationDescriptor, ResponseDescriptor,
};
use crate::validator::ConstraintChecker;

/// A relation of a resource, bound to the operation that follows it.
#[derive(Debug, Clone)]
pub struct RelationDescriptor {
    /// Link name, or the `rel` token of a header link.
    pub key: String,
    pub operation: ApiOperation,
}

/// Result of a field lookup: one resource, or one per array element.
#[derive(Debug, Clone)]
pub enum SemanticValue {
    One(SemanticResource),
    Many(Vec<SemanticResource>),
}

impl SemanticValue {
    /// The resource itself, or the first element.
    pub fn first(self) -> Option<SemanticResource> {
        match self {
            SemanticValue::One(resource) => Some(resource),
            SemanticValue::Many(items) => items.into_iter().next(),
        }
    }

    pub fn into_vec(self) -> Vec<SemanticResource> {
        match self {
            SemanticValue::One(resource) => vec![resource],
            SemanticValue::Many(items) => items,
        }
    }

    pub fn is_many(&self) -> bool {
        matches!(self, SemanticValue::Many(_))
    }
}

/// One payload (object, array element or array) with its schema.
///
/// Read tracking (`other_data`, `other_relations`) is local to the instance;
/// clones track independently.
#[derive(Debug, Clone)]
pub struct SemanticResource {
    client: SemanticClient,
    data: Value,
    schema: Option<Value>,
    semantic_type: Vec<String>,
    response: Arc<HttpResponse>,
    documentation: Arc<ResponseDescriptor>,
    read_fields: HashSet<String>,
    read_relations: HashSet<String>,
}

impl SemanticResource {
    /// Wrap a payload. A `oneOf` schema is narrowed to the branch that fits
    /// the payload.
    pub(crate) fn new(
        client: SemanticClient,
        data: Value,
        schema: Option<Value>,
        response: Arc<HttpResponse>,
        documentation: Arc<ResponseDescriptor>,
    ) -> Self {
        let schema = schema.map(|s| resolve_branch(client.checker(), &s, &data));
        let semantic_type = schema
            .as_ref()
            .map(|s| {
                let ids = semantics_of(s, "@id");
                if ids.is_empty() {
                    semantics_of(s, "@type")
                } else {
                    ids
                }
            })
            .unwrap_or_default();

        Self {
            client,
            data,
            schema,
            semantic_type,
            response,
            documentation,
            read_fields: HashSet::new(),
            read_relations: HashSet::new(),
        }
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn into_data(self) -> Value {
        self.data
    }

    /// The schema after `oneOf` resolution.
    pub fn schema(&self) -> Option<&Value> {
        self.schema.as_ref()
    }

    /// Semantic id(s) of the resource (its `@type` when it has no `@id`).
    pub fn semantic_type(&self) -> &[String] {
        &self.semantic_type
    }

    /// The response this resource was read from.
    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    /// True when `key` is the resource's semantic id or type.
    pub fn is(&self, key: &str) -> bool {
        self.schema
            .as_ref()
            .map(|s| schema_matches(s, key))
            .unwrap_or(false)
    }

    pub fn is_object(&self) -> bool {
        match self.declared_type() {
            Some(t) => t == "object",
            None => self.data.is_object(),
        }
    }

    pub fn is_array(&self) -> bool {
        match self.declared_type() {
            Some(t) => t == "array",
            None => self.data.is_array(),
        }
    }

    pub fn is_primitive(&self) -> bool {
        !self.is_object() && !self.is_array()
    }

    fn declared_type(&self) -> Option<&str> {
        self.schema.as_ref()?.get("type")?.as_str()
    }

    /// One resource per element for array payloads, else the resource itself.
    pub fn to_array(&self) -> Vec<SemanticResource> {
        match &self.data {
            Value::Array(items) => {
                let item_schema = self.schema.as_ref().and_then(|s| s.get("items")).cloned();
                items
                    .iter()
                    .map(|item| self.child(item.clone(), item_schema.clone()))
                    .collect()
            }
            _ => vec![self.clone()],
        }
    }

    /// Forget which fields and relations were read.
    pub fn reset_read_tracking(&mut self) {
        self.read_fields.clear();
        self.read_relations.clear();
    }

    /// Value for a semantic key, from the payload or through a link.
    ///
    /// # Errors
    ///
    /// `NotFoundData` when neither the payload nor a link provides the key,
    /// `AmbiguousMatch` when several links could, and any error of the
    /// followed operation.
    pub fn get(&mut self, key: &str) -> Result<SemanticValue, ClientError> {
        if let Some(value) = self.inner_value(key) {
            return Ok(value);
        }
        self.value_from_links(key)
    }

    /// Like [`get`](Self::get), keeping the first element of an array.
    pub fn get_one(&mut self, key: &str) -> Result<SemanticResource, ClientError> {
        self.get(key)?.first().ok_or_else(|| ClientError::NotFoundData {
            key: key.to_string(),
        })
    }

    /// Like [`get`](Self::get), always as a list.
    pub fn get_array(&mut self, key: &str) -> Result<Vec<SemanticResource>, ClientError> {
        Ok(self.get(key)?.into_vec())
    }

    pub fn get_one_value(&mut self, key: &str) -> Result<Value, ClientError> {
        Ok(self.get_one(key)?.into_data())
    }

    pub fn get_array_value(&mut self, key: &str) -> Result<Vec<Value>, ClientError> {
        Ok(self
            .get_array(key)?
            .into_iter()
            .map(SemanticResource::into_data)
            .collect())
    }

    fn inner_value(&mut self, key: &str) -> Option<SemanticValue> {
        if !self.data.is_object() {
            if !self.data.is_array() && self.semantic_type.iter().any(|t| t == key) {
                return Some(SemanticValue::One(self.clone()));
            }
            return None;
        }

        let (path, property_schema) = {
            let schema = self.schema.as_ref()?;
            let property = flatten_properties(schema)
                .into_iter()
                .find(|p| schema_matches(p.schema, key))?;
            (property.path, property.schema.clone())
        };
        let value = value_at(&self.data, &path)?.clone();
        if let Some(root) = path.first() {
            self.read_fields.insert(root.clone());
        }
        Some(self.wrap(value, Some(property_schema)))
    }

    fn value_from_links(&mut self, key: &str) -> Result<SemanticValue, ClientError> {
        let mut candidates: Vec<RelationDescriptor> = self
            .bind_links(|_, link| link.is_parent_affiliated())
            .into_iter()
            .filter(|relation| {
                let descriptor = relation.operation.descriptor();
                descriptor.verb == Method::Get
                    && relation.operation.missing_parameters(&Value::Null).is_empty()
                    && descriptor
                        .response_body_schema()
                        .map(|s| schema_matches(s, key) || find_property(s, key).is_some())
                        .unwrap_or(false)
            })
            .collect();

        match candidates.len() {
            0 => Err(ClientError::NotFoundData {
                key: key.to_string(),
            }),
            1 => {
                let relation = candidates.remove(0);
                debug!(key, link = %relation.key, "following link to read value");
                let mut linked = relation.operation.invoke(&Value::Null)?;
                if linked.is(key) {
                    return Ok(SemanticValue::One(linked));
                }
                linked
                    .inner_value(key)
                    .ok_or_else(|| ClientError::NotFoundData {
                        key: key.to_string(),
                    })
            }
            _ => {
                let names: Vec<String> = candidates.into_iter().map(|r| r.key).collect();
                warn!(key, candidates = ?names, "more than one link can provide the value");
                Err(ClientError::AmbiguousMatch {
                    key: key.to_string(),
                    candidates: names,
                })
            }
        }
    }

    /// Every top-level property not read yet, `_links` excluded.
    pub fn other_data(&mut self) -> Vec<(String, SemanticValue)> {
        let Some(object) = self.data.as_object() else {
            return Vec::new();
        };
        let names: Vec<String> = match self.schema.as_ref().and_then(|s| s.get("properties")).and_then(Value::as_object) {
            Some(properties) => properties.keys().cloned().collect(),
            None => object.keys().cloned().collect(),
        };

        let mut others = Vec::new();
        for name in names {
            if name == LINKS_KEY || self.read_fields.contains(&name) {
                continue;
            }
            let Some(value) = object.get(&name).filter(|v| !v.is_null()) else {
                continue;
            };
            let property_schema = self
                .schema
                .as_ref()
                .and_then(|s| s.get("properties"))
                .and_then(|p| p.get(&name))
                .cloned();
            others.push((name, self.wrap(value.clone(), property_schema)));
        }
        for (name, _) in &others {
            self.read_fields.insert(name.clone());
        }
        others
    }

    /// Relations for a semantic relation key, from `_links` and headers, in
    /// document order. At most `max` when given. Returned relations are
    /// marked as read.
    pub fn relations(&mut self, key: &str, max: Option<usize>) -> Vec<RelationDescriptor> {
        let mut found = self.relations_matching(key);
        if let Some(max) = max {
            found.truncate(max);
        }
        for relation in &found {
            self.read_relations.insert(relation.key.clone());
        }
        found
    }

    /// The single relation for a key, marked as read when found.
    ///
    /// # Errors
    ///
    /// `AmbiguousMatch` when more than one relation carries the key. Nothing
    /// is marked as read then.
    pub fn relation(&mut self, key: &str) -> Result<Option<RelationDescriptor>, ClientError> {
        let mut found = self.relations_matching(key);
        if found.len() > 1 {
            let names: Vec<String> = found.into_iter().map(|r| r.key).collect();
            warn!(key, candidates = ?names, "more than one relation matches");
            return Err(ClientError::AmbiguousMatch {
                key: key.to_string(),
                candidates: names,
            });
        }
        let relation = found.pop();
        if let Some(relation) = &relation {
            self.read_relations.insert(relation.key.clone());
        }
        Ok(relation)
    }

    /// Relations for several keys, concatenated in key order.
    pub fn relations_for(&mut self, keys: &[&str]) -> Vec<RelationDescriptor> {
        keys.iter().flat_map(|key| self.relations(key, None)).collect()
    }

    /// Whether the payload or headers currently offer this relation. Does
    /// not mark anything as read.
    pub fn is_relation_available(&self, key: &str) -> bool {
        !self.relations_matching(key).is_empty()
    }

    /// Every `_links` relation not read yet. Does not mark them as read.
    pub fn other_relations(&self) -> Vec<RelationDescriptor> {
        self.bind_links(|name, _| !self.read_relations.contains(name))
    }

    /// Values of the response headers documented with this semantic id.
    pub fn data_from_headers(&self, key: &str) -> Vec<SemanticResource> {
        self.normalized_headers()
            .into_iter()
            .filter(|header| header.relation.as_deref() == Some(key))
            .map(|header| self.child(Value::String(header.value), None))
            .collect()
    }

    fn relations_matching(&self, key: &str) -> Vec<RelationDescriptor> {
        let mut found = self.bind_links(|_, link| link.has_relation(key));
        found.extend(self.header_relations(key));
        found
    }

    /// Documented links that pass `filter` and are present in `_links`,
    /// bound to their target operations.
    fn bind_links(&self, filter: impl Fn(&str, &LinkDescriptor) -> bool) -> Vec<RelationDescriptor> {
        let controls = controls_of(&self.data);
        let mut relations = Vec::new();
        for (name, link) in &self.documentation.links {
            if !filter(name.as_str(), link) {
                continue;
            }
            let Some(control) = controls.iter().find(|c| c.relation() == name.as_str()) else {
                continue;
            };
            let Some(descriptor) = self.link_target(link) else {
                warn!(
                    link = %name,
                    operation = link.operation_id.as_deref().or(link.operation_ref.as_deref()).unwrap_or(""),
                    "link targets an operation missing from the document"
                );
                continue;
            };
            relations.push(RelationDescriptor {
                key: name.clone(),
                operation: self.bind(descriptor, control, link),
            });
        }
        relations
    }

    fn link_target(&self, link: &LinkDescriptor) -> Option<OperationDescriptor> {
        let document = self.client.document();
        let authenticated = self.client.credentials().is_authenticated();
        link.operation_id
            .as_deref()
            .and_then(|id| document.operation_by_id(id, authenticated))
            .or_else(|| {
                link.operation_ref
                    .as_deref()
                    .and_then(|r| document.operation_by_ref(r, authenticated))
            })
    }

    /// Bind an operation to a control: narrow a polymorphic request body,
    /// then fill defaults from the control's values, the link's parameter
    /// expressions and the link's request body, in that order.
    fn bind(
        &self,
        mut descriptor: OperationDescriptor,
        control: &HypermediaControl,
        link: &LinkDescriptor,
    ) -> ApiOperation {
        let bound = control.parameters();

        if let Some(body) = descriptor.request_body.as_mut() {
            let branches = body
                .schema()
                .and_then(|s| s.get("oneOf"))
                .and_then(Value::as_array)
                .cloned();
            if let Some(branch) = branches.and_then(|b| closest_branch(&b, bound)) {
                body.set_schema(branch);
            }
        }

        let body_values: Map<String, Value> = link
            .request_body
            .as_ref()
            .and_then(|b| evaluate_value(b, &self.response))
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();

        let mut operation = self.client.operation(descriptor);
        let targets: Vec<(String, String)> = operation
            .schema()
            .parameters()
            .iter()
            .map(|p| (p.name.clone(), format!("{}.{}", p.location.as_str(), p.name)))
            .collect();
        for (name, qualified) in targets {
            let value = bound
                .and_then(|values| values.get(&name))
                .filter(|v| !v.is_null())
                .cloned()
                .or_else(|| {
                    link.parameters
                        .get(&name)
                        .or_else(|| link.parameters.get(&qualified))
                        .and_then(|expression| evaluate_value(expression, &self.response))
                })
                .or_else(|| body_values.get(&name).cloned());
            if let Some(value) = value {
                debug!(parameter = %name, "bound default from hypermedia control");
                operation.schema_mut().set_default(&name, value);
            }
        }
        operation
    }

    fn header_relations(&self, key: &str) -> Vec<RelationDescriptor> {
        self.normalized_headers()
            .into_iter()
            .filter(|header| header.has_relation(key))
            .map(|header| {
                let relation = header.relation.clone().unwrap_or_default();
                let short = relation.rsplit('#').next().unwrap_or(&relation).to_string();
                RelationDescriptor {
                    key: short,
                    operation: self.client.operation(self.header_target(&header)),
                }
            })
            .collect()
    }

    /// Operation for a header link: the documented operation, or the GET
    /// serving that URL, called on the header's URL as is.
    fn header_target(&self, header: &NormalizedHeader) -> OperationDescriptor {
        let document = self.client.document();
        let authenticated = self.client.credentials().is_authenticated();
        let relative = self
            .client
            .relative_to_base(&header.value, Some(self.response.url.as_str()));

        let found = header
            .operation_id
            .as_deref()
            .and_then(|id| document.operation_by_id(id, authenticated))
            .or_else(|| {
                find_operation(
                    document,
                    &OperationQuery::Path(relative.clone()),
                    &SearchOptions::new(),
                    authenticated,
                )
            });
        let mut descriptor = found.unwrap_or_else(|| {
            OperationDescriptor::from_parts(Method::Get, &relative, &Value::Null, &Value::Null, authenticated)
        });
        descriptor.path = relative;
        descriptor.parameters.clear();
        descriptor.request_body = None;
        descriptor
    }

    /// Response headers as `{value, relation}` records. `Link` headers
    /// expand to one record per entry; other headers take their documented
    /// `@id` as relation.
    fn normalized_headers(&self) -> Vec<NormalizedHeader> {
        let mut headers = Vec::new();
        for (name, value) in &self.response.headers {
            let documented = self.documentation.header(name);
            if name.eq_ignore_ascii_case("link") {
                for mut link in parse_link_header(value) {
                    if link.operation_id.is_none() {
                        link.operation_id = documented.and_then(|d| d.operation_id.clone());
                    }
                    headers.push(link);
                }
            } else {
                headers.push(NormalizedHeader {
                    value: value.clone(),
                    relation: documented.and_then(|d| d.semantics.first().cloned()),
                    operation_id: documented.and_then(|d| d.operation_id.clone()),
                    attributes: Vec::new(),
                });
            }
        }
        headers
    }

    fn wrap(&self, value: Value, schema: Option<Value>) -> SemanticValue {
        match value {
            Value::Array(items) => {
                let item_schema = schema.and_then(|s| s.get("items").cloned());
                SemanticValue::Many(
                    items
                        .into_iter()
                        .map(|item| self.child(item, item_schema.clone()))
                        .collect(),
                )
            }
            other => SemanticValue::One(self.child(other, schema)),
        }
    }

    /// A nested payload. Its links are documented by the operation that
    /// returns its type, if any.
    fn child(&self, value: Value, schema: Option<Value>) -> SemanticResource {
        let documentation = schema
            .as_ref()
            .and_then(|s| self.documentation_for(s))
            .unwrap_or_default();
        let mut response = HttpResponse::new(200, value.clone());
        response.url = self.response.url.clone();
        SemanticResource::new(
            self.client.clone(),
            value,
            schema,
            Arc::new(response),
            Arc::new(documentation),
        )
    }

    fn documentation_for(&self, schema: &Value) -> Option<ResponseDescriptor> {
        let document = self.client.document();
        let authenticated = self.client.credentials().is_authenticated();
        semantics_of(schema, "@id")
            .into_iter()
            .chain(semantics_of(schema, "@type"))
            .find_map(|key| {
                find_operation(
                    document,
                    &OperationQuery::Returns(key),
                    &SearchOptions::new(),
                    authenticated,
                )
            })
            .and_then(|op| op.primary_response().cloned())
    }
}

/// Narrow a `oneOf` schema to the branch fitting `data`: among validating
/// branches, the one with the most required fields. Falls back to the first
/// branch when none validates.
fn resolve_branch(checker: &dyn ConstraintChecker, schema: &Value, data: &Value) -> Value {
    let Some(branches) = schema.get("oneOf").and_then(Value::as_array) else {
        return schema.clone();
    };
    let Some(first) = branches.first() else {
        return schema.clone();
    };

    let mut ranked: Vec<&Value> = branches.iter().collect();
    ranked.sort_by_key(|branch| Reverse(required_count(branch)));
    match ranked.into_iter().find(|branch| checker.matches(branch, data)) {
        Some(branch) => branch.clone(),
        None => {
            trace!("no oneOf branch validates, using the first one");
            first.clone()
        }
    }
}

fn required_count(schema: &Value) -> usize {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}

/// The branch whose properties overlap most with the control's bound
/// parameter names; the first branch on ties.
fn closest_branch(branches: &[Value], bound: Option<&Map<String, Value>>) -> Option<Value> {
    let overlap = |branch: &Value| -> usize {
        let Some(bound) = bound else { return 0 };
        branch
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| properties.keys().filter(|k| bound.contains_key(*k)).count())
            .unwrap_or(0)
    };

    let mut best: Option<(&Value, usize)> = None;
    for branch in branches {
        let score = overlap(branch);
        if best.map(|(_, top)| score > top).unwrap_or(true) {
            best = Some((branch, score));
        }
    }
    best.map(|(branch, _)| branch.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::JsonSchemaChecker;
    use serde_json::json;

    fn payment_branches() -> Vec<Value> {
        vec![
            json!({ "@id": "Card", "required": ["card"], "properties": { "card": {} } }),
            json!({ "@id": "Transfer", "required": ["iban", "bic"], "properties": { "iban": {}, "bic": {} } }),
        ]
    }

    #[test]
    fn branch_with_most_required_fields_wins() {
        let schema = json!({
            "oneOf": [
                { "@id": "Summary", "type": "object", "required": ["id"] },
                { "@id": "Detail", "type": "object", "required": ["id", "lines"] }
            ]
        });
        let detailed = resolve_branch(&JsonSchemaChecker, &schema, &json!({ "id": 1, "lines": [] }));
        assert_eq!(detailed["@id"], "Detail");
        let summary = resolve_branch(&JsonSchemaChecker, &schema, &json!({ "id": 1 }));
        assert_eq!(summary["@id"], "Summary");
    }

    #[test]
    fn no_validating_branch_falls_back_to_first() {
        let schema = json!({
            "oneOf": [
                { "@id": "A", "type": "object", "required": ["a"] },
                { "@id": "B", "type": "object", "required": ["b", "c"] }
            ]
        });
        let chosen = resolve_branch(&JsonSchemaChecker, &schema, &json!("text"));
        assert_eq!(chosen["@id"], "A");
    }

    #[test]
    fn schema_without_one_of_is_kept() {
        let schema = json!({ "@id": "Order", "type": "object" });
        assert_eq!(resolve_branch(&JsonSchemaChecker, &schema, &json!({})), schema);
    }

    #[test]
    fn closest_branch_by_bound_parameters() {
        let bound = json!({ "iban": "FR76", "bic": "AGRI" });
        let chosen = closest_branch(&payment_branches(), bound.as_object()).unwrap();
        assert_eq!(chosen["@id"], "Transfer");

        // Nothing bound: first branch
        let chosen = closest_branch(&payment_branches(), None).unwrap();
        assert_eq!(chosen["@id"], "Card");
        assert!(closest_branch(&[], None).is_none());
    }

    #[test]
    fn semantic_value_accessors() {
        assert!(SemanticValue::Many(Vec::new()).into_vec().is_empty());
        assert!(SemanticValue::Many(Vec::new()).is_many());
        assert!(SemanticValue::Many(Vec::new()).first().is_none());
    }
}
