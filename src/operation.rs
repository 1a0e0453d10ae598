//! Operation Schema: the full parameter view of one matched operation.

use serde_json::{Map, Value};

use crate::types::{OperationDescriptor, ParameterDescriptor, ParameterLocation};

/// A matched operation with its request-body properties projected as
/// [`ParameterLocation::Body`] parameters.
///
/// Values are supplied as a JSON object keyed either by semantic id or by
/// literal parameter name; see [`OperationSchema::value_for`].
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSchema {
    operation: OperationDescriptor,
    parameters: Vec<ParameterDescriptor>,
}

impl OperationSchema {
    pub fn new(operation: OperationDescriptor) -> Self {
        let parameters = project_parameters(&operation);
        Self {
            operation,
            parameters,
        }
    }

    pub fn operation(&self) -> &OperationDescriptor {
        &self.operation
    }

    /// Declared parameters followed by the request-body properties.
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    pub fn parameters_in(
        &self,
        location: ParameterLocation,
    ) -> impl Iterator<Item = &ParameterDescriptor> + '_ {
        self.parameters
            .iter()
            .filter(move |p| p.location == location)
    }

    pub fn request_body_schema(&self) -> Option<&Value> {
        self.operation.request_body_schema()
    }

    /// Parameter name → schema default, for every parameter that has one.
    pub fn default_values(&self) -> Map<String, Value> {
        self.parameters
            .iter()
            .filter_map(|p| p.default_value().map(|d| (p.name.clone(), d.clone())))
            .collect()
    }

    /// Set the default of every parameter or body property named `name`.
    /// Returns whether anything was updated.
    pub fn set_default(&mut self, name: &str, value: Value) -> bool {
        let mut updated = false;
        for parameter in self.parameters.iter_mut().filter(|p| p.name == name) {
            parameter.set_default(value.clone());
            updated = true;
        }
        updated
    }

    /// Value for a parameter: a supplied value under one of its semantic
    /// ids, then under its literal name, then the schema default.
    pub fn value_for(&self, parameter: &ParameterDescriptor, values: &Value) -> Option<Value> {
        parameter
            .semantics
            .iter()
            .find_map(|id| present(values.get(id.as_str())))
            .or_else(|| present(values.get(parameter.name.as_str())))
            .or_else(|| parameter.default_value().filter(|d| !d.is_null()))
            .cloned()
    }

    /// Parameters without a value. Only required ones when `required_only`.
    pub fn missing_parameters(&self, values: &Value, required_only: bool) -> Vec<&ParameterDescriptor> {
        self.parameters
            .iter()
            .filter(|p| !required_only || p.required)
            .filter(|p| self.value_for(p, values).is_none())
            .collect()
    }

    pub fn misses_required_parameters(&self, values: &Value) -> bool {
        !self.missing_parameters(values, true).is_empty()
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn project_parameters(operation: &OperationDescriptor) -> Vec<ParameterDescriptor> {
    let mut parameters: Vec<ParameterDescriptor> = operation
        .parameters
        .iter()
        .cloned()
        .map(|mut p| {
            // A path cannot be built without its placeholders
            if p.location == ParameterLocation::Path {
                p.required = true;
            }
            p
        })
        .collect();

    if let Some(body) = operation.request_body_schema() {
        let required: Vec<&str> = body
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if let Some(properties) = body.get("properties").and_then(Value::as_object) {
            for (name, schema) in properties {
                parameters.push(ParameterDescriptor::from_body_property(
                    name,
                    schema,
                    required.contains(&name.as_str()),
                ));
            }
        }
    }
    parameters
}
