//! Structural checks of live payloads against schema branches.

use serde_json::Value;
use tracing::trace;

/// Decides whether a value fits a schema. Used to tell `oneOf` branches
/// apart on a concrete payload.
pub trait ConstraintChecker: Send + Sync {
    fn matches(&self, schema: &Value, value: &Value) -> bool;
}

/// [`ConstraintChecker`] backed by the `jsonschema` crate.
///
/// Semantic keywords (`@id`, `@type`, `x-affiliation`) are unknown keywords to
/// JSON Schema and are ignored. A schema that fails to compile never matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaChecker;

impl ConstraintChecker for JsonSchemaChecker {
    fn matches(&self, schema: &Value, value: &Value) -> bool {
        match jsonschema::validator_for(schema) {
            Ok(validator) => validator.is_valid(value),
            Err(e) => {
                trace!(error = %e, "schema branch does not compile");
                false
            }
        }
    }
}
