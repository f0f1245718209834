//! JSON Schema values and validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(feature = "schema")]
use crate::error::LlmError;

/// A JSON Schema document.
///
/// Used for tool parameters, for grammar-constrained decoding and as the
/// target of object generation.
///
/// ```rust
/// use llm_bridge_core::JsonSchema;
///
/// // From a raw JSON value
/// let schema = JsonSchema::new(serde_json::json!({
///     "type": "object",
///     "properties": { "name": { "type": "string" } },
///     "required": ["name"]
/// }));
/// assert!(schema.validate(&serde_json::json!({"name": "Ada"})).unwrap().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSchema(Value);

impl JsonSchema {
    /// Creates a schema from a raw JSON value.
    pub fn new(schema: Value) -> Self {
        Self(schema)
    }

    /// Returns the underlying schema value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the schema and returns the underlying value.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Derives a schema from a Rust type implementing
    /// [`schemars::JsonSchema`].
    #[cfg(feature = "schema")]
    pub fn from_type<T: schemars::JsonSchema>() -> Result<Self, serde_json::Error> {
        let schema = schemars::schema_for!(T);
        let value = serde_json::to_value(schema)?;
        Ok(Self(value))
    }

    /// Validates `value` against this schema.
    ///
    /// Returns one [`ValidationIssue`] per violation; an empty list means
    /// the value conforms. Returns [`LlmError::InvalidRequest`] if the
    /// schema itself is malformed.
    #[cfg(feature = "schema")]
    pub fn validate(&self, value: &Value) -> Result<Vec<ValidationIssue>, LlmError> {
        let validator = jsonschema::validator_for(&self.0)
            .map_err(|e| LlmError::InvalidRequest(format!("invalid JSON schema: {e}")))?;
        Ok(validator
            .iter_errors(value)
            .map(|e| {
                let schema_path = e.schema_path.to_string();
                ValidationIssue {
                    path: e.instance_path.to_string(),
                    keyword: schema_path
                        .rsplit('/')
                        .next()
                        .unwrap_or_default()
                        .to_owned(),
                    message: e.to_string(),
                    actual: e.instance.clone().into_owned(),
                }
            })
            .collect())
    }
}

/// One schema violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// JSON Pointer to the offending location in the instance; empty for
    /// the root.
    pub path: String,
    /// The schema keyword that failed (`"type"`, `"required"`, ...).
    pub keyword: String,
    /// Human-readable description.
    pub message: String,
    /// The offending value.
    pub actual: Value,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}
