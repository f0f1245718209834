//! Typed target schemas for object generation.

use std::fmt;
use std::marker::PhantomData;

use llm_bridge_core::{JsonSchema, LlmError, ValidationIssue};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A JSON Schema paired with the Rust type it describes.
///
/// Validation checks the value against the schema first and then
/// deserializes it into `T`; a value that passes yields exactly one `T`.
/// The schema is stateless and can be reused across calls.
///
/// ```rust
/// use llm_bridge::ObjectSchema;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize, schemars::JsonSchema)]
/// struct Person {
///     name: String,
/// }
///
/// let schema = ObjectSchema::<Person>::from_type().unwrap();
/// let person = schema.validate(&serde_json::json!({"name": "Rin"})).unwrap();
/// assert_eq!(person.name, "Rin");
/// assert!(schema.validate(&serde_json::json!({})).is_err());
/// ```
pub struct ObjectSchema<T> {
    schema: JsonSchema,
    _target: PhantomData<fn() -> T>,
}

impl<T> ObjectSchema<T> {
    /// Wraps a raw JSON Schema.
    ///
    /// Returns [`LlmError::InvalidRequest`] if the schema is malformed.
    pub fn new(schema: JsonSchema) -> Result<Self, LlmError> {
        schema.validate(&Value::Null)?;
        Ok(Self {
            schema,
            _target: PhantomData,
        })
    }

    /// The JSON Schema projection sent to the model.
    pub fn json_schema(&self) -> &JsonSchema {
        &self.schema
    }
}

impl<T: schemars::JsonSchema> ObjectSchema<T> {
    /// Derives the schema from `T`.
    pub fn from_type() -> Result<Self, LlmError> {
        let schema = JsonSchema::from_type::<T>()
            .map_err(|e| LlmError::InvalidRequest(format!("failed to derive JSON schema: {e}")))?;
        Self::new(schema)
    }
}

impl<T: DeserializeOwned> ObjectSchema<T> {
    /// Validates `value` and converts it into `T`.
    pub fn validate(&self, value: &Value) -> Result<T, Vec<ValidationIssue>> {
        let issues = self.schema.validate(value).unwrap_or_else(|e| {
            vec![ValidationIssue {
                path: String::new(),
                keyword: "$schema".into(),
                message: e.to_string(),
                actual: value.clone(),
            }]
        });
        if !issues.is_empty() {
            return Err(issues);
        }

        T::deserialize(value).map_err(|e| {
            vec![ValidationIssue {
                path: String::new(),
                keyword: "type".into(),
                message: e.to_string(),
                actual: value.clone(),
            }]
        })
    }
}

impl<T> Clone for ObjectSchema<T> {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            _target: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ObjectSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectSchema")
            .field("target", &std::any::type_name::<T>())
            .field("schema", self.schema.as_value())
            .finish()
    }
}
