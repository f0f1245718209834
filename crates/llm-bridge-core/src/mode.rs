//! Call modes: how a single model invocation elicits its output.
//!
//! [`CallMode`] is a closed sum type and is not `#[non_exhaustive]`;
//! backends dispatch on it with total `match`es.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::JsonSchema;

/// The mode of one model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CallMode {
    /// Free dialogue: stream text and complete tool calls.
    Regular {
        /// Caller-declared tools the model may invoke. Empty means none.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tools: Vec<ToolDefinition>,
    },
    /// Ask for JSON via an instruction (and the backend's JSON mode, if any).
    ObjectJson,
    /// Ask for JSON via grammar-constrained decoding.
    ObjectGrammar {
        /// The schema the decoder is constrained to.
        schema: JsonSchema,
    },
    /// Force invocation of one synthetic tool whose parameters are the
    /// target schema.
    ObjectTool {
        /// The synthetic schema-tool.
        tool: ToolDefinition,
    },
}

impl CallMode {
    /// A `regular` mode with no tools.
    pub fn regular() -> Self {
        Self::Regular { tools: Vec::new() }
    }

    /// The wire name of this mode (`"regular"`, `"object-json"`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Regular { .. } => "regular",
            Self::ObjectJson => "object-json",
            Self::ObjectGrammar { .. } => "object-grammar",
            Self::ObjectTool { .. } => "object-tool",
        }
    }

    /// The object mode this call mode implements, or `None` for `regular`.
    pub fn object_mode(&self) -> Option<ObjectMode> {
        match self {
            Self::Regular { .. } => None,
            Self::ObjectJson => Some(ObjectMode::Json),
            Self::ObjectGrammar { .. } => Some(ObjectMode::Grammar),
            Self::ObjectTool { .. } => Some(ObjectMode::Tool),
        }
    }
}

/// Caller-facing selector for how structured output is elicited.
///
/// Models advertise their preferred variant through
/// [`ModelMetadata::preferred_object_mode`](crate::ModelMetadata::preferred_object_mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectMode {
    /// JSON requested by instruction.
    Json,
    /// JSON requested by constrained decoding.
    Grammar,
    /// JSON requested by forcing a synthetic tool call.
    Tool,
}

impl fmt::Display for ObjectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Grammar => "grammar",
            Self::Tool => "tool",
        })
    }
}

/// A tool the model can invoke.
///
/// Used for caller-declared tools in [`CallMode::Regular`] and for the
/// single synthetic schema-tool in [`CallMode::ObjectTool`]. Names are
/// unique within a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool's name.
    pub name: String,
    /// Shown to the model so it knows when to use the tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema of the tool's arguments.
    pub parameters: JsonSchema,
}

impl ToolDefinition {
    /// Creates a tool definition without a description.
    pub fn new(name: impl Into<String>, parameters: JsonSchema) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object_schema() -> JsonSchema {
        JsonSchema::new(json!({"type": "object"}))
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(CallMode::regular().name(), "regular");
        assert_eq!(CallMode::ObjectJson.name(), "object-json");
        assert_eq!(
            CallMode::ObjectGrammar {
                schema: object_schema()
            }
            .name(),
            "object-grammar"
        );
        assert_eq!(
            CallMode::ObjectTool {
                tool: ToolDefinition::new("json", object_schema())
            }
            .name(),
            "object-tool"
        );
    }

    #[test]
    fn test_object_mode_of_call_mode() {
        assert_eq!(CallMode::regular().object_mode(), None);
        assert_eq!(CallMode::ObjectJson.object_mode(), Some(ObjectMode::Json));
        assert_eq!(
            CallMode::ObjectTool {
                tool: ToolDefinition::new("json", object_schema())
            }
            .object_mode(),
            Some(ObjectMode::Tool)
        );
    }

    #[test]
    fn test_call_mode_wire_shape() {
        let mode = CallMode::ObjectTool {
            tool: ToolDefinition::new("json", object_schema())
                .with_description("Respond with a JSON object."),
        };
        let value = serde_json::to_value(&mode).unwrap();
        assert_eq!(value["type"], "object-tool");
        assert_eq!(value["tool"]["name"], "json");
        assert_eq!(value["tool"]["description"], "Respond with a JSON object.");

        let regular = serde_json::to_value(CallMode::regular()).unwrap();
        assert_eq!(regular, json!({"type": "regular"}));
    }

    #[test]
    fn test_call_mode_deserialize_defaults_tools() {
        let mode: CallMode = serde_json::from_value(json!({"type": "regular"})).unwrap();
        assert_eq!(mode, CallMode::regular());
    }

    #[test]
    fn test_object_mode_display_and_serde() {
        assert_eq!(ObjectMode::Grammar.to_string(), "grammar");
        assert_eq!(serde_json::to_value(ObjectMode::Tool).unwrap(), json!("tool"));
    }

    #[test]
    fn test_tool_definition_description_skipped_when_none() {
        let tool = ToolDefinition::new("search", object_schema());
        let value = serde_json::to_value(&tool).unwrap();
        assert!(value.get("description").is_none());
    }
}
