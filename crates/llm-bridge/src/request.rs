//! Mode resolution and request shaping shared by the object pipeline and
//! the partial-object streamer.

use llm_bridge_core::{
    CallMode, CallOptions, CallSettings, JsonSchema, LlmError, Message, ModelMetadata, ObjectMode,
    ToolDefinition,
};
use tracing::debug;

use crate::prompt_input::PromptInput;

/// Name of the synthetic tool used in `tool` mode.
pub const OBJECT_TOOL_NAME: &str = "json";

/// Description of the synthetic tool used in `tool` mode.
pub const OBJECT_TOOL_DESCRIPTION: &str = "Respond with a JSON object.";

const SCHEMA_PREFIX: &str = "JSON schema:";
const SCHEMA_SUFFIX: &str = "You MUST answer with a JSON object that matches the JSON schema above.";

/// Caller arguments for [`generate_object`](crate::generate_object) and
/// [`stream_object`](crate::stream_object).
///
/// Exactly one of `prompt` and `messages` must be set. When `mode` is
/// `None` the model's declared preferred object mode is used.
#[derive(Debug, Clone, Default)]
pub struct ObjectParams {
    /// How to elicit the object.
    pub mode: Option<ObjectMode>,
    /// System instruction.
    pub system: Option<String>,
    /// A single user prompt.
    pub prompt: Option<String>,
    /// A full message list.
    pub messages: Option<Vec<Message>>,
    /// Sampling and transport settings.
    pub settings: CallSettings,
}

/// Picks the explicit mode, else the model's preferred one.
pub(crate) fn resolve_mode(
    requested: Option<ObjectMode>,
    metadata: &ModelMetadata,
) -> Result<ObjectMode, LlmError> {
    let mode = requested
        .or(metadata.preferred_object_mode)
        .ok_or_else(|| LlmError::NoDefaultObjectMode {
            provider: metadata.provider.to_string(),
            model_id: metadata.model_id.clone(),
        })?;
    debug!(
        %mode,
        explicit = requested.is_some(),
        "Resolved object generation mode"
    );
    Ok(mode)
}

/// Builds the call options for one object request.
///
/// `json` and `grammar` append the schema instruction to the system text;
/// `grammar` also passes the schema in the mode. `tool` leaves the system
/// text alone and wraps the schema in the synthetic `json` tool.
pub(crate) fn object_call_options(
    mode: ObjectMode,
    schema: &JsonSchema,
    params: ObjectParams,
) -> Result<CallOptions, LlmError> {
    let ObjectParams {
        mode: _,
        system,
        prompt,
        messages,
        settings,
    } = params;

    let (call_mode, system) = match mode {
        ObjectMode::Json => (
            CallMode::ObjectJson,
            Some(inject_json_schema(system.as_deref(), schema)),
        ),
        ObjectMode::Grammar => (
            CallMode::ObjectGrammar {
                schema: schema.clone(),
            },
            Some(inject_json_schema(system.as_deref(), schema)),
        ),
        ObjectMode::Tool => (
            CallMode::ObjectTool {
                tool: ToolDefinition::new(OBJECT_TOOL_NAME, schema.clone())
                    .with_description(OBJECT_TOOL_DESCRIPTION),
            },
            system,
        ),
    };

    let (prompt, input_format) = PromptInput {
        system,
        prompt,
        messages,
    }
    .into_prompt()?;

    Ok(CallOptions {
        mode: call_mode,
        prompt,
        input_format,
        settings,
    })
}

/// Appends the labeled schema block to `system`.
///
/// The caller's text comes first, separated by a blank line:
///
/// ```text
/// <system>
///
/// JSON schema:
/// {"type":"object",...}
/// You MUST answer with a JSON object that matches the JSON schema above.
/// ```
pub fn inject_json_schema(system: Option<&str>, schema: &JsonSchema) -> String {
    let schema_json = schema.as_value().to_string();
    let block = [SCHEMA_PREFIX, schema_json.as_str(), SCHEMA_SUFFIX].join("\n");
    match system {
        Some(system) => format!("{system}\n\n{block}"),
        None => block,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_bridge_core::InputFormat;
    use serde_json::json;

    fn schema() -> JsonSchema {
        JsonSchema::new(json!({"type": "object", "properties": {"name": {"type": "string"}}}))
    }

    fn params(system: Option<&str>) -> ObjectParams {
        ObjectParams {
            system: system.map(Into::into),
            prompt: Some("Invent a person".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_mode_prefers_explicit() {
        let meta = ModelMetadata::new("p", "m").with_preferred_object_mode(ObjectMode::Json);
        assert_eq!(
            resolve_mode(Some(ObjectMode::Tool), &meta).unwrap(),
            ObjectMode::Tool
        );
        assert_eq!(resolve_mode(None, &meta).unwrap(), ObjectMode::Json);
    }

    #[test]
    fn test_resolve_mode_without_default_fails() {
        let meta = ModelMetadata::new("p", "m");
        let err = resolve_mode(None, &meta).unwrap_err();
        assert!(matches!(
            err,
            LlmError::NoDefaultObjectMode { ref provider, ref model_id }
                if provider == "p" && model_id == "m"
        ));
    }

    #[test]
    fn test_inject_json_schema_layout() {
        let text = inject_json_schema(Some("Be precise."), &schema());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "Be precise.");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "JSON schema:");
        let embedded: serde_json::Value = serde_json::from_str(lines[3]).unwrap();
        assert_eq!(&embedded, schema().as_value());
        assert_eq!(
            lines[4],
            "You MUST answer with a JSON object that matches the JSON schema above."
        );

        let text = inject_json_schema(None, &schema());
        assert!(text.starts_with("JSON schema:\n{"));
    }

    #[test]
    fn test_json_mode_shapes_request() {
        let options = object_call_options(ObjectMode::Json, &schema(), params(Some("sys"))).unwrap();
        assert_eq!(options.mode, CallMode::ObjectJson);
        let system = options.prompt.system().unwrap();
        assert!(system.starts_with("sys\n\nJSON schema:\n"));
        assert_eq!(options.input_format, InputFormat::Prompt);
    }

    #[test]
    fn test_grammar_mode_carries_schema() {
        let options = object_call_options(ObjectMode::Grammar, &schema(), params(None)).unwrap();
        assert_eq!(options.mode, CallMode::ObjectGrammar { schema: schema() });
        assert!(options.prompt.system().unwrap().starts_with("JSON schema:"));
    }

    #[test]
    fn test_tool_mode_wraps_schema_in_json_tool() {
        let options = object_call_options(ObjectMode::Tool, &schema(), params(Some("sys"))).unwrap();
        let CallMode::ObjectTool { tool } = &options.mode else {
            panic!("expected object-tool mode, got {:?}", options.mode);
        };
        assert_eq!(tool.name, "json");
        assert_eq!(tool.description.as_deref(), Some("Respond with a JSON object."));
        assert_eq!(tool.parameters, schema());
        assert_eq!(options.prompt.system(), Some("sys"));
    }

    #[test]
    fn test_invalid_prompt_input_is_rejected() {
        let err = object_call_options(ObjectMode::Json, &schema(), ObjectParams::default())
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidPrompt(_)));
    }
}
