//! Free-form text generation with optional tools.
//!
//! [`generate_text`] and [`stream_text`] call the model in `regular` mode.
//! Tool calls the model makes are checked against the declared tools:
//! the tool must exist and its arguments must be a JSON value matching
//! the tool's parameter schema.

use std::pin::Pin;

use futures::stream::{Stream, StreamExt};
use llm_bridge_core::{
    CallMode, CallOptions, CallSettings, DynLanguageModel, FinishReason, LlmError, Message,
    PartStream, StreamError, StreamPart, ToolCallRecord, ToolDefinition, Usage,
};
use serde_json::Value;
use tracing::{Span, debug, field, instrument, warn};

use crate::prompt_input::PromptInput;

/// Caller arguments for [`generate_text`] and [`stream_text`].
#[derive(Debug, Clone, Default)]
pub struct TextParams {
    /// Tools the model may call.
    pub tools: Vec<ToolDefinition>,
    /// System instruction.
    pub system: Option<String>,
    /// A single user prompt.
    pub prompt: Option<String>,
    /// A full message list.
    pub messages: Option<Vec<Message>>,
    /// Sampling and transport settings.
    pub settings: CallSettings,
}

/// A tool call whose arguments were parsed and checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToolCall {
    /// Backend-assigned call id.
    pub tool_call_id: String,
    /// Name of the declared tool.
    pub tool_name: String,
    /// The parsed arguments.
    pub args: Value,
}

/// The result of a [`generate_text`] call.
#[derive(Debug, Clone)]
pub struct GenerateTextResult {
    /// Generated text; empty if the model only called tools.
    pub text: String,
    /// Checked tool calls, in the order the model made them.
    pub tool_calls: Vec<ParsedToolCall>,
    /// Why the model stopped.
    pub finish_reason: FinishReason,
    /// Token counts reported by the backend.
    pub usage: Usage,
}

/// Generates text with a single model call.
///
/// # Errors
///
/// [`LlmError::InvalidPrompt`] for inconsistent prompt arguments, any
/// backend error, and [`LlmError::InvalidToolCall`] for a call to an
/// undeclared tool or with arguments that don't match its parameters.
#[instrument(skip_all, fields(provider = field::Empty, model = field::Empty, tools = field::Empty))]
pub async fn generate_text(
    model: &dyn DynLanguageModel,
    params: TextParams,
) -> Result<GenerateTextResult, LlmError> {
    let (options, tools) = regular_call_options(model, params)?;
    let response = model.generate_boxed(&options).await?;

    let tool_calls = response
        .tool_calls
        .into_iter()
        .map(|call| parse_tool_call(&tools, &call))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(
        tool_calls = tool_calls.len(),
        finish_reason = ?response.finish_reason,
        "Text generated"
    );

    Ok(GenerateTextResult {
        text: response.text.unwrap_or_default(),
        tool_calls,
        finish_reason: response.finish_reason,
        usage: response.usage,
    })
}

/// Starts a streaming text generation.
///
/// Completed tool calls that fail the checks of [`generate_text`] are
/// replaced by an `Error` part in the stream.
#[instrument(skip_all, fields(provider = field::Empty, model = field::Empty, tools = field::Empty))]
pub async fn stream_text(
    model: &dyn DynLanguageModel,
    params: TextParams,
) -> Result<StreamTextResult, LlmError> {
    let (options, tools) = regular_call_options(model, params)?;
    let stream = model.stream_boxed(&options).await?;

    let checked = stream.map(move |part| match part {
        StreamPart::ToolCall {
            tool_call_id,
            tool_name,
            args,
        } => {
            let record = ToolCallRecord {
                tool_call_id,
                tool_name,
                args,
            };
            match parse_tool_call(&tools, &record) {
                Ok(_) => StreamPart::ToolCall {
                    tool_call_id: record.tool_call_id,
                    tool_name: record.tool_name,
                    args: record.args,
                },
                Err(err) => StreamPart::Error(StreamError::from(err)),
            }
        }
        other => other,
    });

    Ok(StreamTextResult {
        stream: Box::pin(checked),
    })
}

/// An in-flight text stream.
pub struct StreamTextResult {
    stream: PartStream,
}

impl std::fmt::Debug for StreamTextResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTextResult").finish_non_exhaustive()
    }
}

impl StreamTextResult {
    /// Only the text deltas.
    pub fn text_stream(self) -> Pin<Box<dyn Stream<Item = String> + Send>> {
        Box::pin(self.stream.filter_map(|part| async move {
            match part {
                StreamPart::TextDelta { text_delta } => Some(text_delta),
                _ => None,
            }
        }))
    }

    /// Every part, in order.
    pub fn full_stream(self) -> PartStream {
        self.stream
    }
}

fn regular_call_options(
    model: &dyn DynLanguageModel,
    params: TextParams,
) -> Result<(CallOptions, Vec<ToolDefinition>), LlmError> {
    let metadata = model.metadata();
    let span = Span::current();
    span.record("provider", &*metadata.provider);
    span.record("model", metadata.model_id.as_str());
    span.record("tools", params.tools.len());

    let TextParams {
        tools,
        system,
        prompt,
        messages,
        settings,
    } = params;

    let (prompt, input_format) = PromptInput {
        system,
        prompt,
        messages,
    }
    .into_prompt()?;

    let options = CallOptions {
        mode: CallMode::Regular {
            tools: tools.clone(),
        },
        prompt,
        input_format,
        settings,
    };
    Ok((options, tools))
}

/// Checks one tool call against the declared tools.
fn parse_tool_call(
    tools: &[ToolDefinition],
    call: &ToolCallRecord,
) -> Result<ParsedToolCall, LlmError> {
    let invalid = |message: String| {
        warn!(tool = %call.tool_name, detail = %message, "Rejected tool call");
        LlmError::InvalidToolCall {
            tool_name: call.tool_name.clone(),
            message,
        }
    };

    let Some(definition) = tools.iter().find(|t| t.name == call.tool_name) else {
        return Err(invalid("unknown tool".into()));
    };

    let args: Value = serde_json::from_str(&call.args)
        .map_err(|e| invalid(format!("arguments are not valid JSON: {e}")))?;

    let issues = definition.parameters.validate(&args)?;
    if let Some(first) = issues.first() {
        return Err(invalid(format!("arguments do not match parameters: {first}")));
    }

    Ok(ParsedToolCall {
        tool_call_id: call.tool_call_id.clone(),
        tool_name: call.tool_name.clone(),
        args,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_bridge_core::test_helpers::{
        collect_parts, final_part, mock_for, sample_response, sample_tool_response, tool_delta,
    };
    use llm_bridge_core::{InputFormat, JsonSchema};
    use serde_json::json;

    fn weather_tool() -> ToolDefinition {
        ToolDefinition::new(
            "get_weather",
            JsonSchema::new(json!({
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "required": ["city"]
            })),
        )
        .with_description("Current weather for a city")
    }

    fn params() -> TextParams {
        TextParams {
            tools: vec![weather_tool()],
            prompt: Some("Weather in Oslo?".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_generate_text_returns_text() {
        let mock = mock_for("test", "test-model");
        mock.queue_response(sample_response("Hello!"));

        let result = generate_text(
            &mock,
            TextParams {
                prompt: Some("Hi".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(result.text, "Hello!");
        assert!(result.tool_calls.is_empty());
        assert_eq!(result.finish_reason, FinishReason::Stop);

        let call = &mock.recorded_calls()[0];
        assert_eq!(call.mode, CallMode::regular());
        assert_eq!(call.input_format, InputFormat::Prompt);
    }

    #[tokio::test]
    async fn test_generate_text_parses_tool_call() {
        let mock = mock_for("test", "test-model");
        mock.queue_response(sample_tool_response("get_weather", r#"{"city":"Oslo"}"#));

        let result = generate_text(&mock, params()).await.unwrap();
        assert_eq!(result.text, "");
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].tool_name, "get_weather");
        assert_eq!(result.tool_calls[0].args, json!({"city": "Oslo"}));

        let call = &mock.recorded_calls()[0];
        assert!(matches!(&call.mode, CallMode::Regular { tools } if tools.len() == 1));
    }

    #[tokio::test]
    async fn test_generate_text_rejects_unknown_tool() {
        let mock = mock_for("test", "test-model");
        mock.queue_response(sample_tool_response("launch_rocket", "{}"));

        let err = generate_text(&mock, params()).await.unwrap_err();
        assert!(matches!(
            err,
            LlmError::InvalidToolCall { ref tool_name, .. } if tool_name == "launch_rocket"
        ));
    }

    #[tokio::test]
    async fn test_generate_text_rejects_bad_arguments() {
        let mock = mock_for("test", "test-model");
        mock.queue_response(sample_tool_response("get_weather", r#"{"city":7}"#));
        mock.queue_response(sample_tool_response("get_weather", "{city"));

        for _ in 0..2 {
            let err = generate_text(&mock, params()).await.unwrap_err();
            assert!(matches!(err, LlmError::InvalidToolCall { .. }), "{err:?}");
        }
    }

    #[tokio::test]
    async fn test_stream_text_streams() {
        let mock = mock_for("test", "test-model");
        mock.queue_stream(vec![
            StreamPart::text("Hel"),
            StreamPart::text("lo"),
            final_part(),
        ]);

        let result = stream_text(&mock, params()).await.unwrap();
        let text: Vec<String> = result.text_stream().collect().await;
        assert_eq!(text, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_stream_text_checks_completed_tool_calls() {
        let mock = mock_for("test", "test-model");
        mock.queue_stream(vec![
            tool_delta(0, "c1", "get_weather", r#"{"city":"Oslo"}"#),
            StreamPart::ToolCall {
                tool_call_id: "c1".into(),
                tool_name: "get_weather".into(),
                args: r#"{"city":"Oslo"}"#.into(),
            },
            StreamPart::ToolCall {
                tool_call_id: "c2".into(),
                tool_name: "nope".into(),
                args: "{}".into(),
            },
            final_part(),
        ]);

        let result = stream_text(&mock, params()).await.unwrap();
        let parts = collect_parts(result.full_stream()).await;
        assert_eq!(parts.len(), 4);
        assert!(matches!(&parts[1], StreamPart::ToolCall { tool_call_id, .. } if tool_call_id == "c1"));
        assert!(matches!(&parts[2], StreamPart::Error(e) if e.message.contains("nope")));
        assert!(matches!(parts[3], StreamPart::FinalMetadata { .. }));
    }

    #[tokio::test]
    async fn test_inconsistent_prompt_is_rejected_before_call() {
        let mock = mock_for("test", "test-model");
        let err = stream_text(&mock, TextParams::default()).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidPrompt(_)));
        assert!(mock.recorded_calls().is_empty());
    }
}
