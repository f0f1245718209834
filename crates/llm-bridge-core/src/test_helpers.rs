//! Pre-built helpers for testing code that uses `llm-bridge-core` types.
//!
//! Available when the `test-utils` feature is enabled, so downstream
//! crates can reuse them in their own test suites. Also compiled during
//! `#[cfg(test)]` for this crate's own tests.

use futures::StreamExt;

use crate::mock::MockLanguageModel;
use crate::mode::ObjectMode;
use crate::model::{GenerateResponse, ModelMetadata};
use crate::stream::{FinishReason, PartStream, StreamPart, ToolCallRecord};
use crate::usage::Usage;

/// Builds a [`GenerateResponse`] carrying `text` and [`sample_usage`].
pub fn sample_response(text: &str) -> GenerateResponse {
    GenerateResponse {
        text: Some(text.into()),
        tool_calls: Vec::new(),
        finish_reason: FinishReason::Stop,
        usage: sample_usage(),
    }
}

/// Builds a [`GenerateResponse`] containing one tool call.
pub fn sample_tool_response(tool_name: &str, args: &str) -> GenerateResponse {
    GenerateResponse {
        text: None,
        tool_calls: vec![ToolCallRecord {
            tool_call_id: "call_1".into(),
            tool_name: tool_name.into(),
            args: args.into(),
        }],
        finish_reason: FinishReason::ToolCalls,
        usage: sample_usage(),
    }
}

/// Returns a [`Usage`] with 100 prompt / 50 completion tokens.
pub fn sample_usage() -> Usage {
    Usage {
        prompt_tokens: 100,
        completion_tokens: 50,
    }
}

/// A `FinalMetadata` part with [`FinishReason::Stop`] and [`sample_usage`].
pub fn final_part() -> StreamPart {
    StreamPart::FinalMetadata {
        finish_reason: FinishReason::Stop,
        usage: sample_usage(),
    }
}

/// A `ToolCallDelta` part with the given fragment.
pub fn tool_delta(index: u32, id: &str, name: &str, fragment: &str) -> StreamPart {
    StreamPart::ToolCallDelta {
        index,
        tool_call_id: id.into(),
        tool_name: name.into(),
        args_text_delta: fragment.into(),
    }
}

/// Collects every part of a stream.
pub async fn collect_parts(stream: PartStream) -> Vec<StreamPart> {
    stream.collect::<Vec<_>>().await
}

/// Concatenates the text deltas of a part list.
pub fn joined_text(parts: &[StreamPart]) -> String {
    parts
        .iter()
        .filter_map(|p| match p {
            StreamPart::TextDelta { text_delta } => Some(text_delta.as_str()),
            _ => None,
        })
        .collect()
}

/// Creates a [`MockLanguageModel`] with the given provider and model id
/// and no preferred object mode.
pub fn mock_for(provider: &str, model_id: &str) -> MockLanguageModel {
    MockLanguageModel::new(ModelMetadata::new(provider.to_owned(), model_id))
}

/// Creates a [`MockLanguageModel`] that prefers `mode` for object
/// generation.
pub fn mock_preferring(mode: ObjectMode) -> MockLanguageModel {
    MockLanguageModel::new(ModelMetadata::new("mock", "test-model").with_preferred_object_mode(mode))
}
