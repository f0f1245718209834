//! Canonical stream parts.
//!
//! Every backend's incremental output is normalized into a sequence of
//! [`StreamPart`]s carried by a [`PartStream`]:
//!
//! | Part | Meaning |
//! |------|---------|
//! | [`TextDelta`](StreamPart::TextDelta) | a fragment of generated text |
//! | [`ToolCallDelta`](StreamPart::ToolCallDelta) | a fragment of a tool call's argument JSON |
//! | [`ToolCall`](StreamPart::ToolCall) | a complete tool call whose arguments are valid JSON |
//! | [`FinalMetadata`](StreamPart::FinalMetadata) | finish reason and usage; always last if present |
//! | [`Error`](StreamPart::Error) | an advisory error; the stream keeps going |
//!
//! Parts arrive in backend-emission order. The sequence ends only when
//! the transport ends; an `Error` part never terminates it by itself.
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use llm_bridge_core::{PartStream, StreamPart};
//!
//! async fn print_stream(mut stream: PartStream) {
//!     while let Some(part) = stream.next().await {
//!         match part {
//!             StreamPart::TextDelta { text_delta } => print!("{text_delta}"),
//!             StreamPart::FinalMetadata { finish_reason, .. } => {
//!                 println!("\n[done: {finish_reason:?}]");
//!             }
//!             StreamPart::Error(error) => eprintln!("stream error: {}", error.message),
//!             _ => {}
//!         }
//!     }
//! }
//! ```

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::usage::Usage;

/// A pinned, boxed, `Send` stream of [`StreamPart`]s.
pub type PartStream = Pin<Box<dyn Stream<Item = StreamPart> + Send>>;

/// One normalized event in a model's incremental output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamPart {
    /// A fragment of the model's text output.
    TextDelta {
        /// The text fragment.
        text_delta: String,
    },
    /// A fragment of a tool call's argument text.
    ToolCallDelta {
        /// Backend-assigned index; scoped to one stream.
        index: u32,
        /// Identifier of the call.
        tool_call_id: String,
        /// The tool being called.
        tool_name: String,
        /// Only the new fragment, never the accumulated text.
        args_text_delta: String,
    },
    /// A complete tool call.
    ToolCall {
        /// Identifier of the call.
        tool_call_id: String,
        /// The tool being called.
        tool_name: String,
        /// Argument text; always syntactically valid JSON.
        args: String,
    },
    /// Finish reason and token usage. Last part of the stream if present.
    FinalMetadata {
        /// Why the model stopped.
        finish_reason: FinishReason,
        /// Token counts reported by the backend.
        usage: Usage,
    },
    /// An advisory error.
    Error(StreamError),
}

impl StreamPart {
    /// Shorthand for a [`TextDelta`](Self::TextDelta) part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::TextDelta {
            text_delta: text.into(),
        }
    }

    /// Shorthand for an [`Error`](Self::Error) part.
    pub fn error(error: impl Into<StreamError>) -> Self {
        Self::Error(error.into())
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    /// Natural end or stop sequence.
    Stop,
    /// Maximum token count reached.
    Length,
    /// A content filter stopped the model.
    ContentFilter,
    /// The model called tools.
    ToolCalls,
    /// The model stopped because of an error.
    Error,
    /// Any other reason.
    Other,
}

/// The payload of an [`Error`](StreamPart::Error) part.
///
/// A cloneable, serializable projection of the underlying failure, so
/// parts can be replayed, compared and forwarded to UI layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamError {
    /// Human-readable description of the failure.
    pub message: String,
    /// Whether the failure is transient.
    #[serde(default)]
    pub retryable: bool,
}

impl StreamError {
    /// Creates a non-retryable stream error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

impl From<&LlmError> for StreamError {
    fn from(err: &LlmError) -> Self {
        Self {
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

impl From<LlmError> for StreamError {
    fn from(err: LlmError) -> Self {
        Self::from(&err)
    }
}

/// A complete tool call as returned by a non-streaming call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Identifier of the call.
    pub tool_call_id: String,
    /// The tool being called.
    pub tool_name: String,
    /// Argument text as returned by the backend.
    pub args: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[test]
    fn test_stream_part_wire_shape() {
        let value = serde_json::to_value(StreamPart::text("Hi")).unwrap();
        assert_eq!(value, json!({"type": "text-delta", "text_delta": "Hi"}));

        let value = serde_json::to_value(StreamPart::ToolCallDelta {
            index: 0,
            tool_call_id: "call_1".into(),
            tool_name: "json".into(),
            args_text_delta: "{\"a\"".into(),
        })
        .unwrap();
        assert_eq!(value["type"], "tool-call-delta");
        assert_eq!(value["index"], 0);

        let value = serde_json::to_value(StreamPart::FinalMetadata {
            finish_reason: FinishReason::ContentFilter,
            usage: Usage::default(),
        })
        .unwrap();
        assert_eq!(value["type"], "final-metadata");
        assert_eq!(value["finish_reason"], "content-filter");
    }

    #[test]
    fn test_error_part_from_llm_error() {
        let err = LlmError::Http {
            status: Some(http::StatusCode::BAD_GATEWAY),
            message: "upstream".into(),
            retryable: true,
        };
        let part = StreamPart::error(&err);
        assert!(matches!(
            &part,
            StreamPart::Error(error) if error.retryable && error.message.contains("upstream")
        ));
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["retryable"], true);
    }

    #[test]
    fn test_stream_error_deserialize_defaults_retryable() {
        let err: StreamError = serde_json::from_value(json!({"message": "x"})).unwrap();
        assert_eq!(err, StreamError::new("x"));
    }

    #[tokio::test]
    async fn test_part_stream_continues_after_error() {
        let parts = vec![
            StreamPart::text("a"),
            StreamPart::error(StreamError::new("hiccup")),
            StreamPart::text("b"),
        ];
        let stream: PartStream = Box::pin(futures::stream::iter(parts));
        let collected: Vec<_> = stream.collect().await;
        assert_eq!(collected.len(), 3);
        assert_eq!(collected[2], StreamPart::text("b"));
    }

    #[test]
    fn test_part_stream_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<PartStream>();
    }
}
