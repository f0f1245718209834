//! Unified error type for model calls and object generation.
//!
//! Backend adapters map their native failures into [`LlmError`] and the
//! object pipeline adds its own materialization failures, so callers match
//! against a single type regardless of which backend produced the error.
//!
//! # Taxonomy
//!
//! | Variant | Raised when |
//! |---------|-------------|
//! | [`UnsupportedMode`](LlmError::UnsupportedMode) | the backend cannot implement the requested call mode |
//! | [`NoDefaultObjectMode`](LlmError::NoDefaultObjectMode) | no mode was given and the model declares none |
//! | [`NoObjectGenerated`](LlmError::NoObjectGenerated) | the response lacks the field the mode expects |
//! | [`ObjectParse`](LlmError::ObjectParse) | the raw text is not valid JSON |
//! | [`ObjectValidation`](LlmError::ObjectValidation) | the parsed JSON does not satisfy the schema |
//! | [`Provider`](LlmError::Provider) / [`Http`](LlmError::Http) | the backend or its transport failed |
//!
//! Nothing in this workspace retries. The `retryable` flag on provider
//! errors is advisory for callers that compose their own retry policy:
//!
//! ```rust
//! use llm_bridge_core::LlmError;
//!
//! fn should_retry(err: &LlmError) -> bool {
//!     err.is_provider_error() && err.is_retryable()
//! }
//! ```

use serde_json::Value;

use crate::mode::ObjectMode;
use crate::schema::ValidationIssue;
use crate::stream::StreamError;

/// The unified error type returned by model calls and the object pipeline.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LlmError {
    /// The backend cannot implement the requested (or defaulted) call mode.
    #[error("{provider} does not support {mode} mode")]
    UnsupportedMode {
        /// Provider that rejected the mode.
        provider: String,
        /// The rejected mode, as its wire name (e.g. `"object-grammar"`).
        mode: String,
    },

    /// No object mode was requested and the model declares no preferred one.
    #[error("model {provider}/{model_id} has no default object generation mode")]
    NoDefaultObjectMode {
        /// Provider of the model.
        provider: String,
        /// Model identifier.
        model_id: String,
    },

    /// The response did not contain the output the object mode expects.
    #[error("no object generated in {mode} mode: {message}")]
    NoObjectGenerated {
        /// The object mode the call used.
        mode: ObjectMode,
        /// What was missing.
        message: String,
    },

    /// The raw result text is not syntactically valid JSON.
    #[error("failed to parse object JSON: {source}")]
    ObjectParse {
        /// The raw text returned by the model.
        value_text: String,
        /// The JSON parser's error.
        #[source]
        source: serde_json::Error,
    },

    /// The parsed JSON does not satisfy the target schema.
    #[error("object failed schema validation: {}", join_issues(.issues))]
    ObjectValidation {
        /// The raw text returned by the model.
        value_text: String,
        /// The parsed value that failed validation.
        value: Value,
        /// One entry per violation.
        issues: Vec<ValidationIssue>,
    },

    /// An opaque backend failure that doesn't map to another variant.
    #[error("Provider error ({code}): {message}")]
    Provider {
        /// Provider-defined error code (e.g. `"overloaded"`).
        code: String,
        /// Human-readable error description.
        message: String,
        /// Whether the caller may retry this request.
        retryable: bool,
    },

    /// A transport-level backend failure.
    ///
    /// `status` is `None` when no response was received at all.
    #[error("HTTP error (status={status:?}): {message}")]
    Http {
        /// The HTTP status code, if one was received.
        status: Option<http::StatusCode>,
        /// A human-readable description of the failure.
        message: String,
        /// Whether the caller may retry this request.
        retryable: bool,
    },

    /// The call exceeded its deadline.
    #[error("Operation timed out after {elapsed_ms}ms")]
    Timeout {
        /// Milliseconds elapsed before the timeout fired.
        elapsed_ms: u64,
    },

    /// The caller-supplied prompt could not be converted.
    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    /// The request was malformed (e.g. an invalid JSON schema).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A tool call returned by the model names an unknown tool or carries
    /// arguments that don't match the tool's parameters.
    #[error("Invalid tool call ({tool_name}): {message}")]
    InvalidToolCall {
        /// The tool name the model used.
        tool_name: String,
        /// What was wrong with the call.
        message: String,
    },

    /// An `error` part surfaced from a model stream.
    #[error("Stream error: {}", .0.message)]
    Stream(StreamError),
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl LlmError {
    /// Builds an [`UnsupportedMode`](Self::UnsupportedMode) error.
    ///
    /// Backends call this at the top of `generate` / `stream`, before any
    /// network interaction.
    pub fn unsupported_mode(provider: impl Into<String>, mode: &str) -> Self {
        Self::UnsupportedMode {
            provider: provider.into(),
            mode: mode.to_owned(),
        }
    }

    /// Returns `true` for failures raised by the backend or its transport.
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. } | Self::Http { .. } | Self::Timeout { .. }
        )
    }

    /// Returns `true` if the error is transient and a retry may succeed.
    ///
    /// ```rust
    /// use llm_bridge_core::LlmError;
    ///
    /// assert!(LlmError::Timeout { elapsed_ms: 5000 }.is_retryable());
    /// assert!(!LlmError::InvalidPrompt("empty".into()).is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { retryable, .. } | Self::Provider { retryable, .. } => *retryable,
            Self::Stream(err) => err.retryable,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// The raw model text attached to parse and validation failures.
    pub fn value_text(&self) -> Option<&str> {
        match self {
            Self::ObjectParse { value_text, .. } | Self::ObjectValidation { value_text, .. } => {
                Some(value_text)
            }
            _ => None,
        }
    }
}

impl From<StreamError> for LlmError {
    fn from(err: StreamError) -> Self {
        Self::Stream(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_error(text: &str) -> LlmError {
        let source = serde_json::from_str::<Value>(text).unwrap_err();
        LlmError::ObjectParse {
            value_text: text.into(),
            source,
        }
    }

    #[test]
    fn test_error_display_unsupported_mode() {
        let err = LlmError::unsupported_mode("mistral", "object-grammar");
        assert_eq!(
            err.to_string(),
            "mistral does not support object-grammar mode"
        );
    }

    #[test]
    fn test_error_display_no_default_mode() {
        let err = LlmError::NoDefaultObjectMode {
            provider: "mock".into(),
            model_id: "m1".into(),
        };
        assert!(err.to_string().contains("mock/m1"));
    }

    #[test]
    fn test_error_display_no_object_generated() {
        let err = LlmError::NoObjectGenerated {
            mode: ObjectMode::Tool,
            message: "no tool call".into(),
        };
        let display = err.to_string();
        assert!(display.contains("tool"));
        assert!(display.contains("no tool call"));
    }

    #[test]
    fn test_object_parse_keeps_text_and_source() {
        use std::error::Error;
        let err = parse_error("not json");
        assert_eq!(err.value_text(), Some("not json"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_error_display_validation_joins_issues() {
        let err = LlmError::ObjectValidation {
            value_text: "{}".into(),
            value: serde_json::json!({}),
            issues: vec![
                ValidationIssue {
                    path: String::new(),
                    keyword: "required".into(),
                    message: "\"name\" is a required property".into(),
                    actual: serde_json::json!({}),
                },
                ValidationIssue {
                    path: "/age".into(),
                    keyword: "type".into(),
                    message: "\"x\" is not of type \"integer\"".into(),
                    actual: serde_json::json!("x"),
                },
            ],
        };
        let display = err.to_string();
        assert!(display.contains("required property"));
        assert!(display.contains("; "));
        assert_eq!(err.value_text(), Some("{}"));
    }

    #[test]
    fn test_error_display_http() {
        let err = LlmError::Http {
            status: Some(http::StatusCode::TOO_MANY_REQUESTS),
            message: "rate limited".into(),
            retryable: true,
        };
        let display = err.to_string();
        assert!(display.contains("429"));
        assert!(display.contains("rate limited"));
    }

    #[test]
    fn test_provider_error_classification() {
        assert!(
            LlmError::Provider {
                code: "overloaded".into(),
                message: "busy".into(),
                retryable: true,
            }
            .is_provider_error()
        );
        assert!(LlmError::Timeout { elapsed_ms: 1 }.is_provider_error());
        assert!(!parse_error("{").is_provider_error());
        assert!(!LlmError::unsupported_mode("x", "object-json").is_provider_error());
    }

    #[test]
    fn test_retryable_flags() {
        let err = LlmError::Provider {
            code: "bad_request".into(),
            message: "invalid".into(),
            retryable: false,
        };
        assert!(!err.is_retryable());

        let err = LlmError::Stream(StreamError {
            message: "reset".into(),
            retryable: true,
        });
        assert!(err.is_retryable());
        assert!(!parse_error("{").is_retryable());
    }

    #[test]
    fn test_from_stream_error() {
        let err: LlmError = StreamError::new("boom").into();
        assert!(matches!(err, LlmError::Stream(ref e) if e.message == "boom"));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LlmError>();
    }
}
