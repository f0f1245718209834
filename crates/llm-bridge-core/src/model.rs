//! The model contract and per-call options.
//!
//! This module defines two core abstractions:
//!
//! - **[`LanguageModel`]**: the trait every backend implements. It uses
//!   Rust 2024's native async-fn-in-traits, so implementations are plain
//!   `async fn`s.
//!
//! - **[`DynLanguageModel`]**: an object-safe mirror of `LanguageModel`
//!   that uses boxed futures. A blanket
//!   `impl<T: LanguageModel> DynLanguageModel for T` bridges the two, so
//!   any concrete model can be stored as `Box<dyn DynLanguageModel>` or
//!   `Arc<dyn DynLanguageModel>`.
//!
//! # Call modes
//!
//! Every call carries a [`CallMode`]. A backend that cannot implement the
//! requested mode must fail with
//! [`LlmError::UnsupportedMode`](crate::LlmError::UnsupportedMode) before
//! doing any network work:
//!
//! ```rust,ignore
//! match &options.mode {
//!     CallMode::Regular { tools } => { /* chat request with tools */ }
//!     CallMode::ObjectJson => { /* set the vendor's JSON response format */ }
//!     CallMode::ObjectGrammar { .. } => {
//!         return Err(LlmError::unsupported_mode("my-vendor", options.mode.name()));
//!     }
//!     CallMode::ObjectTool { tool } => { /* force `tool` as the only choice */ }
//! }
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::mode::{CallMode, ObjectMode};
use crate::prompt::Prompt;
use crate::stream::{FinishReason, PartStream, ToolCallRecord};
use crate::usage::Usage;

/// The trait every language-model backend implements.
///
/// # Object safety
///
/// `LanguageModel` is not object-safe because its methods return
/// `impl Future`. Use [`DynLanguageModel`] for dynamic dispatch; every
/// `LanguageModel` implements it through a blanket impl.
pub trait LanguageModel: Send + Sync {
    /// Performs one non-streaming call.
    fn generate(
        &self,
        options: &CallOptions,
    ) -> impl Future<Output = Result<GenerateResponse, LlmError>> + Send;

    /// Performs one streaming call.
    ///
    /// The returned [`PartStream`] yields normalized parts as the backend
    /// produces them. If a `FinalMetadata` part is produced it is the last
    /// one; `Error` parts do not end the stream.
    fn stream(
        &self,
        options: &CallOptions,
    ) -> impl Future<Output = Result<PartStream, LlmError>> + Send;

    /// Returns static metadata describing this model.
    fn metadata(&self) -> ModelMetadata;
}

/// Object-safe counterpart of [`LanguageModel`] for dynamic dispatch.
///
/// ```rust,no_run
/// use llm_bridge_core::{CallOptions, DynLanguageModel};
///
/// async fn ask(model: &dyn DynLanguageModel, options: &CallOptions) -> Option<String> {
///     model.generate_boxed(options).await.ok()?.text
/// }
/// ```
pub trait DynLanguageModel: Send + Sync {
    /// Boxed-future version of [`LanguageModel::generate`].
    fn generate_boxed<'a>(
        &'a self,
        options: &'a CallOptions,
    ) -> Pin<Box<dyn Future<Output = Result<GenerateResponse, LlmError>> + Send + 'a>>;

    /// Boxed-future version of [`LanguageModel::stream`].
    fn stream_boxed<'a>(
        &'a self,
        options: &'a CallOptions,
    ) -> Pin<Box<dyn Future<Output = Result<PartStream, LlmError>> + Send + 'a>>;

    /// Returns static metadata describing this model.
    fn metadata(&self) -> ModelMetadata;
}

impl<T: LanguageModel> DynLanguageModel for T {
    fn generate_boxed<'a>(
        &'a self,
        options: &'a CallOptions,
    ) -> Pin<Box<dyn Future<Output = Result<GenerateResponse, LlmError>> + Send + 'a>> {
        Box::pin(self.generate(options))
    }

    fn stream_boxed<'a>(
        &'a self,
        options: &'a CallOptions,
    ) -> Pin<Box<dyn Future<Output = Result<PartStream, LlmError>> + Send + 'a>> {
        Box::pin(self.stream(options))
    }

    fn metadata(&self) -> ModelMetadata {
        LanguageModel::metadata(self)
    }
}

/// Version marker of the model contract a backend implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecificationVersion {
    /// The first (and current) contract version.
    #[default]
    V1,
}

/// Describes a model instance.
///
/// The `provider` field uses [`Cow<'static, str>`] so built-in backends
/// can use a static name while user-created ones can use owned strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// The contract version this model implements.
    #[serde(default)]
    pub specification_version: SpecificationVersion,
    /// Provider identifier (e.g. `"openai"`).
    pub provider: Cow<'static, str>,
    /// Model identifier (e.g. `"gpt-4o"`).
    pub model_id: String,
    /// The object mode used when a caller doesn't pick one. `None` means
    /// callers must always pass an explicit mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_object_mode: Option<ObjectMode>,
}

impl ModelMetadata {
    /// Creates V1 metadata with no preferred object mode.
    pub fn new(provider: impl Into<Cow<'static, str>>, model_id: impl Into<String>) -> Self {
        Self {
            specification_version: SpecificationVersion::V1,
            provider: provider.into(),
            model_id: model_id.into(),
            preferred_object_mode: None,
        }
    }

    /// Declares the preferred object mode.
    #[must_use]
    pub fn with_preferred_object_mode(mut self, mode: ObjectMode) -> Self {
        self.preferred_object_mode = Some(mode);
        self
    }
}

/// How the caller supplied the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// A single prompt string.
    #[default]
    Prompt,
    /// A list of messages.
    Messages,
}

/// Sampling and transport settings shared by every call.
///
/// Every field is optional; `None` leaves the backend's default in place.
///
/// ```rust
/// use llm_bridge_core::CallSettings;
///
/// let settings = CallSettings {
///     temperature: Some(0.0),
///     max_tokens: Some(256),
///     ..Default::default()
/// };
/// assert!(settings.seed.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallSettings {
    /// Maximum number of tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Penalty for repeating information already in the prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    /// Penalty for repeating the same words.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// Seed for deterministic sampling, where supported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Per-call timeout. Skipped during serialization.
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

/// Everything a backend needs for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallOptions {
    /// How the output is elicited.
    pub mode: CallMode,
    /// The normalized prompt.
    pub prompt: Prompt,
    /// How the caller supplied the conversation.
    #[serde(default)]
    pub input_format: InputFormat,
    /// Sampling and transport settings.
    #[serde(default)]
    pub settings: CallSettings,
}

impl CallOptions {
    /// Creates options with default settings and the `prompt` input format.
    pub fn new(mode: CallMode, prompt: Prompt) -> Self {
        Self {
            mode,
            prompt,
            input_format: InputFormat::default(),
            settings: CallSettings::default(),
        }
    }
}

/// The result of a non-streaming call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Text output, if the model produced any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Tool calls, in the order the model made them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
    /// Why the model stopped.
    pub finish_reason: FinishReason,
    /// Token counts.
    #[serde(default)]
    pub usage: Usage,
}
