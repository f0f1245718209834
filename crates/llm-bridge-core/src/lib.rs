//! # llm-bridge-core
//!
//! Provider-agnostic vocabulary for talking to large language models.
//!
//! This crate defines the shared types every backend adapter speaks: the
//! normalized prompt, the per-call [`CallMode`], the versioned
//! [`LanguageModel`] contract, canonical [`StreamPart`]s, usage counts,
//! JSON Schema handling and the unified [`LlmError`]. It contains no
//! vendor-specific code and performs no I/O.
//!
//! The object pipeline, the partial-object streamer and the stream
//! normalizer live in the `llm-bridge` crate, which re-exports everything
//! here.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`prompt`] | System instruction plus role-typed messages |
//! | [`mode`] | [`CallMode`], [`ObjectMode`] and tool definitions |
//! | [`model`] | The [`LanguageModel`] trait and call options |
//! | [`stream`] | [`StreamPart`] and the [`PartStream`] alias |
//! | [`schema`] | [`JsonSchema`] and validation issues |
//! | [`usage`] | Token counts |
//! | [`error`] | Unified [`LlmError`] |

#![warn(missing_docs)]

pub mod error;
pub mod mode;
pub mod model;
pub mod prompt;
pub mod schema;
pub mod stream;
pub mod usage;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;

pub use error::LlmError;
pub use mode::{CallMode, ObjectMode, ToolDefinition};
pub use model::{
    CallOptions, CallSettings, DynLanguageModel, GenerateResponse, InputFormat, LanguageModel,
    ModelMetadata, SpecificationVersion,
};
pub use prompt::{Message, Prompt};
pub use schema::{JsonSchema, ValidationIssue};
pub use stream::{FinishReason, PartStream, StreamError, StreamPart, ToolCallRecord};
pub use usage::Usage;
