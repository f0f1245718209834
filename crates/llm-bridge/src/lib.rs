//! # llm-bridge
//!
//! Structured object generation and stream normalization on top of any
//! backend that implements [`LanguageModel`].
//!
//! Backends speak the shared vocabulary of `llm-bridge-core`, which this
//! crate re-exports in full. On top of it, this crate provides:
//!
//! - [`generate_object`](fn@generate_object): one schema-valid typed object from one call, in
//!   `json`, `grammar` or `tool` mode
//! - [`stream_object`](fn@stream_object): deep-partial snapshots of the object while it is
//!   being generated, backed by a tolerant [`partial_json`] parser
//! - [`normalize`]: turns backend chunk streams into canonical
//!   [`StreamPart`]s, with a [`ToolCallAccumulator`] for
//!   fragmented tool calls
//! - [`generate_text`] and [`stream_text`] for free-form dialogue with
//!   tools
//!
//! ```text
//!   backend adapter ──chunks──▶ normalize ──StreamPart──▶ stream_object
//!          │                                                    │
//!          └── impl LanguageModel ◀── generate_object ◀── ObjectSchema<T>
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use llm_bridge::{generate_object, DynLanguageModel, LlmError, ObjectParams, ObjectSchema};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize, schemars::JsonSchema)]
//! struct Invoice {
//!     number: String,
//!     total_cents: u64,
//! }
//!
//! # async fn example(model: &dyn DynLanguageModel) -> Result<(), LlmError> {
//! let schema = ObjectSchema::<Invoice>::from_type()?;
//! let invoice = generate_object(
//!     model,
//!     &schema,
//!     ObjectParams {
//!         prompt: Some("Extract the invoice from: ...".into()),
//!         ..Default::default()
//!     },
//! )
//! .await?
//! .object;
//! println!("{invoice:?}");
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`generate_object`](mod@generate_object) | Non-streaming object generation |
//! | [`stream_object`](mod@stream_object) | Partial-object streaming |
//! | [`partial_json`] | Tolerant parsing of truncated JSON |
//! | [`normalize`] | Backend chunk streams to [`StreamPart`]s |
//! | [`accumulator`] | Reassembly of fragmented tool calls |
//! | [`object_schema`] | Typed schema handles |
//! | [`prompt_input`] | Prompt-or-messages arguments |
//! | [`request`] | Mode resolution and request shaping |
//! | [`text`] | Free-form text generation |

#![warn(missing_docs)]

pub mod accumulator;
pub mod generate_object;
pub mod normalize;
pub mod object_schema;
pub mod partial_json;
pub mod prompt_input;
pub mod request;
pub mod stream_object;
pub mod text;

pub use llm_bridge_core::*;

pub use accumulator::ToolCallAccumulator;
pub use generate_object::{GenerateObjectResult, generate_object};
pub use normalize::{ChunkNormalizer, OneShotModel, normalize_stream};
pub use object_schema::ObjectSchema;
pub use partial_json::{PartialJson, parse_partial_json};
pub use prompt_input::PromptInput;
pub use request::ObjectParams;
pub use stream_object::{
    PartialObjectAccumulator, PartialObjectStream, StreamObjectResult, stream_object,
};
pub use text::{
    GenerateTextResult, ParsedToolCall, StreamTextResult, TextParams, generate_text, stream_text,
};
