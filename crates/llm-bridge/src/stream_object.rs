//! Streaming structured object generation.
//!
//! [`stream_object`] resolves the mode and shapes the request exactly like
//! [`generate_object`](crate::generate_object), then makes one streaming
//! call. The returned [`StreamObjectResult`] owns the model stream and is
//! consumed once, either as a stream of deep-partial snapshots or as a
//! final validated object.
//!
//! Snapshots are produced by a [`PartialObjectAccumulator`]: each new
//! fragment (text deltas in `json`/`grammar` mode, argument deltas of the
//! first tool call in `tool` mode) is appended, the whole text is tolerantly parsed, and the
//! result is emitted only if it differs structurally from the previous
//! snapshot. Snapshots are not validated.
//!
//! `Error` parts from the model stream surface as `Err(LlmError::Stream)`
//! items; the sequence continues after them and ends when the model
//! stream ends.
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use llm_bridge::{stream_object, ObjectParams, ObjectSchema};
//! use llm_bridge_core::{DynLanguageModel, LlmError, ObjectMode};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, schemars::JsonSchema)]
//! struct Recipe {
//!     name: String,
//!     steps: Vec<String>,
//! }
//!
//! # async fn example(model: &dyn DynLanguageModel) -> Result<(), LlmError> {
//! let schema = ObjectSchema::<Recipe>::from_type()?;
//! let result = stream_object(
//!     model,
//!     &schema,
//!     ObjectParams {
//!         mode: Some(ObjectMode::Json),
//!         prompt: Some("A lasagna recipe".into()),
//!         ..Default::default()
//!     },
//! )
//! .await?;
//!
//! let mut partials = result.partial_object_stream();
//! while let Some(snapshot) = partials.next().await {
//!     println!("{}", snapshot?);
//! }
//! # Ok(())
//! # }
//! ```

use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};
use llm_bridge_core::{
    DynLanguageModel, FinishReason, LlmError, ObjectMode, PartStream, StreamError, StreamPart,
    Usage,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{Span, debug, field, instrument};

use crate::generate_object::{GenerateObjectResult, materialize};
use crate::object_schema::ObjectSchema;
use crate::partial_json::parse_partial_json;
use crate::request::{ObjectParams, object_call_options, resolve_mode};

/// A stream of deep-partial object snapshots.
pub type PartialObjectStream = Pin<Box<dyn Stream<Item = Result<Value, LlmError>> + Send>>;

/// Starts a streaming object generation.
///
/// Fails before any backend call with [`LlmError::NoDefaultObjectMode`]
/// or [`LlmError::InvalidPrompt`]; any error the backend returns when
/// opening the stream is propagated.
#[instrument(
    skip_all,
    fields(provider = field::Empty, model = field::Empty, mode = field::Empty)
)]
pub async fn stream_object<T>(
    model: &dyn DynLanguageModel,
    schema: &ObjectSchema<T>,
    params: ObjectParams,
) -> Result<StreamObjectResult<T>, LlmError> {
    let metadata = model.metadata();
    let span = Span::current();
    span.record("provider", &*metadata.provider);
    span.record("model", metadata.model_id.as_str());

    let mode = resolve_mode(params.mode, &metadata)?;
    span.record("mode", field::display(mode));

    let options = object_call_options(mode, schema.json_schema(), params)?;
    let stream = model.stream_boxed(&options).await?;

    Ok(StreamObjectResult {
        mode,
        stream,
        schema: schema.clone(),
    })
}

/// An in-flight object stream. Consumed by exactly one of
/// [`partial_object_stream`](Self::partial_object_stream) or
/// [`collect_object`](Self::collect_object).
pub struct StreamObjectResult<T> {
    mode: ObjectMode,
    stream: PartStream,
    schema: ObjectSchema<T>,
}

impl<T> std::fmt::Debug for StreamObjectResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamObjectResult")
            .field("mode", &self.mode)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl<T> StreamObjectResult<T> {
    /// The object mode the request used.
    pub fn mode(&self) -> ObjectMode {
        self.mode
    }

    /// Turns the model stream into deep-partial snapshots.
    ///
    /// Dropping the returned stream drops the model stream and all
    /// accumulated text.
    pub fn partial_object_stream(self) -> PartialObjectStream {
        let state = (
            self.stream,
            FragmentSelector::new(self.mode),
            PartialObjectAccumulator::new(),
            0_usize,
        );

        let snapshots = stream::unfold(
            state,
            |(mut parts, mut selector, mut acc, mut emitted)| async move {
                loop {
                    let Some(part) = parts.next().await else {
                        debug!(emitted, "Partial object stream ended");
                        return None;
                    };
                    match selector.select(part) {
                        Fragment::Text(text) => {
                            if let Some(snapshot) = acc.push(&text) {
                                emitted += 1;
                                return Some((Ok(snapshot), (parts, selector, acc, emitted)));
                            }
                        }
                        Fragment::Error(err) => {
                            let item = Err(LlmError::Stream(err));
                            return Some((item, (parts, selector, acc, emitted)));
                        }
                        Fragment::Finish(..) | Fragment::Skip => {}
                    }
                }
            },
        );

        Box::pin(snapshots)
    }
}

impl<T: DeserializeOwned> StreamObjectResult<T> {
    /// Drains the stream and materializes the final object.
    ///
    /// The first `Error` part is returned as [`LlmError::Stream`]. An
    /// empty stream is [`LlmError::NoObjectGenerated`]; otherwise the
    /// accumulated text is parsed and validated as in
    /// [`generate_object`](crate::generate_object).
    pub async fn collect_object(self) -> Result<GenerateObjectResult<T>, LlmError> {
        let Self {
            mode,
            mut stream,
            schema,
        } = self;

        let mut selector = FragmentSelector::new(mode);
        let mut raw_text = String::new();
        let mut finish_reason = FinishReason::Other;
        let mut usage = Usage::default();

        while let Some(part) = stream.next().await {
            match selector.select(part) {
                Fragment::Text(text) => raw_text.push_str(&text),
                Fragment::Error(err) => return Err(LlmError::Stream(err)),
                Fragment::Finish(reason, u) => {
                    finish_reason = reason;
                    usage = u;
                }
                Fragment::Skip => {}
            }
        }

        if raw_text.is_empty() {
            return Err(LlmError::NoObjectGenerated {
                mode,
                message: "stream ended without object text".into(),
            });
        }

        let object = materialize(&schema, &raw_text)?;
        Ok(GenerateObjectResult {
            object,
            raw_text,
            finish_reason,
            usage,
        })
    }
}

enum Fragment {
    Text(String),
    Error(StreamError),
    Finish(FinishReason, Usage),
    Skip,
}

/// Picks the parts that carry object text for one stream.
///
/// In `tool` mode the object is the arguments of the first tool call
/// seen; deltas for any other call index are skipped.
struct FragmentSelector {
    mode: ObjectMode,
    tool_index: Option<u32>,
}

impl FragmentSelector {
    fn new(mode: ObjectMode) -> Self {
        Self {
            mode,
            tool_index: None,
        }
    }

    fn select(&mut self, part: StreamPart) -> Fragment {
        match (self.mode, part) {
            (ObjectMode::Json | ObjectMode::Grammar, StreamPart::TextDelta { text_delta }) => {
                Fragment::Text(text_delta)
            }
            (
                ObjectMode::Tool,
                StreamPart::ToolCallDelta {
                    index,
                    args_text_delta,
                    ..
                },
            ) => {
                let locked = *self.tool_index.get_or_insert(index);
                if locked == index {
                    Fragment::Text(args_text_delta)
                } else {
                    debug!(index, locked, "Skipping delta of another tool call");
                    Fragment::Skip
                }
            }
            (_, StreamPart::Error(err)) => Fragment::Error(err),
            (
                _,
                StreamPart::FinalMetadata {
                    finish_reason,
                    usage,
                },
            ) => Fragment::Finish(finish_reason, usage),
            _ => Fragment::Skip,
        }
    }
}

/// Per-stream state of the partial-object streamer.
///
/// Owned by the consuming stream; nothing else shares it.
///
/// ```rust
/// use llm_bridge::PartialObjectAccumulator;
/// use serde_json::json;
///
/// let mut acc = PartialObjectAccumulator::new();
/// assert_eq!(acc.push("{\"name\":"), Some(json!({})));
/// assert_eq!(acc.push(" "), None);
/// assert_eq!(acc.push("\"Rin\"}"), Some(json!({"name": "Rin"})));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PartialObjectAccumulator {
    accumulated_text: String,
    latest_emitted: Option<Value>,
}

impl PartialObjectAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `fragment` and returns a snapshot if the parsed value
    /// differs from the last emitted one.
    pub fn push(&mut self, fragment: &str) -> Option<Value> {
        self.accumulated_text.push_str(fragment);
        let current = parse_partial_json(&self.accumulated_text).into_value()?;
        if self.latest_emitted.as_ref() == Some(&current) {
            return None;
        }
        self.latest_emitted = Some(current.clone());
        Some(current)
    }

    /// All text appended so far.
    pub fn accumulated_text(&self) -> &str {
        &self.accumulated_text
    }

    /// The last emitted snapshot.
    pub fn latest_emitted(&self) -> Option<&Value> {
        self.latest_emitted.as_ref()
    }
}
