//! Normalizes backend-native incremental output into [`StreamPart`]s.
//!
//! A backend adapter decodes its transport (SSE, NDJSON, ...) into
//! native chunks and hands them to a [`ChunkNormalizer`];
//! [`normalize_stream`] drives the normalizer and produces the canonical
//! [`PartStream`].
//!
//! | Normalizer | Input |
//! |------------|-------|
//! | [`ChatDeltaNormalizer`] | chat-completion delta chunks ([`ChatChunk`]) as sent by OpenAI- and Mistral-compatible backends |
//! | [`OneShotNormalizer`] | a complete [`GenerateResponse`] from a backend without native streaming |
//!
//! Backends without delta support can be wrapped in [`OneShotModel`] to
//! get a `stream` implementation for free.

use futures::stream::{self, Stream, StreamExt};
use llm_bridge_core::{
    CallOptions, FinishReason, GenerateResponse, LanguageModel, LlmError, ModelMetadata,
    PartStream, StreamError, StreamPart, Usage,
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::accumulator::{ToolCallAccumulator, ToolCallFragment};

/// Turns one backend's native chunks into canonical parts.
///
/// A normalizer holds the per-stream state (tool-call records, the
/// pending finish reason) and must be created fresh for every stream.
pub trait ChunkNormalizer {
    /// The backend-native chunk type.
    type Chunk;

    /// Converts one chunk into zero or more parts.
    fn normalize(&mut self, chunk: Self::Chunk) -> Vec<StreamPart>;

    /// Converts a transport failure into parts. The stream continues.
    fn error(&mut self, error: &LlmError) -> Vec<StreamPart> {
        vec![StreamPart::error(error)]
    }

    /// Called once when the transport ends; returns the trailing parts.
    fn finish(&mut self) -> Vec<StreamPart>;
}

/// Drives `normalizer` over a stream of native chunks.
///
/// Transport errors become [`Error`](StreamPart::Error) parts and don't
/// end the sequence; the sequence ends when `chunks` ends, after the
/// normalizer's [`finish`](ChunkNormalizer::finish) parts. At most one
/// chunk is buffered.
pub fn normalize_stream<S, N>(chunks: S, normalizer: N) -> PartStream
where
    S: Stream<Item = Result<N::Chunk, LlmError>> + Send + 'static,
    N: ChunkNormalizer + Send + 'static,
    N::Chunk: Send,
{
    let state = Some((Box::pin(chunks), normalizer));
    let parts = stream::unfold(state, |state| async move {
        let (mut chunks, mut normalizer) = state?;
        match chunks.next().await {
            Some(Ok(chunk)) => Some((normalizer.normalize(chunk), Some((chunks, normalizer)))),
            Some(Err(err)) => {
                warn!(error = %err, "Transport error in model stream");
                Some((normalizer.error(&err), Some((chunks, normalizer))))
            }
            None => Some((normalizer.finish(), None)),
        }
    })
    .flat_map(stream::iter);

    Box::pin(parts)
}

// ── Chat-completion deltas ──────────────────────────────────────────

/// One streamed chat-completion chunk (the `data:` payload of an SSE
/// event).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChunk {
    /// Choices in this chunk; only the first is used.
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    /// Token usage, usually only on the last chunk.
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

/// A choice within a [`ChatChunk`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChoice {
    /// The incremental content.
    #[serde(default)]
    pub delta: ChatDelta,
    /// Set on the choice's final chunk.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental content of a [`ChatChoice`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatDelta {
    /// A text fragment.
    #[serde(default)]
    pub content: Option<String>,
    /// Tool-call fragments.
    #[serde(default)]
    pub tool_calls: Option<Vec<ChatToolCallDelta>>,
}

/// A tool-call fragment within a [`ChatDelta`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatToolCallDelta {
    /// Index of the call within the stream.
    pub index: u32,
    /// Call id; present on the first fragment.
    #[serde(default)]
    pub id: Option<String>,
    /// Function name and argument fragment.
    #[serde(default)]
    pub function: Option<ChatFunctionDelta>,
}

/// Function part of a [`ChatToolCallDelta`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatFunctionDelta {
    /// Function name; present on the first fragment.
    #[serde(default)]
    pub name: Option<String>,
    /// Argument text fragment.
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Token usage reported in a [`ChatChunk`].
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ChatUsage {
    /// Prompt tokens.
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Completion tokens.
    #[serde(default)]
    pub completion_tokens: u64,
}

/// Normalizer for chat-completion delta chunks.
///
/// Text content always becomes a [`TextDelta`](StreamPart::TextDelta),
/// whatever the call mode. Tool-call fragments go through a
/// [`ToolCallAccumulator`]. The finish reason and usage are held back and
/// emitted as a single [`FinalMetadata`](StreamPart::FinalMetadata) by
/// [`finish`](ChunkNormalizer::finish), so it is always the last part.
///
/// ```rust
/// use llm_bridge::normalize::{ChatChunk, ChatDeltaNormalizer, ChunkNormalizer};
///
/// let mut normalizer = ChatDeltaNormalizer::new();
/// let chunk: ChatChunk = serde_json::from_str(
///     r#"{"choices":[{"delta":{"content":"Hi"},"finish_reason":null}]}"#,
/// ).unwrap();
/// let parts = normalizer.normalize(chunk);
/// assert_eq!(parts.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ChatDeltaNormalizer {
    tool_calls: ToolCallAccumulator,
    finish_reason: Option<FinishReason>,
    usage: Usage,
}

impl ChatDeltaNormalizer {
    /// Creates a normalizer for one stream.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChunkNormalizer for ChatDeltaNormalizer {
    type Chunk = ChatChunk;

    fn normalize(&mut self, chunk: ChatChunk) -> Vec<StreamPart> {
        let mut parts = Vec::new();

        if let Some(usage) = chunk.usage {
            self.usage = Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            };
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            return parts;
        };

        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
            parts.push(StreamPart::text(text));
        }

        if let Some(tool_calls) = choice.delta.tool_calls {
            let fragments = tool_calls.into_iter().map(|tc| {
                let (tool_name, args_text) = tc
                    .function
                    .map(|f| (f.name, f.arguments))
                    .unwrap_or_default();
                ToolCallFragment {
                    index: tc.index,
                    id: tc.id,
                    tool_name,
                    args_text,
                }
            });
            parts.extend(self.tool_calls.push_all(fragments));
        }

        if let Some(reason) = choice.finish_reason {
            self.finish_reason = Some(convert_finish_reason(&reason));
        }

        parts
    }

    fn error(&mut self, error: &LlmError) -> Vec<StreamPart> {
        self.finish_reason = Some(FinishReason::Error);
        vec![StreamPart::error(error)]
    }

    fn finish(&mut self) -> Vec<StreamPart> {
        let mut parts = self.tool_calls.finish();
        let finish_reason = self.finish_reason.take().unwrap_or(FinishReason::Other);
        debug!(?finish_reason, "Chat stream finished");
        parts.push(StreamPart::FinalMetadata {
            finish_reason,
            usage: std::mem::take(&mut self.usage),
        });
        parts
    }
}

/// Maps a chat-completion `finish_reason` string.
pub fn convert_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" | "model_length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        "error" => FinishReason::Error,
        other => {
            warn!(finish_reason = other, "Unexpected finish_reason");
            FinishReason::Other
        }
    }
}

// ── One-shot responses ──────────────────────────────────────────────

/// Degrades a complete [`GenerateResponse`] into the part sequence a
/// streaming backend would have produced: one text delta with the whole
/// text, then for each tool call a single argument delta followed by the
/// completed call, then final metadata.
///
/// Tool calls whose arguments are not valid JSON become
/// [`Error`](StreamPart::Error) parts.
#[derive(Debug, Default)]
pub struct OneShotNormalizer {
    finish: Option<(FinishReason, Usage)>,
}

impl ChunkNormalizer for OneShotNormalizer {
    type Chunk = GenerateResponse;

    fn normalize(&mut self, response: GenerateResponse) -> Vec<StreamPart> {
        let mut parts = Vec::new();
        if let Some(text) = response.text.filter(|t| !t.is_empty()) {
            parts.push(StreamPart::text(text));
        }
        for (index, call) in response.tool_calls.into_iter().enumerate() {
            if serde_json::from_str::<serde_json::Value>(&call.args).is_ok() {
                parts.push(StreamPart::ToolCallDelta {
                    index: u32::try_from(index).unwrap_or(u32::MAX),
                    tool_call_id: call.tool_call_id.clone(),
                    tool_name: call.tool_name.clone(),
                    args_text_delta: call.args.clone(),
                });
                parts.push(StreamPart::ToolCall {
                    tool_call_id: call.tool_call_id,
                    tool_name: call.tool_name,
                    args: call.args,
                });
            } else {
                warn!(tool_call_id = %call.tool_call_id, "Tool call arguments are not valid JSON");
                parts.push(StreamPart::error(StreamError::new(format!(
                    "tool call {} ({}) has invalid JSON arguments",
                    call.tool_call_id, call.tool_name
                ))));
            }
        }
        self.finish = Some((response.finish_reason, response.usage));
        parts
    }

    fn finish(&mut self) -> Vec<StreamPart> {
        self.finish
            .take()
            .map(|(finish_reason, usage)| StreamPart::FinalMetadata {
                finish_reason,
                usage,
            })
            .into_iter()
            .collect()
    }
}

/// Wraps a backend without native delta support.
///
/// `generate` is passed through; `stream` performs one `generate` call and
/// replays the response through [`OneShotNormalizer`].
#[derive(Debug, Clone)]
pub struct OneShotModel<M> {
    inner: M,
}

impl<M> OneShotModel<M> {
    /// Wraps `inner`.
    pub fn new(inner: M) -> Self {
        Self { inner }
    }

    /// Returns the wrapped model.
    pub fn into_inner(self) -> M {
        self.inner
    }
}

impl<M: LanguageModel> LanguageModel for OneShotModel<M> {
    async fn generate(&self, options: &CallOptions) -> Result<GenerateResponse, LlmError> {
        self.inner.generate(options).await
    }

    async fn stream(&self, options: &CallOptions) -> Result<PartStream, LlmError> {
        let response = self.inner.generate(options).await?;
        let chunks = stream::once(async move { Ok(response) });
        Ok(normalize_stream(chunks, OneShotNormalizer::default()))
    }

    fn metadata(&self) -> ModelMetadata {
        self.inner.metadata()
    }
}
