//! Reassembles tool calls whose arguments arrive as text fragments.
//!
//! Streaming backends split a tool call's argument JSON across many
//! deltas keyed by a per-stream `index`. [`ToolCallAccumulator`] keeps one
//! record per index, re-emits each fragment as a
//! [`ToolCallDelta`](StreamPart::ToolCallDelta), and emits exactly one
//! complete [`ToolCall`](StreamPart::ToolCall) as soon as the accumulated
//! text parses as JSON.
//!
//! Fragments must be appended monotonically per index. The accumulator is
//! fail-fast about anything else:
//!
//! - a delta for an index that already completed,
//! - a delta whose id contradicts the record's id,
//! - a first delta without an id or tool name,
//! - arguments growing past [`MAX_ARGS_LEN`],
//!
//! each yield an [`Error`](StreamPart::Error) part and the delta is not
//! applied. [`finish`](ToolCallAccumulator::finish) reports every record
//! whose arguments never became valid JSON.

use std::collections::BTreeMap;

use llm_bridge_core::{StreamError, StreamPart};

/// Maximum accumulated argument text per tool call.
pub const MAX_ARGS_LEN: usize = 16 * 1024 * 1024; // 16 MiB

/// One incremental tool-call update as reported by a backend.
///
/// Only the first delta for an index is expected to carry `id` and
/// `tool_name`; later ones usually carry just an argument fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallFragment {
    /// Backend-assigned index of the call within the stream.
    pub index: u32,
    /// Identifier of the call, if this delta carries it.
    pub id: Option<String>,
    /// Tool name, if this delta carries it.
    pub tool_name: Option<String>,
    /// New argument text, if any.
    pub args_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordState {
    Open,
    Complete,
    Failed,
}

#[derive(Debug)]
struct ToolCallState {
    id: String,
    name: String,
    arguments_buffer: String,
    state: RecordState,
}

/// Per-stream tool-call reassembly state.
///
/// Index space is scoped to one instance; create a fresh accumulator for
/// every stream.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<u32, ToolCallState>,
}

impl ToolCallAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the deltas of one backend chunk, in order.
    pub fn push_all(
        &mut self,
        fragments: impl IntoIterator<Item = ToolCallFragment>,
    ) -> Vec<StreamPart> {
        fragments
            .into_iter()
            .flat_map(|fragment| self.push(fragment))
            .collect()
    }

    /// Applies one delta and returns the parts it produces.
    pub fn push(&mut self, fragment: ToolCallFragment) -> Vec<StreamPart> {
        let ToolCallFragment {
            index,
            id,
            tool_name,
            args_text,
        } = fragment;
        let args_text = args_text.unwrap_or_default();

        let Some(call) = self.calls.get_mut(&index) else {
            let (Some(id), Some(name)) = (id, tool_name) else {
                return vec![protocol_error(
                    index,
                    "first delta for a tool call must carry an id and a tool name",
                )];
            };
            let call = self.calls.entry(index).or_insert(ToolCallState {
                id,
                name,
                arguments_buffer: String::new(),
                state: RecordState::Open,
            });
            return append(index, call, &args_text);
        };

        match call.state {
            RecordState::Complete => {
                return vec![protocol_error(
                    index,
                    &format!("delta for completed tool call {}", call.id),
                )];
            }
            RecordState::Failed => {
                return vec![protocol_error(
                    index,
                    &format!("delta for failed tool call {}", call.id),
                )];
            }
            RecordState::Open => {}
        }

        if let Some(id) = id.filter(|id| *id != call.id) {
            return vec![protocol_error(
                index,
                &format!("delta id {id} contradicts tool call {}", call.id),
            )];
        }

        append(index, call, &args_text)
    }

    /// Ends the stream, reporting every call that never completed.
    pub fn finish(&mut self) -> Vec<StreamPart> {
        std::mem::take(&mut self.calls)
            .into_iter()
            .filter(|(_, call)| call.state == RecordState::Open)
            .map(|(index, call)| {
                protocol_error(
                    index,
                    &format!(
                        "tool call {} ({}) ended with incomplete arguments",
                        call.id, call.name
                    ),
                )
            })
            .collect()
    }

    /// Returns `true` if some call is still waiting for fragments.
    pub fn has_pending(&self) -> bool {
        self.calls.values().any(|c| c.state == RecordState::Open)
    }
}

fn append(index: u32, call: &mut ToolCallState, fragment: &str) -> Vec<StreamPart> {
    let mut parts = Vec::new();

    if !fragment.is_empty() {
        if call.arguments_buffer.len() + fragment.len() > MAX_ARGS_LEN {
            call.state = RecordState::Failed;
            call.arguments_buffer.clear();
            return vec![protocol_error(
                index,
                &format!("tool call {} arguments exceeded 16 MiB", call.id),
            )];
        }
        call.arguments_buffer.push_str(fragment);
        parts.push(StreamPart::ToolCallDelta {
            index,
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            args_text_delta: fragment.to_owned(),
        });
    }

    if serde_json::from_str::<serde_json::Value>(&call.arguments_buffer).is_ok() {
        call.state = RecordState::Complete;
        parts.push(StreamPart::ToolCall {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            args: std::mem::take(&mut call.arguments_buffer),
        });
    }

    parts
}

fn protocol_error(index: u32, message: &str) -> StreamPart {
    tracing::warn!(index, detail = message, "Tool call protocol violation");
    StreamPart::error(StreamError::new(format!("tool call index {index}: {message}")))
}
