//! The normalized prompt every backend adapter consumes.
//!
//! A [`Prompt`] is an optional system instruction plus an ordered list of
//! [`Message`]s. The allowed parts per role are encoded in the types:
//!
//! | Role | Parts |
//! |------|-------|
//! | user | [`UserPart::Text`], [`UserPart::Image`] |
//! | assistant | [`AssistantPart::Text`], [`AssistantPart::ToolCall`] |
//! | tool | [`ToolResultPart`] |
//!
//! so a prompt that violates the role/part invariant cannot be built.
//!
//! ```rust
//! use llm_bridge_core::prompt::{Message, Prompt};
//!
//! let prompt = Prompt::new(
//!     Some("You are terse.".into()),
//!     vec![Message::user("Name a colour")],
//! );
//! assert_eq!(prompt.messages().len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A system instruction plus an ordered conversation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Prompt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

impl Prompt {
    /// Creates a prompt.
    pub fn new(system: Option<String>, messages: Vec<Message>) -> Self {
        Self { system, messages }
    }

    /// The system instruction, if any.
    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    /// The conversation, in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

/// The role of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human (or calling program).
    User,
    /// The model.
    Assistant,
    /// Results of tool executions.
    Tool,
}

/// One message of a [`Prompt`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", content = "content", rename_all = "lowercase")]
pub enum Message {
    /// A user turn.
    User(Vec<UserPart>),
    /// A model turn.
    Assistant(Vec<AssistantPart>),
    /// Tool results answering earlier tool calls.
    Tool(Vec<ToolResultPart>),
}

impl Message {
    /// A user message with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self::User(vec![UserPart::Text { text: text.into() }])
    }

    /// An assistant message with a single text part.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant(vec![AssistantPart::Text { text: text.into() }])
    }

    /// A tool message carrying one result.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        result: Value,
    ) -> Self {
        Self::Tool(vec![ToolResultPart {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            result,
        }])
    }

    /// The role of this message.
    pub fn role(&self) -> Role {
        match self {
            Self::User(_) => Role::User,
            Self::Assistant(_) => Role::Assistant,
            Self::Tool(_) => Role::Tool,
        }
    }

    /// Concatenated text parts, or `None` if the message has none.
    pub fn text(&self) -> Option<String> {
        let texts: Vec<&str> = match self {
            Self::User(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    UserPart::Text { text } => Some(text.as_str()),
                    UserPart::Image { .. } => None,
                })
                .collect(),
            Self::Assistant(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    AssistantPart::Text { text } => Some(text.as_str()),
                    AssistantPart::ToolCall(_) => None,
                })
                .collect(),
            Self::Tool(_) => Vec::new(),
        };
        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }
}

/// A part of a user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UserPart {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// Binary image data.
    Image {
        /// Raw image bytes.
        image: Vec<u8>,
        /// Media type such as `"image/png"`, if known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
}

/// A part of an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AssistantPart {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// A tool invocation the model made earlier in the conversation.
    ToolCall(ToolCallPart),
}

/// A tool invocation recorded in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPart {
    /// Identifier linking the call to its result.
    pub tool_call_id: String,
    /// The invoked tool.
    pub tool_name: String,
    /// The call's arguments.
    pub args: Value,
}

/// The result of one tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultPart {
    /// The id of the call this result answers.
    pub tool_call_id: String,
    /// The tool that produced the result.
    pub tool_name: String,
    /// The result value.
    pub result: Value,
}
