//! Converts caller-facing prompt arguments into the normalized [`Prompt`].

use llm_bridge_core::{InputFormat, LlmError, Message, Prompt};

/// The conversation as a caller supplies it.
///
/// Exactly one of `prompt` and `messages` must be set.
///
/// ```rust
/// use llm_bridge::PromptInput;
/// use llm_bridge_core::InputFormat;
///
/// let input = PromptInput {
///     system: Some("Answer briefly.".into()),
///     prompt: Some("Name a prime".into()),
///     ..Default::default()
/// };
/// let (prompt, format) = input.into_prompt().unwrap();
/// assert_eq!(format, InputFormat::Prompt);
/// assert_eq!(prompt.system(), Some("Answer briefly."));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptInput {
    /// System instruction.
    pub system: Option<String>,
    /// A single user prompt.
    pub prompt: Option<String>,
    /// A full message list.
    pub messages: Option<Vec<Message>>,
}

impl PromptInput {
    /// Builds the normalized prompt and reports how it was supplied.
    pub fn into_prompt(self) -> Result<(Prompt, InputFormat), LlmError> {
        match (self.prompt, self.messages) {
            (Some(prompt), None) => Ok((
                Prompt::new(self.system, vec![Message::user(prompt)]),
                InputFormat::Prompt,
            )),
            (None, Some(messages)) => Ok((Prompt::new(self.system, messages), InputFormat::Messages)),
            (Some(_), Some(_)) => Err(LlmError::InvalidPrompt(
                "prompt and messages cannot both be set".into(),
            )),
            (None, None) => Err(LlmError::InvalidPrompt(
                "either prompt or messages must be set".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_bridge_core::prompt::Role;

    #[test]
    fn test_prompt_becomes_single_user_message() {
        let (prompt, format) = PromptInput {
            prompt: Some("hello".into()),
            ..Default::default()
        }
        .into_prompt()
        .unwrap();
        assert_eq!(format, InputFormat::Prompt);
        assert!(prompt.system().is_none());
        assert_eq!(prompt.messages(), &[Message::user("hello")]);
    }

    #[test]
    fn test_messages_pass_through_in_order() {
        let messages = vec![
            Message::user("q"),
            Message::assistant("a"),
            Message::user("q2"),
        ];
        let (prompt, format) = PromptInput {
            system: Some("sys".into()),
            messages: Some(messages.clone()),
            ..Default::default()
        }
        .into_prompt()
        .unwrap();
        assert_eq!(format, InputFormat::Messages);
        assert_eq!(prompt.system(), Some("sys"));
        assert_eq!(prompt.messages(), messages.as_slice());
        assert_eq!(prompt.messages()[1].role(), Role::Assistant);
    }

    #[test]
    fn test_both_or_neither_is_invalid() {
        let both = PromptInput {
            prompt: Some("p".into()),
            messages: Some(vec![]),
            ..Default::default()
        };
        assert!(matches!(both.into_prompt(), Err(LlmError::InvalidPrompt(_))));

        let neither = PromptInput {
            system: Some("sys".into()),
            ..Default::default()
        };
        assert!(matches!(neither.into_prompt(), Err(LlmError::InvalidPrompt(_))));
    }
}
