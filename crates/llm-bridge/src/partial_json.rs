//! Tolerant parsing of truncated JSON text.
//!
//! [`parse_partial_json`] turns the prefix of a JSON document into the
//! most complete value that prefix implies. Input that parses strictly is
//! returned as [`PartialJson::Complete`]; a truncated prefix is closed off
//! and returned as [`PartialJson::Repaired`]:
//!
//! | Truncated at | Repair |
//! |--------------|--------|
//! | inside a string | the string is closed; an incomplete escape is dropped |
//! | inside an object or array | open containers are closed |
//! | a number ending in `.`, `e`, `+` or `-` | those characters are trimmed |
//! | a literal prefix (`tru`, `fa`, `n`) | completed to the literal |
//! | an object key, or before a member's value starts | the member is dropped |
//!
//! The tail is first cut back to the last point where closing is
//! unambiguous; [`partial_json_fixer::fix_json`] then appends the closing
//! quotes and brackets, and `serde_json` parses the result. Anything that
//! can't become valid JSON by appending more text is
//! [`PartialJson::Failed`], as is empty or whitespace-only input.
//!
//! ```rust
//! use llm_bridge::partial_json::{parse_partial_json, PartialJson};
//! use serde_json::json;
//!
//! assert_eq!(
//!     parse_partial_json(r#"{"name": "Ri"#),
//!     PartialJson::Repaired(json!({"name": "Ri"}))
//! );
//! assert_eq!(parse_partial_json("{\"a\":"), PartialJson::Repaired(json!({})));
//! assert_eq!(parse_partial_json("not json"), PartialJson::Failed);
//! ```

use std::borrow::Cow;

use partial_json_fixer::fix_json;
use serde_json::Value;

/// Nesting depth at which input is treated as malformed. Matches the
/// recursion limit of `serde_json`, so strict and tolerant parsing agree.
const MAX_DEPTH: usize = 128;

const LITERALS: [&str; 3] = ["true", "false", "null"];

/// The outcome of [`parse_partial_json`].
#[derive(Debug, Clone, PartialEq)]
pub enum PartialJson {
    /// The text was a complete JSON document.
    Complete(Value),
    /// The text was a truncated prefix; this is its closed-off value.
    Repaired(Value),
    /// The text is not a prefix of any JSON document.
    Failed,
}

impl PartialJson {
    /// The parsed value, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Complete(v) | Self::Repaired(v) => Some(v),
            Self::Failed => None,
        }
    }

    /// Consumes the outcome and returns the parsed value, if any.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Complete(v) | Self::Repaired(v) => Some(v),
            Self::Failed => None,
        }
    }
}

/// Parses a possibly truncated JSON document.
pub fn parse_partial_json(text: &str) -> PartialJson {
    if text.trim().is_empty() {
        return PartialJson::Failed;
    }
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return PartialJson::Complete(value);
    }

    let Some(stable) = stable_prefix(text) else {
        return PartialJson::Failed;
    };
    if stable.trim().is_empty() {
        return PartialJson::Failed;
    }
    match serde_json::from_str::<Value>(&fix_json(&stable)) {
        Ok(value) => PartialJson::Repaired(value),
        Err(_) => PartialJson::Failed,
    }
}

/// What an open object expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Key,
    Colon,
    Value,
    Comma,
}

#[derive(Debug)]
enum Frame {
    /// `member_start` is the byte offset just past the `{` or `,` that
    /// opened the current member.
    Object { expect: Expect, member_start: usize },
    Array,
}

/// Where a string starting at some offset ends.
enum StringEnd {
    /// Offset just past the closing quote.
    Closed(usize),
    /// Unterminated; offset past the last complete character.
    Open(usize),
}

/// Cuts `text` back to the longest prefix whose closing needs only
/// quotes and brackets, completing a trailing literal on the way.
///
/// Returns `None` when the text can't be the prefix of a JSON document.
fn stable_prefix(text: &str) -> Option<Cow<'_, str>> {
    let bytes = text.as_bytes();
    let mut frames: Vec<Frame> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let is_key = matches!(
                    frames.last(),
                    Some(Frame::Object {
                        expect: Expect::Key,
                        ..
                    })
                );
                if !is_key {
                    start_value(&mut frames)?;
                }
                match string_end(bytes, i + 1) {
                    StringEnd::Closed(end) => {
                        if is_key {
                            if let Some(Frame::Object { expect, .. }) = frames.last_mut() {
                                *expect = Expect::Colon;
                            }
                        }
                        i = end;
                        continue;
                    }
                    StringEnd::Open(_) if is_key => return cut_member(text, &frames),
                    StringEnd::Open(safe) => return Some(Cow::Borrowed(&text[..safe])),
                }
            }
            open @ (b'{' | b'[') => {
                start_value(&mut frames)?;
                if frames.len() + 1 >= MAX_DEPTH {
                    return None;
                }
                frames.push(if open == b'{' {
                    Frame::Object {
                        expect: Expect::Key,
                        member_start: i + 1,
                    }
                } else {
                    Frame::Array
                });
            }
            b'}' => match frames.pop()? {
                Frame::Object {
                    expect: Expect::Key | Expect::Comma,
                    ..
                } => {}
                _ => return None,
            },
            b']' => {
                if !matches!(frames.pop()?, Frame::Array) {
                    return None;
                }
            }
            b':' => match frames.last_mut() {
                Some(Frame::Object { expect, .. }) if *expect == Expect::Colon => {
                    *expect = Expect::Value;
                }
                _ => return None,
            },
            b',' => match frames.last_mut() {
                Some(Frame::Object {
                    expect,
                    member_start,
                }) if *expect == Expect::Comma => {
                    *expect = Expect::Key;
                    *member_start = i + 1;
                }
                Some(Frame::Array) => {}
                _ => return None,
            },
            b if b.is_ascii_whitespace() => {}
            _ => {
                start_value(&mut frames)?;
                let end = bytes[i..]
                    .iter()
                    .position(|b| b.is_ascii_whitespace() || b",:{}[]\"".contains(b))
                    .map_or(bytes.len(), |len| i + len);
                if end == bytes.len() {
                    return finish_token(text, i, &frames);
                }
                i = end;
                continue;
            }
        }
        i += 1;
    }

    match frames.last() {
        Some(Frame::Object { expect, .. }) if *expect != Expect::Comma => {
            cut_member(text, &frames)
        }
        _ => Some(Cow::Borrowed(text)),
    }
}

/// Records that a value starts in the innermost container.
fn start_value(frames: &mut [Frame]) -> Option<()> {
    match frames.last_mut() {
        Some(Frame::Object { expect, .. }) => {
            if *expect != Expect::Value {
                return None;
            }
            *expect = Expect::Comma;
        }
        Some(Frame::Array) | None => {}
    }
    Some(())
}

/// Drops the member the innermost object is still reading.
fn cut_member<'a>(text: &'a str, frames: &[Frame]) -> Option<Cow<'a, str>> {
    match frames.last()? {
        Frame::Object { member_start, .. } => Some(Cow::Borrowed(&text[..*member_start])),
        Frame::Array => None,
    }
}

/// Handles a number or literal that runs to the end of `text`.
fn finish_token<'a>(text: &'a str, start: usize, frames: &[Frame]) -> Option<Cow<'a, str>> {
    let token = &text[start..];
    if let Some(literal) = LITERALS.iter().find(|l| l.starts_with(token)) {
        return Some(Cow::Owned(format!("{text}{}", &literal[token.len()..])));
    }

    let trimmed = token.trim_end_matches(['.', 'e', 'E', '+', '-']);
    if !trimmed.is_empty() {
        return Some(Cow::Borrowed(&text[..start + trimmed.len()]));
    }
    match frames.last()? {
        Frame::Object { .. } => cut_member(text, frames),
        Frame::Array => Some(Cow::Borrowed(&text[..start])),
    }
}

fn string_end(bytes: &[u8], mut i: usize) -> StringEnd {
    while i < bytes.len() {
        match bytes[i] {
            b'"' => return StringEnd::Closed(i + 1),
            b'\\' => {
                let len = escape_len(bytes, i);
                if i + len > bytes.len() {
                    return StringEnd::Open(i);
                }
                i += len;
            }
            _ => i += 1,
        }
    }
    StringEnd::Open(bytes.len())
}

/// Length of the escape at `at`, counting a high surrogate together with
/// the low surrogate it needs.
fn escape_len(bytes: &[u8], at: usize) -> usize {
    if bytes.get(at + 1) != Some(&b'u') {
        return 2;
    }
    let unit = bytes
        .get(at + 2..at + 6)
        .and_then(|hex| std::str::from_utf8(hex).ok())
        .and_then(|hex| u16::from_str_radix(hex, 16).ok());
    match unit {
        Some(0xD800..=0xDBFF) => 12,
        _ => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repaired(text: &str) -> Value {
        match parse_partial_json(text) {
            PartialJson::Repaired(v) => v,
            other => panic!("expected repaired value for {text:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_complete_input() {
        assert_eq!(
            parse_partial_json(r#"{"a": [1, 2], "b": null}"#),
            PartialJson::Complete(json!({"a": [1, 2], "b": null}))
        );
        assert_eq!(parse_partial_json("42"), PartialJson::Complete(json!(42)));
    }

    #[test]
    fn test_empty_and_whitespace_fail() {
        assert_eq!(parse_partial_json(""), PartialJson::Failed);
        assert_eq!(parse_partial_json("  \n\t"), PartialJson::Failed);
    }

    #[test]
    fn test_open_containers_are_closed() {
        assert_eq!(repaired("{"), json!({}));
        assert_eq!(repaired("["), json!([]));
        assert_eq!(repaired(r#"{"a": {"b": [1, {"c": 2"#), json!({"a": {"b": [1, {"c": 2}]}}));
        assert_eq!(repaired(r#"{"a": 1,"#), json!({"a": 1}));
        assert_eq!(repaired("[1, 2,"), json!([1, 2]));
    }

    #[test]
    fn test_truncated_strings() {
        assert_eq!(repaired(r#"{"name": "Ri"#), json!({"name": "Ri"}));
        assert_eq!(repaired(r#""hello"#), json!("hello"));
        assert_eq!(repaired(r#"["a\"#), json!(["a"]));
        assert_eq!(repaired(r#"["a\u00"#), json!(["a"]));
        assert_eq!(repaired(r#"["aé"#), json!(["aé"]));
        assert_eq!(repaired(r#"["\ud83d"#), json!([""]));
        assert_eq!(repaired(r#"["😀"#), json!(["😀"]));
    }

    #[test]
    fn test_members_without_value_are_dropped() {
        assert_eq!(repaired(r#"{"name""#), json!({}));
        assert_eq!(repaired(r#"{"na"#), json!({}));
        assert_eq!(repaired(r#"{"name":"#), json!({}));
        assert_eq!(repaired(r#"{"a": 1, "b": "#), json!({"a": 1}));
        assert_eq!(repaired(r#"{"a": -"#), json!({}));
    }

    #[test]
    fn test_truncated_numbers() {
        assert_eq!(repaired(r#"{"n": 1."#), json!({"n": 1}));
        assert_eq!(repaired(r#"{"n": 2e"#), json!({"n": 2}));
        assert_eq!(repaired(r#"{"n": 2e-"#), json!({"n": 2}));
        assert_eq!(repaired("[3.5"), json!([3.5]));
        assert_eq!(repaired("[-"), json!([]));
    }

    #[test]
    fn test_partial_literals() {
        assert_eq!(repaired(r#"{"ok": tr"#), json!({"ok": true}));
        assert_eq!(repaired("[fa"), json!([false]));
        assert_eq!(repaired(r#"{"v": n"#), json!({"v": null}));
        assert_eq!(repaired("tru"), json!(true));
    }

    #[test]
    fn test_malformed_input_fails() {
        assert_eq!(parse_partial_json("not json"), PartialJson::Failed);
        assert_eq!(parse_partial_json(r#"{"a" 1"#), PartialJson::Failed);
        assert_eq!(parse_partial_json(r#"{"a": 1}}"#), PartialJson::Failed);
        assert_eq!(parse_partial_json("[1 2"), PartialJson::Failed);
        assert_eq!(parse_partial_json(r#"{"a": trux"#), PartialJson::Failed);
        assert_eq!(parse_partial_json(r#"{"a": 1, }"#), PartialJson::Failed);
        assert_eq!(parse_partial_json(r#"["\x"#), PartialJson::Failed);
        assert_eq!(parse_partial_json("{1"), PartialJson::Failed);
        assert_eq!(parse_partial_json(r#"{"a": }"#), PartialJson::Failed);
        assert_eq!(parse_partial_json(r#"{"a": 1] "#), PartialJson::Failed);
    }

    #[test]
    fn test_dangling_key_is_not_given_a_null_value() {
        assert_eq!(repaired(r#"{"a": 1, "b"#), json!({"a": 1}));
        assert_eq!(repaired(r#"{"a": [1, {"b": "#), json!({"a": [1, {}]}));
        assert_eq!(repaired(r#"{"a": "x\"#), json!({"a": "x"}));
        assert_eq!(repaired(r#"{"a": "x\\"#), json!({"a": "x\\"}));
    }

    #[test]
    fn test_deep_nesting_does_not_overflow() {
        let text = "[".repeat(100_000);
        assert_eq!(parse_partial_json(&text), PartialJson::Failed);
    }

    #[test]
    fn test_depth_limit_matches_strict_parser() {
        let open = |depth: usize| "[".repeat(depth);
        let closed = |depth: usize| format!("{}{}", open(depth), "]".repeat(depth));

        assert!(matches!(parse_partial_json(&closed(MAX_DEPTH - 1)), PartialJson::Complete(_)));
        assert!(matches!(parse_partial_json(&open(MAX_DEPTH - 1)), PartialJson::Repaired(_)));

        assert!(serde_json::from_str::<Value>(&closed(MAX_DEPTH)).is_err());
        assert_eq!(parse_partial_json(&closed(MAX_DEPTH)), PartialJson::Failed);
        assert_eq!(parse_partial_json(&open(MAX_DEPTH)), PartialJson::Failed);
    }

    #[test]
    fn test_every_prefix_is_handled() {
        let full = r#"{"name": "Rin", "tags": ["a", "b\n"], "age": 17, "ok": false, "x": null}"#;
        for end in 0..=full.len() {
            let outcome = parse_partial_json(&full[..end]);
            if end == 0 {
                assert_eq!(outcome, PartialJson::Failed);
            } else {
                assert!(outcome.value().is_some(), "prefix {:?} failed", &full[..end]);
            }
        }
        assert!(matches!(parse_partial_json(full), PartialJson::Complete(_)));
    }

    #[test]
    fn test_accessors() {
        let outcome = parse_partial_json("[1");
        assert_eq!(outcome.value(), Some(&json!([1])));
        assert_eq!(outcome.into_value(), Some(json!([1])));
        assert_eq!(PartialJson::Failed.into_value(), None);
    }
}
