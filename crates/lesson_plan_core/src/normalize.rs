//! crates/lesson_plan_core/src/normalize.rs
//!
//! The repair/normalize pipeline that turns a model reply into a
//! `LessonPlanContent`.
//!
//! The model is asked for a JSON object with ten string fields, but nothing
//! guarantees it. Replies arrive wrapped in markdown fences, with comments,
//! single-quoted keys, trailing commas, or with a list where a paragraph was
//! requested. The passes run in a fixed order:
//!
//! 1. Take the interior of a ```` ```json ```` fence if one is present
//! 2. Repair syntax outside string literals (comments, single quotes,
//!    trailing commas)
//! 3. Parse strictly as JSON
//! 4. Coerce each of the ten fields into a string
//!
//! Every pass is a pure function; the pipeline has no state and no I/O.

use crate::domain::{LessonPlanContent, CONTENT_FIELDS};
use crate::ports::PortError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::iter::Peekable;
use std::str::Chars;

/// Sub-fields that carry the human-readable text of a list item, by priority.
const LIST_ITEM_TEXT_KEYS: [&str; 3] = ["description", "text", "item"];

/// The reply could not be parsed as JSON even after repair.
#[derive(Debug, thiserror::Error)]
#[error("AI response is not valid JSON after repair: {source}")]
pub struct MalformedResponse {
    /// The reply exactly as the model sent it.
    pub raw: String,
    #[source]
    pub source: serde_json::Error,
}

impl From<MalformedResponse> for PortError {
    fn from(err: MalformedResponse) -> Self {
        PortError::MalformedAiResponse {
            reason: err.source.to_string(),
            raw: err.raw,
        }
    }
}

/// Runs the full pipeline over a raw model reply.
pub fn normalize_response(raw: &str) -> Result<LessonPlanContent, MalformedResponse> {
    let candidate = extract_json_block(raw);
    let repaired = repair_json_syntax(candidate);
    let value: Value = serde_json::from_str(&repaired).map_err(|source| MalformedResponse {
        raw: raw.to_string(),
        source,
    })?;
    Ok(normalize_value(&value))
}

// ── Pass 1: Fenced block extraction ─────────────────────────────────────────

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").unwrap());

/// Returns the interior of the first ```` ```json ```` block, or the whole
/// text when there is no such block (or the block is empty).
pub fn extract_json_block(text: &str) -> &str {
    RE_JSON_FENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|inner| !inner.is_empty())
        .unwrap_or(text)
}

// ── Pass 2: Syntax repair ───────────────────────────────────────────────────

/// Strips comments, converts single-quoted strings to double-quoted ones and
/// drops trailing commas. Double-quoted string literals pass through intact.
pub fn repair_json_syntax(text: &str) -> String {
    let requoted = strip_comments_and_requote(text);
    remove_trailing_commas(&requoted)
}

fn strip_comments_and_requote(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => copy_double_quoted(&mut chars, &mut out),
            '\'' => requote_single_quoted(&mut chars, &mut out),
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                skip_block_comment(&mut chars);
            }
            '/' if chars.peek() == Some(&'/') => {
                while chars.peek().is_some_and(|&next| next != '\n') {
                    chars.next();
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Copies a double-quoted literal whose opening quote was already consumed.
fn copy_double_quoted(chars: &mut Peekable<Chars<'_>>, out: &mut String) {
    out.push('"');
    while let Some(c) = chars.next() {
        out.push(c);
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '"' => return,
            _ => {}
        }
    }
}

/// Rewrites `'text'` as `"text"`, escaping embedded double quotes.
fn requote_single_quoted(chars: &mut Peekable<Chars<'_>>, out: &mut String) {
    out.push('"');
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\'') => out.push('\''),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            '\'' => break,
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out.push('"');
}

fn skip_block_comment(chars: &mut Peekable<Chars<'_>>) {
    let mut previous = '\0';
    for c in chars.by_ref() {
        if previous == '*' && c == '/' {
            return;
        }
        previous = c;
    }
}

fn remove_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' if closes_container(&chars[i + 1..]) => {}
            _ => out.push(c),
        }
    }
    out
}

fn closes_container(rest: &[char]) -> bool {
    rest.iter()
        .find(|c| !c.is_whitespace())
        .is_some_and(|c| matches!(c, '}' | ']'))
}

// ── Pass 4: Field normalization ─────────────────────────────────────────────

/// The shapes a content field can take in a parsed reply.
#[derive(Debug)]
enum FieldValue<'a> {
    Text(&'a str),
    List(&'a [Value]),
    Object(&'a Map<String, Value>),
    Number(&'a Number),
    Empty,
}

impl<'a> From<Option<&'a Value>> for FieldValue<'a> {
    fn from(value: Option<&'a Value>) -> Self {
        match value {
            Some(Value::String(text)) => FieldValue::Text(text),
            Some(Value::Array(items)) => FieldValue::List(items),
            Some(Value::Object(map)) => FieldValue::Object(map),
            Some(Value::Number(number)) => FieldValue::Number(number),
            Some(Value::Bool(_)) | Some(Value::Null) | None => FieldValue::Empty,
        }
    }
}

impl FieldValue<'_> {
    fn into_text(self) -> String {
        match self {
            FieldValue::Text(text) => text.to_string(),
            FieldValue::List(items) => items
                .iter()
                .map(list_item_text)
                .collect::<Vec<_>>()
                .join("\n"),
            FieldValue::Object(map) => pretty_json(&Value::Object(map.clone())),
            FieldValue::Number(number) => number.to_string(),
            FieldValue::Empty => String::new(),
        }
    }
}

/// Coerces a parsed reply into the ten-field shape. Total over any JSON value.
pub fn normalize_value(value: &Value) -> LessonPlanContent {
    let mut content = LessonPlanContent::default();
    let Some(object) = value.as_object() else {
        return content;
    };
    for key in CONTENT_FIELDS {
        if let Some(slot) = content.field_mut(key) {
            *slot = FieldValue::from(object.get(key)).into_text();
        }
    }
    content
}

fn list_item_text(item: &Value) -> String {
    match item {
        Value::String(text) => text.clone(),
        Value::Object(map) => LIST_ITEM_TEXT_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(present_text))
            .unwrap_or_else(|| pretty_json(item)),
        Value::Array(_) => pretty_json(item),
        scalar => scalar.to_string(),
    }
}

/// The text of a list-item sub-field, or `None` when it is blank.
///
/// Blank means an empty string, `null`, `false` or a numeric zero, so a
/// `{"description": 0, "text": "..."}` item falls through to its `text`.
fn present_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::String(_) | Value::Null | Value::Bool(false) => None,
        Value::Number(number) if number.as_f64() == Some(0.0) => None,
        Value::Bool(true) | Value::Number(_) => Some(value.to_string()),
        Value::Array(_) | Value::Object(_) => Some(pretty_json(value)),
    }
}

fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
