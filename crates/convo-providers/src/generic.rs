// SPDX-License-Identifier: MIT OR Apache-2.0
//! Best-effort fallback for payloads no other adapter accepts.
//!
//! Every message array is accepted. Roles come from `role` or `author`,
//! bodies from `content`, `parts`, `text` or `message`, and anything else on
//! a message is kept as metadata under `generic`.

use convo_error::{ConvoError, ValidationResult};
use convo_ir::{Conversation, FieldMap, Message, Part, canonical_part_keys};
use convo_metadata::extract;
use convo_provider::{Direction, Provider, RawInput};
use serde_json::Value;

use crate::canonical::part_from_wire;
use crate::common::{bare_text, combine_system, string_field};

/// Format tag.
pub const GENERIC: &str = "generic";

const ROLE_KEYS: &[&str] = &["role", "author"];
const BODY_KEYS: &[&str] = &["content", "parts", "text", "message"];
const MESSAGE_KEYS: &[&str] = &["role", "author", "content", "parts", "text", "message", "name"];

/// Permissive adapter used when inference finds no better match.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericProvider;

impl Provider for GenericProvider {
    fn name(&self) -> &'static str {
        GENERIC
    }

    fn validate_messages(&self, _messages: &[Value]) -> ValidationResult {
        ValidationResult::ok()
    }

    fn validate_system(&self, _system: &Value) -> ValidationResult {
        ValidationResult::ok()
    }

    fn to_canonical(
        &self,
        input: &RawInput,
        system: Option<&Value>,
        direction: Direction,
    ) -> Result<Conversation, ConvoError> {
        let messages = match input {
            RawInput::Text(text) => vec![bare_text(text, direction)],
            RawInput::Messages(raw) => raw.iter().map(|m| message_from_any(m, direction)).collect(),
        };
        match system {
            Some(system) => Ok(combine_system(GENERIC, messages, parts_from_any(system))),
            None => Ok(Conversation::from_messages(messages)),
        }
    }
}

fn message_from_any(value: &Value, direction: Direction) -> Message {
    let Some(obj) = value.as_object() else {
        return Message::new(direction.default_role(), parts_from_any(value));
    };
    let role = ROLE_KEYS
        .iter()
        .find_map(|k| string_field(obj, k))
        .unwrap_or_else(|| direction.default_role().to_string());
    let parts = BODY_KEYS
        .iter()
        .find_map(|k| obj.get(*k))
        .map(parts_from_any)
        .unwrap_or_default();
    Message {
        role,
        parts,
        name: string_field(obj, "name"),
        finish_reason: None,
        metadata: extract(GENERIC, obj, MESSAGE_KEYS),
    }
}

/// Interpret any JSON value as a list of parts.
fn parts_from_any(value: &Value) -> Vec<Part> {
    match value {
        Value::Null => Vec::new(),
        Value::String(text) => vec![Part::text(text.as_str())],
        Value::Array(items) => items.iter().map(part_from_any).collect(),
        other => vec![part_from_any(other)],
    }
}

fn part_from_any(value: &Value) -> Part {
    match value {
        Value::String(text) => Part::text(text.as_str()),
        Value::Object(obj) => object_part(value, obj),
        other => Part::text(other.to_string()),
    }
}

fn object_part(value: &Value, obj: &FieldMap) -> Part {
    if let Some(Value::String(part_type)) = obj.get("type") {
        if canonical_part_keys(part_type).is_some()
            && let Ok(part) = part_from_wire(GENERIC, value, "")
        {
            return part;
        }
        if let Some(text) = obj.get("text").and_then(Value::as_str) {
            return Part::text(text);
        }
        return Part::generic(part_type.as_str(), obj.clone());
    }
    match obj.get("text").and_then(Value::as_str) {
        Some(text) => Part::text(text),
        None => Part::text(value.to_string()),
    }
}
