// SPDX-License-Identifier: MIT OR Apache-2.0
//! Helpers shared by the reference adapters.

use convo_error::{ConvoError, ErrorCode, ValidationError};
use convo_ir::{Conversation, FieldMap, Message, MetadataBag, Part};
use convo_metadata::{
    MetadataMode, apply, known_str, names, remove_known_field, restore_parts_metadata,
    set_known_field,
};
use convo_provider::Direction;
use convo_system::extract_system;
use serde_json::Value;

/// Longest tool name the chat APIs accept.
const MAX_TOOL_NAME: usize = 64;

// ── Validation ──────────────────────────────────────────────────────────

/// Collects validation errors with JSON-pointer paths.
#[derive(Debug, Default)]
pub(crate) struct Issues(Vec<ValidationError>);

impl Issues {
    pub(crate) fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.push(ValidationError::new(path, message));
    }

    pub(crate) fn finish(self) -> convo_error::ValidationResult {
        convo_error::ValidationResult::from_errors(self.0)
    }

    /// Require `value` to be an object, recording an issue otherwise.
    pub(crate) fn object<'a>(&mut self, value: &'a Value, path: &str) -> Option<&'a FieldMap> {
        let obj = value.as_object();
        if obj.is_none() {
            self.push(path, "expected an object");
        }
        obj
    }

    /// Require `obj[key]` to be a string.
    pub(crate) fn string(&mut self, obj: &FieldMap, key: &str, path: &str) {
        if !obj.get(key).is_some_and(Value::is_string) {
            self.push(format!("{path}/{key}"), "expected a string");
        }
    }

    /// If present, `obj[key]` must be a string.
    pub(crate) fn opt_string(&mut self, obj: &FieldMap, key: &str, path: &str) {
        if obj.get(key).is_some_and(|v| !v.is_string()) {
            self.push(format!("{path}/{key}"), "expected a string");
        }
    }

    /// `obj[key]` must be a string from `allowed`.
    pub(crate) fn one_of(&mut self, obj: &FieldMap, key: &str, allowed: &[&str], path: &str) {
        match obj.get(key).and_then(Value::as_str) {
            Some(v) if allowed.contains(&v) => {}
            Some(v) => self.push(format!("{path}/{key}"), format!("unexpected value `{v}`")),
            None => self.push(format!("{path}/{key}"), "expected a string"),
        }
    }

    /// `obj` must not carry `key`.
    pub(crate) fn forbid(&mut self, obj: &FieldMap, key: &str, path: &str) {
        if obj.contains_key(key) {
            self.push(format!("{path}/{key}"), "field not allowed in this format");
        }
    }
}

// ── Lowering ────────────────────────────────────────────────────────────

/// A malformed raw entity discovered while lowering.
pub(crate) fn malformed(provider: &str, path: &str, message: &str) -> ConvoError {
    ConvoError::new(
        ErrorCode::SchemaMismatch,
        format!("`{provider}` payload is malformed at {path}: {message}"),
    )
    .with_context("provider", provider)
    .with_context("path", path)
}

pub(crate) fn as_object<'a>(
    value: &'a Value,
    provider: &str,
    path: &str,
) -> Result<&'a FieldMap, ConvoError> {
    value
        .as_object()
        .ok_or_else(|| malformed(provider, path, "expected an object"))
}

pub(crate) fn str_field<'a>(obj: &'a FieldMap, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

pub(crate) fn string_field(obj: &FieldMap, key: &str) -> Option<String> {
    str_field(obj, key).map(str::to_string)
}

/// One message holding a bare string, with the role picked by `direction`.
pub(crate) fn bare_text(text: &str, direction: Direction) -> Message {
    Message::text(direction.default_role(), text)
}

/// Split system messages out and prepend `supplied` parts to them.
pub(crate) fn combine_system(
    provider: &str,
    messages: Vec<Message>,
    supplied: Vec<Part>,
) -> Conversation {
    let (rest, extracted) = extract_system(provider, messages);
    let mut system = supplied;
    system.extend(extracted);
    Conversation::from_messages(rest).with_system(system)
}

/// Tool arguments arrive as JSON text in some formats; parse them, keeping
/// unparsable text verbatim.
pub(crate) fn parse_arguments(value: Value) -> Value {
    match value {
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        other => other,
    }
}

/// JSON text of tool arguments for formats that carry them as a string.
pub(crate) fn arguments_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Replace characters outside `[A-Za-z0-9_-]` (plus `extra`) and cap the
/// length.
pub(crate) fn sanitize_tool_name(name: &str, extra: &[char]) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || extra.contains(&c) {
                c
            } else {
                '_'
            }
        })
        .take(MAX_TOOL_NAME)
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Sanitise a tool name for `provider`, recording the original as a known
/// field on `bag` when it changes.
pub(crate) fn emit_tool_name(
    provider: &str,
    name: &str,
    extra: &[char],
    bag: &mut Option<MetadataBag>,
) -> String {
    let sanitized = sanitize_tool_name(name, extra);
    if sanitized != name {
        set_known_field(bag, provider, names::ORIGINAL_NAME, Value::from(name));
    }
    sanitized
}

/// The pre-sanitising tool name recorded on `bag`, or `wire_name`.
pub(crate) fn take_original_name(bag: &mut Option<MetadataBag>, wire_name: &str) -> String {
    match remove_known_field(bag, names::ORIGINAL_NAME) {
        Some(Value::String(original)) => original,
        _ => wire_name.to_string(),
    }
}

/// Remove a known field only when it holds `expected`.
pub(crate) fn take_known_marker(bag: &mut Option<MetadataBag>, name: &str, expected: &str) -> bool {
    if known_str(bag.as_ref(), name) == Some(expected) {
        remove_known_field(bag, name);
        true
    } else {
        false
    }
}

/// Split a base64 `data:` URL into its MIME type and payload.
pub(crate) fn parse_data_url(url: &str) -> Option<(Option<String>, String)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, data) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    let mime = (!mime.is_empty()).then(|| mime.to_string());
    Some((mime, data.to_string()))
}

pub(crate) fn data_url(mime: Option<&str>, data: &str) -> String {
    format!(
        "data:{};base64,{data}",
        mime.unwrap_or("application/octet-stream")
    )
}

// ── Raising ─────────────────────────────────────────────────────────────

/// Clone a message for emission with any stashed parts metadata moved back
/// onto its first part.
pub(crate) fn emission_copy(message: &Message) -> Message {
    let mut copy = message.clone();
    restore_parts_metadata(&mut copy.metadata, &mut copy.parts);
    copy
}

/// Apply `bag` to `obj` under `mode` and wrap it as a JSON value.
pub(crate) fn finish(mode: MetadataMode, bag: Option<&MetadataBag>, mut obj: FieldMap) -> Value {
    apply(mode, bag, &mut obj);
    Value::Object(obj)
}

/// Convenience for building wire objects from literal pairs.
pub(crate) fn fields<const N: usize>(pairs: [(&str, Value); N]) -> FieldMap {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
