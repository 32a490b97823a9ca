// SPDX-License-Identifier: MIT OR Apache-2.0
//! Anthropic Messages API.
//!
//! The system prompt travels outside the message list. It is read as a
//! string or an array of text blocks and always written as blocks. Messages
//! alternate `user` and `assistant`; tool results are `tool_result` blocks
//! inside user messages.

use convo_error::{ConvoError, ValidationResult};
use convo_ir::{Conversation, FieldMap, Message, MetadataBag, Part, PartKind, modality, role};
use convo_metadata::{
    MetadataMode, extract, known_field, names, remove_known_field, restore_parts_metadata,
    set_known_field, stash_parts_metadata,
};
use convo_provider::{Direction, Provider, ProviderOutput, RawInput};
use convo_system::extract_system;
use serde_json::Value;

use crate::common::{
    Issues, as_object, bare_text, emission_copy, emit_tool_name, fields, finish, malformed,
    str_field, string_field, take_known_marker, take_original_name,
};

/// Format tag.
pub const ANTHROPIC: &str = "anthropic";

const REDACTED_THINKING: &str = "redacted_thinking";
const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

const ROLES: &[&str] = &["user", "assistant"];
const BLOCK_TYPES: &[&str] = &[
    "text",
    "image",
    "document",
    "tool_use",
    "tool_result",
    "thinking",
    "redacted_thinking",
    "server_tool_use",
    "web_search_tool_result",
    "search_result",
];
const MESSAGE_KEYS: &[&str] = &["role", "content", "stop_reason"];

/// Adapter for Anthropic Messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicProvider;

impl Provider for AnthropicProvider {
    fn name(&self) -> &'static str {
        ANTHROPIC
    }

    fn validate_messages(&self, messages: &[Value]) -> ValidationResult {
        let mut issues = Issues::default();
        for (i, message) in messages.iter().enumerate() {
            let path = format!("/{i}");
            let Some(obj) = issues.object(message, &path) else {
                continue;
            };
            issues.one_of(obj, "role", ROLES, &path);
            for key in ["parts", "tool_calls", "tool_call_id", "name"] {
                issues.forbid(obj, key, &path);
            }
            match obj.get("content") {
                Some(Value::String(_)) => {}
                Some(Value::Array(blocks)) => validate_blocks(&mut issues, blocks, &format!("{path}/content")),
                _ => issues.push(format!("{path}/content"), "expected a string or an array of blocks"),
            }
        }
        issues.finish()
    }

    fn validate_system(&self, system: &Value) -> ValidationResult {
        let mut issues = Issues::default();
        match system {
            Value::String(_) => {}
            Value::Array(blocks) => {
                for (j, block) in blocks.iter().enumerate() {
                    let path = format!("/{j}");
                    if let Some(obj) = issues.object(block, &path) {
                        issues.one_of(obj, "type", &["text"], &path);
                        issues.string(obj, "text", &path);
                    }
                }
            }
            _ => issues.push("", "expected a string or an array of text blocks"),
        }
        issues.finish()
    }

    fn has_system_channel(&self) -> bool {
        true
    }

    fn to_canonical(
        &self,
        input: &RawInput,
        system: Option<&Value>,
        direction: Direction,
    ) -> Result<Conversation, ConvoError> {
        let messages = match input {
            RawInput::Text(text) => vec![bare_text(text, direction)],
            RawInput::Messages(raw) => raw
                .iter()
                .enumerate()
                .map(|(i, m)| message_from_wire(m, &format!("/{i}")))
                .collect::<Result<Vec<_>, _>>()?,
        };
        let system = match system {
            Some(system) => system_from_wire(system)?,
            None => Vec::new(),
        };
        Ok(Conversation::from_messages(messages).with_system(system))
    }

    fn supports_target(&self) -> bool {
        true
    }

    fn to_provider_format(
        &self,
        messages: &[Message],
        mode: MetadataMode,
    ) -> Result<ProviderOutput, ConvoError> {
        let (rest, system_parts) =
            extract_system(ANTHROPIC, messages.iter().map(emission_copy).collect());
        let out = rest.iter().map(|m| message_to_wire(m, mode)).collect();
        let system = (!system_parts.is_empty()).then(|| system_to_wire(&system_parts, mode));
        Ok(ProviderOutput::messages(out).with_system(system))
    }
}

fn validate_blocks(issues: &mut Issues, blocks: &[Value], path: &str) {
    for (j, block) in blocks.iter().enumerate() {
        let block_path = format!("{path}/{j}");
        if let Some(obj) = issues.object(block, &block_path) {
            issues.one_of(obj, "type", BLOCK_TYPES, &block_path);
        }
    }
}

// ── Lowering ────────────────────────────────────────────────────────────

fn message_from_wire(value: &Value, path: &str) -> Result<Message, ConvoError> {
    let obj = as_object(value, ANTHROPIC, path)?;
    let wire_role = str_field(obj, "role")
        .ok_or_else(|| malformed(ANTHROPIC, path, "message has no string `role`"))?;

    let mut parts = match obj.get("content") {
        Some(Value::String(text)) => vec![Part::text(text.as_str())],
        Some(Value::Array(blocks)) => blocks
            .iter()
            .enumerate()
            .map(|(j, b)| block_from_wire(b, &format!("{path}/content/{j}")))
            .collect::<Result<Vec<_>, _>>()?,
        _ => Vec::new(),
    };

    let only_results = !parts.is_empty()
        && parts
            .iter()
            .all(|p| matches!(p.kind, PartKind::ToolCallResponse { .. }));
    let role = if wire_role == role::USER && only_results {
        role::TOOL.to_string()
    } else {
        wire_role.to_string()
    };

    let mut metadata = extract(ANTHROPIC, obj, MESSAGE_KEYS);
    restore_parts_metadata(&mut metadata, &mut parts);
    Ok(Message {
        role,
        parts,
        name: None,
        finish_reason: string_field(obj, "stop_reason"),
        metadata,
    })
}

fn media_from_source(kind: &str, source: &FieldMap) -> Option<Part> {
    let m = if kind == "image" {
        modality::IMAGE
    } else {
        modality::DOCUMENT
    };
    match str_field(source, "type")? {
        "base64" => Some(Part::blob(
            m,
            string_field(source, "media_type"),
            str_field(source, "data")?,
        )),
        "url" => Some(Part::uri(m, str_field(source, "url")?)),
        "file" => Some(Part::file(m, str_field(source, "file_id")?)),
        _ => None,
    }
}

fn block_from_wire(value: &Value, path: &str) -> Result<Part, ConvoError> {
    let obj = as_object(value, ANTHROPIC, path)?;
    let block_type = str_field(obj, "type")
        .ok_or_else(|| malformed(ANTHROPIC, path, "block has no string `type`"))?;
    let text = |key: &str| {
        str_field(obj, key)
            .ok_or_else(|| malformed(ANTHROPIC, path, &format!("`{block_type}` block has no `{key}`")))
    };

    let (part, mut metadata) = match block_type {
        "text" => (Part::text(text("text")?), extract(ANTHROPIC, obj, &["type", "text"])),
        "image" | "document" => {
            let media = obj
                .get("source")
                .and_then(Value::as_object)
                .and_then(|source| media_from_source(block_type, source));
            match media {
                Some(part) => (part, extract(ANTHROPIC, obj, &["type", "source"])),
                None => return Part::from_value(value),
            }
        }
        "tool_use" => {
            let mut metadata = extract(ANTHROPIC, obj, &["type", "id", "name", "input"]);
            let name = take_original_name(&mut metadata, text("name")?);
            let part = Part::tool_call(
                string_field(obj, "id"),
                name,
                obj.get("input").cloned().unwrap_or(Value::Null),
            );
            (part, metadata)
        }
        "tool_result" => {
            let mut metadata = extract(ANTHROPIC, obj, &["type", "tool_use_id", "content", "is_error"]);
            if let Some(is_error) = obj.get("is_error").and_then(Value::as_bool) {
                set_known_field(&mut metadata, ANTHROPIC, names::IS_ERROR, Value::Bool(is_error));
            }
            let part = Part::tool_call_response(
                string_field(obj, "tool_use_id"),
                obj.get("content").cloned().unwrap_or(Value::Null),
            );
            (part, metadata)
        }
        "thinking" => (
            Part::reasoning(text("thinking")?),
            extract(ANTHROPIC, obj, &["type", "thinking"]),
        ),
        REDACTED_THINKING => {
            let mut metadata = extract(ANTHROPIC, obj, &["type", "data"]);
            set_known_field(
                &mut metadata,
                ANTHROPIC,
                names::ORIGINAL_TYPE,
                Value::from(REDACTED_THINKING),
            );
            (Part::reasoning(text("data")?), metadata)
        }
        _ => return Part::from_value(value),
    };
    if let Some(bag) = metadata.take() {
        return Ok(part.with_metadata(bag));
    }
    Ok(part)
}

fn system_from_wire(value: &Value) -> Result<Vec<Part>, ConvoError> {
    match value {
        Value::String(text) => Ok(vec![Part::text(text.as_str())]),
        Value::Array(blocks) => blocks
            .iter()
            .enumerate()
            .map(|(j, b)| block_from_wire(b, &format!("/system/{j}")))
            .collect(),
        _ => Err(malformed(ANTHROPIC, "/system", "expected a string or an array of blocks")),
    }
}

// ── Raising ─────────────────────────────────────────────────────────────

fn wire_role(role: &str) -> &'static str {
    if role == role::ASSISTANT {
        "assistant"
    } else {
        // tool results and any other role ride in user turns
        "user"
    }
}

fn message_to_wire(message: &Message, mode: MetadataMode) -> Value {
    let mut bag = message.metadata.clone();
    let content = match message.parts.as_slice() {
        [single] if single.as_text().is_some() => {
            stash_parts_metadata(mode, ANTHROPIC, &mut bag, std::slice::from_ref(single));
            Value::String(single.as_text().unwrap_or_default().to_string())
        }
        [] => Value::String(String::new()),
        parts => Value::Array(parts.iter().map(|p| block_to_wire(p, mode)).collect()),
    };
    let mut obj = fields([
        ("role", Value::from(wire_role(&message.role))),
        ("content", content),
    ]);
    if let Some(reason) = &message.finish_reason {
        obj.insert("stop_reason".into(), Value::String(reason.clone()));
    }
    if message.name.is_some() {
        tracing::trace!(target: "convo_metadata", provider = ANTHROPIC, "participant name dropped");
    }
    finish(mode, bag.as_ref(), obj)
}

fn system_to_wire(parts: &[Part], mode: MetadataMode) -> Value {
    Value::Array(parts.iter().map(|p| block_to_wire(p, mode)).collect())
}

fn media_kind(m: &str) -> &'static str {
    if m == modality::IMAGE {
        "image"
    } else {
        "document"
    }
}

fn block_to_wire(part: &Part, mode: MetadataMode) -> Value {
    let mut bag: Option<MetadataBag> = part.metadata.clone();
    let obj = match &part.kind {
        PartKind::Text { content } => fields([
            ("type", Value::from("text")),
            ("text", Value::String(content.clone())),
        ]),
        PartKind::Reasoning { content } => {
            if take_known_marker(&mut bag, names::ORIGINAL_TYPE, REDACTED_THINKING) {
                fields([
                    ("type", Value::from(REDACTED_THINKING)),
                    ("data", Value::String(content.clone())),
                ])
            } else {
                fields([
                    ("type", Value::from("thinking")),
                    ("thinking", Value::String(content.clone())),
                ])
            }
        }
        PartKind::Blob {
            modality: m,
            mime_type,
            content,
        } => fields([
            ("type", Value::from(media_kind(m))),
            (
                "source",
                Value::Object(fields([
                    ("type", Value::from("base64")),
                    (
                        "media_type",
                        Value::from(mime_type.as_deref().unwrap_or(DEFAULT_MEDIA_TYPE)),
                    ),
                    ("data", Value::String(content.clone())),
                ])),
            ),
        ]),
        PartKind::Uri { modality: m, uri, .. } => fields([
            ("type", Value::from(media_kind(m))),
            (
                "source",
                Value::Object(fields([
                    ("type", Value::from("url")),
                    ("url", Value::String(uri.clone())),
                ])),
            ),
        ]),
        PartKind::File {
            modality: m,
            file_id,
            ..
        } => fields([
            ("type", Value::from(media_kind(m))),
            (
                "source",
                Value::Object(fields([
                    ("type", Value::from("file")),
                    ("file_id", Value::String(file_id.clone())),
                ])),
            ),
        ]),
        PartKind::ToolCall {
            id,
            name,
            arguments,
        } => {
            let wire_name = emit_tool_name(ANTHROPIC, name, &[], &mut bag);
            let mut obj = fields([("type", Value::from("tool_use"))]);
            if let Some(id) = id {
                obj.insert("id".into(), Value::String(id.clone()));
            }
            obj.insert("name".into(), Value::String(wire_name));
            obj.insert("input".into(), arguments.clone());
            obj
        }
        PartKind::ToolCallResponse { id, response } => {
            let mut obj = fields([("type", Value::from("tool_result"))]);
            if let Some(id) = id {
                obj.insert("tool_use_id".into(), Value::String(id.clone()));
            }
            match response {
                Value::Null => {}
                Value::String(_) | Value::Array(_) => {
                    obj.insert("content".into(), response.clone());
                }
                other => {
                    obj.insert("content".into(), Value::String(other.to_string()));
                }
            }
            if let Some(Value::Bool(is_error)) = known_field(bag.as_ref(), names::IS_ERROR).cloned() {
                remove_known_field(&mut bag, names::IS_ERROR);
                obj.insert("is_error".into(), Value::Bool(is_error));
            }
            obj
        }
        PartKind::Generic { .. } => part.to_fields(),
    };
    finish(mode, bag.as_ref(), obj)
}
