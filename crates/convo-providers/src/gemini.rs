// SPDX-License-Identifier: MIT OR Apache-2.0
//! Gemini `generateContent` contents.
//!
//! Messages are `{role, parts}` with the assistant role spelled `model`.
//! Parts are keyed by their payload (`text`, `inlineData`, `functionCall`,
//! ...) rather than by a `type` tag. The system prompt travels separately as
//! `systemInstruction`.

use std::collections::HashMap;

use convo_error::{ConvoError, ValidationResult};
use convo_ir::{Conversation, FieldMap, Message, MetadataBag, Part, PartKind, modality, role};
use convo_metadata::{
    MetadataMode, extract, merge_bags, names, remove_known_field, restore_parts_metadata,
    set_known_field,
};
use convo_provider::{Direction, Provider, ProviderOutput, RawInput};
use convo_system::extract_system;
use serde_json::Value;

use crate::common::{
    Issues, as_object, bare_text, emission_copy, emit_tool_name, fields, finish, malformed,
    str_field, string_field, take_known_marker, take_original_name,
};

/// Format tag.
pub const GEMINI: &str = "gemini";

/// Gemini function names may also contain dots and colons.
const TOOL_NAME_EXTRA: &[char] = &['.', ':'];
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";
const FILE_MARKER: &str = "file";

const ROLES: &[&str] = &["user", "model", "function"];
const PART_KEYS: &[&str] = &[
    "text",
    "inlineData",
    "fileData",
    "functionCall",
    "functionResponse",
    "executableCode",
    "codeExecutionResult",
];
const MESSAGE_KEYS: &[&str] = &["role", "parts", "finishReason"];
const SYSTEM_KEYS: &[&str] = &["role", "parts"];

/// Adapter for Gemini contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiProvider;

impl Provider for GeminiProvider {
    fn name(&self) -> &'static str {
        GEMINI
    }

    fn validate_messages(&self, messages: &[Value]) -> ValidationResult {
        let mut issues = Issues::default();
        for (i, message) in messages.iter().enumerate() {
            let path = format!("/{i}");
            let Some(obj) = issues.object(message, &path) else {
                continue;
            };
            if obj.contains_key("role") {
                issues.one_of(obj, "role", ROLES, &path);
            }
            issues.forbid(obj, "content", &path);
            issues.forbid(obj, "type", &path);
            match obj.get("parts") {
                Some(Value::Array(parts)) => validate_parts(&mut issues, parts, &format!("{path}/parts")),
                _ => issues.push(format!("{path}/parts"), "expected an array of parts"),
            }
        }
        issues.finish()
    }

    fn validate_system(&self, system: &Value) -> ValidationResult {
        let mut issues = Issues::default();
        match system {
            Value::String(_) => {}
            Value::Object(obj) => match obj.get("parts") {
                Some(Value::Array(parts)) => {
                    for (j, part) in parts.iter().enumerate() {
                        let path = format!("/parts/{j}");
                        if let Some(part) = issues.object(part, &path) {
                            issues.string(part, "text", &path);
                        }
                    }
                }
                _ => issues.push("/parts", "expected an array of parts"),
            },
            _ => issues.push("", "expected a string or a content object"),
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
                .map(|(i, m)| message_from_wire(m, &format!("/{i}"), direction))
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
        let call_names = tool_call_names(messages);
        let (rest, mut system_parts) =
            extract_system(GEMINI, messages.iter().map(emission_copy).collect());
        let out = rest
            .iter()
            .map(|m| message_to_wire(m, mode, &call_names))
            .collect();

        // systemInstruction is one object, so message-level bags land on it
        // while positions stay on the parts.
        let mut system_bag = MetadataBag::new();
        for part in &mut system_parts {
            if let Some(Value::Object(bag)) = remove_known_field(&mut part.metadata, names::MESSAGE_METADATA) {
                merge_bags(&mut system_bag, bag);
            }
        }
        let system = (!system_parts.is_empty()).then(|| {
            let parts = system_parts
                .iter()
                .map(|p| part_to_wire(p, mode, &call_names))
                .collect();
            let bag = (!system_bag.is_empty()).then_some(&system_bag);
            finish(mode, bag, fields([("parts", Value::Array(parts))]))
        });
        Ok(ProviderOutput::messages(out).with_system(system))
    }
}

fn validate_parts(issues: &mut Issues, parts: &[Value], path: &str) {
    for (j, part) in parts.iter().enumerate() {
        let part_path = format!("{path}/{j}");
        if let Some(obj) = issues.object(part, &part_path)
            && !PART_KEYS.iter().any(|k| obj.contains_key(*k))
        {
            issues.push(part_path, "part carries no known payload");
        }
    }
}

// ── Lowering ────────────────────────────────────────────────────────────

fn canonical_role(wire: Option<&str>, parts: &[Part], direction: Direction) -> String {
    let only_responses = !parts.is_empty()
        && parts
            .iter()
            .all(|p| matches!(p.kind, PartKind::ToolCallResponse { .. }));
    match wire {
        Some("model") => role::ASSISTANT.to_string(),
        Some("function") => role::TOOL.to_string(),
        Some("user") if only_responses => role::TOOL.to_string(),
        Some(other) => other.to_string(),
        None => direction.default_role().to_string(),
    }
}

fn message_from_wire(value: &Value, path: &str, direction: Direction) -> Result<Message, ConvoError> {
    let obj = as_object(value, GEMINI, path)?;
    let mut parts = parts_from_wire(obj.get("parts"), path)?;
    let role = canonical_role(str_field(obj, "role"), &parts, direction);
    let mut metadata = extract(GEMINI, obj, MESSAGE_KEYS);
    restore_parts_metadata(&mut metadata, &mut parts);
    Ok(Message {
        role,
        parts,
        name: None,
        finish_reason: string_field(obj, "finishReason"),
        metadata,
    })
}

fn parts_from_wire(parts: Option<&Value>, path: &str) -> Result<Vec<Part>, ConvoError> {
    match parts {
        Some(Value::Array(raw)) => raw
            .iter()
            .enumerate()
            .map(|(j, p)| part_from_wire(p, &format!("{path}/parts/{j}")))
            .collect(),
        _ => Ok(Vec::new()),
    }
}

fn inner<'a>(obj: &'a FieldMap, key: &str, path: &str) -> Result<&'a FieldMap, ConvoError> {
    obj.get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| malformed(GEMINI, path, &format!("`{key}` must be an object")))
}

fn part_from_wire(value: &Value, path: &str) -> Result<Part, ConvoError> {
    let obj = as_object(value, GEMINI, path)?;

    if let Some(text) = obj.get("text") {
        let text = text
            .as_str()
            .ok_or_else(|| malformed(GEMINI, path, "`text` must be a string"))?;
        let thought = obj.get("thought").and_then(Value::as_bool) == Some(true);
        let part = if thought {
            Part::reasoning(text)
        } else {
            Part::text(text)
        };
        let keys: &[&str] = if thought { &["text", "thought"] } else { &["text"] };
        return Ok(attach(part, extract(GEMINI, obj, keys)));
    }

    if obj.contains_key("inlineData") {
        let data = inner(obj, "inlineData", path)?;
        let mime = string_field(data, "mimeType");
        let content = str_field(data, "data")
            .ok_or_else(|| malformed(GEMINI, path, "`inlineData` has no `data`"))?;
        let m = mime.as_deref().map_or(modality::DOCUMENT, modality::from_mime);
        let part = Part::blob(m, mime, content);
        return Ok(attach(part, extract(GEMINI, obj, &["inlineData"])));
    }

    if obj.contains_key("fileData") {
        let data = inner(obj, "fileData", path)?;
        let mime_type = string_field(data, "mimeType");
        let uri = string_field(data, "fileUri")
            .ok_or_else(|| malformed(GEMINI, path, "`fileData` has no `fileUri`"))?;
        let m = mime_type
            .as_deref()
            .map_or(modality::DOCUMENT, modality::from_mime)
            .to_string();
        let mut metadata = extract(GEMINI, obj, &["fileData"]);
        let kind = if take_known_marker(&mut metadata, names::ORIGINAL_TYPE, FILE_MARKER) {
            PartKind::File {
                modality: m,
                mime_type,
                file_id: uri,
            }
        } else {
            PartKind::Uri {
                modality: m,
                mime_type,
                uri,
            }
        };
        return Ok(attach(kind.into(), metadata));
    }

    if obj.contains_key("functionCall") {
        let call = inner(obj, "functionCall", path)?;
        let wire_name = str_field(call, "name")
            .ok_or_else(|| malformed(GEMINI, path, "`functionCall` has no `name`"))?;
        let mut metadata = extract(GEMINI, obj, &["functionCall"]);
        let name = take_original_name(&mut metadata, wire_name);
        let part = Part::tool_call(
            string_field(call, "id"),
            name,
            call.get("args").cloned().unwrap_or(Value::Null),
        );
        return Ok(attach(part, metadata));
    }

    if obj.contains_key("functionResponse") {
        let response = inner(obj, "functionResponse", path)?;
        let mut metadata = extract(GEMINI, obj, &["functionResponse"]);
        let name = take_original_name(&mut metadata, str_field(response, "name").unwrap_or_default());
        set_known_field(&mut metadata, GEMINI, names::ORIGINAL_NAME, Value::String(name));
        let part = Part::tool_call_response(
            string_field(response, "id"),
            response.get("response").cloned().unwrap_or(Value::Null),
        );
        return Ok(attach(part, metadata));
    }

    // executableCode, codeExecutionResult and anything newer
    match obj.keys().next() {
        Some(key) => Ok(Part::generic(key.clone(), obj.clone())),
        None => Err(malformed(GEMINI, path, "empty part")),
    }
}

fn attach(part: Part, metadata: Option<MetadataBag>) -> Part {
    match metadata {
        Some(bag) => part.with_metadata(bag),
        None => part,
    }
}

fn system_from_wire(value: &Value) -> Result<Vec<Part>, ConvoError> {
    match value {
        Value::String(text) => Ok(vec![Part::text(text.as_str())]),
        Value::Object(obj) => {
            let mut parts = parts_from_wire(obj.get("parts"), "/system")?;
            if let Some(bag) = extract(GEMINI, obj, SYSTEM_KEYS)
                && let Some(first) = parts.first_mut()
            {
                set_known_field(
                    &mut first.metadata,
                    GEMINI,
                    names::MESSAGE_METADATA,
                    Value::Object(bag),
                );
            }
            Ok(parts)
        }
        _ => Err(malformed(GEMINI, "/system", "expected a string or a content object")),
    }
}

// ── Raising ─────────────────────────────────────────────────────────────

/// Tool names by call id, for `functionResponse` parts that need one.
fn tool_call_names(messages: &[Message]) -> HashMap<&str, &str> {
    messages
        .iter()
        .flat_map(|m| &m.parts)
        .filter_map(|p| match &p.kind {
            PartKind::ToolCall {
                id: Some(id), name, ..
            } => Some((id.as_str(), name.as_str())),
            _ => None,
        })
        .collect()
}

fn wire_role(role: &str) -> &'static str {
    if role == role::ASSISTANT {
        "model"
    } else {
        "user"
    }
}

fn message_to_wire(message: &Message, mode: MetadataMode, call_names: &HashMap<&str, &str>) -> Value {
    let parts = message
        .parts
        .iter()
        .map(|p| part_to_wire(p, mode, call_names))
        .collect();
    let mut obj = fields([
        ("role", Value::from(wire_role(&message.role))),
        ("parts", Value::Array(parts)),
    ]);
    if let Some(reason) = &message.finish_reason {
        obj.insert("finishReason".into(), Value::String(reason.clone()));
    }
    if message.name.is_some() {
        tracing::trace!(target: "convo_metadata", provider = GEMINI, "participant name dropped");
    }
    finish(mode, message.metadata.as_ref(), obj)
}

fn file_data(mime_type: Option<&String>, uri: &str) -> Value {
    let mut data = FieldMap::new();
    if let Some(mime) = mime_type {
        data.insert("mimeType".into(), Value::String(mime.clone()));
    }
    data.insert("fileUri".into(), Value::from(uri));
    Value::Object(data)
}

fn part_to_wire(part: &Part, mode: MetadataMode, call_names: &HashMap<&str, &str>) -> Value {
    let mut bag = part.metadata.clone();
    let obj = match &part.kind {
        PartKind::Text { content } => fields([("text", Value::String(content.clone()))]),
        PartKind::Reasoning { content } => fields([
            ("text", Value::String(content.clone())),
            ("thought", Value::Bool(true)),
        ]),
        PartKind::Blob {
            mime_type, content, ..
        } => fields([(
            "inlineData",
            Value::Object(fields([
                (
                    "mimeType",
                    Value::from(mime_type.as_deref().unwrap_or(DEFAULT_MIME_TYPE)),
                ),
                ("data", Value::String(content.clone())),
            ])),
        )]),
        PartKind::Uri { mime_type, uri, .. } => {
            fields([("fileData", file_data(mime_type.as_ref(), uri))])
        }
        PartKind::File {
            mime_type, file_id, ..
        } => {
            set_known_field(&mut bag, GEMINI, names::ORIGINAL_TYPE, Value::from(FILE_MARKER));
            fields([("fileData", file_data(mime_type.as_ref(), file_id))])
        }
        PartKind::ToolCall {
            id,
            name,
            arguments,
        } => {
            let mut call = FieldMap::new();
            if let Some(id) = id {
                call.insert("id".into(), Value::String(id.clone()));
            }
            let wire_name = emit_tool_name(GEMINI, name, TOOL_NAME_EXTRA, &mut bag);
            call.insert("name".into(), Value::String(wire_name));
            if !arguments.is_null() {
                call.insert("args".into(), arguments.clone());
            }
            fields([("functionCall", Value::Object(call))])
        }
        PartKind::ToolCallResponse { id, response } => {
            let name = match remove_known_field(&mut bag, names::ORIGINAL_NAME) {
                Some(Value::String(name)) => name,
                _ => id
                    .as_deref()
                    .and_then(|id| call_names.get(id))
                    .map(|name| (*name).to_string())
                    .unwrap_or_default(),
            };
            let mut reply = FieldMap::new();
            if let Some(id) = id {
                reply.insert("id".into(), Value::String(id.clone()));
            }
            let wire_name = emit_tool_name(GEMINI, &name, TOOL_NAME_EXTRA, &mut bag);
            reply.insert("name".into(), Value::String(wire_name));
            reply.insert("response".into(), response.clone());
            fields([("functionResponse", Value::Object(reply))])
        }
        PartKind::Generic { part_type, fields } => {
            if fields.contains_key(part_type) {
                let mut obj = fields.clone();
                obj.shift_remove("type");
                obj
            } else {
                part.to_fields()
            }
        }
    };
    finish(mode, bag.as_ref(), obj)
}
