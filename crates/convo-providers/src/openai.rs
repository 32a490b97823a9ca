// SPDX-License-Identifier: MIT OR Apache-2.0
//! OpenAI Chat Completions messages.
//!
//! System instructions are ordinary `system` messages. Content is either a
//! string or an array of typed content parts; tool calls live in a separate
//! `tool_calls` array and results come back as `tool` messages.

use convo_error::{ConvoError, ValidationResult};
use convo_ir::{Conversation, FieldMap, Message, MetadataBag, Part, PartKind, modality, role};
use convo_metadata::{
    MetadataMode, bag_from_extras, extract, merge_bags, names, remove_known_field,
    restore_parts_metadata, set_known_field, stash_parts_metadata,
};
use convo_provider::{Direction, Provider, ProviderOutput, RawInput};
use serde_json::Value;
use std::collections::VecDeque;

use crate::common::{
    Issues, arguments_string, as_object, bare_text, data_url, emission_copy, emit_tool_name,
    fields, finish, malformed, parse_arguments, parse_data_url, str_field, string_field,
    take_original_name,
};

/// Format tag.
pub const OPENAI: &str = "openai";

const ROLES: &[&str] = &["system", "developer", "user", "assistant", "tool", "function"];
const CONTENT_TYPES: &[&str] = &["text", "image_url", "input_audio", "file", "refusal"];
const MESSAGE_KEYS: &[&str] = &[
    "role",
    "content",
    "name",
    "tool_calls",
    "tool_call_id",
    "reasoning_content",
    "finish_reason",
];
const TOOL_CALL_KEYS: &[&str] = &["id", "type", "function"];

/// Adapter for Chat Completions messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiProvider;

impl Provider for OpenAiProvider {
    fn name(&self) -> &'static str {
        OPENAI
    }

    fn validate_messages(&self, messages: &[Value]) -> ValidationResult {
        let mut issues = Issues::default();
        for (i, message) in messages.iter().enumerate() {
            let path = format!("/{i}");
            let Some(obj) = issues.object(message, &path) else {
                continue;
            };
            issues.one_of(obj, "role", ROLES, &path);
            issues.opt_string(obj, "name", &path);
            issues.forbid(obj, "parts", &path);
            match obj.get("content") {
                Some(Value::Null | Value::String(_)) => {}
                Some(Value::Array(items)) => {
                    for (j, item) in items.iter().enumerate() {
                        let item_path = format!("{path}/content/{j}");
                        if let Some(item) = issues.object(item, &item_path) {
                            issues.one_of(item, "type", CONTENT_TYPES, &item_path);
                        }
                    }
                }
                Some(_) => issues.push(format!("{path}/content"), "expected a string, null or an array"),
                None if obj.contains_key("tool_calls") => {}
                None => issues.push(format!("{path}/content"), "missing content"),
            }
            if let Some(calls) = obj.get("tool_calls") {
                validate_tool_calls(&mut issues, calls, &format!("{path}/tool_calls"));
            }
            if str_field(obj, "role") == Some("tool") {
                issues.string(obj, "tool_call_id", &path);
            }
        }
        issues.finish()
    }

    fn to_canonical(
        &self,
        input: &RawInput,
        _system: Option<&Value>,
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
        Ok(Conversation::from_messages(messages))
    }

    fn supports_target(&self) -> bool {
        true
    }

    fn to_provider_format(
        &self,
        messages: &[Message],
        mode: MetadataMode,
    ) -> Result<ProviderOutput, ConvoError> {
        let mut out = Vec::with_capacity(messages.len());
        for message in messages {
            out.extend(message_to_wire(message, mode));
        }
        Ok(ProviderOutput::messages(out))
    }
}

fn validate_tool_calls(issues: &mut Issues, calls: &Value, path: &str) {
    let Some(calls) = calls.as_array() else {
        issues.push(path, "expected an array");
        return;
    };
    for (j, call) in calls.iter().enumerate() {
        let call_path = format!("{path}/{j}");
        let Some(call) = issues.object(call, &call_path) else {
            continue;
        };
        match call.get("function").and_then(Value::as_object) {
            Some(function) => issues.string(function, "name", &format!("{call_path}/function")),
            None => issues.push(format!("{call_path}/function"), "expected an object"),
        }
    }
}

// ── Lowering ────────────────────────────────────────────────────────────

fn message_from_wire(value: &Value, path: &str) -> Result<Message, ConvoError> {
    let obj = as_object(value, OPENAI, path)?;
    let role = string_field(obj, "role")
        .ok_or_else(|| malformed(OPENAI, path, "message has no string `role`"))?;

    let mut parts = Vec::new();
    if let Some(reasoning) = str_field(obj, "reasoning_content") {
        parts.push(Part::reasoning(reasoning));
    }
    if role == role::TOOL {
        parts.push(Part::tool_call_response(
            string_field(obj, "tool_call_id"),
            obj.get("content").cloned().unwrap_or(Value::Null),
        ));
    } else {
        match obj.get("content") {
            Some(Value::String(text)) => parts.push(Part::text(text.as_str())),
            Some(Value::Array(items)) => {
                for (j, item) in items.iter().enumerate() {
                    parts.push(content_part_from_wire(item, &format!("{path}/content/{j}"))?);
                }
            }
            _ => {}
        }
    }
    if let Some(Value::Array(calls)) = obj.get("tool_calls") {
        for (j, call) in calls.iter().enumerate() {
            parts.push(tool_call_from_wire(call, &format!("{path}/tool_calls/{j}"))?);
        }
    }

    let mut metadata = extract(OPENAI, obj, MESSAGE_KEYS);
    restore_layout(&mut metadata, &mut parts);
    restore_parts_metadata(&mut metadata, &mut parts);
    Ok(Message {
        role,
        parts,
        name: string_field(obj, "name"),
        finish_reason: string_field(obj, "finish_reason"),
        metadata,
    })
}

/// Fields of a nested object other than `consumed`, kept as part metadata.
fn nested_extras(obj: &FieldMap, consumed: &[&str]) -> FieldMap {
    obj.iter()
        .filter(|(k, _)| !consumed.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn with_nested(part: Part, outer: Option<MetadataBag>, nested: FieldMap) -> Part {
    let mut bag = outer.unwrap_or_default();
    if let Some(inner) = bag_from_extras(OPENAI, nested) {
        merge_bags(&mut bag, inner);
    }
    part.with_metadata(bag)
}

fn content_part_from_wire(value: &Value, path: &str) -> Result<Part, ConvoError> {
    let obj = as_object(value, OPENAI, path)?;
    let part_type = str_field(obj, "type")
        .ok_or_else(|| malformed(OPENAI, path, "content part has no string `type`"))?;
    let outer = |keys: &[&str]| extract(OPENAI, obj, keys);

    let part = match part_type {
        "text" => {
            let text = str_field(obj, "text")
                .ok_or_else(|| malformed(OPENAI, path, "text part has no `text`"))?;
            Part::text(text).with_metadata(outer(&["type", "text"]).unwrap_or_default())
        }
        "image_url" => {
            let (url, nested) = match obj.get("image_url") {
                Some(Value::String(url)) => (url.clone(), FieldMap::new()),
                Some(Value::Object(image)) => (
                    string_field(image, "url").unwrap_or_default(),
                    nested_extras(image, &["url"]),
                ),
                _ => return Err(malformed(OPENAI, path, "image_url part has no `image_url`")),
            };
            let part = match parse_data_url(&url) {
                Some((mime, data)) => Part::blob(modality::IMAGE, mime, data),
                None => Part::uri(modality::IMAGE, url),
            };
            with_nested(part, outer(&["type", "image_url"]), nested)
        }
        "input_audio" => {
            let audio = obj
                .get("input_audio")
                .and_then(Value::as_object)
                .ok_or_else(|| malformed(OPENAI, path, "input_audio part has no `input_audio`"))?;
            let mime = str_field(audio, "format").map(|f| format!("audio/{f}"));
            let data = string_field(audio, "data").unwrap_or_default();
            with_nested(
                Part::blob(modality::AUDIO, mime, data),
                outer(&["type", "input_audio"]),
                nested_extras(audio, &["data", "format"]),
            )
        }
        "file" => {
            let file = obj
                .get("file")
                .and_then(Value::as_object)
                .ok_or_else(|| malformed(OPENAI, path, "file part has no `file`"))?;
            let part = if let Some(id) = str_field(file, "file_id") {
                Part::file(modality::DOCUMENT, id)
            } else {
                let raw = string_field(file, "file_data").unwrap_or_default();
                match parse_data_url(&raw) {
                    Some((mime, data)) => Part::blob(modality::DOCUMENT, mime, data),
                    None => Part::blob(modality::DOCUMENT, None, raw),
                }
            };
            with_nested(
                part,
                outer(&["type", "file"]),
                nested_extras(file, &["file_id", "file_data"]),
            )
        }
        _ => Part::from_value(value)?,
    };
    Ok(part)
}

fn tool_call_from_wire(value: &Value, path: &str) -> Result<Part, ConvoError> {
    let obj = as_object(value, OPENAI, path)?;
    let function = obj
        .get("function")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed(OPENAI, path, "tool call has no `function`"))?;
    let wire_name = str_field(function, "name")
        .ok_or_else(|| malformed(OPENAI, path, "tool call has no function name"))?;
    let arguments = parse_arguments(function.get("arguments").cloned().unwrap_or(Value::Null));

    let mut metadata = extract(OPENAI, obj, TOOL_CALL_KEYS);
    let name = take_original_name(&mut metadata, wire_name);
    let part = Part::tool_call(string_field(obj, "id"), name, arguments);
    Ok(part.with_metadata(metadata.unwrap_or_default()))
}

// ── Raising ─────────────────────────────────────────────────────────────

/// One canonical message may become several wire messages: each tool result
/// is its own `tool` message.
fn message_to_wire(message: &Message, mode: MetadataMode) -> Vec<Value> {
    let message = emission_copy(message);
    let (responses, rest): (Vec<&Part>, Vec<&Part>) = message
        .parts
        .iter()
        .partition(|p| matches!(p.kind, PartKind::ToolCallResponse { .. }));

    let mut out = Vec::new();
    let mut message_bag = message.metadata.clone();
    let regular = !rest.is_empty() || responses.is_empty();

    for (i, part) in responses.iter().enumerate() {
        let bag = if i == 0 && !regular {
            message_bag.take()
        } else {
            None
        };
        out.push(tool_message(&message, part, bag, mode));
    }
    if regular {
        out.push(regular_message(&message, &rest, message_bag, mode));
    }
    out
}

fn tool_message(
    message: &Message,
    part: &Part,
    mut bag: Option<MetadataBag>,
    mode: MetadataMode,
) -> Value {
    let PartKind::ToolCallResponse { id, response } = &part.kind else {
        return Value::Null;
    };
    let content = match response {
        Value::String(_) | Value::Array(_) => response.clone(),
        Value::Null => Value::String(String::new()),
        other => Value::String(other.to_string()),
    };
    let mut obj = fields([("role", Value::from(role::TOOL))]);
    if let Some(id) = id {
        obj.insert("tool_call_id".into(), Value::String(id.clone()));
    }
    obj.insert("content".into(), content);
    if let Some(name) = &message.name {
        obj.insert("name".into(), Value::String(name.clone()));
    }
    stash_parts_metadata(mode, OPENAI, &mut bag, std::slice::from_ref(part));
    finish(mode, bag.as_ref(), obj)
}

fn regular_message(
    message: &Message,
    parts: &[&Part],
    mut bag: Option<MetadataBag>,
    mode: MetadataMode,
) -> Value {
    let mut collapsed: Vec<Part> = Vec::new();
    let mut reasoning = String::new();
    let mut segments = Vec::new();
    let mut content_parts: Vec<&Part> = Vec::new();
    let mut tool_calls = Vec::new();
    let mut layout = Vec::with_capacity(parts.len());

    for part in parts {
        let slot = Slot::of(part);
        layout.push(slot);
        match (&part.kind, slot) {
            (PartKind::Reasoning { content }, _) => {
                reasoning.push_str(content);
                segments.push(content.chars().count());
                collapsed.push((*part).clone());
            }
            (_, Slot::ToolCall) => tool_calls.push(tool_call_to_wire(part, mode)),
            _ => content_parts.push(part),
        }
    }

    let content = match content_parts.as_slice() {
        [single] if single.as_text().is_some() => {
            collapsed.push((*single).clone());
            Value::String(single.as_text().unwrap_or_default().to_string())
        }
        [] if !tool_calls.is_empty() || !segments.is_empty() => Value::Null,
        [] => Value::String(String::new()),
        many => Value::Array(many.iter().map(|p| content_part_to_wire(p, mode)).collect()),
    };

    let mut obj = fields([
        ("role", Value::String(message.role.clone())),
        ("content", content),
    ]);
    if let Some(name) = &message.name {
        obj.insert("name".into(), Value::String(name.clone()));
    }
    if !tool_calls.is_empty() {
        obj.insert("tool_calls".into(), Value::Array(tool_calls));
    }
    if !segments.is_empty() {
        obj.insert("reasoning_content".into(), Value::String(reasoning));
    }
    if let Some(reason) = &message.finish_reason {
        obj.insert("finish_reason".into(), Value::String(reason.clone()));
    }
    if mode == MetadataMode::Preserve {
        record_layout(&mut bag, &layout, &segments);
    }
    stash_parts_metadata(mode, OPENAI, &mut bag, &collapsed);
    finish(mode, bag.as_ref(), obj)
}

/// Wire slot a part lands in. Chat messages group reasoning first, then
/// content, then tool calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    Reasoning,
    Content,
    ToolCall,
}

impl Slot {
    fn of(part: &Part) -> Self {
        match part.kind {
            PartKind::Reasoning { .. } => Self::Reasoning,
            PartKind::ToolCall { .. } => Self::ToolCall,
            _ => Self::Content,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Reasoning => "reasoning",
            Self::Content => "content",
            Self::ToolCall => "tool_call",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "reasoning" => Some(Self::Reasoning),
            "content" => Some(Self::Content),
            "tool_call" => Some(Self::ToolCall),
            _ => None,
        }
    }
}

/// Record the part order and reasoning boundaries the wire shape loses.
/// Nothing is written when the grouped order already matches.
fn record_layout(bag: &mut Option<MetadataBag>, layout: &[Slot], segments: &[usize]) {
    remove_known_field(bag, names::PART_ORDER);
    remove_known_field(bag, names::REASONING_LENGTHS);
    let grouped = layout.windows(2).all(|w| w[0] <= w[1]);
    if grouped && segments.len() <= 1 {
        return;
    }
    let order = layout.iter().map(|slot| Value::from(slot.as_str())).collect();
    set_known_field(bag, OPENAI, names::PART_ORDER, Value::Array(order));
    if segments.len() > 1 {
        set_known_field(bag, OPENAI, names::REASONING_LENGTHS, Value::from(segments.to_vec()));
    }
}

/// Undo [`record_layout`]. A layout that does not fit the parts read from
/// the wire is dropped and the grouped order stays.
fn restore_layout(bag: &mut Option<MetadataBag>, parts: &mut Vec<Part>) {
    let lengths = remove_known_field(bag, names::REASONING_LENGTHS);
    let order = remove_known_field(bag, names::PART_ORDER);

    let mut reasoning = VecDeque::new();
    let mut content = VecDeque::new();
    let mut calls = VecDeque::new();
    for part in parts.drain(..) {
        match Slot::of(&part) {
            Slot::Reasoning => reasoning.push_back(part),
            Slot::Content => content.push_back(part),
            Slot::ToolCall => calls.push_back(part),
        }
    }
    if let Some(Value::Array(lengths)) = lengths
        && reasoning.len() == 1
        && let Some(lengths) = lengths
            .iter()
            .map(|n| n.as_u64().and_then(|n| usize::try_from(n).ok()))
            .collect::<Option<Vec<_>>>()
        && let Some(part) = reasoning.pop_front()
    {
        reasoning.extend(split_reasoning(part, &lengths));
    }

    let order = match order {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().and_then(Slot::parse))
            .collect::<Option<Vec<_>>>(),
        _ => None,
    };
    let fits = order.as_ref().is_some_and(|order| {
        let count = |slot| order.iter().filter(|s| **s == slot).count();
        count(Slot::Reasoning) == reasoning.len()
            && count(Slot::Content) == content.len()
            && count(Slot::ToolCall) == calls.len()
    });
    match order {
        Some(order) if fits => {
            for slot in order {
                let queue = match slot {
                    Slot::Reasoning => &mut reasoning,
                    Slot::Content => &mut content,
                    Slot::ToolCall => &mut calls,
                };
                parts.extend(queue.pop_front());
            }
        }
        _ => parts.extend(reasoning.into_iter().chain(content).chain(calls)),
    }
}

/// Cut one reasoning part back into segments of the given character lengths.
fn split_reasoning(part: Part, lengths: &[usize]) -> Vec<Part> {
    let PartKind::Reasoning { content } = &part.kind else {
        return vec![part];
    };
    if lengths.iter().sum::<usize>() != content.chars().count() {
        return vec![part];
    }
    let mut chars = content.chars();
    let mut out: Vec<Part> = lengths
        .iter()
        .map(|&n| Part::reasoning(chars.by_ref().take(n).collect::<String>()))
        .collect();
    if let Some(first) = out.first_mut() {
        first.metadata = part.metadata;
    }
    out
}

fn content_part_to_wire(part: &Part, mode: MetadataMode) -> Value {
    let obj = match &part.kind {
        PartKind::Text { content } => fields([
            ("type", Value::from("text")),
            ("text", Value::String(content.clone())),
        ]),
        PartKind::Blob {
            modality: m,
            mime_type,
            content,
        } => match m.as_str() {
            modality::IMAGE => fields([
                ("type", Value::from("image_url")),
                (
                    "image_url",
                    Value::Object(fields([(
                        "url",
                        Value::String(data_url(mime_type.as_deref(), content)),
                    )])),
                ),
            ]),
            modality::AUDIO => {
                let format = mime_type
                    .as_deref()
                    .and_then(|m| m.strip_prefix("audio/"))
                    .unwrap_or("wav");
                fields([
                    ("type", Value::from("input_audio")),
                    (
                        "input_audio",
                        Value::Object(fields([
                            ("data", Value::String(content.clone())),
                            ("format", Value::from(format)),
                        ])),
                    ),
                ])
            }
            _ => fields([
                ("type", Value::from("file")),
                (
                    "file",
                    Value::Object(fields([(
                        "file_data",
                        Value::String(data_url(mime_type.as_deref(), content)),
                    )])),
                ),
            ]),
        },
        PartKind::Uri {
            modality: m, uri, ..
        } if m == modality::IMAGE => fields([
            ("type", Value::from("image_url")),
            (
                "image_url",
                Value::Object(fields([("url", Value::String(uri.clone()))])),
            ),
        ]),
        PartKind::File { file_id, .. } => fields([
            ("type", Value::from("file")),
            (
                "file",
                Value::Object(fields([("file_id", Value::String(file_id.clone()))])),
            ),
        ]),
        _ => part.to_fields(),
    };
    finish(mode, part.metadata.as_ref(), obj)
}

fn tool_call_to_wire(part: &Part, mode: MetadataMode) -> Value {
    let PartKind::ToolCall {
        id,
        name,
        arguments,
    } = &part.kind
    else {
        return Value::Null;
    };
    let mut bag = part.metadata.clone();
    let wire_name = emit_tool_name(OPENAI, name, &[], &mut bag);
    let mut obj = FieldMap::new();
    if let Some(id) = id {
        obj.insert("id".into(), Value::String(id.clone()));
    }
    obj.insert("type".into(), Value::from("function"));
    obj.insert(
        "function".into(),
        Value::Object(fields([
            ("name", Value::String(wire_name)),
            ("arguments", Value::String(arguments_string(arguments))),
        ])),
    );
    finish(mode, bag.as_ref(), obj)
}
