// SPDX-License-Identifier: MIT OR Apache-2.0
//! OpenAI Responses API input items.
//!
//! Input is a flat list of items: role-bearing messages, function calls,
//! function call outputs and reasoning summaries. The system prompt arrives
//! as the top-level `instructions` string. Only the source direction is
//! supported.

use convo_error::{ConvoError, ValidationResult};
use convo_ir::{Conversation, FieldMap, Message, MetadataBag, Part, modality, role};
use convo_metadata::{extract, restore_parts_metadata};
use convo_provider::{Direction, Provider, RawInput};
use serde_json::Value;

use crate::common::{
    Issues, as_object, bare_text, combine_system, malformed, parse_arguments, parse_data_url,
    str_field, string_field,
};

/// Format tag.
pub const OPENAI_RESPONSES: &str = "openai_responses";

const ROLES: &[&str] = &["system", "developer", "user", "assistant"];
const ITEM_TYPES: &[&str] = &[
    "message",
    "function_call",
    "function_call_output",
    "reasoning",
    "item_reference",
    "web_search_call",
    "file_search_call",
    "computer_call",
    "computer_call_output",
    "custom_tool_call",
    "custom_tool_call_output",
];
const CONTENT_TYPES: &[&str] = &[
    "input_text",
    "output_text",
    "input_image",
    "input_file",
    "input_audio",
    "refusal",
];
const MESSAGE_KEYS: &[&str] = &["type", "role", "content"];

/// Adapter for Responses API input.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiResponsesProvider;

impl Provider for OpenAiResponsesProvider {
    fn name(&self) -> &'static str {
        OPENAI_RESPONSES
    }

    fn validate_messages(&self, messages: &[Value]) -> ValidationResult {
        let mut issues = Issues::default();
        for (i, item) in messages.iter().enumerate() {
            let path = format!("/{i}");
            let Some(obj) = issues.object(item, &path) else {
                continue;
            };
            match str_field(obj, "type") {
                None | Some("message") => validate_message(&mut issues, obj, &path),
                Some("function_call") => {
                    issues.string(obj, "call_id", &path);
                    issues.string(obj, "name", &path);
                    issues.string(obj, "arguments", &path);
                }
                Some("function_call_output") => {
                    issues.string(obj, "call_id", &path);
                    if !obj.contains_key("output") {
                        issues.push(format!("{path}/output"), "missing output");
                    }
                }
                Some(_) => issues.one_of(obj, "type", ITEM_TYPES, &path),
            }
        }
        issues.finish()
    }

    fn validate_system(&self, system: &Value) -> ValidationResult {
        if system.is_string() {
            ValidationResult::ok()
        } else {
            ValidationResult::fail("", "instructions must be a string")
        }
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
                .map(|(i, item)| item_from_wire(item, &format!("/{i}"), direction))
                .collect::<Result<Vec<_>, _>>()?,
        };
        let instructions = match system {
            Some(Value::String(text)) => vec![Part::text(text.as_str())],
            Some(_) => {
                return Err(malformed(
                    OPENAI_RESPONSES,
                    "/system",
                    "instructions must be a string",
                ));
            }
            None => Vec::new(),
        };
        Ok(combine_system(OPENAI_RESPONSES, messages, instructions))
    }
}

fn validate_message(issues: &mut Issues, obj: &FieldMap, path: &str) {
    issues.one_of(obj, "role", ROLES, path);
    match obj.get("content") {
        Some(Value::String(_)) => {}
        Some(Value::Array(items)) => {
            for (j, item) in items.iter().enumerate() {
                let item_path = format!("{path}/content/{j}");
                if let Some(item) = issues.object(item, &item_path) {
                    issues.one_of(item, "type", CONTENT_TYPES, &item_path);
                }
            }
        }
        _ => issues.push(format!("{path}/content"), "expected a string or an array"),
    }
}

// ── Lowering ────────────────────────────────────────────────────────────

fn item_from_wire(value: &Value, path: &str, direction: Direction) -> Result<Message, ConvoError> {
    let obj = as_object(value, OPENAI_RESPONSES, path)?;
    match str_field(obj, "type") {
        None | Some("message") => message_from_wire(obj, path),
        Some("function_call") => {
            let name = str_field(obj, "name")
                .ok_or_else(|| malformed(OPENAI_RESPONSES, path, "function_call has no `name`"))?;
            let part = Part::tool_call(
                string_field(obj, "call_id"),
                name,
                parse_arguments(obj.get("arguments").cloned().unwrap_or(Value::Null)),
            );
            let bag = extract(OPENAI_RESPONSES, obj, &["type", "call_id", "name", "arguments"]);
            Ok(Message::new(role::ASSISTANT, vec![attach(part, bag)]))
        }
        Some("function_call_output") => {
            let part = Part::tool_call_response(
                string_field(obj, "call_id"),
                obj.get("output").cloned().unwrap_or(Value::Null),
            );
            let bag = extract(OPENAI_RESPONSES, obj, &["type", "call_id", "output"]);
            Ok(Message::new(role::TOOL, vec![attach(part, bag)]))
        }
        Some("reasoning") => {
            let parts = obj
                .get("summary")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(|s| s.get("text").and_then(Value::as_str))
                .map(Part::reasoning)
                .collect();
            let mut message = Message::new(role::ASSISTANT, parts);
            message.metadata = extract(OPENAI_RESPONSES, obj, &["type", "summary"]);
            Ok(message)
        }
        Some(other) => {
            tracing::debug!(target: "convo_providers", item_type = other, "keeping unrecognised item as a generic part");
            Ok(Message::new(
                direction.default_role(),
                vec![Part::generic(other, obj.clone())],
            ))
        }
    }
}

fn message_from_wire(obj: &FieldMap, path: &str) -> Result<Message, ConvoError> {
    let role = string_field(obj, "role")
        .ok_or_else(|| malformed(OPENAI_RESPONSES, path, "message has no string `role`"))?;
    let mut parts = match obj.get("content") {
        Some(Value::String(text)) => vec![Part::text(text.as_str())],
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(j, item)| content_from_wire(item, &format!("{path}/content/{j}")))
            .collect::<Result<Vec<_>, _>>()?,
        _ => Vec::new(),
    };
    let mut metadata = extract(OPENAI_RESPONSES, obj, MESSAGE_KEYS);
    restore_parts_metadata(&mut metadata, &mut parts);
    Ok(Message {
        role,
        parts,
        name: None,
        finish_reason: None,
        metadata,
    })
}

fn attach(part: Part, bag: Option<MetadataBag>) -> Part {
    match bag {
        Some(bag) => part.with_metadata(bag),
        None => part,
    }
}

/// A URL that is either a base64 `data:` URL or a plain reference.
fn located(m: &str, url: &str) -> Part {
    match parse_data_url(url) {
        Some((mime, data)) => Part::blob(m, mime, data),
        None => Part::uri(m, url),
    }
}

fn content_from_wire(value: &Value, path: &str) -> Result<Part, ConvoError> {
    let obj = as_object(value, OPENAI_RESPONSES, path)?;
    let part_type = str_field(obj, "type")
        .ok_or_else(|| malformed(OPENAI_RESPONSES, path, "content item has no string `type`"))?;
    let (part, consumed): (Part, &[&str]) = match part_type {
        "input_text" | "output_text" => {
            let text = str_field(obj, "text")
                .ok_or_else(|| malformed(OPENAI_RESPONSES, path, "text item has no `text`"))?;
            (Part::text(text), &["type", "text"])
        }
        "input_image" => {
            if let Some(id) = str_field(obj, "file_id") {
                (Part::file(modality::IMAGE, id), &["type", "file_id"])
            } else if let Some(url) = str_field(obj, "image_url") {
                (located(modality::IMAGE, url), &["type", "image_url"])
            } else {
                return Err(malformed(OPENAI_RESPONSES, path, "input_image has no source"));
            }
        }
        "input_file" => {
            if let Some(id) = str_field(obj, "file_id") {
                (Part::file(modality::DOCUMENT, id), &["type", "file_id"])
            } else if let Some(data) = str_field(obj, "file_data") {
                (located(modality::DOCUMENT, data), &["type", "file_data"])
            } else if let Some(url) = str_field(obj, "file_url") {
                (Part::uri(modality::DOCUMENT, url), &["type", "file_url"])
            } else {
                return Err(malformed(OPENAI_RESPONSES, path, "input_file has no source"));
            }
        }
        "input_audio" => {
            let audio = obj.get("input_audio").and_then(Value::as_object).unwrap_or(obj);
            let data = str_field(audio, "data")
                .ok_or_else(|| malformed(OPENAI_RESPONSES, path, "input_audio has no `data`"))?;
            let mime = str_field(audio, "format").map(|f| format!("audio/{f}"));
            (
                Part::blob(modality::AUDIO, mime, data),
                &["type", "input_audio", "data", "format"],
            )
        }
        _ => return Part::from_value(value),
    };
    Ok(attach(part, extract(OPENAI_RESPONSES, obj, consumed)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use convo_ir::PartKind;
    use serde_json::json;

    fn lower(raw: Vec<Value>, instructions: Option<Value>) -> Conversation {
        OpenAiResponsesProvider
            .to_canonical(&RawInput::from(raw), instructions.as_ref(), Direction::Input)
            .unwrap()
    }

    #[test]
    fn validator_accepts_items() {
        let p = OpenAiResponsesProvider;
        assert!(p.validate_messages(&[
            json!({"role": "user", "content": [{"type": "input_text", "text": "Hi"}]}),
            json!({"type": "function_call", "call_id": "c1", "name": "ls", "arguments": "{}"}),
            json!({"type": "function_call_output", "call_id": "c1", "output": "ok"}),
            json!({"type": "reasoning", "id": "r1", "summary": []}),
        ]).valid);
        assert!(p.validate_system(&json!("Be brief")).valid);
        assert!(!p.validate_system(&json!({"parts": []})).valid);
    }

    #[test]
    fn validator_rejects_chat_content_types() {
        let p = OpenAiResponsesProvider;
        assert!(!p.validate_messages(&[json!({"role": "user", "content": [{"type": "text", "text": "Hi"}]})]).valid);
        assert!(!p.validate_messages(&[json!({"type": "mystery"})]).valid);
        assert!(!p.validate_messages(&[json!({"role": "tool", "content": "x"})]).valid);
    }

    #[test]
    fn instructions_become_the_system_sequence() {
        let conv = lower(
            vec![
                json!({"role": "developer", "content": "Prefer metric units"}),
                json!({"role": "system", "content": "Be brief"}),
                json!({"role": "user", "content": "Hi"}),
            ],
            Some(json!("You are helpful")),
        );
        let system: Vec<_> = conv.system_parts().iter().filter_map(Part::as_text).collect();
        assert_eq!(system, vec!["You are helpful", "Be brief"]);
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[0].role, "developer");
    }

    #[test]
    fn lowers_function_items() {
        let conv = lower(
            vec![
                json!({"type": "function_call", "id": "fc_1", "call_id": "c1", "name": "ls", "arguments": "{\"dir\":\".\"}"}),
                json!({"type": "function_call_output", "call_id": "c1", "output": "a.txt"}),
            ],
            None,
        );
        assert_eq!(conv.messages[0].role, role::ASSISTANT);
        assert_eq!(
            conv.messages[0].parts[0].kind,
            PartKind::ToolCall {
                id: Some("c1".into()),
                name: "ls".into(),
                arguments: json!({"dir": "."}),
            }
        );
        assert_eq!(
            conv.messages[0].parts[0].metadata.as_ref().map(|b| Value::Object(b.clone())),
            Some(json!({"openai_responses": {"id": "fc_1"}}))
        );
        assert_eq!(conv.messages[1].role, role::TOOL);
    }

    #[test]
    fn reasoning_summaries_become_parts() {
        let conv = lower(
            vec![json!({"type": "reasoning", "id": "r1", "summary": [
                {"type": "summary_text", "text": "first"},
                {"type": "summary_text", "text": "second"}
            ]})],
            None,
        );
        let m = &conv.messages[0];
        assert_eq!(m.parts.len(), 2);
        assert!(m.parts.iter().all(|p| matches!(p.kind, PartKind::Reasoning { .. })));
        assert_eq!(
            m.metadata.as_ref().map(|b| Value::Object(b.clone())),
            Some(json!({"openai_responses": {"id": "r1"}}))
        );
    }

    #[test]
    fn media_items() {
        let conv = lower(
            vec![json!({"role": "user", "content": [
                {"type": "input_image", "image_url": "data:image/png;base64,AAAA", "detail": "low"},
                {"type": "input_file", "file_id": "file-1"},
                {"type": "input_file", "file_url": "https://x/doc.pdf"}
            ]})],
            None,
        );
        let parts = &conv.messages[0].parts;
        assert!(matches!(&parts[0].kind, PartKind::Blob { mime_type: Some(m), .. } if m == "image/png"));
        assert!(parts[0].metadata.is_some());
        assert!(matches!(parts[1].kind, PartKind::File { .. }));
        assert!(matches!(parts[2].kind, PartKind::Uri { .. }));
    }

    #[test]
    fn unknown_items_follow_direction() {
        let raw = RawInput::from(vec![json!({"type": "web_search_call", "id": "ws_1", "status": "completed"})]);
        let conv = OpenAiResponsesProvider
            .to_canonical(&raw, None, Direction::Output)
            .unwrap();
        assert_eq!(conv.messages[0].role, role::ASSISTANT);
        assert_eq!(conv.messages[0].parts[0].part_type(), "web_search_call");
    }

    #[test]
    fn is_source_only() {
        let p = OpenAiResponsesProvider;
        assert!(!p.supports_target());
        assert!(p.to_provider_format(&[], convo_metadata::MetadataMode::Strip).is_err());
    }
}
