// SPDX-License-Identifier: MIT OR Apache-2.0
//! The canonical IR's own JSON shape as a provider.
//!
//! Messages are `{role, parts, name?, finish_reason?}` and parts use the
//! canonical `type` tags. System messages stay inline unless a separate
//! system value is supplied, in which case both are gathered into the
//! conversation's system sequence.

use convo_error::{ConvoError, ValidationResult};
use convo_ir::{
    CANONICAL_FORMAT, Conversation, FieldMap, METADATA_FIELD, Message, Part, canonical_part_keys,
    required_part_keys,
};
use convo_metadata::{MetadataMode, extract, restore_parts_metadata};
use convo_provider::{Direction, Provider, ProviderOutput, RawInput};
use serde_json::Value;

use crate::common::{
    Issues, as_object, bare_text, combine_system, emission_copy, finish, malformed, string_field,
};

const MESSAGE_KEYS: &[&str] = &["role", "parts", "name", "finish_reason"];

/// Adapter for the canonical wire shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalProvider;

impl Provider for CanonicalProvider {
    fn name(&self) -> &'static str {
        CANONICAL_FORMAT
    }

    fn validate_messages(&self, messages: &[Value]) -> ValidationResult {
        let mut issues = Issues::default();
        for (i, message) in messages.iter().enumerate() {
            let path = format!("/{i}");
            let Some(obj) = issues.object(message, &path) else {
                continue;
            };
            issues.string(obj, "role", &path);
            issues.opt_string(obj, "name", &path);
            issues.opt_string(obj, "finish_reason", &path);
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
            Value::Array(parts) => validate_parts(&mut issues, parts, ""),
            _ => issues.push("", "expected a string or an array of parts"),
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
        match system {
            Some(system) => Ok(combine_system(
                CANONICAL_FORMAT,
                messages,
                system_from_wire(system)?,
            )),
            None => Ok(Conversation::from_messages(messages)),
        }
    }

    fn supports_target(&self) -> bool {
        true
    }

    fn to_provider_format(
        &self,
        messages: &[Message],
        mode: MetadataMode,
    ) -> Result<ProviderOutput, ConvoError> {
        Ok(ProviderOutput::messages(
            messages.iter().map(|m| message_to_wire(m, mode)).collect(),
        ))
    }
}

/// Check parts against what lowering needs, so a shape that validates
/// also lowers.
fn validate_parts(issues: &mut Issues, parts: &[Value], path: &str) {
    for (j, part) in parts.iter().enumerate() {
        let part_path = format!("{path}/{j}");
        let Some(obj) = issues.object(part, &part_path) else {
            continue;
        };
        let Some(part_type) = obj.get("type").and_then(Value::as_str) else {
            issues.push(format!("{part_path}/type"), "expected a string");
            continue;
        };
        for key in required_part_keys(part_type) {
            issues.string(obj, key, &part_path);
        }
        if canonical_part_keys(part_type).is_none()
            && obj
                .get(METADATA_FIELD)
                .is_some_and(|v| !v.is_object() && !v.is_null())
        {
            issues.push(format!("{part_path}/{METADATA_FIELD}"), "expected an object");
        }
    }
}

/// Parse one canonical wire part, keeping unconsumed fields as metadata
/// under `provider`.
pub(crate) fn part_from_wire(provider: &str, value: &Value, path: &str) -> Result<Part, ConvoError> {
    let obj = as_object(value, provider, path)?;
    let part_type = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(provider, path, "part has no string `type`"))?;
    match canonical_part_keys(part_type) {
        Some(keys) => {
            let consumed: FieldMap = obj
                .iter()
                .filter(|(k, _)| keys.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let mut part = Part::from_value(&Value::Object(consumed))?;
            part.metadata = extract(provider, obj, keys);
            Ok(part)
        }
        None => Part::from_value(value),
    }
}

fn message_from_wire(value: &Value, path: &str) -> Result<Message, ConvoError> {
    let obj = as_object(value, CANONICAL_FORMAT, path)?;
    let role = string_field(obj, "role")
        .ok_or_else(|| malformed(CANONICAL_FORMAT, path, "message has no string `role`"))?;
    let mut parts = match obj.get("parts") {
        Some(Value::Array(raw)) => raw
            .iter()
            .enumerate()
            .map(|(j, p)| part_from_wire(CANONICAL_FORMAT, p, &format!("{path}/parts/{j}")))
            .collect::<Result<Vec<_>, _>>()?,
        _ => Vec::new(),
    };
    let mut metadata = extract(CANONICAL_FORMAT, obj, MESSAGE_KEYS);
    restore_parts_metadata(&mut metadata, &mut parts);
    Ok(Message {
        role,
        parts,
        name: string_field(obj, "name"),
        finish_reason: string_field(obj, "finish_reason"),
        metadata,
    })
}

fn system_from_wire(value: &Value) -> Result<Vec<Part>, ConvoError> {
    match value {
        Value::String(text) => Ok(vec![Part::text(text.as_str())]),
        Value::Array(raw) => raw
            .iter()
            .enumerate()
            .map(|(j, p)| part_from_wire(CANONICAL_FORMAT, p, &format!("/system/{j}")))
            .collect(),
        _ => Err(malformed(
            CANONICAL_FORMAT,
            "/system",
            "expected a string or an array of parts",
        )),
    }
}

pub(crate) fn part_to_wire(part: &Part, mode: MetadataMode) -> Value {
    finish(mode, part.metadata.as_ref(), part.to_fields())
}

fn message_to_wire(message: &Message, mode: MetadataMode) -> Value {
    let message = emission_copy(message);
    let mut obj = FieldMap::new();
    obj.insert("role".into(), Value::String(message.role.clone()));
    obj.insert(
        "parts".into(),
        Value::Array(message.parts.iter().map(|p| part_to_wire(p, mode)).collect()),
    );
    if let Some(name) = &message.name {
        obj.insert("name".into(), Value::String(name.clone()));
    }
    if let Some(reason) = &message.finish_reason {
        obj.insert("finish_reason".into(), Value::String(reason.clone()));
    }
    finish(mode, message.metadata.as_ref(), obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use convo_ir::{MetadataBag, role};
    use serde_json::json;

    fn bag(v: Value) -> MetadataBag {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn accepts_canonical_and_rejects_other_shapes() {
        let p = CanonicalProvider;
        assert!(p.validate_messages(&[json!({"role": "user", "parts": [{"type": "text", "content": "Hi"}]})]).valid);
        assert!(!p.validate_messages(&[json!({"role": "user", "content": "Hi"})]).valid);
        assert!(!p.validate_messages(&[json!({"role": "user", "parts": [{"text": "Hi"}]})]).valid);
        assert!(p.validate_messages(&[]).valid);
    }

    #[test]
    fn parts_missing_required_fields_are_rejected() {
        let p = CanonicalProvider;
        for part in [
            json!({"type": "text"}),
            json!({"type": "reasoning", "content": 1}),
            json!({"type": "blob", "content": "AAAA"}),
            json!({"type": "file", "modality": "document"}),
            json!({"type": "uri", "modality": "image"}),
            json!({"type": "tool_call", "arguments": {}}),
            json!({"type": "citation", "_provider_metadata": "x"}),
        ] {
            let raw = [json!({"role": "user", "parts": [part.clone()]})];
            let result = p.validate_messages(&raw);
            assert!(!result.valid, "{part}");
            assert!(result.errors[0].path.starts_with("/0/parts/0"), "{part}");
        }
        let tool = json!({"type": "tool_call_response", "id": "c1"});
        let citation = json!({"type": "citation", "url": "https://a"});
        assert!(p.validate_messages(&[json!({"role": "tool", "parts": [tool, citation]})]).valid);
        assert!(!p.validate_system(&json!([{"type": "text"}])).valid);
    }

    #[test]
    fn extras_become_metadata_under_canonical() {
        let raw = vec![json!({
            "role": "user",
            "parts": [{"type": "text", "content": "Hi", "lang": "en"}],
            "trace_id": "t-1"
        })];
        let conv = CanonicalProvider
            .to_canonical(&RawInput::from(raw), None, Direction::Input)
            .unwrap();
        let m = &conv.messages[0];
        assert_eq!(m.metadata, Some(bag(json!({"canonical": {"trace_id": "t-1"}}))));
        assert_eq!(m.parts[0].metadata, Some(bag(json!({"canonical": {"lang": "en"}}))));
    }

    #[test]
    fn supplied_system_is_combined_with_inline() {
        let raw = vec![
            json!({"role": "system", "parts": [{"type": "text", "content": "B"}]}),
            json!({"role": "user", "parts": [{"type": "text", "content": "Hi"}]}),
        ];
        let conv = CanonicalProvider
            .to_canonical(&RawInput::from(raw), Some(&json!("A")), Direction::Input)
            .unwrap();
        assert_eq!(conv.messages.len(), 1);
        let system: Vec<_> = conv.system_parts().iter().filter_map(Part::as_text).collect();
        assert_eq!(system, vec!["A", "B"]);
        assert!(conv.system_is_consistent());
    }

    #[test]
    fn inline_system_stays_without_supplied_system() {
        let raw = vec![json!({"role": "system", "parts": [{"type": "text", "content": "B"}]})];
        let conv = CanonicalProvider
            .to_canonical(&RawInput::from(raw), None, Direction::Input)
            .unwrap();
        assert!(conv.system.is_none());
        assert_eq!(conv.messages[0].role, role::SYSTEM);
    }

    #[test]
    fn modes_shape_output() {
        let m = Message::text(role::USER, "Hi")
            .with_metadata(bag(json!({"canonical": {"trace_id": "t-1"}})));
        let strip = CanonicalProvider.to_provider_format(&[m.clone()], MetadataMode::Strip).unwrap();
        assert_eq!(strip.messages[0], json!({"role": "user", "parts": [{"type": "text", "content": "Hi"}]}));

        let pass = CanonicalProvider.to_provider_format(&[m.clone()], MetadataMode::Passthrough).unwrap();
        assert_eq!(pass.messages[0]["trace_id"], json!("t-1"));

        let keep = CanonicalProvider.to_provider_format(&[m], MetadataMode::Preserve).unwrap();
        assert_eq!(keep.messages[0][METADATA_FIELD], json!({"canonical": {"trace_id": "t-1"}}));
    }

    #[test]
    fn bare_text_uses_direction() {
        let conv = CanonicalProvider
            .to_canonical(&RawInput::from("Hello"), None, Direction::Output)
            .unwrap();
        assert_eq!(conv.messages[0].role, role::ASSISTANT);
    }

    #[test]
    fn malformed_part_is_an_error() {
        let raw = vec![json!({"role": "user", "parts": [{"type": "text"}]})];
        assert!(
            CanonicalProvider
                .to_canonical(&RawInput::from(raw), None, Direction::Input)
                .is_err()
        );
    }
}
