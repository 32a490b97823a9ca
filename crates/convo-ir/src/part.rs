// SPDX-License-Identifier: MIT OR Apache-2.0
//! Content parts: a closed set of well-known kinds plus an open generic kind.

use convo_error::{ConvoError, ErrorCode};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::{FieldMap, METADATA_FIELD, MetadataBag};

/// The payload of a [`Part`], discriminated by its wire `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum PartKind {
    /// Plain text.
    Text {
        /// The text payload.
        content: String,
    },
    /// Inline binary payload.
    Blob {
        /// Modality such as `"image"` or `"audio"`.
        modality: String,
        /// MIME type, when known.
        mime_type: Option<String>,
        /// Base64-encoded bytes.
        content: String,
    },
    /// Reference to a previously uploaded file.
    File {
        /// Modality of the referenced file.
        modality: String,
        /// MIME type, when known.
        mime_type: Option<String>,
        /// Opaque provider file id.
        file_id: String,
    },
    /// Reference by URL.
    Uri {
        /// Modality of the referenced resource.
        modality: String,
        /// MIME type, when known.
        mime_type: Option<String>,
        /// The URL.
        uri: String,
    },
    /// Model "thinking" text.
    Reasoning {
        /// The reasoning text.
        content: String,
    },
    /// A tool invocation requested by the model.
    ToolCall {
        /// Call identifier, when the provider assigns one.
        id: Option<String>,
        /// Tool name.
        name: String,
        /// Arguments of unconstrained shape.
        arguments: Value,
    },
    /// The result of a prior tool invocation.
    ToolCallResponse {
        /// Identifier of the corresponding tool call.
        id: Option<String>,
        /// Response of unconstrained shape.
        response: Value,
    },
    /// Any other `type`, kept with all of its fields.
    Generic {
        /// The wire `type` tag.
        part_type: String,
        /// Every other field of the part.
        fields: FieldMap,
    },
}

impl PartKind {
    /// The wire `type` tag of this kind.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Text { .. } => "text",
            Self::Blob { .. } => "blob",
            Self::File { .. } => "file",
            Self::Uri { .. } => "uri",
            Self::Reasoning { .. } => "reasoning",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolCallResponse { .. } => "tool_call_response",
            Self::Generic { part_type, .. } => part_type,
        }
    }
}

/// Field names the canonical wire shape consumes for a well-known part type.
///
/// Returns `None` for types that fall through to [`PartKind::Generic`].
#[must_use]
pub fn canonical_part_keys(part_type: &str) -> Option<&'static [&'static str]> {
    let keys: &'static [&'static str] = match part_type {
        "text" | "reasoning" => &["type", "content"],
        "blob" => &["type", "modality", "mime_type", "content"],
        "file" => &["type", "modality", "mime_type", "file_id"],
        "uri" => &["type", "modality", "mime_type", "uri"],
        "tool_call" => &["type", "id", "name", "arguments"],
        "tool_call_response" => &["type", "id", "response"],
        _ => return None,
    };
    Some(keys)
}

/// Fields [`Part::from_value`] requires as strings for a well-known part type.
#[must_use]
pub fn required_part_keys(part_type: &str) -> &'static [&'static str] {
    match part_type {
        "text" | "reasoning" => &["content"],
        "blob" => &["modality", "content"],
        "file" => &["modality", "file_id"],
        "uri" => &["modality", "uri"],
        "tool_call" => &["name"],
        _ => &[],
    }
}

/// A single tagged content unit plus its optional metadata bag.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    /// The tagged payload.
    pub kind: PartKind,
    /// Provider-keyed extension data.
    pub metadata: Option<MetadataBag>,
}

impl From<PartKind> for Part {
    fn from(kind: PartKind) -> Self {
        Self {
            kind,
            metadata: None,
        }
    }
}

impl Part {
    /// A text part.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        PartKind::Text {
            content: content.into(),
        }
        .into()
    }

    /// A reasoning part.
    #[must_use]
    pub fn reasoning(content: impl Into<String>) -> Self {
        PartKind::Reasoning {
            content: content.into(),
        }
        .into()
    }

    /// An inline binary part.
    #[must_use]
    pub fn blob(
        modality: impl Into<String>,
        mime_type: Option<String>,
        content: impl Into<String>,
    ) -> Self {
        PartKind::Blob {
            modality: modality.into(),
            mime_type,
            content: content.into(),
        }
        .into()
    }

    /// A file-reference part.
    #[must_use]
    pub fn file(modality: impl Into<String>, file_id: impl Into<String>) -> Self {
        PartKind::File {
            modality: modality.into(),
            mime_type: None,
            file_id: file_id.into(),
        }
        .into()
    }

    /// A URL-reference part.
    #[must_use]
    pub fn uri(modality: impl Into<String>, uri: impl Into<String>) -> Self {
        PartKind::Uri {
            modality: modality.into(),
            mime_type: None,
            uri: uri.into(),
        }
        .into()
    }

    /// A tool-call part.
    #[must_use]
    pub fn tool_call(id: Option<String>, name: impl Into<String>, arguments: Value) -> Self {
        PartKind::ToolCall {
            id,
            name: name.into(),
            arguments,
        }
        .into()
    }

    /// A tool-call response part.
    #[must_use]
    pub fn tool_call_response(id: Option<String>, response: Value) -> Self {
        PartKind::ToolCallResponse { id, response }.into()
    }

    /// A part of any other type.
    #[must_use]
    pub fn generic(part_type: impl Into<String>, fields: FieldMap) -> Self {
        PartKind::Generic {
            part_type: part_type.into(),
            fields,
        }
        .into()
    }

    /// Attach a metadata bag (an empty bag clears it).
    #[must_use]
    pub fn with_metadata(mut self, bag: MetadataBag) -> Self {
        self.metadata = if bag.is_empty() { None } else { Some(bag) };
        self
    }

    /// The wire `type` tag.
    #[must_use]
    pub fn part_type(&self) -> &str {
        self.kind.type_name()
    }

    /// The text payload of a text part.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.kind {
            PartKind::Text { content } => Some(content),
            _ => None,
        }
    }

    /// Canonical wire fields of this part, without the metadata bag.
    #[must_use]
    pub fn to_fields(&self) -> FieldMap {
        let mut m = FieldMap::new();
        m.insert("type".into(), Value::String(self.part_type().to_string()));
        match &self.kind {
            PartKind::Text { content } | PartKind::Reasoning { content } => {
                m.insert("content".into(), Value::String(content.clone()));
            }
            PartKind::Blob {
                modality,
                mime_type,
                content,
            } => {
                m.insert("modality".into(), Value::String(modality.clone()));
                if let Some(mime) = mime_type {
                    m.insert("mime_type".into(), Value::String(mime.clone()));
                }
                m.insert("content".into(), Value::String(content.clone()));
            }
            PartKind::File {
                modality,
                mime_type,
                file_id,
            } => {
                m.insert("modality".into(), Value::String(modality.clone()));
                if let Some(mime) = mime_type {
                    m.insert("mime_type".into(), Value::String(mime.clone()));
                }
                m.insert("file_id".into(), Value::String(file_id.clone()));
            }
            PartKind::Uri {
                modality,
                mime_type,
                uri,
            } => {
                m.insert("modality".into(), Value::String(modality.clone()));
                if let Some(mime) = mime_type {
                    m.insert("mime_type".into(), Value::String(mime.clone()));
                }
                m.insert("uri".into(), Value::String(uri.clone()));
            }
            PartKind::ToolCall {
                id,
                name,
                arguments,
            } => {
                m.insert("id".into(), id.clone().map_or(Value::Null, Value::String));
                m.insert("name".into(), Value::String(name.clone()));
                m.insert("arguments".into(), arguments.clone());
            }
            PartKind::ToolCallResponse { id, response } => {
                m.insert("id".into(), id.clone().map_or(Value::Null, Value::String));
                m.insert("response".into(), response.clone());
            }
            PartKind::Generic { fields, .. } => {
                for (k, v) in fields {
                    if k != "type" {
                        m.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        m
    }

    /// Canonical wire value of this part, including its metadata bag.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut m = self.to_fields();
        if let Some(bag) = &self.metadata
            && !bag.is_empty()
        {
            m.insert(METADATA_FIELD.into(), Value::Object(bag.clone()));
        }
        Value::Object(m)
    }

    /// Parse a canonical wire value.
    ///
    /// Fields a well-known type does not consume are ignored here; adapters
    /// that must keep them split them off first.
    pub fn from_value(value: &Value) -> Result<Self, ConvoError> {
        let obj = value
            .as_object()
            .ok_or_else(|| invalid("part must be a JSON object"))?;
        let part_type = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("part must have a string \"type\""))?;

        let kind = match part_type {
            "text" => PartKind::Text {
                content: req_str(obj, "content", part_type)?,
            },
            "reasoning" => PartKind::Reasoning {
                content: req_str(obj, "content", part_type)?,
            },
            "blob" => PartKind::Blob {
                modality: req_str(obj, "modality", part_type)?,
                mime_type: opt_str(obj, "mime_type"),
                content: req_str(obj, "content", part_type)?,
            },
            "file" => PartKind::File {
                modality: req_str(obj, "modality", part_type)?,
                mime_type: opt_str(obj, "mime_type"),
                file_id: req_str(obj, "file_id", part_type)?,
            },
            "uri" => PartKind::Uri {
                modality: req_str(obj, "modality", part_type)?,
                mime_type: opt_str(obj, "mime_type"),
                uri: req_str(obj, "uri", part_type)?,
            },
            "tool_call" => PartKind::ToolCall {
                id: opt_str(obj, "id"),
                name: req_str(obj, "name", part_type)?,
                arguments: obj.get("arguments").cloned().unwrap_or(Value::Null),
            },
            "tool_call_response" => PartKind::ToolCallResponse {
                id: opt_str(obj, "id"),
                response: obj.get("response").cloned().unwrap_or(Value::Null),
            },
            other => PartKind::Generic {
                part_type: other.to_string(),
                fields: obj
                    .iter()
                    .filter(|(k, _)| k.as_str() != "type" && k.as_str() != METADATA_FIELD)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            },
        };

        let metadata = match obj.get(METADATA_FIELD) {
            Some(Value::Object(bag)) if !bag.is_empty() => Some(bag.clone()),
            Some(Value::Object(_)) | Some(Value::Null) | None => None,
            Some(_) => return Err(invalid("metadata bag must be a JSON object")),
        };

        Ok(Self { kind, metadata })
    }
}

fn invalid(message: &str) -> ConvoError {
    ConvoError::new(ErrorCode::IrInvalid, message)
}

fn req_str(obj: &FieldMap, key: &str, part_type: &str) -> Result<String, ConvoError> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            invalid(&format!(
                "`{part_type}` part requires a string \"{key}\" field"
            ))
        })
}

fn opt_str(obj: &FieldMap, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

impl Serialize for Part {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Part {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(|e| D::Error::custom(e.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_types_parse() {
        let cases = [
            json!({"type": "text", "content": "hi"}),
            json!({"type": "reasoning", "content": "thinking"}),
            json!({"type": "blob", "modality": "image", "mime_type": "image/png", "content": "AAA="}),
            json!({"type": "file", "modality": "document", "file_id": "file-1"}),
            json!({"type": "uri", "modality": "image", "uri": "https://x/y.png"}),
            json!({"type": "tool_call", "id": "c1", "name": "ls", "arguments": {"a": 1}}),
            json!({"type": "tool_call_response", "id": "c1", "response": "ok"}),
        ];
        for case in &cases {
            let part = Part::from_value(case).unwrap();
            assert!(!matches!(part.kind, PartKind::Generic { .. }), "{case}");
            assert_eq!(&part.to_value(), case);
        }
    }

    #[test]
    fn unknown_type_becomes_generic() {
        let v = json!({"type": "citation", "url": "https://a", "title": "A"});
        let part = Part::from_value(&v).unwrap();
        match &part.kind {
            PartKind::Generic { part_type, fields } => {
                assert_eq!(part_type, "citation");
                assert_eq!(fields.len(), 2);
                assert_eq!(fields["title"], json!("A"));
            }
            other => panic!("expected Generic, got {other:?}"),
        }
        assert_eq!(part.to_value(), v);
    }

    #[test]
    fn dropping_a_required_key_fails_to_parse() {
        let full = json!({
            "content": "x", "modality": "image", "file_id": "f", "uri": "u", "name": "n"
        });
        for part_type in ["text", "reasoning", "blob", "file", "uri", "tool_call"] {
            for key in required_part_keys(part_type) {
                let mut obj = full.as_object().unwrap().clone();
                obj.insert("type".into(), json!(part_type));
                assert!(Part::from_value(&Value::Object(obj.clone())).is_ok(), "{part_type}");
                obj.shift_remove(*key);
                assert!(Part::from_value(&Value::Object(obj)).is_err(), "{part_type}/{key}");
            }
        }
        assert!(required_part_keys("tool_call_response").is_empty());
    }

    #[test]
    fn missing_required_field_is_ir_invalid() {
        let err = Part::from_value(&json!({"type": "text"})).unwrap_err();
        assert_eq!(err.code, ErrorCode::IrInvalid);
        assert!(err.message.contains("content"));
    }

    #[test]
    fn missing_type_is_rejected() {
        assert!(Part::from_value(&json!({"content": "x"})).is_err());
        assert!(Part::from_value(&json!("x")).is_err());
    }

    #[test]
    fn tool_call_without_id_serializes_null_id() {
        let p = Part::tool_call(None, "search", json!({"q": "rust"}));
        assert_eq!(p.to_value()["id"], Value::Null);
        let back = Part::from_value(&p.to_value()).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn metadata_bag_roundtrips() {
        let mut bag = MetadataBag::new();
        bag.insert("anthropic".into(), json!({"cache_control": {"type": "ephemeral"}}));
        let p = Part::text("hi").with_metadata(bag.clone());
        let v = p.to_value();
        assert_eq!(v[METADATA_FIELD], Value::Object(bag));
        let back: Part = serde_json::from_value(v).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn non_object_metadata_is_rejected() {
        let v = json!({"type": "text", "content": "x", "_provider_metadata": 3});
        assert!(Part::from_value(&v).is_err());
    }

    #[test]
    fn canonical_keys_cover_known_types() {
        assert!(canonical_part_keys("text").unwrap().contains(&"content"));
        assert!(canonical_part_keys("tool_call").unwrap().contains(&"arguments"));
        assert!(canonical_part_keys("citation").is_none());
    }

    #[test]
    fn deserialize_error_is_readable() {
        let err = serde_json::from_value::<Part>(json!({"type": "uri"})).unwrap_err();
        assert!(err.to_string().contains("uri"));
    }
}
