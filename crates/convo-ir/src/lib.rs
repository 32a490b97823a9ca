// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canonical intermediate representation (IR) for chat conversations.
//!
//! The IR captures the semantic meaning of messages, content parts and system
//! instructions in a provider-neutral form. Provider adapters lower their wire
//! formats into the IR and raise the IR back into their own format; no
//! adapter ever sees another provider's wire shape.
//!
//! IR values are plain data: they are built fresh per translation call and
//! compared structurally.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod part;

pub use part::{Part, PartKind, canonical_part_keys, required_part_keys};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Format tag of the canonical representation itself.
pub const CANONICAL_FORMAT: &str = "canonical";

/// Reserved field carrying an entity's metadata bag on the wire.
pub const METADATA_FIELD: &str = "_provider_metadata";

/// Provider-keyed extension data attached to an IR entity.
///
/// Each key is a provider identifier; each value is an object owned by that
/// provider. The engine only moves these objects around.
pub type MetadataBag = serde_json::Map<String, Value>;

/// Ordered map of arbitrary wire fields.
pub type FieldMap = serde_json::Map<String, Value>;

/// Canonical role names. Any other string is accepted as a role as well.
pub mod role {
    /// System prompt / instructions.
    pub const SYSTEM: &str = "system";
    /// User / human turn.
    pub const USER: &str = "user";
    /// Assistant / model turn.
    pub const ASSISTANT: &str = "assistant";
    /// Tool result turn.
    pub const TOOL: &str = "tool";
}

/// Common modality names for binary and referenced parts.
pub mod modality {
    /// Still images.
    pub const IMAGE: &str = "image";
    /// Audio clips.
    pub const AUDIO: &str = "audio";
    /// Video clips.
    pub const VIDEO: &str = "video";
    /// Documents such as PDFs.
    pub const DOCUMENT: &str = "document";

    /// Guess a modality from a MIME type, defaulting to [`DOCUMENT`].
    #[must_use]
    pub fn from_mime(mime: &str) -> &'static str {
        let top = mime.split('/').next().unwrap_or_default();
        match top {
            "image" => IMAGE,
            "audio" => AUDIO,
            "video" => VIDEO,
            _ => DOCUMENT,
        }
    }
}

// ── Messages ────────────────────────────────────────────────────────────

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author role. Canonical values live in [`role`], but any string is kept.
    pub role: String,

    /// Ordered content parts.
    pub parts: Vec<Part>,

    /// Optional participant name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Why the model stopped producing this message, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    /// Provider-keyed extension data.
    #[serde(
        default,
        rename = "_provider_metadata",
        skip_serializing_if = "Option::is_none"
    )]
    pub metadata: Option<MetadataBag>,
}

impl Message {
    /// Create a message with the given role and parts.
    #[must_use]
    pub fn new(role: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            role: role.into(),
            parts,
            name: None,
            finish_reason: None,
            metadata: None,
        }
    }

    /// Create a message holding one text part.
    #[must_use]
    pub fn text(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(role, vec![Part::text(text)])
    }

    /// Set the participant name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the finish reason.
    #[must_use]
    pub fn with_finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.finish_reason = Some(reason.into());
        self
    }

    /// Attach a metadata bag (an empty bag clears it).
    #[must_use]
    pub fn with_metadata(mut self, bag: MetadataBag) -> Self {
        self.metadata = if bag.is_empty() { None } else { Some(bag) };
        self
    }

    /// Returns `true` for messages with the `system` role.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.role == role::SYSTEM
    }

    /// Returns `true` if every part is a text part.
    #[must_use]
    pub fn is_text_only(&self) -> bool {
        self.parts
            .iter()
            .all(|p| matches!(p.kind, PartKind::Text { .. }))
    }

    /// Concatenate every text part into a single string.
    #[must_use]
    pub fn text_content(&self) -> String {
        self.parts.iter().filter_map(Part::as_text).collect()
    }

    /// All tool-call parts of this message.
    #[must_use]
    pub fn tool_calls(&self) -> Vec<&Part> {
        self.parts
            .iter()
            .filter(|p| matches!(p.kind, PartKind::ToolCall { .. }))
            .collect()
    }
}

// ── Conversation ────────────────────────────────────────────────────────

/// The canonical result of a translation: messages plus an optional separate
/// system sequence.
///
/// When `system` is populated no message in `messages` has the `system` role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Messages in conversation order.
    pub messages: Vec<Message>,

    /// System parts kept outside the message sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<Vec<Part>>,
}

impl Conversation {
    /// Create an empty conversation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a conversation from a message list.
    #[must_use]
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            system: None,
        }
    }

    /// Set the system sequence; an empty sequence clears it.
    #[must_use]
    pub fn with_system(mut self, system: Vec<Part>) -> Self {
        self.system = if system.is_empty() {
            None
        } else {
            Some(system)
        };
        self
    }

    /// Append a message and return `self` for chaining.
    #[must_use]
    pub fn push(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// System parts, empty when there is no separate system sequence.
    #[must_use]
    pub fn system_parts(&self) -> &[Part] {
        self.system.as_deref().unwrap_or_default()
    }

    /// Return the number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Return `true` if there are no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Collect every tool-call part across all messages.
    #[must_use]
    pub fn tool_calls(&self) -> Vec<&Part> {
        self.messages.iter().flat_map(Message::tool_calls).collect()
    }

    /// Return the last message, if any.
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// `true` when the system-channel invariant holds: either no separate
    /// system sequence, or no inline system message.
    #[must_use]
    pub fn system_is_consistent(&self) -> bool {
        self.system.is_none() || !self.messages.iter().any(Message::is_system)
    }
}
