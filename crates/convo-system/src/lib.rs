// SPDX-License-Identifier: MIT OR Apache-2.0
//! System-instruction reconciliation.
//!
//! Split-channel providers keep system content apart from the message list,
//! while single-channel providers interleave system messages anywhere in it.
//! [`extract_system`] pulls system messages out of a sequence and tags each
//! part with the index its message originally held; [`reinsert_system`] puts
//! them back at those positions.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::collections::BTreeMap;

use convo_ir::{Message, MetadataBag, Part, role};
use convo_metadata::{names, remove_known_field, set_known_field};
use serde_json::Value;

/// Remove every system-role message from `messages`.
///
/// Each removed part records, as a known field under `provider`, the index
/// its message held in the original sequence. A system message's own bag,
/// name and finish reason are kept as known fields on its first part so
/// reinsertion can restore them.
#[must_use]
pub fn extract_system(provider: &str, messages: Vec<Message>) -> (Vec<Message>, Vec<Part>) {
    let mut kept = Vec::with_capacity(messages.len());
    let mut system = Vec::new();

    for (index, message) in messages.into_iter().enumerate() {
        if !message.is_system() {
            kept.push(message);
            continue;
        }
        let Message {
            mut parts,
            name,
            finish_reason,
            metadata,
            ..
        } = message;
        if parts.is_empty() {
            tracing::debug!(target: "convo_system", index, "empty system message dropped");
            continue;
        }
        for part in &mut parts {
            remove_known_field(&mut part.metadata, names::MESSAGE_INDEX);
            set_known_field(
                &mut part.metadata,
                provider,
                names::MESSAGE_INDEX,
                Value::from(index),
            );
        }
        let first = &mut parts[0].metadata;
        if let Some(bag) = metadata.filter(|b| !b.is_empty()) {
            set_known_field(first, provider, names::MESSAGE_METADATA, Value::Object(bag));
        }
        if let Some(name) = name {
            set_known_field(first, provider, names::MESSAGE_NAME, Value::String(name));
        }
        if let Some(reason) = finish_reason {
            set_known_field(first, provider, names::MESSAGE_FINISH_REASON, Value::String(reason));
        }
        system.extend(parts);
    }

    (kept, system)
}

/// Message-level fields an extracted system message left on its first part.
#[derive(Default)]
struct Header {
    metadata: Option<MetadataBag>,
    name: Option<String>,
    finish_reason: Option<String>,
}

impl Header {
    fn take(part: &mut Part) -> Self {
        Self {
            metadata: take_message_metadata(part),
            name: take_string(part, names::MESSAGE_NAME),
            finish_reason: take_string(part, names::MESSAGE_FINISH_REASON),
        }
    }
}

#[derive(Default)]
struct Group {
    parts: Vec<Part>,
    header: Header,
}

impl Group {
    fn push(&mut self, part: Part, header: Header) {
        let slot = &mut self.header;
        slot.metadata = slot.metadata.take().or(header.metadata);
        slot.name = slot.name.take().or(header.name);
        slot.finish_reason = slot.finish_reason.take().or(header.finish_reason);
        self.parts.push(part);
    }

    fn into_message(self) -> Message {
        Message {
            role: role::SYSTEM.to_string(),
            parts: self.parts,
            name: self.header.name,
            finish_reason: self.header.finish_reason,
            metadata: self.header.metadata,
        }
    }
}

fn take_index(part: &mut Part) -> Option<usize> {
    let raw = remove_known_field(&mut part.metadata, names::MESSAGE_INDEX)?;
    match raw.as_u64().and_then(|n| usize::try_from(n).ok()) {
        Some(index) => Some(index),
        None => {
            tracing::debug!(target: "convo_system", value = %raw, "ignoring invalid message index");
            None
        }
    }
}

fn take_message_metadata(part: &mut Part) -> Option<MetadataBag> {
    match remove_known_field(&mut part.metadata, names::MESSAGE_METADATA)? {
        Value::Object(bag) if !bag.is_empty() => Some(bag),
        _ => None,
    }
}

fn take_string(part: &mut Part, name: &str) -> Option<String> {
    match remove_known_field(&mut part.metadata, name)? {
        Value::String(s) => Some(s),
        _ => None,
    }
}

/// Splice system parts back into `messages` as system-role messages.
///
/// Parts sharing a recorded index become one message placed at that index,
/// clamped to the final length. Parts without a usable index become a single
/// message at position 0, inserted before any indexed group.
#[must_use]
pub fn reinsert_system(messages: Vec<Message>, system: Vec<Part>) -> Vec<Message> {
    if system.is_empty() {
        return messages;
    }

    let mut implicit = Group::default();
    let mut indexed: BTreeMap<usize, Group> = BTreeMap::new();

    for mut part in system {
        let index = take_index(&mut part);
        let header = Header::take(&mut part);
        match index {
            Some(i) => indexed.entry(i).or_default().push(part, header),
            None => implicit.push(part, header),
        }
    }

    let has_implicit = !implicit.parts.is_empty();
    let final_len = messages.len() + indexed.len() + usize::from(has_implicit);

    let mut out = messages;
    out.reserve(final_len - out.len());
    if has_implicit {
        out.insert(0, implicit.into_message());
    }
    for (index, group) in indexed {
        let at = index.min(final_len).min(out.len());
        out.insert(at, group.into_message());
    }
    out
}
