// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cross-provider known fields.
//!
//! Known fields live in a reserved sub-object of a provider entry. Any
//! provider may read them back regardless of which provider wrote them.

use convo_ir::{FieldMap, MetadataBag};
use serde_json::Value;

use crate::{KNOWN_FIELDS, is_known_fields_key, prune};

/// Names of the known fields adapters exchange.
pub mod names {
    /// Tool or function name before sanitising for a provider's naming rules.
    pub const ORIGINAL_NAME: &str = "original_name";
    /// Whether a tool result reported an error.
    pub const IS_ERROR: &str = "is_error";
    /// Position a system message originally held in its message array.
    pub const MESSAGE_INDEX: &str = "message_index";
    /// Provider-specific part type folded into a canonical type.
    pub const ORIGINAL_TYPE: &str = "original_type";
    /// Message-level bag of an extracted system message.
    pub const MESSAGE_METADATA: &str = "message_metadata";
    /// Participant name of an extracted system message.
    pub const MESSAGE_NAME: &str = "message_name";
    /// Finish reason of an extracted system message.
    pub const MESSAGE_FINISH_REASON: &str = "message_finish_reason";
    /// Original order of part kinds in a message whose format regroups them.
    pub const PART_ORDER: &str = "part_order";
    /// Character lengths of reasoning parts joined into one wire string.
    pub const REASONING_LENGTHS: &str = "reasoning_lengths";
}

fn known_fields_of(entry: &Value) -> impl Iterator<Item = &FieldMap> {
    entry
        .as_object()
        .into_iter()
        .flat_map(|fields| fields.iter())
        .filter(|(k, _)| is_known_fields_key(k))
        .filter_map(|(_, v)| v.as_object())
}

/// Look up a known field across every provider entry, in bag order.
#[must_use]
pub fn known_field<'a>(bag: Option<&'a MetadataBag>, name: &str) -> Option<&'a Value> {
    bag?.values()
        .flat_map(known_fields_of)
        .find_map(|fields| fields.get(name))
}

/// Like [`known_field`], for string values.
#[must_use]
pub fn known_str<'a>(bag: Option<&'a MetadataBag>, name: &str) -> Option<&'a str> {
    known_field(bag, name).and_then(Value::as_str)
}

/// Record a known field under `provider`'s entry, creating layers as needed.
///
/// A non-object provider entry is opaque data and is left untouched.
pub fn set_known_field(bag: &mut Option<MetadataBag>, provider: &str, name: &str, value: Value) {
    let inner = bag.get_or_insert_with(MetadataBag::new);
    let entry = inner
        .entry(provider.to_string())
        .or_insert_with(|| Value::Object(FieldMap::new()));
    let Value::Object(fields) = entry else {
        tracing::warn!(
            target: "convo_metadata",
            provider,
            field = name,
            "provider entry is not an object; known field dropped"
        );
        return;
    };
    let key = fields
        .keys()
        .find(|k| is_known_fields_key(k))
        .cloned()
        .unwrap_or_else(|| KNOWN_FIELDS.to_string());
    let slot = fields
        .entry(key)
        .or_insert_with(|| Value::Object(FieldMap::new()));
    if !slot.is_object() {
        *slot = Value::Object(FieldMap::new());
    }
    if let Value::Object(known) = slot {
        known.insert(name.to_string(), value);
    }
}

/// Remove a known field from every provider entry and return the first value
/// found. Layers left empty are pruned.
pub fn remove_known_field(bag: &mut Option<MetadataBag>, name: &str) -> Option<Value> {
    let inner = bag.as_mut()?;
    let mut found = None;
    for entry in inner.values_mut() {
        let Value::Object(fields) = entry else {
            continue;
        };
        for (key, value) in fields.iter_mut() {
            if !is_known_fields_key(key) {
                continue;
            }
            if let Value::Object(known) = value
                && let Some(v) = known.shift_remove(name)
                && found.is_none()
            {
                found = Some(v);
            }
        }
    }
    prune(bag);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(v: Value) -> MetadataBag {
        match v {
            Value::Object(m) => m,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn lookup_scans_all_providers() {
        let b = bag(json!({
            "openai": {"x": 1},
            "gemini": {"_knownFields": {"original_name": "a.b"}}
        }));
        assert_eq!(known_str(Some(&b), names::ORIGINAL_NAME), Some("a.b"));
        assert!(known_field(Some(&b), names::IS_ERROR).is_none());
        assert!(known_field(None, names::IS_ERROR).is_none());
    }

    #[test]
    fn first_provider_wins() {
        let b = bag(json!({
            "anthropic": {"_known_fields": {"is_error": true}},
            "openai": {"_known_fields": {"is_error": false}}
        }));
        assert_eq!(known_field(Some(&b), names::IS_ERROR), Some(&json!(true)));
    }

    #[test]
    fn set_creates_layers() {
        let mut b = None;
        set_known_field(&mut b, "openai", names::MESSAGE_INDEX, json!(2));
        assert_eq!(
            Value::Object(b.unwrap()),
            json!({"openai": {"_known_fields": {"message_index": 2}}})
        );
    }

    #[test]
    fn set_reuses_existing_spelling() {
        let mut b = Some(bag(json!({"gemini": {"_knownFields": {"a": 1}}})));
        set_known_field(&mut b, "gemini", "b", json!(2));
        assert_eq!(
            Value::Object(b.unwrap()),
            json!({"gemini": {"_knownFields": {"a": 1, "b": 2}}})
        );
    }

    #[test]
    fn set_skips_opaque_entries() {
        let mut b = Some(bag(json!({"openai": "opaque"})));
        set_known_field(&mut b, "openai", "a", json!(1));
        assert_eq!(Value::Object(b.unwrap()), json!({"openai": "opaque"}));
    }

    #[test]
    fn remove_prunes_empty_layers() {
        let mut b = Some(bag(json!({
            "openai": {"_known_fields": {"message_index": 0}},
            "anthropic": {"cache": 1, "_known_fields": {"message_index": 5}}
        })));
        let v = remove_known_field(&mut b, names::MESSAGE_INDEX);
        assert_eq!(v, Some(json!(0)));
        assert_eq!(Value::Object(b.unwrap()), json!({"anthropic": {"cache": 1}}));
    }

    #[test]
    fn remove_missing_leaves_bag_alone() {
        let mut b = Some(bag(json!({"openai": {"x": 1}})));
        assert!(remove_known_field(&mut b, "nope").is_none());
        assert_eq!(Value::Object(b.unwrap()), json!({"openai": {"x": 1}}));
        let mut none = None;
        assert!(remove_known_field(&mut none, "nope").is_none());
    }
}
