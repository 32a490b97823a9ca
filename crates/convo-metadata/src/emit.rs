// SPDX-License-Identifier: MIT OR Apache-2.0
//! Emission modes and the parts-metadata stash.

use convo_ir::{FieldMap, METADATA_FIELD, MetadataBag, Part};
use serde_json::Value;

use crate::{MetadataMode, PARTS_METADATA, is_parts_metadata_key, is_reserved_key, merge_bags, prune};

/// Write `bag` onto a target wire object according to `mode`.
///
/// - [`MetadataMode::Strip`] writes nothing.
/// - [`MetadataMode::Passthrough`] copies each provider entry's fields onto
///   `target`, never overwriting a field already present. Reserved
///   sub-objects from several entries are merged.
/// - [`MetadataMode::Preserve`] sets `target[METADATA_FIELD]` to the bag.
pub fn apply(mode: MetadataMode, bag: Option<&MetadataBag>, target: &mut FieldMap) {
    let Some(bag) = bag.filter(|b| !b.is_empty()) else {
        return;
    };
    match mode {
        MetadataMode::Strip => {}
        MetadataMode::Passthrough => {
            for entry in bag.values() {
                let Value::Object(fields) = entry else {
                    continue;
                };
                for (key, value) in fields {
                    match (target.get_mut(key), value) {
                        (None, value) => {
                            target.insert(key.clone(), value.clone());
                        }
                        (Some(Value::Object(existing)), Value::Object(incoming))
                            if is_reserved_key(key) =>
                        {
                            merge_bags(existing, incoming.clone());
                        }
                        _ => {}
                    }
                }
            }
        }
        MetadataMode::Preserve => {
            target.insert(METADATA_FIELD.to_string(), Value::Object(bag.clone()));
        }
    }
}

/// Keep part-level bags alive when a message's parts collapse into a bare
/// string.
///
/// Under [`MetadataMode::Preserve`] the merged part bags are stored in the
/// message bag under `provider`'s parts-metadata sub-object. The other modes
/// have nowhere to put them, so they are dropped.
pub fn stash_parts_metadata(
    mode: MetadataMode,
    provider: &str,
    message_bag: &mut Option<MetadataBag>,
    parts: &[Part],
) {
    let mut merged = MetadataBag::new();
    for bag in parts.iter().filter_map(|p| p.metadata.as_ref()) {
        merge_bags(&mut merged, bag.clone());
    }
    if merged.is_empty() {
        return;
    }
    if mode != MetadataMode::Preserve {
        tracing::trace!(
            target: "convo_metadata",
            provider,
            %mode,
            "part metadata dropped on string content"
        );
        return;
    }

    let inner = message_bag.get_or_insert_with(MetadataBag::new);
    let mut stash = MetadataBag::new();
    let mut entry = FieldMap::new();
    entry.insert(PARTS_METADATA.to_string(), Value::Object(merged));
    stash.insert(provider.to_string(), Value::Object(entry));
    merge_bags(inner, stash);
}

/// Detach every stashed parts-metadata sub-object from `message_bag`,
/// merged in bag order.
pub fn take_parts_metadata(message_bag: &mut Option<MetadataBag>) -> Option<MetadataBag> {
    let inner = message_bag.as_mut()?;
    let mut merged = MetadataBag::new();
    for entry in inner.values_mut() {
        let Value::Object(fields) = entry else {
            continue;
        };
        let keys: Vec<String> = fields
            .keys()
            .filter(|k| is_parts_metadata_key(k))
            .cloned()
            .collect();
        for key in keys {
            if let Some(Value::Object(stashed)) = fields.shift_remove(&key) {
                merge_bags(&mut merged, stashed);
            }
        }
    }
    prune(message_bag);
    if merged.is_empty() { None } else { Some(merged) }
}

/// Move stashed parts metadata back onto the first part of a message.
///
/// A message without parts keeps its stash.
pub fn restore_parts_metadata(message_bag: &mut Option<MetadataBag>, parts: &mut [Part]) {
    let Some(first) = parts.first_mut() else {
        return;
    };
    let Some(stashed) = take_parts_metadata(message_bag) else {
        return;
    };
    let target = first.metadata.get_or_insert_with(MetadataBag::new);
    merge_bags(target, stashed);
}
