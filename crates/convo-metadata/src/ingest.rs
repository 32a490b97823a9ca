// SPDX-License-Identifier: MIT OR Apache-2.0
//! Two-pass field extraction and bag merging.

use convo_ir::{FieldMap, METADATA_FIELD, MetadataBag};
use serde_json::Value;

use crate::{KNOWN_FIELDS, PARTS_METADATA, is_known_fields_key, is_parts_metadata_key};

/// Partition `obj` into the fields named in `known_keys` and everything else.
///
/// Both halves keep the original field order.
#[must_use]
pub fn split_fields(obj: &FieldMap, known_keys: &[&str]) -> (FieldMap, FieldMap) {
    let mut known = FieldMap::new();
    let mut extra = FieldMap::new();
    for (k, v) in obj {
        if known_keys.contains(&k.as_str()) {
            known.insert(k.clone(), v.clone());
        } else {
            extra.insert(k.clone(), v.clone());
        }
    }
    (known, extra)
}

/// Build the metadata bag for a raw entity produced by `provider`.
///
/// Every field of `obj` not listed in `known_keys` is kept. A nested
/// [`METADATA_FIELD`] object is merged in as an existing bag; top-level
/// reserved sub-objects (from an earlier passthrough emission) are merged into
/// `provider`'s entry under their normalised spelling.
#[must_use]
pub fn extract(provider: &str, obj: &FieldMap, known_keys: &[&str]) -> Option<MetadataBag> {
    let (_, extras) = split_fields(obj, known_keys);
    bag_from_extras(provider, extras)
}

/// Fold already-separated extra fields into a bag keyed by `provider`.
#[must_use]
pub fn bag_from_extras(provider: &str, extras: FieldMap) -> Option<MetadataBag> {
    let mut bag = MetadataBag::new();
    let mut own = FieldMap::new();

    for (key, value) in extras {
        if key == METADATA_FIELD {
            match value {
                Value::Object(existing) => merge_bags(&mut bag, existing),
                Value::Null => {}
                other => {
                    own.insert(key, other);
                }
            }
        } else if is_known_fields_key(&key) {
            merge_reserved(&mut own, KNOWN_FIELDS, value);
        } else if is_parts_metadata_key(&key) {
            merge_reserved(&mut own, PARTS_METADATA, value);
        } else {
            own.insert(key, value);
        }
    }

    if !own.is_empty() {
        let mut entry = MetadataBag::new();
        entry.insert(provider.to_string(), Value::Object(own));
        merge_bags(&mut bag, entry);
    }

    let mut bag = Some(bag);
    prune(&mut bag);
    bag
}

fn merge_reserved(target: &mut FieldMap, key: &str, value: Value) {
    match (target.get_mut(key), value) {
        (Some(Value::Object(existing)), Value::Object(incoming)) => {
            merge_bags(existing, incoming);
        }
        (_, value) => {
            target.insert(key.to_string(), value);
        }
    }
}

/// Deep-merge `src` into `target`. Nested objects merge key by key; any other
/// value in `src` replaces the one in `target`.
pub fn merge_bags(target: &mut FieldMap, src: FieldMap) {
    for (key, value) in src {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_bags(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

/// Remove empty reserved sub-objects and empty provider entries; clear the
/// bag entirely when nothing is left.
pub fn prune(bag: &mut Option<MetadataBag>) {
    let Some(inner) = bag.as_mut() else {
        return;
    };
    for entry in inner.values_mut() {
        if let Value::Object(fields) = entry {
            let empty_reserved: Vec<String> = fields
                .iter()
                .filter(|(k, v)| {
                    (is_known_fields_key(k) || is_parts_metadata_key(k))
                        && v.as_object().is_some_and(FieldMap::is_empty)
                })
                .map(|(k, _)| k.clone())
                .collect();
            for k in empty_reserved {
                fields.shift_remove(&k);
            }
        }
    }
    let empty_entries: Vec<String> = inner
        .iter()
        .filter(|(_, v)| v.as_object().is_some_and(FieldMap::is_empty))
        .map(|(k, _)| k.clone())
        .collect();
    for k in empty_entries {
        inner.shift_remove(&k);
    }
    if inner.is_empty() {
        *bag = None;
    }
}
