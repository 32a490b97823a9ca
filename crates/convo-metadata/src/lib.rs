// SPDX-License-Identifier: MIT OR Apache-2.0
//! Provider metadata preservation for convo-bridge.
//!
//! Every provider wire format carries fields the canonical IR has no slot
//! for. On ingestion an adapter partitions a raw entity's fields into the ones
//! it consumes and the extras; the extras land in the entity's
//! [`MetadataBag`] under the producing provider's key ([`extract`]). On
//! emission the bag is either dropped, spread back onto the target entity, or
//! nested under [`METADATA_FIELD`], depending on the [`MetadataMode`]
//! ([`apply`]).
//!
//! Two reserved sub-objects inside a provider entry carry meaning across
//! providers:
//!
//! - known fields ([`KNOWN_FIELDS`]): values such as an original tool name or
//!   a message index that any provider may read back ([`known_field`]);
//! - parts metadata ([`PARTS_METADATA`]): part-level bags stashed on a message
//!   whose content collapsed to a bare string ([`stash_parts_metadata`]), put
//!   back onto the first part later ([`restore_parts_metadata`]).
//!
//! Both are recognised case-insensitively under a snake_case and a camelCase
//! spelling.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod emit;
mod ingest;
mod known;

pub use convo_ir::{METADATA_FIELD, MetadataBag};
pub use emit::{apply, restore_parts_metadata, stash_parts_metadata, take_parts_metadata};
pub use ingest::{bag_from_extras, extract, merge_bags, prune, split_fields};
pub use known::{known_field, known_str, names, remove_known_field, set_known_field};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Known-fields sub-object key (snake_case spelling).
pub const KNOWN_FIELDS: &str = "_known_fields";
/// Known-fields sub-object key (camelCase spelling).
pub const KNOWN_FIELDS_ALT: &str = "_knownFields";
/// Parts-metadata sub-object key (snake_case spelling).
pub const PARTS_METADATA: &str = "_parts_metadata";
/// Parts-metadata sub-object key (camelCase spelling).
pub const PARTS_METADATA_ALT: &str = "_partsMetadata";

/// `true` if `key` names the known-fields sub-object under either spelling.
#[must_use]
pub fn is_known_fields_key(key: &str) -> bool {
    key.eq_ignore_ascii_case(KNOWN_FIELDS) || key.eq_ignore_ascii_case(KNOWN_FIELDS_ALT)
}

/// `true` if `key` names the parts-metadata sub-object under either spelling.
#[must_use]
pub fn is_parts_metadata_key(key: &str) -> bool {
    key.eq_ignore_ascii_case(PARTS_METADATA) || key.eq_ignore_ascii_case(PARTS_METADATA_ALT)
}

/// `true` if `key` is one of the reserved sub-object keys.
#[must_use]
pub fn is_reserved_key(key: &str) -> bool {
    is_known_fields_key(key) || is_parts_metadata_key(key)
}

// ── MetadataMode ────────────────────────────────────────────────────────

/// How metadata bags are emitted when converting out of canonical form.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum MetadataMode {
    /// Drop every bag; output holds only canonically derived fields.
    #[default]
    Strip,
    /// Spread bag contents onto the target entity's top level.
    Passthrough,
    /// Nest the bag under [`METADATA_FIELD`] on the target entity.
    Preserve,
}

impl MetadataMode {
    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strip => "strip",
            Self::Passthrough => "passthrough",
            Self::Preserve => "preserve",
        }
    }
}

impl fmt::Display for MetadataMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`MetadataMode`] name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMode(pub String);

impl fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown metadata mode '{}' (expected strip, passthrough or preserve)",
            self.0
        )
    }
}

impl std::error::Error for UnknownMode {}

impl FromStr for MetadataMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strip" => Ok(Self::Strip),
            "passthrough" => Ok(Self::Passthrough),
            "preserve" => Ok(Self::Preserve),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_keys_match_both_spellings_case_insensitively() {
        assert!(is_known_fields_key("_known_fields"));
        assert!(is_known_fields_key("_knownFields"));
        assert!(is_known_fields_key("_KNOWN_FIELDS"));
        assert!(is_known_fields_key("_knownfields"));
        assert!(!is_known_fields_key("known_fields"));

        assert!(is_parts_metadata_key("_parts_metadata"));
        assert!(is_parts_metadata_key("_partsMetadata"));
        assert!(is_parts_metadata_key("_PartsMetadata"));
        assert!(!is_parts_metadata_key("_parts"));
    }

    #[test]
    fn mode_defaults_to_strip() {
        assert_eq!(MetadataMode::default(), MetadataMode::Strip);
    }

    #[test]
    fn mode_parses_and_displays() {
        for mode in [
            MetadataMode::Strip,
            MetadataMode::Passthrough,
            MetadataMode::Preserve,
        ] {
            assert_eq!(mode.to_string().parse::<MetadataMode>().unwrap(), mode);
        }
        assert_eq!(
            "PRESERVE".parse::<MetadataMode>().unwrap(),
            MetadataMode::Preserve
        );
        assert!("keep".parse::<MetadataMode>().is_err());
    }

    #[test]
    fn mode_serde_is_lowercase() {
        let json = serde_json::to_string(&MetadataMode::Passthrough).unwrap();
        assert_eq!(json, r#""passthrough""#);
        let back: MetadataMode = serde_json::from_str(r#""preserve""#).unwrap();
        assert_eq!(back, MetadataMode::Preserve);
    }
}
