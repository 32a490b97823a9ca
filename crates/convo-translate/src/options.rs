// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-call translation options.

use convo_metadata::MetadataMode;
use convo_provider::Direction;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What one translation call asks for. Unset fields fall back to the
/// translator's defaults.
///
/// ```
/// use convo_translate::TranslateOptions;
/// use convo_metadata::MetadataMode;
///
/// let opts = TranslateOptions::new()
///     .from_format("openai")
///     .to_format("anthropic")
///     .metadata_mode(MetadataMode::Preserve);
/// assert_eq!(opts.to.as_deref(), Some("anthropic"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateOptions {
    /// Source format; inferred when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Target format; the canonical IR when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Side of the exchange the input comes from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    /// Separately supplied system content in the source format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<Value>,
    /// How metadata bags are emitted into the target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_mode: Option<MetadataMode>,
}

impl TranslateOptions {
    /// Options with every field unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the source format instead of inferring it.
    #[must_use]
    pub fn from_format(mut self, name: impl Into<String>) -> Self {
        self.from = Some(name.into());
        self
    }

    /// Name the target format.
    #[must_use]
    pub fn to_format(mut self, name: impl Into<String>) -> Self {
        self.to = Some(name.into());
        self
    }

    /// Set the direction.
    #[must_use]
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Supply system content.
    #[must_use]
    pub fn system(mut self, system: Value) -> Self {
        self.system = Some(system);
        self
    }

    /// Set the metadata mode.
    #[must_use]
    pub fn metadata_mode(mut self, mode: MetadataMode) -> Self {
        self.metadata_mode = Some(mode);
        self
    }
}
