// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for translators.
//!
//! [`TranslatorConfig`] holds the defaults a translator applies when a call
//! does not say otherwise. It is read from TOML, overridden from the
//! environment, checked by [`validate_config`] and layered with
//! [`merge_configs`].
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::collections::BTreeSet;
use std::path::Path;

use convo_error::{ConvoError, DEFAULT_EXCERPT_LEN, ErrorCode};
use convo_metadata::MetadataMode;
use convo_provider::Direction;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// An environment override held a value that does not parse.
    #[error("invalid value for {var}: {reason}")]
    InvalidEnv {
        /// Variable name.
        var: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

impl From<ConfigError> for ConvoError {
    fn from(err: ConfigError) -> Self {
        ConvoError::new(ErrorCode::ConfigInvalid, err.to_string()).with_source(err)
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// Error excerpts are long enough to flood logs.
    LargeExcerpt {
        /// Configured excerpt length.
        len: usize,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::LargeExcerpt { len } => {
                write!(f, "excerpt_len {len} is unusually large")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Defaults applied by a translator.
///
/// Every field is optional so that overlays only replace what they set.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct TranslatorConfig {
    /// Metadata mode used when a call does not pick one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_metadata_mode: Option<MetadataMode>,

    /// Direction used for bare-string payloads when a call does not pick one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_direction: Option<Direction>,

    /// Provider names in inference priority order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference_order: Option<Vec<String>>,

    /// Maximum length of the input excerpt carried by schema errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt_len: Option<usize>,
}

impl TranslatorConfig {
    /// Effective metadata mode.
    #[must_use]
    pub fn metadata_mode(&self) -> MetadataMode {
        self.default_metadata_mode.unwrap_or_default()
    }

    /// Effective direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.default_direction.unwrap_or_default()
    }

    /// Effective excerpt length.
    #[must_use]
    pub fn excerpt_len(&self) -> usize {
        self.excerpt_len.unwrap_or(DEFAULT_EXCERPT_LEN)
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Excerpt length above which a warning is produced.
const LARGE_EXCERPT_THRESHOLD: usize = 10_000;

/// Environment variable overriding [`TranslatorConfig::default_metadata_mode`].
pub const ENV_METADATA_MODE: &str = "CONVO_METADATA_MODE";
/// Environment variable overriding [`TranslatorConfig::default_direction`].
pub const ENV_DIRECTION: &str = "CONVO_DIRECTION";
/// Environment variable overriding [`TranslatorConfig::inference_order`]
/// (comma separated).
pub const ENV_INFERENCE_ORDER: &str = "CONVO_INFERENCE_ORDER";
/// Environment variable overriding [`TranslatorConfig::excerpt_len`].
pub const ENV_EXCERPT_LEN: &str = "CONVO_EXCERPT_LEN";

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`TranslatorConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, starts from [`TranslatorConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<TranslatorConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => TranslatorConfig::default(),
    };
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Parse a TOML string into a [`TranslatorConfig`].
pub fn parse_toml(content: &str) -> Result<TranslatorConfig, ConfigError> {
    toml::from_str::<TranslatorConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// Recognised variables:
/// - `CONVO_METADATA_MODE`
/// - `CONVO_DIRECTION`
/// - `CONVO_INFERENCE_ORDER`
/// - `CONVO_EXCERPT_LEN`
pub fn apply_env_overrides(config: &mut TranslatorConfig) -> Result<(), ConfigError> {
    apply_overrides(config, |var| std::env::var(var).ok())
}

/// Apply overrides read through `lookup`, which maps a variable name to its
/// value.
pub fn apply_overrides(
    config: &mut TranslatorConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let invalid = |var: &str, reason: String| ConfigError::InvalidEnv {
        var: var.to_string(),
        reason,
    };
    if let Some(val) = lookup(ENV_METADATA_MODE) {
        let mode = val
            .parse::<MetadataMode>()
            .map_err(|e| invalid(ENV_METADATA_MODE, e.to_string()))?;
        config.default_metadata_mode = Some(mode);
    }
    if let Some(val) = lookup(ENV_DIRECTION) {
        let direction = val
            .parse::<Direction>()
            .map_err(|e| invalid(ENV_DIRECTION, e.to_string()))?;
        config.default_direction = Some(direction);
    }
    if let Some(val) = lookup(ENV_INFERENCE_ORDER) {
        config.inference_order = Some(
            val.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        );
    }
    if let Some(val) = lookup(ENV_EXCERPT_LEN) {
        let len = val
            .trim()
            .parse::<usize>()
            .map_err(|e| invalid(ENV_EXCERPT_LEN, e.to_string()))?;
        config.excerpt_len = Some(len);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (an empty or repeating inference order, a zero excerpt length)
/// are returned as a [`ConfigError::ValidationError`]; soft issues come back
/// as warnings. Whether the named providers exist is only known once a
/// registry is at hand, so unknown names are not an error here.
pub fn validate_config(config: &TranslatorConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    match &config.inference_order {
        Some(order) if order.is_empty() => {
            errors.push("inference_order must not be empty".into());
        }
        Some(order) => {
            let mut seen = BTreeSet::new();
            for name in order {
                if name.trim().is_empty() {
                    errors.push("inference_order entries must not be blank".into());
                } else if !seen.insert(name.as_str()) {
                    errors.push(format!("inference_order lists '{name}' more than once"));
                }
            }
        }
        None => warnings.push(ConfigWarning::MissingOptionalField {
            field: "inference_order".into(),
            hint: "the built-in priority order is used".into(),
        }),
    }

    match config.excerpt_len {
        Some(0) => errors.push("excerpt_len must be greater than zero".into()),
        Some(len) if len > LARGE_EXCERPT_THRESHOLD => {
            warnings.push(ConfigWarning::LargeExcerpt { len });
        }
        _ => {}
    }

    if config.default_metadata_mode.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "default_metadata_mode".into(),
            hint: "provider metadata is stripped unless a call asks otherwise".into(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations. Values in `overlay` take precedence over `base`.
///
/// The inference order is replaced as a whole, never concatenated.
#[must_use]
pub fn merge_configs(base: TranslatorConfig, overlay: TranslatorConfig) -> TranslatorConfig {
    TranslatorConfig {
        default_metadata_mode: overlay.default_metadata_mode.or(base.default_metadata_mode),
        default_direction: overlay.default_direction.or(base.default_direction),
        inference_order: overlay.inference_order.or(base.inference_order),
        excerpt_len: overlay.excerpt_len.or(base.excerpt_len),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
