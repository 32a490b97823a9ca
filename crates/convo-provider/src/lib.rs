// SPDX-License-Identifier: MIT OR Apache-2.0
//! The provider adapter contract.
//!
//! A [`Provider`] knows one wire format. Every provider can lower its format
//! into the canonical [`Conversation`]; providers that also implement
//! [`Provider::to_provider_format`] can be a translation target. Providers
//! are collected into an immutable [`ProviderRegistry`] that is built once and
//! shared by reference.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod registry;

pub use registry::{ProviderRegistry, ProviderRegistryBuilder};

use std::fmt;
use std::str::FromStr;

use convo_error::{ConvoError, DEFAULT_EXCERPT_LEN, ErrorCode, ValidationResult};
use convo_ir::{Conversation, Message, role};
use convo_metadata::MetadataMode;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Direction ───────────────────────────────────────────────────────────

/// Which side of a model exchange a payload comes from.
///
/// Only used to pick the role of a bare-string payload.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// A request to a model; bare strings become `user` messages.
    #[default]
    Input,
    /// A model response; bare strings become `assistant` messages.
    Output,
}

impl Direction {
    /// Role assigned to a bare-string payload.
    #[must_use]
    pub fn default_role(self) -> &'static str {
        match self {
            Self::Input => role::USER,
            Self::Output => role::ASSISTANT,
        }
    }

    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ConvoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "input" => Ok(Self::Input),
            "output" => Ok(Self::Output),
            _ => Err(ConvoError::new(
                ErrorCode::ConfigInvalid,
                format!("unknown direction '{s}' (expected input or output)"),
            )),
        }
    }
}

// ── RawInput ────────────────────────────────────────────────────────────

/// Untyped payload handed to a translation: a bare string or an array of raw
/// provider messages.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    /// A bare string, compatible with every format.
    Text(String),
    /// Raw wire messages of some provider.
    Messages(Vec<Value>),
}

impl RawInput {
    /// The raw messages, or `None` for a bare string.
    #[must_use]
    pub fn messages(&self) -> Option<&[Value]> {
        match self {
            Self::Text(_) => None,
            Self::Messages(m) => Some(m),
        }
    }

    /// `true` for a bare string.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// JSON rendition of the payload.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Messages(m) => Value::Array(m.clone()),
        }
    }

    /// Compact JSON text used for error excerpts.
    #[must_use]
    pub fn excerpt(&self) -> String {
        self.to_value().to_string()
    }
}

impl From<&str> for RawInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for RawInput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<Value>> for RawInput {
    fn from(m: Vec<Value>) -> Self {
        Self::Messages(m)
    }
}

impl TryFrom<Value> for RawInput {
    type Error = ConvoError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => Ok(Self::Text(s)),
            Value::Array(m) => Ok(Self::Messages(m)),
            other => Err(ConvoError::new(
                ErrorCode::SchemaMismatch,
                "raw input must be a string or an array of messages",
            )
            .with_context("excerpt", convo_error::truncate(&other.to_string(), DEFAULT_EXCERPT_LEN))),
        }
    }
}

// ── ProviderOutput ──────────────────────────────────────────────────────

/// Provider-shaped result of converting out of canonical form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderOutput {
    /// Raw wire messages.
    pub messages: Vec<Value>,
    /// Separate system value, for providers with a system channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<Value>,
}

impl ProviderOutput {
    /// Output without a system channel.
    #[must_use]
    pub fn messages(messages: Vec<Value>) -> Self {
        Self {
            messages,
            system: None,
        }
    }

    /// Attach a system value.
    #[must_use]
    pub fn with_system(mut self, system: Option<Value>) -> Self {
        self.system = system;
        self
    }
}

// ── Provider ────────────────────────────────────────────────────────────

/// A wire-format adapter.
///
/// Implementations hold no state between calls; the same value is shared by
/// every translation running in the process.
pub trait Provider: Send + Sync + fmt::Debug {
    /// Format tag, unique within a registry.
    fn name(&self) -> &'static str;

    /// Accept or reject an array of raw messages as this format.
    fn validate_messages(&self, messages: &[Value]) -> ValidationResult;

    /// Accept or reject a raw system value as this format.
    ///
    /// Providers without a system channel reject everything.
    fn validate_system(&self, _system: &Value) -> ValidationResult {
        ValidationResult::fail("", format!("`{}` has no system channel", self.name()))
    }

    /// `true` when this format keeps system content apart from its messages.
    fn has_system_channel(&self) -> bool {
        false
    }

    /// Lower raw input into canonical form.
    ///
    /// Callers validate first (see [`ensure_valid`]); implementations may
    /// assume the shape their validator accepts.
    fn to_canonical(
        &self,
        input: &RawInput,
        system: Option<&Value>,
        direction: Direction,
    ) -> Result<Conversation, ConvoError>;

    /// `true` when [`Provider::to_provider_format`] is implemented.
    fn supports_target(&self) -> bool {
        false
    }

    /// Raise canonical messages into this format.
    ///
    /// `messages` may contain system-role messages; split-channel providers
    /// move them into [`ProviderOutput::system`].
    fn to_provider_format(
        &self,
        _messages: &[Message],
        _mode: MetadataMode,
    ) -> Result<ProviderOutput, ConvoError> {
        Err(ConvoError::unsupported_target(self.name()))
    }
}

/// Validate `input` (and `system`, if given) against `provider`.
///
/// Bare strings are valid for every provider. A failure becomes a
/// `SchemaMismatch` naming the provider, with an excerpt of at most
/// `excerpt_len` bytes.
pub fn ensure_valid(
    provider: &dyn Provider,
    input: &RawInput,
    system: Option<&Value>,
    excerpt_len: usize,
) -> Result<(), ConvoError> {
    if let Some(messages) = input.messages() {
        let result = provider.validate_messages(messages);
        if !result.valid {
            return Err(ConvoError::schema_mismatch_with_limit(
                provider.name(),
                &input.excerpt(),
                &result.errors,
                excerpt_len,
            ));
        }
    }
    if let Some(system) = system {
        let result = provider.validate_system(system);
        if !result.valid {
            return Err(ConvoError::schema_mismatch_with_limit(
                provider.name(),
                &system.to_string(),
                &result.errors,
                excerpt_len,
            )
            .with_context("field", "system"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use convo_error::ValidationError;
    use serde_json::json;

    #[derive(Debug)]
    struct Strings;

    impl Provider for Strings {
        fn name(&self) -> &'static str {
            "strings"
        }

        fn validate_messages(&self, messages: &[Value]) -> ValidationResult {
            let errors = messages
                .iter()
                .enumerate()
                .filter(|(_, m)| !m.is_string())
                .map(|(i, _)| ValidationError::new(format!("/{i}"), "expected a string"))
                .collect();
            ValidationResult::from_errors(errors)
        }

        fn to_canonical(
            &self,
            input: &RawInput,
            _system: Option<&Value>,
            direction: Direction,
        ) -> Result<Conversation, ConvoError> {
            let texts: Vec<String> = match input {
                RawInput::Text(s) => vec![s.clone()],
                RawInput::Messages(m) => m
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            };
            Ok(Conversation::from_messages(
                texts
                    .into_iter()
                    .map(|t| Message::text(direction.default_role(), t))
                    .collect(),
            ))
        }
    }

    #[test]
    fn direction_roles() {
        assert_eq!(Direction::Input.default_role(), "user");
        assert_eq!(Direction::Output.default_role(), "assistant");
        assert_eq!(Direction::default(), Direction::Input);
        assert_eq!("OUTPUT".parse::<Direction>().unwrap(), Direction::Output);
        assert_eq!(
            "sideways".parse::<Direction>().unwrap_err().code,
            ErrorCode::ConfigInvalid
        );
    }

    #[test]
    fn raw_input_from_json() {
        assert!(RawInput::try_from(json!("hi")).unwrap().is_text());
        assert_eq!(
            RawInput::try_from(json!([{"a": 1}])).unwrap().messages().unwrap().len(),
            1
        );
        let err = RawInput::try_from(json!({"role": "user"})).unwrap_err();
        assert_eq!(err.code, ErrorCode::SchemaMismatch);
    }

    #[test]
    fn default_target_is_unsupported() {
        let p = Strings;
        assert!(!p.supports_target());
        let err = p.to_provider_format(&[], MetadataMode::Strip).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedTarget);
        assert!(!p.validate_system(&json!("x")).valid);
    }

    #[test]
    fn ensure_valid_accepts_bare_strings() {
        ensure_valid(&Strings, &RawInput::from("anything"), None, 200).unwrap();
    }

    #[test]
    fn ensure_valid_reports_mismatch_with_excerpt() {
        let input = RawInput::from(vec![json!("ok"), json!({"role": "user"})]);
        let err = ensure_valid(&Strings, &input, None, 10).unwrap_err();
        assert_eq!(err.code, ErrorCode::SchemaMismatch);
        assert_eq!(err.context["provider"], json!("strings"));
        let excerpt = err.context["excerpt"].as_str().unwrap();
        assert!(excerpt.len() <= 10 + '…'.len_utf8());
        assert!(err.to_string().contains("/1"));
    }

    #[test]
    fn ensure_valid_checks_system() {
        let err = ensure_valid(&Strings, &RawInput::from("hi"), Some(&json!("sys")), 200)
            .unwrap_err();
        assert_eq!(err.context["field"], json!("system"));
    }
}
