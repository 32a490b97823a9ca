// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error taxonomy with stable error codes for convo-bridge.
//!
//! Every translation error carries an [`ErrorCode`] (a machine-readable,
//! stable string tag), a human-readable message, an optional cause chain, and
//! arbitrary key-value context. Use the builder returned by
//! [`ConvoError::new`] to construct errors fluently.
//!
//! Validator output ([`ValidationError`], [`ValidationResult`]) lives here as
//! well so that providers, inference and the orchestrator agree on one shape.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default maximum length (in bytes) of the input excerpt attached to a
/// schema mismatch.
pub const DEFAULT_EXCERPT_LEN: usize = 200;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Raw input does not match a provider's wire shape.
    Schema,
    /// Provider lookup and capability errors.
    Provider,
    /// Canonical IR errors.
    Ir,
    /// Configuration errors.
    Config,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Schema => "schema",
            Self::Provider => "provider",
            Self::Ir => "ir",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Raw input failed the declared or inferred provider's validator.
    SchemaMismatch,
    /// The requested target provider cannot produce its own format.
    UnsupportedTarget,
    /// No provider is registered under the requested name.
    UnknownProvider,
    /// A provider registry was assembled inconsistently.
    RegistryInvalid,
    /// Canonical JSON could not be interpreted as IR values.
    IrInvalid,
    /// Translator configuration is invalid.
    ConfigInvalid,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SchemaMismatch => ErrorCategory::Schema,
            Self::UnsupportedTarget | Self::UnknownProvider | Self::RegistryInvalid => {
                ErrorCategory::Provider
            }
            Self::IrInvalid => ErrorCategory::Ir,
            Self::ConfigInvalid => ErrorCategory::Config,
            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"SCHEMA_MISMATCH"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaMismatch => "SCHEMA_MISMATCH",
            Self::UnsupportedTarget => "UNSUPPORTED_TARGET",
            Self::UnknownProvider => "UNKNOWN_PROVIDER",
            Self::RegistryInvalid => "REGISTRY_INVALID",
            Self::IrInvalid => "IR_INVALID",
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in a raw payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// JSON-pointer-style path to the problematic field (e.g. `/0/role`).
    pub path: String,
    /// What went wrong.
    pub message: String,
}

impl ValidationError {
    /// Create a validation error at `path`.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Outcome of validating a payload against one provider's shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    /// `true` when no errors were found.
    pub valid: bool,
    /// Hard errors: the payload violates the provider's wire contract.
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// A passing result.
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// Build a result from collected errors.
    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// A failing result with a single error.
    pub fn fail(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::from_errors(vec![ValidationError::new(path, message)])
    }
}

// ---------------------------------------------------------------------------
// ConvoError
// ---------------------------------------------------------------------------

/// Unified translation error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use convo_error::{ConvoError, ErrorCode};
///
/// let err = ConvoError::new(ErrorCode::UnknownProvider, "no such provider")
///     .with_context("provider", "cohere");
/// assert_eq!(err.code, ErrorCode::UnknownProvider);
/// ```
pub struct ConvoError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl ConvoError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Raw content does not match `provider`'s wire shape.
    ///
    /// `excerpt` is truncated to [`DEFAULT_EXCERPT_LEN`] bytes; use
    /// [`ConvoError::schema_mismatch_with_limit`] for a different limit.
    pub fn schema_mismatch(provider: &str, excerpt: &str, issues: &[ValidationError]) -> Self {
        Self::schema_mismatch_with_limit(provider, excerpt, issues, DEFAULT_EXCERPT_LEN)
    }

    /// Like [`ConvoError::schema_mismatch`] with an explicit excerpt limit.
    pub fn schema_mismatch_with_limit(
        provider: &str,
        excerpt: &str,
        issues: &[ValidationError],
        limit: usize,
    ) -> Self {
        let detail = issues
            .first()
            .map(|i| format!(" ({i})"))
            .unwrap_or_default();
        Self::new(
            ErrorCode::SchemaMismatch,
            format!("input does not match the `{provider}` format{detail}"),
        )
        .with_context("provider", provider)
        .with_context("excerpt", truncate(excerpt, limit))
        .with_context(
            "issues",
            issues.iter().map(ToString::to_string).collect::<Vec<_>>(),
        )
    }

    /// `provider` has no conversion from canonical form.
    pub fn unsupported_target(provider: &str) -> Self {
        Self::new(
            ErrorCode::UnsupportedTarget,
            format!("`{provider}` is source-only and cannot be a translation target"),
        )
        .with_context("provider", provider)
    }

    /// No provider is registered as `name`.
    pub fn unknown_provider(name: &str) -> Self {
        Self::new(
            ErrorCode::UnknownProvider,
            format!("no provider registered as `{name}`"),
        )
        .with_context("provider", name)
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

/// Truncate `s` to at most `max_len` bytes without splitting a character.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

impl fmt::Debug for ConvoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ConvoError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for ConvoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ConvoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<serde_json::Error> for ConvoError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorCode::IrInvalid, err.to_string()).with_source(err)
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`ConvoError`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConvoErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&ConvoError> for ConvoErrorDto {
    fn from(err: &ConvoError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<ConvoErrorDto> for ConvoError {
    fn from(dto: ConvoErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io;

    const ALL_CODES: &[ErrorCode] = &[
        ErrorCode::SchemaMismatch,
        ErrorCode::UnsupportedTarget,
        ErrorCode::UnknownProvider,
        ErrorCode::RegistryInvalid,
        ErrorCode::IrInvalid,
        ErrorCode::ConfigInvalid,
        ErrorCode::Internal,
    ];

    // -- Construction & Display -----------------------------------------

    #[test]
    fn basic_construction() {
        let err = ConvoError::new(ErrorCode::Internal, "boom");
        assert_eq!(err.code, ErrorCode::Internal);
        assert_eq!(err.message, "boom");
        assert!(err.source.is_none());
        assert!(err.context.is_empty());
    }

    #[test]
    fn display_without_context() {
        let err = ConvoError::new(ErrorCode::Internal, "oops");
        assert_eq!(err.to_string(), "[INTERNAL] oops");
    }

    #[test]
    fn display_with_context() {
        let err = ConvoError::unknown_provider("cohere");
        let s = err.to_string();
        assert!(s.starts_with("[UNKNOWN_PROVIDER]"));
        assert!(s.contains("cohere"));
    }

    #[test]
    fn debug_with_source() {
        let src = io::Error::new(io::ErrorKind::InvalidData, "bad bytes");
        let err = ConvoError::new(ErrorCode::IrInvalid, "parse").with_source(src);
        let dbg = format!("{err:?}");
        assert!(dbg.contains("source"));
        assert!(dbg.contains("bad bytes"));
    }

    // -- Named constructors ---------------------------------------------

    #[test]
    fn schema_mismatch_carries_provider_and_excerpt() {
        let issues = vec![ValidationError::new("/0/role", "missing role")];
        let err = ConvoError::schema_mismatch("openai", r#"[{"content":"hi"}]"#, &issues);
        assert_eq!(err.code, ErrorCode::SchemaMismatch);
        assert_eq!(err.context["provider"], serde_json::json!("openai"));
        assert_eq!(
            err.context["excerpt"],
            serde_json::json!(r#"[{"content":"hi"}]"#)
        );
        assert_eq!(
            err.context["issues"],
            serde_json::json!(["/0/role: missing role"])
        );
        assert!(err.message.contains("/0/role"));
    }

    #[test]
    fn schema_mismatch_truncates_long_excerpt() {
        let long = "é".repeat(300);
        let err = ConvoError::schema_mismatch("gemini", &long, &[]);
        let excerpt = err.context["excerpt"].as_str().unwrap();
        assert!(excerpt.len() <= DEFAULT_EXCERPT_LEN + '…'.len_utf8());
        assert!(excerpt.ends_with('…'));
    }

    #[test]
    fn unsupported_target_names_provider() {
        let err = ConvoError::unsupported_target("generic");
        assert_eq!(err.code, ErrorCode::UnsupportedTarget);
        assert_eq!(err.category(), ErrorCategory::Provider);
        assert!(err.message.contains("generic"));
    }

    #[test]
    fn serde_json_error_converts_to_ir_invalid() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ConvoError = parse_err.into();
        assert_eq!(err.code, ErrorCode::IrInvalid);
        assert!(std::error::Error::source(&err).is_some());
    }

    // -- Truncation -----------------------------------------------------

    #[test]
    fn truncate_short_string_is_unchanged() {
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn truncate_respects_char_boundary() {
        let t = truncate("aé", 2);
        assert_eq!(t, "a…");
    }

    // -- Categorisation -------------------------------------------------

    #[test]
    fn codes_categorised() {
        assert_eq!(ErrorCode::SchemaMismatch.category(), ErrorCategory::Schema);
        assert_eq!(
            ErrorCode::UnsupportedTarget.category(),
            ErrorCategory::Provider
        );
        assert_eq!(
            ErrorCode::UnknownProvider.category(),
            ErrorCategory::Provider
        );
        assert_eq!(
            ErrorCode::RegistryInvalid.category(),
            ErrorCategory::Provider
        );
        assert_eq!(ErrorCode::IrInvalid.category(), ErrorCategory::Ir);
        assert_eq!(ErrorCode::ConfigInvalid.category(), ErrorCategory::Config);
        assert_eq!(ErrorCode::Internal.category(), ErrorCategory::Internal);
    }

    // -- Validation results ---------------------------------------------

    #[test]
    fn validation_result_valid_tracks_errors() {
        assert!(ValidationResult::ok().valid);
        assert!(!ValidationResult::fail("/", "nope").valid);
        assert!(ValidationResult::from_errors(Vec::new()).valid);
    }

    #[test]
    fn validation_error_display() {
        let e = ValidationError::new("/1/parts", "must be an array");
        assert_eq!(e.to_string(), "/1/parts: must be an array");
    }

    // -- Serialization --------------------------------------------------

    #[test]
    fn error_code_serde_roundtrip() {
        let json = serde_json::to_string(&ErrorCode::SchemaMismatch).unwrap();
        assert_eq!(json, r#""SCHEMA_MISMATCH""#);
        let back: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ErrorCode::SchemaMismatch);
    }

    #[test]
    fn dto_roundtrip_with_source() {
        let src = io::Error::other("inner");
        let err = ConvoError::new(ErrorCode::Internal, "outer").with_source(src);
        let dto: ConvoErrorDto = (&err).into();
        assert_eq!(dto.source_message.as_deref(), Some("inner"));
        let json = serde_json::to_string(&dto).unwrap();
        let back: ConvoErrorDto = serde_json::from_str(&json).unwrap();
        assert_eq!(dto, back);
        let restored: ConvoError = back.into();
        assert!(restored.source.is_none());
    }

    #[test]
    fn all_codes_have_unique_as_str() {
        let mut seen = HashSet::new();
        for code in ALL_CODES {
            assert!(seen.insert(code.as_str()), "duplicate {code:?}");
        }
    }

    #[test]
    fn all_codes_serialize_to_as_str() {
        for code in ALL_CODES {
            let json = serde_json::to_string(code).unwrap();
            assert_eq!(json, format!(r#""{}""#, code.as_str()));
            assert_eq!(code.to_string(), code.as_str());
        }
    }
}
