// SPDX-License-Identifier: MIT OR Apache-2.0
//! Translation between chat-model provider formats.
//!
//! A [`Translator`] sequences the whole call: pick the source format (or
//! infer it), validate the raw input against it, lower it into the canonical
//! IR, then raise the IR into the target format when one is requested. It
//! borrows an immutable [`ProviderRegistry`] and keeps no state between
//! calls, so one translator serves any number of threads.
//!
//! ```
//! use convo_translate::{TranslateOptions, translate};
//!
//! let out = translate("Hello, world!", &TranslateOptions::new()).unwrap();
//! let conv = out.into_conversation().unwrap();
//! assert_eq!(conv.messages[0].role, "user");
//! ```
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod options;

use std::sync::OnceLock;

use convo_config::{TranslatorConfig, validate_config};
use convo_error::{ConvoError, DEFAULT_EXCERPT_LEN};
use convo_inference::{Inference, ProviderInference};
use convo_ir::{CANONICAL_FORMAT, Conversation};
use convo_metadata::MetadataMode;
use convo_provider::{Direction, Provider, ProviderOutput, ProviderRegistry, RawInput, ensure_valid};
use convo_providers::{DEFAULT_PRIORITY, default_registry};
use convo_system::reinsert_system;
use serde::{Serialize, Serializer};
use serde_json::Value;

pub use options::TranslateOptions;

// ── Translation ─────────────────────────────────────────────────────────

/// Result of a translation.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    /// The canonical IR, when no target format was requested.
    Canonical(Conversation),
    /// Messages (and system value) in a provider's wire format.
    Provider {
        /// Target format tag.
        format: &'static str,
        /// Provider-shaped output.
        output: ProviderOutput,
    },
}

impl Translation {
    /// Format tag of the result.
    #[must_use]
    pub fn format(&self) -> &'static str {
        match self {
            Self::Canonical(_) => CANONICAL_FORMAT,
            Self::Provider { format, .. } => *format,
        }
    }

    /// Number of messages in the result.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Canonical(conv) => conv.messages.len(),
            Self::Provider { output, .. } => output.messages.len(),
        }
    }

    /// `true` when the result holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The canonical conversation, if that is what was produced.
    #[must_use]
    pub fn into_conversation(self) -> Option<Conversation> {
        match self {
            Self::Canonical(conv) => Some(conv),
            Self::Provider { .. } => None,
        }
    }

    /// The provider output, if a target format was requested.
    #[must_use]
    pub fn into_output(self) -> Option<ProviderOutput> {
        match self {
            Self::Canonical(_) => None,
            Self::Provider { output, .. } => Some(output),
        }
    }

    /// `{messages, system?}` as JSON in the result's format.
    pub fn to_value(&self) -> Result<Value, ConvoError> {
        Ok(serde_json::to_value(self)?)
    }
}

impl Serialize for Translation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Canonical(conv) => conv.serialize(serializer),
            Self::Provider { output, .. } => output.serialize(serializer),
        }
    }
}

// ── Translator ──────────────────────────────────────────────────────────

/// Orchestrates inference, validation and conversion over a registry.
#[derive(Debug, Clone)]
pub struct Translator<'r> {
    registry: &'r ProviderRegistry,
    inference: ProviderInference<'r>,
    metadata_mode: MetadataMode,
    direction: Direction,
    excerpt_len: usize,
}

impl<'r> Translator<'r> {
    /// A translator over `registry` with the built-in priority order and
    /// default settings.
    #[must_use]
    pub fn new(registry: &'r ProviderRegistry) -> Self {
        Self {
            registry,
            inference: ProviderInference::new(registry, DEFAULT_PRIORITY),
            metadata_mode: MetadataMode::default(),
            direction: Direction::default(),
            excerpt_len: DEFAULT_EXCERPT_LEN,
        }
    }

    /// Build a translator from a configuration.
    ///
    /// Fails with `ConfigInvalid` when the configuration does not validate.
    /// Names in the inference order that `registry` does not know are
    /// skipped with a warning.
    pub fn from_config(
        registry: &'r ProviderRegistry,
        config: &TranslatorConfig,
    ) -> Result<Self, ConvoError> {
        for warning in validate_config(config)? {
            tracing::debug!(target: "convo_translate", %warning, "config warning");
        }
        let mut translator = Self::new(registry)
            .with_metadata_mode(config.metadata_mode())
            .with_direction(config.direction())
            .with_excerpt_len(config.excerpt_len());
        if let Some(order) = &config.inference_order {
            translator = translator.with_priority(order.as_slice());
        }
        Ok(translator)
    }

    /// Replace the inference priority order.
    #[must_use]
    pub fn with_priority<S: AsRef<str>>(mut self, order: &[S]) -> Self {
        self.inference = ProviderInference::new(self.registry, order);
        self
    }

    /// Default metadata mode for calls that do not set one.
    #[must_use]
    pub fn with_metadata_mode(mut self, mode: MetadataMode) -> Self {
        self.metadata_mode = mode;
        self
    }

    /// Default direction for calls that do not set one.
    #[must_use]
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Maximum excerpt length in schema errors.
    #[must_use]
    pub fn with_excerpt_len(mut self, len: usize) -> Self {
        self.excerpt_len = len;
        self
    }

    /// The registry this translator reads.
    #[must_use]
    pub fn registry(&self) -> &'r ProviderRegistry {
        self.registry
    }

    /// Effective inference order.
    #[must_use]
    pub fn priority(&self) -> Vec<&'static str> {
        self.inference.order()
    }

    /// Infer the format of `input` without translating it.
    #[must_use]
    pub fn infer(&self, input: &RawInput, system: Option<&Value>) -> Inference {
        self.inference.infer(input, system)
    }

    /// Translate `input` as described by `options`.
    pub fn translate(
        &self,
        input: &RawInput,
        options: &TranslateOptions,
    ) -> Result<Translation, ConvoError> {
        let system = options.system.as_ref();
        let target = self.resolve_target(options.to.as_deref())?;
        let source = match options.from.as_deref() {
            Some(name) => self.registry.require(name)?,
            None => self.registry.require(self.infer(input, system).provider)?,
        };

        ensure_valid(source, input, system, self.excerpt_len)?;

        let direction = options.direction.unwrap_or(self.direction);
        let conv = source.to_canonical(input, system, direction)?;

        let Some(target) = target else {
            tracing::debug!(
                target: "convo_translate",
                from = source.name(),
                messages = conv.messages.len(),
                "translated to canonical"
            );
            return Ok(Translation::Canonical(conv));
        };

        let mode = options.metadata_mode.unwrap_or(self.metadata_mode);
        let messages = reinsert_system(conv.messages, conv.system.unwrap_or_default());
        let output = target.to_provider_format(&messages, mode)?;
        tracing::debug!(
            target: "convo_translate",
            from = source.name(),
            to = target.name(),
            %mode,
            messages = output.messages.len(),
            "translated"
        );
        Ok(Translation::Provider {
            format: target.name(),
            output,
        })
    }

    /// Translate an untyped JSON value (a string or an array of messages).
    pub fn translate_value(
        &self,
        input: Value,
        options: &TranslateOptions,
    ) -> Result<Translation, ConvoError> {
        self.translate(&RawInput::try_from(input)?, options)
    }

    /// `None` for the canonical IR, otherwise a provider that can be a target.
    fn resolve_target(&self, name: Option<&str>) -> Result<Option<&'r dyn Provider>, ConvoError> {
        match name {
            None | Some(CANONICAL_FORMAT) => Ok(None),
            Some(name) => {
                let provider = self.registry.require(name)?;
                if provider.supports_target() {
                    Ok(Some(provider))
                } else {
                    Err(ConvoError::unsupported_target(name))
                }
            }
        }
    }
}

/// Process-wide translator over [`default_registry`].
pub fn default_translator() -> &'static Translator<'static> {
    static TRANSLATOR: OnceLock<Translator<'static>> = OnceLock::new();
    TRANSLATOR.get_or_init(|| Translator::new(default_registry()))
}

/// Translate with the built-in providers and default settings.
pub fn translate(
    input: impl Into<RawInput>,
    options: &TranslateOptions,
) -> Result<Translation, ConvoError> {
    default_translator().translate(&input.into(), options)
}
