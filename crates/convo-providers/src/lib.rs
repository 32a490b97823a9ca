// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reference provider adapters.
//!
//! | Format             | System channel | Target |
//! |--------------------|----------------|--------|
//! | `canonical`        | optional       | yes    |
//! | `gemini`           | separate       | yes    |
//! | `anthropic`        | separate       | yes    |
//! | `openai`           | inline         | yes    |
//! | `openai_responses` | `instructions` | no     |
//! | `generic`          | inline         | no     |
//!
//! [`default_registry`] holds one instance of each with `generic` as the
//! fallback, and [`DEFAULT_PRIORITY`] is the inference order that keeps the
//! structurally specific formats ahead of the permissive ones.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::sync::OnceLock;

use convo_error::ConvoError;
use convo_provider::{ProviderRegistry, ProviderRegistryBuilder};

pub mod anthropic;
pub mod canonical;
mod common;
pub mod gemini;
pub mod generic;
pub mod openai;
pub mod responses;

pub use anthropic::{ANTHROPIC, AnthropicProvider};
pub use canonical::CanonicalProvider;
pub use convo_ir::CANONICAL_FORMAT as CANONICAL;
pub use gemini::{GEMINI, GeminiProvider};
pub use generic::{GENERIC, GenericProvider};
pub use openai::{OPENAI, OpenAiProvider};
pub use responses::{OPENAI_RESPONSES, OpenAiResponsesProvider};

/// Inference order for the built-in providers.
pub const DEFAULT_PRIORITY: &[&str] = &[CANONICAL, GEMINI, ANTHROPIC, OPENAI, OPENAI_RESPONSES, GENERIC];

/// A builder pre-loaded with every built-in provider and `generic` as the
/// fallback. Register more adapters before calling `build`.
#[must_use]
pub fn builtin_builder() -> ProviderRegistryBuilder {
    ProviderRegistry::builder()
        .register(CanonicalProvider)
        .register(GeminiProvider)
        .register(AnthropicProvider)
        .register(OpenAiProvider)
        .register(OpenAiResponsesProvider)
        .register(GenericProvider)
        .fallback(GENERIC)
}

/// Build a fresh registry of the built-in providers.
pub fn builtin_registry() -> Result<ProviderRegistry, ConvoError> {
    builtin_builder().build()
}

/// Process-wide registry of the built-in providers.
pub fn default_registry() -> &'static ProviderRegistry {
    static REGISTRY: OnceLock<ProviderRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| builtin_registry().expect("built-in providers have unique names"))
}
