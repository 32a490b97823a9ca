// SPDX-License-Identifier: MIT OR Apache-2.0
//! Provider format inference.
//!
//! Untyped input is matched by trial validation: each candidate provider's
//! validator is run in a fixed priority order and the first one that accepts
//! wins. Structurally specific formats belong early in the order, permissive
//! ones late. Inference never fails; when nothing matches the registry's
//! fallback provider is returned.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::fmt;

use convo_provider::{Provider, ProviderRegistry, RawInput};
use serde::Serialize;
use serde_json::Value;

/// What an [`Inference`] was decided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// Bare-string input; the first provider in the order was taken.
    BareString,
    /// A validator accepted the whole message array.
    Messages,
    /// A validator accepted the system value.
    System,
    /// Nothing matched; the registry fallback was taken.
    Fallback,
}

impl fmt::Display for MatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BareString => "bare_string",
            Self::Messages => "messages",
            Self::System => "system",
            Self::Fallback => "fallback",
        })
    }
}

/// Result of inferring a provider format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Inference {
    /// Format tag of the chosen provider.
    pub provider: &'static str,
    /// Which part of the input decided it.
    pub matched_on: MatchSource,
}

/// Trial-validation engine over a borrowed registry.
#[derive(Debug, Clone)]
pub struct ProviderInference<'r> {
    registry: &'r ProviderRegistry,
    order: Vec<&'r dyn Provider>,
}

impl<'r> ProviderInference<'r> {
    /// Build an engine that tries providers in `order`.
    ///
    /// Names not present in `registry` are skipped with a warning.
    pub fn new<S: AsRef<str>>(registry: &'r ProviderRegistry, order: &[S]) -> Self {
        let mut resolved: Vec<&'r dyn Provider> = Vec::with_capacity(order.len());
        for name in order {
            let name = name.as_ref();
            match registry.get(name) {
                Some(p) if !resolved.iter().any(|q| q.name() == p.name()) => resolved.push(p),
                Some(_) => {
                    tracing::warn!(target: "convo_inference", provider = name, "duplicate name in inference order skipped");
                }
                None => {
                    tracing::warn!(target: "convo_inference", provider = name, "unknown provider in inference order skipped");
                }
            }
        }
        Self {
            registry,
            order: resolved,
        }
    }

    /// Build an engine that tries providers in registration order.
    #[must_use]
    pub fn in_registry_order(registry: &'r ProviderRegistry) -> Self {
        Self {
            registry,
            order: registry.iter().collect(),
        }
    }

    /// Effective priority order.
    #[must_use]
    pub fn order(&self) -> Vec<&'static str> {
        self.order.iter().map(|p| p.name()).collect()
    }

    /// Infer the format of `input`, consulting `system` when the messages
    /// decide nothing.
    #[must_use]
    pub fn infer(&self, input: &RawInput, system: Option<&Value>) -> Inference {
        let inference = self.decide(input, system);
        tracing::debug!(
            target: "convo_inference",
            provider = inference.provider,
            matched_on = %inference.matched_on,
            "inferred provider format"
        );
        inference
    }

    fn decide(&self, input: &RawInput, system: Option<&Value>) -> Inference {
        match input {
            RawInput::Text(_) => {
                if let Some(first) = self.order.first() {
                    return Inference {
                        provider: first.name(),
                        matched_on: MatchSource::BareString,
                    };
                }
            }
            RawInput::Messages(messages) if !messages.is_empty() => {
                if let Some(p) = self
                    .order
                    .iter()
                    .find(|p| p.validate_messages(messages).valid)
                {
                    return Inference {
                        provider: p.name(),
                        matched_on: MatchSource::Messages,
                    };
                }
            }
            RawInput::Messages(_) => {}
        }

        if let Some(system) = system
            && let Some(p) = self
                .order
                .iter()
                .find(|p| p.validate_system(system).valid)
        {
            return Inference {
                provider: p.name(),
                matched_on: MatchSource::System,
            };
        }

        Inference {
            provider: self.registry.fallback().name(),
            matched_on: MatchSource::Fallback,
        }
    }

    /// Every provider in the order whose message validator accepts `messages`.
    #[must_use]
    pub fn candidates(&self, messages: &[Value]) -> Vec<&'static str> {
        if messages.is_empty() {
            return Vec::new();
        }
        self.order
            .iter()
            .filter(|p| p.validate_messages(messages).valid)
            .map(|p| p.name())
            .collect()
    }
}
