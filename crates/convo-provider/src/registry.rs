// SPDX-License-Identifier: MIT OR Apache-2.0
//! Immutable, name-keyed provider table.

use std::sync::Arc;

use convo_error::{ConvoError, ErrorCode};

use crate::Provider;

/// An immutable set of named [`Provider`]s plus a universal fallback.
///
/// Built once through [`ProviderRegistry::builder`] and never mutated, so a
/// single registry can be shared by every concurrent translation.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
    fallback: usize,
}

impl ProviderRegistry {
    /// Start building a registry.
    #[must_use]
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    /// Look up a provider by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Provider> {
        self.providers
            .iter()
            .find(|p| p.name() == name)
            .map(|p| &**p)
    }

    /// Look up a provider by name, failing with `UnknownProvider`.
    pub fn require(&self, name: &str) -> Result<&dyn Provider, ConvoError> {
        self.get(name)
            .ok_or_else(|| ConvoError::unknown_provider(name).with_context("registered", self.names()))
    }

    /// Return an `Arc` handle to the named provider.
    #[must_use]
    pub fn get_arc(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    /// Check whether a provider with the given name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names, in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// The universal best-effort provider used when inference finds no match.
    #[must_use]
    pub fn fallback(&self) -> &dyn Provider {
        &*self.providers[self.fallback]
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Always `false`: a registry holds at least its fallback.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Iterate providers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Provider> {
        self.providers.iter().map(|p| &**p)
    }
}

/// Collects providers for a [`ProviderRegistry`].
#[derive(Debug, Default)]
pub struct ProviderRegistryBuilder {
    providers: Vec<Arc<dyn Provider>>,
    fallback: Option<String>,
}

impl ProviderRegistryBuilder {
    /// Add a provider.
    #[must_use]
    pub fn register(self, provider: impl Provider + 'static) -> Self {
        self.register_arc(Arc::new(provider))
    }

    /// Add an already shared provider.
    #[must_use]
    pub fn register_arc(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Name the provider returned when inference finds no match.
    #[must_use]
    pub fn fallback(mut self, name: impl Into<String>) -> Self {
        self.fallback = Some(name.into());
        self
    }

    /// Freeze the registry.
    ///
    /// Fails with `RegistryInvalid` on duplicate names or when the fallback
    /// is missing or unregistered.
    pub fn build(self) -> Result<ProviderRegistry, ConvoError> {
        for (i, p) in self.providers.iter().enumerate() {
            if self.providers[..i].iter().any(|q| q.name() == p.name()) {
                return Err(ConvoError::new(
                    ErrorCode::RegistryInvalid,
                    format!("provider `{}` registered twice", p.name()),
                )
                .with_context("provider", p.name()));
            }
        }
        let Some(fallback_name) = self.fallback else {
            return Err(ConvoError::new(
                ErrorCode::RegistryInvalid,
                "registry has no fallback provider",
            ));
        };
        let fallback = self
            .providers
            .iter()
            .position(|p| p.name() == fallback_name)
            .ok_or_else(|| {
                ConvoError::new(
                    ErrorCode::RegistryInvalid,
                    format!("fallback provider `{fallback_name}` is not registered"),
                )
                .with_context("provider", &fallback_name)
            })?;
        tracing::debug!(
            target: "convo_provider",
            providers = self.providers.len(),
            fallback = %fallback_name,
            "registry built"
        );
        Ok(ProviderRegistry {
            providers: self.providers,
            fallback,
        })
    }
}
