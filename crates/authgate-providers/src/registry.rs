//! Provider registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::OAuthProvider;
use crate::{AppleProvider, FacebookProvider, GithubProvider, GoogleProvider, MicrosoftProvider};
use authgate_core::{Config, ProviderKind};

/// Registry of configured OAuth providers, keyed by kind.
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn OAuthProvider>>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Build adapters for every vendor present in the config.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        for (kind, creds) in config.oauth_credentials() {
            let provider: Arc<dyn OAuthProvider> = match kind {
                ProviderKind::Github => Arc::new(GithubProvider::new(creds)),
                ProviderKind::Google => Arc::new(GoogleProvider::new(creds)),
                ProviderKind::Facebook => Arc::new(FacebookProvider::new(creds)),
                ProviderKind::Microsoft => Arc::new(MicrosoftProvider::new(creds)),
                ProviderKind::Apple | ProviderKind::Email => continue,
            };
            registry.register(provider);
        }
        if let Some(apple) = &config.apple {
            registry.register(Arc::new(AppleProvider::new(apple)));
        }
        registry
    }

    /// Register a provider, replacing any previous one of the same kind.
    pub fn register(&mut self, provider: Arc<dyn OAuthProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    /// Get a provider by kind.
    #[must_use]
    pub fn get(&self, kind: ProviderKind) -> Option<&Arc<dyn OAuthProvider>> {
        self.providers.get(&kind)
    }

    /// Registered kinds in login-page order.
    #[must_use]
    pub fn kinds(&self) -> Vec<ProviderKind> {
        ProviderKind::OAUTH
            .into_iter()
            .filter(|k| self.providers.contains_key(k))
            .collect()
    }

    /// Providers offering the browser redirect flow, in login-page order.
    #[must_use]
    pub fn web_login_providers(&self) -> Vec<&Arc<dyn OAuthProvider>> {
        self.kinds()
            .into_iter()
            .filter_map(|k| self.providers.get(&k))
            .filter(|p| p.supports_web_login())
            .collect()
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
