//! Provider registry: the fixed set of configured LLM backends.
//!
//! Built once at startup from configuration and shared read-only across
//! requests. Only providers that are enabled and carry an API key are
//! registered; everything else is simply absent.

use std::sync::Arc;
use hydra_config::{AppConfig, ProviderKind, well_known};
use hydra_core::provider::Provider;
use tracing::{info, warn};
use crate::anthropic::AnthropicProvider;
use crate::gemini::GeminiProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// The ordered set of available providers.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. A provider with the same name is replaced.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.retain(|p| p.name() != provider.name());
        self.providers.push(provider);
    }

    /// Builder-style [`ProviderRegistry::register`].
    pub fn with(mut self, provider: Arc<dyn Provider>) -> Self {
        self.register(provider);
        self
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    /// All providers in registration order.
    pub fn all(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    /// List all registered provider names.
    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Build providers from configuration.
///
/// All adapters share one HTTP client. A provider without a resolvable
/// base URL or model (an unknown name with no `api_url`/`model`) is skipped
/// with a warning.
pub fn build_from_config(config: &AppConfig) -> ProviderRegistry {
    let client = reqwest::Client::new();
    let mut registry = ProviderRegistry::new();

    for (name, provider_config) in &config.providers {
        if !provider_config.is_available() {
            continue;
        }
        let Some(api_key) = provider_config.api_key.clone() else {
            continue;
        };

        let known = well_known(name);
        let Some(base_url) = provider_config
            .api_url
            .clone()
            .or_else(|| known.map(|w| w.base_url.to_string()))
        else {
            warn!(provider = %name, "Skipping provider without api_url");
            continue;
        };
        let Some(model) = provider_config
            .model
            .clone()
            .or_else(|| known.map(|w| w.model.to_string()))
        else {
            warn!(provider = %name, "Skipping provider without model");
            continue;
        };

        let provider: Arc<dyn Provider> = match provider_config.resolved_kind(name) {
            ProviderKind::Anthropic => Arc::new(
                AnthropicProvider::new(api_key)
                    .with_name(name.clone())
                    .with_base_url(base_url)
                    .with_model(model)
                    .with_client(client.clone()),
            ),
            ProviderKind::Gemini => Arc::new(
                GeminiProvider::new(api_key)
                    .with_name(name.clone())
                    .with_base_url(base_url)
                    .with_model(model)
                    .with_client(client.clone()),
            ),
            ProviderKind::OpenaiCompat => Arc::new(
                OpenAiCompatProvider::new(name.clone(), base_url, api_key, model)
                    .with_client(client.clone()),
            ),
        };

        info!(provider = %name, model = %provider.model(), "Registered provider");
        registry.register(provider);
    }

    registry
}
