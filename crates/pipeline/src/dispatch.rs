//! Provider fan-out.
//!
//! The same prompt goes to every registered provider at once. Each call is
//! isolated: an error, empty reply or timeout only removes that provider's
//! candidate. The dispatcher waits for every call to settle.

use futures::future::join_all;
use hydra_core::error::ProviderError;
use hydra_core::persona::CandidateResponse;
use hydra_core::provider::{Provider, ProviderRequest, ProviderResponse};
use hydra_providers::ProviderRegistry;
use hydra_security::audit::{AuditEvent, AuditLogger};
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::prompt::AssembledPrompt;

pub struct Dispatcher {
    registry: ProviderRegistry,
    timeout: Duration,
    temperature: f32,
    max_tokens: u32,
}

impl Dispatcher {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(60),
            temperature: 0.7,
            max_tokens: 1024,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn provider_count(&self) -> usize {
        self.registry.len()
    }

    /// Send `prompt` to every provider; candidates come back in registry order.
    ///
    /// Each failed call is audited as `API_FAILURE`. If every call fails,
    /// `ALL_PROVIDERS_FAILED` is audited once and returned.
    pub async fn dispatch(
        &self,
        prompt: &AssembledPrompt,
        audit: &AuditLogger,
    ) -> Result<Vec<CandidateResponse>, PipelineError> {
        if self.registry.is_empty() {
            return Err(PipelineError::NoProviders);
        }

        let request = ProviderRequest::new(prompt.system.clone(), prompt.messages.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        info!(providers = ?self.registry.names(), "Dispatching prompt");

        let outcomes = join_all(
            self.registry
                .all()
                .iter()
                .map(|provider| self.call(provider.as_ref(), request.clone())),
        )
        .await;

        let mut candidates = Vec::new();
        let mut failures = Vec::new();
        for (provider, outcome) in self.registry.all().iter().zip(outcomes) {
            let name = provider.name().to_string();
            match outcome {
                Ok(response) => candidates.push(CandidateResponse::new(name, response.text)),
                Err(e) => {
                    warn!(provider = %name, error = %e, "Provider call failed");
                    audit
                        .record(
                            AuditEvent::ApiFailure,
                            json!({ "provider": name, "error": e.to_string() }),
                        )
                        .await;
                    failures.push((name, e));
                }
            }
        }

        if candidates.is_empty() {
            audit
                .record(
                    AuditEvent::AllProvidersFailed,
                    json!({
                        "attempted": failures.len(),
                        "providers": failures.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
                    }),
                )
                .await;
            return Err(PipelineError::AllProvidersFailed { failures });
        }

        info!(
            succeeded = candidates.len(),
            failed = failures.len(),
            "Fan-out complete"
        );
        Ok(candidates)
    }

    async fn call(
        &self,
        provider: &dyn Provider,
        request: ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let response = tokio::time::timeout(self.timeout, provider.complete(request))
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!(
                    "Provider '{}' timed out after {}s",
                    provider.name(),
                    self.timeout.as_secs()
                ))
            })??;

        if response.text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse(provider.name().to_string()));
        }
        Ok(response)
    }
}
