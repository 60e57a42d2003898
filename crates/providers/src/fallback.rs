//! Provider fallback: ordered first-success chain with per-provider timeouts.
//!
//! The chain tries each entry in order and stops at the first provider that
//! answers with non-blank text. Every failed attempt is kept so the caller
//! can report it; an exhausted chain is its own error type.

use hydra_core::error::ProviderError;
use hydra_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::registry::ProviderRegistry;

/// An ordered list of providers tried until one succeeds.
pub struct FallbackChain {
    chain: Vec<FallbackEntry>,
}

/// A single entry in the fallback chain.
struct FallbackEntry {
    provider: Arc<dyn Provider>,
    timeout: Duration,
}

/// The winning attempt plus the failures that preceded it.
#[derive(Debug)]
pub struct FallbackSuccess {
    pub provider: String,
    pub response: ProviderResponse,
    pub failures: Vec<(String, ProviderError)>,
}

/// Every entry in the chain failed (or the chain was empty).
#[derive(Debug, thiserror::Error)]
#[error("all {} fallback attempts failed", .failures.len())]
pub struct ChainExhausted {
    pub failures: Vec<(String, ProviderError)>,
}

impl ChainExhausted {
    /// The error from the final attempt, if any attempt was made.
    pub fn last_error(&self) -> Option<&ProviderError> {
        self.failures.last().map(|(_, e)| e)
    }
}

impl FallbackChain {
    /// Create a new fallback chain with no entries.
    pub fn new() -> Self {
        Self { chain: Vec::new() }
    }

    /// Build a chain from a priority list of provider names.
    ///
    /// Names with no registered provider are skipped; they do not count as
    /// failed attempts.
    pub fn from_priority(registry: &ProviderRegistry, priority: &[String], timeout: Duration) -> Self {
        let mut chain = Self::new();
        for name in priority {
            match registry.get(name) {
                Some(provider) => chain = chain.add(provider, timeout),
                None => debug!(provider = %name, "Fallback: provider not configured, skipping"),
            }
        }
        chain
    }

    /// Add a provider to the fallback chain with a custom timeout.
    pub fn add(mut self, provider: Arc<dyn Provider>, timeout: Duration) -> Self {
        self.chain.push(FallbackEntry { provider, timeout });
        self
    }

    /// Add a provider with the default timeout (90s).
    pub fn add_default(self, provider: Arc<dyn Provider>) -> Self {
        self.add(provider, Duration::from_secs(90))
    }

    /// Provider names in attempt order.
    pub fn names(&self) -> Vec<&str> {
        self.chain.iter().map(|e| e.provider.name()).collect()
    }

    /// Number of providers in the chain.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Try each provider in order, returning the first success.
    pub async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<FallbackSuccess, ChainExhausted> {
        let mut failures = Vec::new();

        for (i, entry) in self.chain.iter().enumerate() {
            let provider_name = entry.provider.name().to_string();

            info!(
                provider = %provider_name,
                attempt = i + 1,
                total = self.chain.len(),
                "Fallback: trying provider"
            );

            let error = match tokio::time::timeout(entry.timeout, entry.provider.complete(request.clone()))
                .await
            {
                Ok(Ok(response)) if response.text.trim().is_empty() => {
                    warn!(provider = %provider_name, "Fallback: blank response, trying next");
                    ProviderError::EmptyResponse(provider_name.clone())
                }
                Ok(Ok(response)) => {
                    return Ok(FallbackSuccess {
                        provider: provider_name,
                        response,
                        failures,
                    });
                }
                Ok(Err(e)) => {
                    warn!(
                        provider = %provider_name,
                        error = %e,
                        "Fallback: provider failed, trying next"
                    );
                    e
                }
                Err(_) => {
                    warn!(
                        provider = %provider_name,
                        timeout_secs = entry.timeout.as_secs(),
                        "Fallback: provider timed out, trying next"
                    );
                    ProviderError::Timeout(format!(
                        "Provider '{}' timed out after {}s",
                        provider_name,
                        entry.timeout.as_secs()
                    ))
                }
            };
            failures.push((provider_name, error));
        }

        Err(ChainExhausted { failures })
    }
}

impl Default for FallbackChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hydra_core::message::Message;
    use std::sync::Mutex;

    /// A mock provider that always fails.
    struct FailingProvider {
        name: String,
        error: ProviderError,
        call_count: Mutex<usize>,
    }

    impl FailingProvider {
        fn new(name: &str, error: ProviderError) -> Self {
            Self {
                name: name.into(),
                error,
                call_count: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl Provider for FailingProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn model(&self) -> &str {
            "failing-model"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            *self.call_count.lock().unwrap() += 1;
            Err(self.error.clone())
        }
    }

    /// A mock provider that always succeeds.
    struct SuccessProvider {
        name: String,
        call_count: Mutex<usize>,
    }

    impl SuccessProvider {
        fn new(name: &str) -> Self {
            Self {
                name: name.into(),
                call_count: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl Provider for SuccessProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn model(&self) -> &str {
            "test-model"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            *self.call_count.lock().unwrap() += 1;
            Ok(ProviderResponse {
                text: format!("success from {}", self.name),
                model: "test-model".into(),
                usage: None,
            })
        }
    }

    /// A mock provider that answers with whitespace only.
    struct BlankProvider;

    #[async_trait]
    impl Provider for BlankProvider {
        fn name(&self) -> &str {
            "blank"
        }

        fn model(&self) -> &str {
            "blank-model"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                text: "  \n ".into(),
                model: "blank-model".into(),
                usage: None,
            })
        }
    }

    /// A mock provider that hangs forever (for timeout testing).
    struct HangingProvider;

    #[async_trait]
    impl Provider for HangingProvider {
        fn name(&self) -> &str {
            "hanging"
        }

        fn model(&self) -> &str {
            "hanging-model"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(ProviderError::Timeout("unreachable".into()))
        }
    }

    fn test_request() -> ProviderRequest {
        ProviderRequest::new("system", vec![Message::user("hello")])
    }

    #[tokio::test]
    async fn first_provider_succeeds() {
        let p1 = Arc::new(SuccessProvider::new("primary"));
        let p2 = Arc::new(SuccessProvider::new("secondary"));

        let chain = FallbackChain::new()
            .add_default(p1.clone())
            .add_default(p2.clone());

        let result = chain.complete(test_request()).await.unwrap();
        assert_eq!(result.provider, "primary");
        assert_eq!(result.response.text, "success from primary");
        assert!(result.failures.is_empty());

        // Only first provider should be called
        assert_eq!(p1.calls(), 1);
        assert_eq!(p2.calls(), 0);
    }

    #[tokio::test]
    async fn stops_at_first_success_in_priority_order() {
        let a = Arc::new(FailingProvider::new(
            "a",
            ProviderError::ApiError {
                status_code: 500,
                message: "Internal Server Error".into(),
            },
        ));
        let b = Arc::new(SuccessProvider::new("b"));
        let c = Arc::new(SuccessProvider::new("c"));
        let d = Arc::new(SuccessProvider::new("d"));

        let chain = FallbackChain::new()
            .add_default(a.clone())
            .add_default(b.clone())
            .add_default(c.clone())
            .add_default(d.clone());

        let result = chain.complete(test_request()).await.unwrap();
        assert_eq!(result.provider, "b");
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].0, "a");

        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
        assert_eq!(c.calls(), 0);
        assert_eq!(d.calls(), 0);
    }

    #[tokio::test]
    async fn all_providers_fail() {
        let p1 = Arc::new(FailingProvider::new(
            "primary",
            ProviderError::Network("conn refused".into()),
        ));
        let p2 = Arc::new(FailingProvider::new(
            "secondary",
            ProviderError::AuthenticationFailed("bad key".into()),
        ));

        let chain = FallbackChain::new()
            .add_default(p1.clone())
            .add_default(p2.clone());

        let err = chain.complete(test_request()).await.unwrap_err();
        assert_eq!(err.failures.len(), 2);

        // Last error should be from the last provider
        match err.last_error() {
            Some(ProviderError::AuthenticationFailed(_)) => {}
            other => panic!("Expected AuthenticationFailed, got: {other:?}"),
        }

        assert_eq!(p1.calls(), 1);
        assert_eq!(p2.calls(), 1);
    }

    #[tokio::test]
    async fn timeout_triggers_fallback() {
        let p2 = Arc::new(SuccessProvider::new("secondary"));

        let chain = FallbackChain::new()
            .add(Arc::new(HangingProvider), Duration::from_millis(50))
            .add_default(p2.clone());

        let result = chain.complete(test_request()).await.unwrap();
        assert_eq!(result.provider, "secondary");
        assert!(matches!(result.failures[0].1, ProviderError::Timeout(_)));
        assert_eq!(p2.calls(), 1);
    }

    #[tokio::test]
    async fn blank_response_falls_through() {
        let p2 = Arc::new(SuccessProvider::new("secondary"));

        let chain = FallbackChain::new()
            .add_default(Arc::new(BlankProvider))
            .add_default(p2.clone());

        let result = chain.complete(test_request()).await.unwrap();
        assert_eq!(result.provider, "secondary");
        assert_eq!(result.failures[0].0, "blank");
        assert!(matches!(result.failures[0].1, ProviderError::EmptyResponse(_)));
        assert_eq!(p2.calls(), 1);
    }

    #[tokio::test]
    async fn empty_chain_is_exhausted() {
        let err = FallbackChain::new()
            .complete(test_request())
            .await
            .unwrap_err();
        assert!(err.failures.is_empty());
        assert!(err.last_error().is_none());
    }

    #[test]
    fn from_priority_skips_unconfigured() {
        let registry = ProviderRegistry::new()
            .with(Arc::new(SuccessProvider::new("anthropic")))
            .with(Arc::new(SuccessProvider::new("grok")));

        let priority: Vec<String> = ["openai", "anthropic", "gemini", "grok"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let chain = FallbackChain::from_priority(&registry, &priority, Duration::from_secs(5));
        assert_eq!(chain.names(), vec!["anthropic", "grok"]);
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn empty_chain() {
        let chain = FallbackChain::default();
        assert!(chain.is_empty());
        assert_eq!(chain.len(), 0);
    }
}
