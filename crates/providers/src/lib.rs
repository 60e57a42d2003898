//! LLM Provider implementations for Hydra.
//!
//! All providers implement the `hydra_core::Provider` trait.
//! The registry builds the process-wide provider set from configuration;
//! the fallback chain tries providers in priority order.

pub mod anthropic;
pub mod fallback;
pub mod gemini;
pub mod openai_compat;
pub mod registry;

pub use anthropic::AnthropicProvider;
pub use fallback::{ChainExhausted, FallbackChain, FallbackSuccess};
pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use registry::{ProviderRegistry, build_from_config};

use hydra_core::error::ProviderError;
use tracing::warn;

/// Map a non-success HTTP status to a [`ProviderError`].
///
/// 429 is a rate limit, 401/403 an authentication failure, anything else
/// outside 2xx an API error carrying the response body.
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);
        return Err(ProviderError::RateLimited { retry_after_secs });
    }

    if status == 401 || status == 403 {
        return Err(ProviderError::AuthenticationFailed(format!(
            "{provider} rejected the API key (status {status})"
        )));
    }

    if !response.status().is_success() {
        let error_body = response.text().await.unwrap_or_default();
        warn!(provider, status, body = %error_body, "Provider returned error");
        return Err(ProviderError::ApiError {
            status_code: status,
            message: error_body,
        });
    }

    Ok(response)
}
