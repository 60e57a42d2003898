//! Response synthesis.
//!
//! All surviving drafts are merged into one in-character reply by the first
//! synthesizer in the priority chain that answers.

use hydra_core::message::Message;
use hydra_core::persona::{CandidateResponse, Persona};
use hydra_core::provider::ProviderRequest;
use hydra_providers::{FallbackChain, ProviderRegistry};
use hydra_security::audit::{AuditEvent, AuditLogger};
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::prompt::persona_profile;

pub struct Synthesizer {
    chain: FallbackChain,
    temperature: f32,
    max_tokens: u32,
}

impl Synthesizer {
    pub fn new(chain: FallbackChain) -> Self {
        Self {
            chain,
            temperature: 0.6,
            max_tokens: 1024,
        }
    }

    /// Chain the priority names that are registered, then every other
    /// registered provider in registry order.
    pub fn from_registry(registry: &ProviderRegistry, priority: &[String], timeout: Duration) -> Self {
        let mut chain = FallbackChain::from_priority(registry, priority, timeout);
        for provider in registry.all() {
            if !priority.iter().any(|name| name == provider.name()) {
                chain = chain.add(provider.clone(), timeout);
            }
        }
        Self::new(chain)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Synthesizer names in attempt order.
    pub fn order(&self) -> Vec<&str> {
        self.chain.names()
    }

    /// Build the synthesis request.
    pub fn request(
        &self,
        persona: &Persona,
        briefing: &str,
        user_message: &str,
        candidates: &[CandidateResponse],
    ) -> ProviderRequest {
        let system = format!(
            "{}\nSeveral analysts have drafted answers to the user's message. Merge them into a \
             single, cohesive reply written entirely in your own voice. Do not compare the drafts \
             or mention that there were several. Never break character or mention you are an AI. \
             Output only the reply.",
            persona_profile(persona)
        );

        let drafts: Vec<String> = candidates
            .iter()
            .map(|c| format!("[{}]\n{}", c.provider, c.text))
            .collect();

        let body = format!(
            "ORIGINAL BRIEFING:\n{briefing}\n\nUSER MESSAGE:\n{user_message}\n\nDRAFT RESPONSES:\n{}",
            drafts.join("\n\n")
        );

        ProviderRequest::new(system, vec![Message::user(body)])
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }

    /// Produce the final reply. Exhausting the chain is audited as
    /// `SYNTHESIS_FAILED` and returned; no reply is fabricated.
    pub async fn synthesize(
        &self,
        persona: &Persona,
        briefing: &str,
        user_message: &str,
        candidates: &[CandidateResponse],
        audit: &AuditLogger,
    ) -> Result<String, PipelineError> {
        let request = self.request(persona, briefing, user_message, candidates);

        match self.chain.complete(request).await {
            Ok(success) => {
                info!(
                    synthesizer = %success.provider,
                    drafts = candidates.len(),
                    skipped_failures = success.failures.len(),
                    "Synthesis complete"
                );
                Ok(success.response.text.trim().to_string())
            }
            Err(exhausted) => {
                warn!(attempts = exhausted.failures.len(), "Every synthesizer failed");
                audit
                    .record(
                        AuditEvent::SynthesisFailed,
                        json!({
                            "persona": persona.name,
                            "attempts": exhausted
                                .failures
                                .iter()
                                .map(|(name, e)| json!({ "provider": name, "error": e.to_string() }))
                                .collect::<Vec<_>>(),
                        }),
                    )
                    .await;
                Err(PipelineError::SynthesisFailed {
                    failures: exhausted.failures,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockProvider;
    use std::sync::Arc;

    fn priority(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn drafts() -> Vec<CandidateResponse> {
        vec![
            CandidateResponse::new("openai", "Plan A."),
            CandidateResponse::new("gemini", "Plan B."),
        ]
    }

    #[test]
    fn request_labels_every_draft() {
        let synth = Synthesizer::new(FallbackChain::new());
        let persona = Persona::new("Janus", "Strategist");
        let req = synth.request(&persona, "BRIEF", "What next?", &drafts());

        assert!(req.system.starts_with("You are Janus"));
        assert!(req.system.contains("Output only the reply."));
        let body = &req.messages[0].content;
        assert!(body.contains("ORIGINAL BRIEFING:\nBRIEF"));
        assert!(body.contains("USER MESSAGE:\nWhat next?"));
        assert!(body.contains("[openai]\nPlan A."));
        assert!(body.contains("[gemini]\nPlan B."));
        assert_eq!(req.temperature, 0.6);
    }

    #[tokio::test]
    async fn priority_stops_at_first_success() {
        let a = Arc::new(MockProvider::failing("a"));
        let b = Arc::new(MockProvider::replying("b", "  merged  "));
        let c = Arc::new(MockProvider::replying("c", "unused"));
        let d = Arc::new(MockProvider::replying("d", "unused"));
        let registry = ProviderRegistry::new()
            .with(d.clone())
            .with(c.clone())
            .with(b.clone())
            .with(a.clone());

        let synth = Synthesizer::from_registry(
            &registry,
            &priority(&["a", "b", "c", "d"]),
            Duration::from_secs(5),
        );
        let audit = AuditLogger::new();
        let reply = synth
            .synthesize(&Persona::new("Janus", "Strategist"), "brief", "msg", &drafts(), &audit)
            .await
            .unwrap();

        assert_eq!(reply, "merged");
        assert_eq!((a.calls(), b.calls(), c.calls(), d.calls()), (1, 1, 0, 0));
        assert_eq!(audit.count(), 0);
    }

    #[tokio::test]
    async fn blank_synthesis_moves_to_next_in_priority() {
        let a = Arc::new(MockProvider::replying("a", "   "));
        let b = Arc::new(MockProvider::replying("b", "merged"));
        let registry = ProviderRegistry::new().with(a.clone()).with(b.clone());

        let synth = Synthesizer::from_registry(&registry, &priority(&["a", "b"]), Duration::from_secs(5));
        let audit = AuditLogger::new();
        let reply = synth
            .synthesize(&Persona::new("Janus", "Strategist"), "brief", "msg", &drafts(), &audit)
            .await
            .unwrap();

        assert_eq!(reply, "merged");
        assert_eq!((a.calls(), b.calls()), (1, 1));
        assert_eq!(audit.count_by_event(AuditEvent::SynthesisFailed), 0);
    }

    #[test]
    fn unlisted_providers_join_after_priority() {
        let registry = ProviderRegistry::new()
            .with(Arc::new(MockProvider::replying("deepseek", "x")))
            .with(Arc::new(MockProvider::replying("anthropic", "x")));
        let synth = Synthesizer::from_registry(
            &registry,
            &priority(&["openai", "anthropic", "gemini", "grok"]),
            Duration::from_secs(5),
        );
        assert_eq!(synth.order(), vec!["anthropic", "deepseek"]);
    }

    #[tokio::test]
    async fn exhausted_chain_is_an_error() {
        let registry = ProviderRegistry::new()
            .with(Arc::new(MockProvider::failing("openai")))
            .with(Arc::new(MockProvider::failing("anthropic")));
        let synth = Synthesizer::from_registry(
            &registry,
            &priority(&["openai", "anthropic"]),
            Duration::from_secs(5),
        );
        let audit = AuditLogger::new();

        let err = synth
            .synthesize(&Persona::new("Janus", "Strategist"), "brief", "msg", &drafts(), &audit)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::SynthesisFailed { ref failures } if failures.len() == 2));
        assert_eq!(audit.count_by_event(AuditEvent::SynthesisFailed), 1);
    }
}
