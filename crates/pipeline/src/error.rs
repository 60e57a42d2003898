//! Terminal errors for one chat request or one knowledge ingest.
//!
//! Each variant carries a stable stage code for the wire and a client-safe
//! detail string. The `Display` text may hold internal detail and is meant
//! for logs only.

use hydra_core::error::{ProviderError, StoreError};
use thiserror::Error;

/// Why a chat request produced no reply.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("message is required")]
    MessageRequired,

    #[error("no LLM providers are configured")]
    NoProviders,

    #[error("persona '{0}' not found")]
    PersonaNotFound(String),

    #[error("persona lookup failed: {0}")]
    PersonaLookup(StoreError),

    #[error("failed to store user message: {0}")]
    InsertUserMessage(StoreError),

    #[error("all {} dispatched providers failed", .failures.len())]
    AllProvidersFailed { failures: Vec<(String, ProviderError)> },

    #[error("synthesis failed after {} attempts", .failures.len())]
    SynthesisFailed { failures: Vec<(String, ProviderError)> },

    #[error("fatal: {0}")]
    Fatal(String),
}

impl PipelineError {
    /// Stable identifier of the stage that failed.
    pub fn stage_code(&self) -> &'static str {
        match self {
            PipelineError::MessageRequired => "MESSAGE_REQUIRED",
            PipelineError::NoProviders => "NO_PROVIDERS_CONFIGURED",
            PipelineError::PersonaNotFound(_) | PipelineError::PersonaLookup(_) => "PERSONA_LOOKUP",
            PipelineError::InsertUserMessage(_) => "INSERT_USER_MSG",
            PipelineError::AllProvidersFailed { .. } => "ALL_PROVIDERS_FAILED",
            PipelineError::SynthesisFailed { .. } => "SYNTHESIS_FAILED",
            PipelineError::Fatal(_) => "FATAL",
        }
    }

    /// Detail safe to show a client. Never includes provider or store
    /// error text, which may echo keys or internal hosts.
    pub fn detail(&self) -> String {
        match self {
            PipelineError::MessageRequired => "The message must not be empty.".into(),
            PipelineError::NoProviders => "No LLM provider credentials are configured.".into(),
            PipelineError::PersonaNotFound(name) => format!("Persona '{name}' not found."),
            PipelineError::PersonaLookup(_) => "The persona store is unavailable.".into(),
            PipelineError::InsertUserMessage(_) => "The message could not be saved.".into(),
            PipelineError::AllProvidersFailed { failures } => {
                let names: Vec<&str> = failures.iter().map(|(name, _)| name.as_str()).collect();
                format!("All providers failed: {}.", names.join(", "))
            }
            PipelineError::SynthesisFailed { .. } => {
                "No synthesizer could produce a reply.".into()
            }
            PipelineError::Fatal(_) => "Unexpected server error.".into(),
        }
    }
}

/// Why a knowledge ingest stored nothing.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file name and content are required")]
    FileMissing,

    #[error("embedding failed: {0}")]
    EmbeddingFailed(ProviderError),

    #[error("vector insert failed: {0}")]
    VectorInsertFailed(StoreError),
}

impl IngestError {
    pub fn stage_code(&self) -> &'static str {
        match self {
            IngestError::FileMissing => "FILE_MISSING",
            IngestError::EmbeddingFailed(_) => "EMBEDDING_FAILED",
            IngestError::VectorInsertFailed(_) => "VECTOR_INSERT_FAILED",
        }
    }

    pub fn detail(&self) -> String {
        match self {
            IngestError::FileMissing => "No file was uploaded.".into(),
            IngestError::EmbeddingFailed(_) => "The embedding service failed.".into(),
            IngestError::VectorInsertFailed(_) => "The knowledge store rejected the chunks.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_codes() {
        assert_eq!(PipelineError::NoProviders.stage_code(), "NO_PROVIDERS_CONFIGURED");
        assert_eq!(
            PipelineError::PersonaNotFound("Nyx".into()).stage_code(),
            "PERSONA_LOOKUP"
        );
        assert_eq!(
            PipelineError::InsertUserMessage(StoreError::Storage("locked".into())).stage_code(),
            "INSERT_USER_MSG"
        );
        assert_eq!(IngestError::FileMissing.stage_code(), "FILE_MISSING");
    }

    #[test]
    fn detail_never_leaks_provider_text() {
        let err = PipelineError::AllProvidersFailed {
            failures: vec![(
                "openai".into(),
                ProviderError::AuthenticationFailed("sk-live-secret rejected".into()),
            )],
        };
        let detail = err.detail();
        assert!(detail.contains("openai"));
        assert!(!detail.contains("sk-live"));
        assert!(err.to_string().contains("1 dispatched"));
    }
}
