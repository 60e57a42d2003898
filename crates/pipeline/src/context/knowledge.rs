//! Knowledge-base retrieval: embed the message, search the user's chunks.

use hydra_core::error::ProviderError;
use hydra_core::persona::ContextFragment;
use hydra_core::provider::{EmbeddingRequest, Provider};
use hydra_core::store::KnowledgeStore;
use hydra_security::audit::{AuditEvent, AuditLogger};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Placeholder fragment used when retrieval fails.
pub const KNOWLEDGE_UNAVAILABLE: &str = "Knowledge base unavailable.";

/// Semantic search over a user's uploaded documents.
pub struct KnowledgeRetriever {
    store: Arc<dyn KnowledgeStore>,
    embedder: Option<Arc<dyn Provider>>,
    model: String,
    limit: usize,
    min_similarity: f32,
    timeout: Duration,
}

impl KnowledgeRetriever {
    pub fn new(store: Arc<dyn KnowledgeStore>, embedder: Option<Arc<dyn Provider>>) -> Self {
        Self {
            store,
            embedder,
            model: "text-embedding-3-small".into(),
            limit: 5,
            min_similarity: 0.2,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Top matches as knowledge fragments, best first.
    ///
    /// With no embedding provider configured the knowledge base is simply
    /// skipped. An embedding or search failure yields the
    /// [`KNOWLEDGE_UNAVAILABLE`] fragment and an `EMBEDDING_FAILURE` entry.
    pub async fn retrieve(
        &self,
        user_id: &str,
        message: &str,
        audit: &AuditLogger,
    ) -> Vec<ContextFragment> {
        let Some(embedder) = &self.embedder else {
            debug!("No embedding provider configured, skipping knowledge base");
            return Vec::new();
        };

        let embedding = match self.embed(embedder.as_ref(), message).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!(provider = embedder.name(), error = %e, "Embedding failed");
                audit
                    .record(
                        AuditEvent::EmbeddingFailure,
                        json!({ "provider": embedder.name(), "stage": "embed", "error": e.to_string() }),
                    )
                    .await;
                return vec![ContextFragment::knowledge(None, KNOWLEDGE_UNAVAILABLE)];
            }
        };

        match self
            .store
            .search(user_id, &embedding, self.limit, self.min_similarity)
            .await
        {
            Ok(matches) => {
                debug!(matches = matches.len(), "Knowledge search complete");
                matches
                    .into_iter()
                    .map(|m| ContextFragment::knowledge(Some(m.file_name), m.content))
                    .collect()
            }
            Err(e) => {
                warn!(error = %e, "Knowledge search failed");
                audit
                    .record(
                        AuditEvent::EmbeddingFailure,
                        json!({ "stage": "search", "error": e.to_string() }),
                    )
                    .await;
                vec![ContextFragment::knowledge(None, KNOWLEDGE_UNAVAILABLE)]
            }
        }
    }

    async fn embed(&self, embedder: &dyn Provider, text: &str) -> Result<Vec<f32>, ProviderError> {
        let request = EmbeddingRequest {
            model: self.model.clone(),
            inputs: vec![text.to_string()],
        };
        let response = tokio::time::timeout(self.timeout, embedder.embed(request))
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!(
                    "embedding timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::EmptyResponse("no embedding returned".into()))
    }
}
