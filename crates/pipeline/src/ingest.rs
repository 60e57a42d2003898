//! Knowledge ingestion: chunk a document, embed every chunk, store the rows.

use hydra_config::AppConfig;
use hydra_core::error::ProviderError;
use hydra_core::identity::UserId;
use hydra_core::provider::{EmbeddingRequest, Provider};
use hydra_core::store::{KnowledgeChunk, KnowledgeStore};
use hydra_memory::TextChunker;
use hydra_providers::ProviderRegistry;
use hydra_security::audit::{AuditEvent, AuditLogger};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::IngestError;

/// Inputs per embedding request.
const EMBED_BATCH: usize = 64;

/// Outcome of a successful ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub file_name: String,
    pub chunks: usize,
}

pub struct KnowledgeIngestor {
    store: Arc<dyn KnowledgeStore>,
    embedder: Option<Arc<dyn Provider>>,
    model: String,
    chunker: TextChunker,
    timeout: Duration,
}

impl KnowledgeIngestor {
    pub fn new(store: Arc<dyn KnowledgeStore>, embedder: Option<Arc<dyn Provider>>) -> Self {
        Self {
            store,
            embedder,
            model: "text-embedding-3-small".into(),
            chunker: TextChunker::default(),
            timeout: Duration::from_secs(15),
        }
    }

    /// Embedder and model from `[context]`; `None` if the embedding provider
    /// is not registered.
    pub fn from_config(
        config: &AppConfig,
        registry: &ProviderRegistry,
        store: Arc<dyn KnowledgeStore>,
    ) -> Self {
        Self::new(store, registry.get(&config.context.embedding_provider))
            .with_model(config.context.embedding_model.clone())
            .with_timeout(Duration::from_secs(config.context.embedding_timeout_secs))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_chunker(mut self, chunker: TextChunker) -> Self {
        self.chunker = chunker;
        self
    }

    /// Per embedding batch.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Split `content`, embed each chunk and store it under `user_id`.
    ///
    /// Nothing is stored unless every chunk was embedded.
    pub async fn ingest(
        &self,
        user_id: &UserId,
        file_name: &str,
        content: &str,
        audit: &AuditLogger,
    ) -> Result<IngestReport, IngestError> {
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(IngestError::FileMissing);
        }
        let pieces = self.chunker.split(content);
        if pieces.is_empty() {
            return Err(IngestError::FileMissing);
        }

        let embeddings = match self.embed_all(&pieces).await {
            Ok(embeddings) => embeddings,
            Err(e) => {
                warn!(file = %file_name, error = %e, "Embedding failed during ingest");
                audit
                    .record(
                        AuditEvent::EmbeddingFailure,
                        json!({ "stage": "ingest", "file_name": file_name, "error": e.to_string() }),
                    )
                    .await;
                return Err(IngestError::EmbeddingFailed(e));
            }
        };

        let chunks: Vec<KnowledgeChunk> = pieces
            .into_iter()
            .zip(embeddings)
            .map(|(content, embedding)| KnowledgeChunk {
                user_id: user_id.to_string(),
                file_name: file_name.to_string(),
                content,
                embedding,
            })
            .collect();

        let stored = self
            .store
            .insert(chunks)
            .await
            .map_err(IngestError::VectorInsertFailed)?;

        info!(user_id = %user_id, file = %file_name, chunks = stored, "Knowledge ingested");
        audit
            .record(
                AuditEvent::KnowledgeIngested,
                json!({ "user_id": user_id.as_str(), "file_name": file_name, "chunks": stored }),
            )
            .await;

        Ok(IngestReport {
            file_name: file_name.to_string(),
            chunks: stored,
        })
    }

    async fn embed_all(&self, pieces: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| ProviderError::NotConfigured("no embedding provider configured".into()))?;

        let mut embeddings = Vec::with_capacity(pieces.len());
        for batch in pieces.chunks(EMBED_BATCH) {
            let request = EmbeddingRequest {
                model: self.model.clone(),
                inputs: batch.to_vec(),
            };
            let response = tokio::time::timeout(self.timeout, embedder.embed(request))
                .await
                .map_err(|_| {
                    ProviderError::Timeout(format!(
                        "embedding timed out after {}s",
                        self.timeout.as_secs()
                    ))
                })??;

            if response.embeddings.len() != batch.len() {
                return Err(ProviderError::EmptyResponse(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    response.embeddings.len()
                )));
            }
            embeddings.extend(response.embeddings);
        }
        Ok(embeddings)
    }
}
