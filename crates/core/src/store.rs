//! Store traits: the persistence contracts the pipeline consumes.
//!
//! Three collaborators sit behind these traits:
//! - the persona store (lookup by name, read-only to the pipeline)
//! - the conversation log (turn insert/select ordered by timestamp)
//! - the knowledge store (embedded chunks with similarity search)
//!
//! Implementations: SQLite and in-memory, both in `hydra-memory`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::StoreError;
use crate::persona::{ConversationTurn, Persona};

/// Persona lookup and seeding.
#[async_trait]
pub trait PersonaStore: Send + Sync {
    /// Find a persona by exact name. `Ok(None)` means no such persona.
    async fn find_by_name(&self, name: &str) -> std::result::Result<Option<Persona>, StoreError>;

    /// Insert or replace a persona, keyed by name.
    async fn upsert(&self, persona: Persona) -> std::result::Result<Persona, StoreError>;

    /// All personas, sorted by name.
    async fn list(&self) -> std::result::Result<Vec<Persona>, StoreError>;
}

/// The durable message log.
#[async_trait]
pub trait ConversationLog: Send + Sync {
    /// The most recent `limit` turns for `(user_id, persona_id)`, newest first.
    async fn recent(
        &self,
        user_id: &str,
        persona_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<ConversationTurn>, StoreError>;

    /// Append one turn.
    async fn append(&self, turn: ConversationTurn) -> std::result::Result<(), StoreError>;
}

/// A chunk of user-uploaded text together with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub user_id: String,
    pub file_name: String,
    pub content: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

/// One similarity-search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeMatch {
    pub file_name: String,
    pub content: String,
    pub similarity: f32,
}

/// Vector similarity store scoped per user.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Insert chunks; returns how many were stored.
    async fn insert(&self, chunks: Vec<KnowledgeChunk>) -> std::result::Result<usize, StoreError>;

    /// Top `limit` chunks owned by `user_id` whose cosine similarity to
    /// `embedding` is at least `min_similarity`, best first.
    async fn search(
        &self,
        user_id: &str,
        embedding: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> std::result::Result<Vec<KnowledgeMatch>, StoreError>;
}
