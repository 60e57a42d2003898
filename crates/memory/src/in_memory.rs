//! In-memory store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use hydra_core::error::StoreError;
use hydra_core::persona::{ConversationTurn, Persona};
use hydra_core::store::{
    ConversationLog, KnowledgeChunk, KnowledgeMatch, KnowledgeStore, PersonaStore,
};
use hydra_security::audit::{AuditEntry, AuditSink};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::vector;

/// Keeps personas, turns, knowledge chunks and audit entries in process
/// memory. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    personas: Arc<RwLock<BTreeMap<String, Persona>>>,
    turns: Arc<RwLock<Vec<ConversationTurn>>>,
    knowledge: Arc<RwLock<Vec<KnowledgeChunk>>>,
    audit: Arc<RwLock<Vec<AuditEntry>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored turn, in insertion order.
    pub async fn turns(&self) -> Vec<ConversationTurn> {
        self.turns.read().await.clone()
    }

    /// Number of stored knowledge chunks.
    pub async fn knowledge_count(&self) -> usize {
        self.knowledge.read().await.len()
    }

    /// Audit entries written through the sink.
    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.read().await.clone()
    }
}

#[async_trait]
impl PersonaStore for InMemoryStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<Persona>, StoreError> {
        Ok(self.personas.read().await.get(name).cloned())
    }

    async fn upsert(&self, mut persona: Persona) -> Result<Persona, StoreError> {
        let mut personas = self.personas.write().await;
        // Replacing a persona keeps its id so existing history stays attached.
        if let Some(existing) = personas.get(&persona.name) {
            persona.id = existing.id.clone();
        }
        personas.insert(persona.name.clone(), persona.clone());
        Ok(persona)
    }

    async fn list(&self) -> Result<Vec<Persona>, StoreError> {
        Ok(self.personas.read().await.values().cloned().collect())
    }
}

#[async_trait]
impl ConversationLog for InMemoryStore {
    async fn recent(
        &self,
        user_id: &str,
        persona_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, StoreError> {
        let turns = self.turns.read().await;
        let mut matching: Vec<ConversationTurn> = turns
            .iter()
            .filter(|t| t.user_id == user_id && t.persona_id == persona_id)
            .cloned()
            .collect();
        matching.sort_by_key(|t| t.timestamp);
        Ok(matching.into_iter().rev().take(limit).collect())
    }

    async fn append(&self, turn: ConversationTurn) -> Result<(), StoreError> {
        self.turns.write().await.push(turn);
        Ok(())
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn insert(&self, chunks: Vec<KnowledgeChunk>) -> Result<usize, StoreError> {
        let count = chunks.len();
        self.knowledge.write().await.extend(chunks);
        Ok(count)
    }

    async fn search(
        &self,
        user_id: &str,
        embedding: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<KnowledgeMatch>, StoreError> {
        let knowledge = self.knowledge.read().await;
        Ok(vector::top_matches(
            knowledge.iter().filter(|c| c.user_id == user_id),
            embedding,
            limit,
            min_similarity,
        ))
    }
}

#[async_trait]
impl AuditSink for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn write(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        self.audit.write().await.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use hydra_core::persona::Sender;
    use hydra_security::audit::AuditEvent;

    fn chunk(user: &str, name: &str, embedding: Vec<f32>) -> KnowledgeChunk {
        KnowledgeChunk {
            user_id: user.into(),
            file_name: name.into(),
            content: format!("{name} body"),
            embedding,
        }
    }

    #[tokio::test]
    async fn persona_lookup_and_upsert() {
        let store = InMemoryStore::new();
        assert!(store.find_by_name("Janus").await.unwrap().is_none());

        let first = store
            .upsert(Persona::new("Janus", "Strategist"))
            .await
            .unwrap();
        let replaced = store
            .upsert(Persona::new("Janus", "Gatekeeper"))
            .await
            .unwrap();
        assert_eq!(first.id, replaced.id);

        let found = store.find_by_name("Janus").await.unwrap().unwrap();
        assert_eq!(found.role, "Gatekeeper");

        store.upsert(Persona::new("Athena", "Analyst")).await.unwrap();
        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Athena", "Janus"]);
    }

    #[tokio::test]
    async fn recent_is_newest_first_and_scoped() {
        let store = InMemoryStore::new();
        let base = Utc::now();
        for i in 0..5 {
            let mut turn = ConversationTurn::user("u1", "p1", format!("msg {i}"));
            turn.timestamp = base + Duration::seconds(i);
            store.append(turn).await.unwrap();
        }
        store
            .append(ConversationTurn::ai("u2", "p1", "other user"))
            .await
            .unwrap();
        store
            .append(ConversationTurn::ai("u1", "p2", "other persona"))
            .await
            .unwrap();

        let recent = store.recent("u1", "p1", 3).await.unwrap();
        let contents: Vec<&str> = recent.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["msg 4", "msg 3", "msg 2"]);
        assert!(recent.iter().all(|t| t.sender == Sender::User));
    }

    #[tokio::test]
    async fn knowledge_search_is_per_user() {
        let store = InMemoryStore::new();
        let stored = store
            .insert(vec![
                chunk("u1", "mine.md", vec![1.0, 0.0]),
                chunk("u2", "theirs.md", vec![1.0, 0.0]),
                chunk("u1", "unrelated.md", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        assert_eq!(stored, 3);
        assert_eq!(store.knowledge_count().await, 3);

        let hits = store.search("u1", &[1.0, 0.0], 5, 0.2).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file_name, "mine.md");
    }

    #[tokio::test]
    async fn audit_sink_collects_entries() {
        let store = InMemoryStore::new();
        let entry = AuditEntry {
            timestamp: Utc::now(),
            event: AuditEvent::ApiFailure,
            metadata: serde_json::json!({"provider": "gemini"}),
        };
        store.write(&entry).await.unwrap();
        let entries = store.audit_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, AuditEvent::ApiFailure);
    }
}
