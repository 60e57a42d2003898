//! Shared test doubles for pipeline tests.

use async_trait::async_trait;
use hydra_core::error::{ProviderError, StoreError};
use hydra_core::persona::{ConversationTurn, Persona};
use hydra_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, Usage,
};
use hydra_core::store::{
    ConversationLog, KnowledgeChunk, KnowledgeMatch, KnowledgeStore, PersonaStore,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::context::scrape::{PageFetcher, ScrapeError};

enum Behavior {
    Reply(String),
    Fail(ProviderError),
    Hang,
}

/// A scripted provider that counts its calls and remembers the last request.
pub struct MockProvider {
    name: String,
    behavior: Behavior,
    embedding: Option<Vec<f32>>,
    call_count: Mutex<usize>,
    embed_count: Mutex<usize>,
    last_request: Mutex<Option<ProviderRequest>>,
}

impl MockProvider {
    fn new(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.into(),
            behavior,
            embedding: None,
            call_count: Mutex::new(0),
            embed_count: Mutex::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn replying(name: &str, text: &str) -> Self {
        Self::new(name, Behavior::Reply(text.into()))
    }

    pub fn failing(name: &str) -> Self {
        Self::new(
            name,
            Behavior::Fail(ProviderError::ApiError {
                status_code: 500,
                message: format!("{name} is down"),
            }),
        )
    }

    pub fn hanging(name: &str) -> Self {
        Self::new(name, Behavior::Hang)
    }

    /// Answer every embedding request with `embedding`.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn embed_calls(&self) -> usize {
        *self.embed_count.lock().unwrap()
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        *self.call_count.lock().unwrap() += 1;
        *self.last_request.lock().unwrap() = Some(request);
        match &self.behavior {
            Behavior::Reply(text) => Ok(ProviderResponse {
                text: text.clone(),
                model: "mock-model".into(),
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
            }),
            Behavior::Fail(e) => Err(e.clone()),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderError::Timeout("unreachable".into()))
            }
        }
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        *self.embed_count.lock().unwrap() += 1;
        match &self.embedding {
            Some(embedding) => Ok(EmbeddingResponse {
                embeddings: vec![embedding.clone(); request.inputs.len()],
                model: request.model,
            }),
            None => Err(ProviderError::NotConfigured(format!(
                "{} has no embedding model",
                self.name
            ))),
        }
    }
}

/// A store whose every operation fails.
pub struct BrokenStore;

fn broken() -> StoreError {
    StoreError::Storage("database is locked".into())
}

#[async_trait]
impl PersonaStore for BrokenStore {
    async fn find_by_name(&self, _name: &str) -> Result<Option<Persona>, StoreError> {
        Err(broken())
    }

    async fn upsert(&self, _persona: Persona) -> Result<Persona, StoreError> {
        Err(broken())
    }

    async fn list(&self) -> Result<Vec<Persona>, StoreError> {
        Err(broken())
    }
}

#[async_trait]
impl ConversationLog for BrokenStore {
    async fn recent(
        &self,
        _user_id: &str,
        _persona_id: &str,
        _limit: usize,
    ) -> Result<Vec<ConversationTurn>, StoreError> {
        Err(broken())
    }

    async fn append(&self, _turn: ConversationTurn) -> Result<(), StoreError> {
        Err(broken())
    }
}

#[async_trait]
impl KnowledgeStore for BrokenStore {
    async fn insert(&self, _chunks: Vec<KnowledgeChunk>) -> Result<usize, StoreError> {
        Err(broken())
    }

    async fn search(
        &self,
        _user_id: &str,
        _embedding: &[f32],
        _limit: usize,
        _min_similarity: f32,
    ) -> Result<Vec<KnowledgeMatch>, StoreError> {
        Err(broken())
    }
}

enum Page {
    Html(String),
    Fail,
    Hang,
}

/// Serves canned pages by URL; unknown URLs fail with 404.
#[derive(Default)]
pub struct MockFetcher {
    pages: HashMap<String, Page>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.into(), Page::Html(html.into()));
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.pages.insert(url.into(), Page::Fail);
        self
    }

    pub fn hanging(mut self, url: &str) -> Self {
        self.pages.insert(url.into(), Page::Hang);
        self
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        match self.pages.get(url) {
            Some(Page::Html(html)) => Ok(html.clone()),
            Some(Page::Fail) => Err(ScrapeError::Network("connection refused".into())),
            Some(Page::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ScrapeError::Timeout(3600))
            }
            None => Err(ScrapeError::Status(404)),
        }
    }
}
