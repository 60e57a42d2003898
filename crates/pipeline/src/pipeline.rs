//! The request orchestrator.
//!
//! ```text
//! persona lookup → history → persist user turn
//!       → { knowledge search ‖ URL scraping }
//!       → prompt assembly → provider fan-out → synthesis
//!       → persist AI turn → reply
//! ```
//!
//! Only the provider registry and the stores are shared across requests;
//! everything else lives for one call to [`HydraPipeline::handle`].

use futures::FutureExt;
use hydra_config::AppConfig;
use hydra_core::identity::UserId;
use hydra_core::persona::{ContextFragment, ConversationTurn, Persona};
use hydra_core::store::{ConversationLog, KnowledgeStore, PersonaStore};
use hydra_providers::ProviderRegistry;
use hydra_security::audit::{AuditEvent, AuditLogger};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::context::{HttpFetcher, KnowledgeRetriever, WebScraper, fetch_history};
use crate::dispatch::Dispatcher;
use crate::error::PipelineError;
use crate::prompt;
use crate::synthesis::Synthesizer;

/// One inbound chat message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub persona_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_persona(mut self, persona_name: impl Into<String>) -> Self {
        self.persona_name = Some(persona_name.into());
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}

/// The synthesized reply and the persona that gave it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub persona: String,
}

/// The persistence collaborators. One value may fill every slot.
#[derive(Clone)]
pub struct Stores {
    pub personas: Arc<dyn PersonaStore>,
    pub conversations: Arc<dyn ConversationLog>,
    pub knowledge: Arc<dyn KnowledgeStore>,
}

impl Stores {
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: PersonaStore + ConversationLog + KnowledgeStore + 'static,
    {
        Self {
            personas: store.clone(),
            conversations: store.clone(),
            knowledge: store,
        }
    }
}

pub struct HydraPipeline {
    default_persona: String,
    history_limit: usize,
    stores: Stores,
    knowledge: KnowledgeRetriever,
    scraper: WebScraper,
    dispatcher: Dispatcher,
    synthesizer: Synthesizer,
    audit: Arc<AuditLogger>,
}

impl HydraPipeline {
    /// Wire a pipeline from configuration.
    ///
    /// The embedding provider is looked up by `context.embedding_provider`;
    /// if it is not registered the knowledge base is skipped.
    pub fn from_config(
        config: &AppConfig,
        registry: ProviderRegistry,
        stores: Stores,
        audit: Arc<AuditLogger>,
    ) -> Self {
        let ctx = &config.context;
        let embedder = registry.get(&ctx.embedding_provider);

        let knowledge = KnowledgeRetriever::new(stores.knowledge.clone(), embedder)
            .with_model(ctx.embedding_model.clone())
            .with_limit(ctx.knowledge_limit)
            .with_min_similarity(ctx.min_similarity)
            .with_timeout(Duration::from_secs(ctx.embedding_timeout_secs));

        let scrape_timeout = Duration::from_secs(ctx.scrape_timeout_secs);
        let scraper = WebScraper::new(Arc::new(HttpFetcher::new(scrape_timeout)))
            .with_max_urls(ctx.max_urls)
            .with_max_chars(ctx.scrape_max_chars)
            .with_timeout(scrape_timeout);

        let synthesizer = Synthesizer::from_registry(
            &registry,
            &config.synthesis.priority,
            Duration::from_secs(config.synthesis.timeout_secs),
        )
        .with_temperature(config.synthesis.temperature)
        .with_max_tokens(config.max_tokens);

        let dispatcher = Dispatcher::new(registry)
            .with_timeout(Duration::from_secs(config.dispatch.timeout_secs))
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens);

        Self {
            default_persona: config.default_persona.clone(),
            history_limit: ctx.history_limit,
            stores,
            knowledge,
            scraper,
            dispatcher,
            synthesizer,
            audit,
        }
    }

    pub fn with_scraper(mut self, scraper: WebScraper) -> Self {
        self.scraper = scraper;
        self
    }

    pub fn with_knowledge(mut self, knowledge: KnowledgeRetriever) -> Self {
        self.knowledge = knowledge;
        self
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn provider_count(&self) -> usize {
        self.dispatcher.provider_count()
    }

    /// Answer one chat message as the requested persona.
    ///
    /// A panic anywhere in the request is caught, audited as `FATAL_ERROR`
    /// and returned as [`PipelineError::Fatal`].
    pub async fn handle(
        &self,
        user_id: &UserId,
        request: ChatRequest,
    ) -> Result<ChatReply, PipelineError> {
        match AssertUnwindSafe(self.run(user_id, request)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".into());
                error!(user_id = %user_id, error = %detail, "Pipeline panicked");
                self.audit
                    .record(
                        AuditEvent::FatalError,
                        json!({ "user_id": user_id.as_str(), "error": detail }),
                    )
                    .await;
                Err(PipelineError::Fatal(detail))
            }
        }
    }

    async fn run(&self, user_id: &UserId, request: ChatRequest) -> Result<ChatReply, PipelineError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(PipelineError::MessageRequired);
        }
        let persona_name = request
            .persona_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.default_persona);
        let image_url = request
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        if self.dispatcher.provider_count() == 0 {
            return Err(PipelineError::NoProviders);
        }

        let persona = self.lookup_persona(user_id, persona_name).await?;
        info!(user_id = %user_id, persona = %persona.name, "Handling chat request");

        let history = fetch_history(
            self.stores.conversations.as_ref(),
            &self.audit,
            user_id.as_str(),
            &persona.id,
            self.history_limit,
        )
        .await;

        if let Err(e) = self
            .stores
            .conversations
            .append(
                ConversationTurn::user(user_id.as_str(), &persona.id, message)
                    .with_image_url(image_url),
            )
            .await
        {
            warn!(error = %e, "Failed to store user message");
            let err = PipelineError::InsertUserMessage(e);
            self.record_fatal(user_id, &err).await;
            return Err(err);
        }

        let (knowledge, web) = tokio::join!(
            self.knowledge.retrieve(user_id.as_str(), message, &self.audit),
            self.scraper.scrape(message, &self.audit),
        );
        let fragments: Vec<ContextFragment> = web.into_iter().chain(knowledge).collect();

        let prompt = prompt::assemble(&persona, &fragments, &history, message);
        let candidates = self.dispatcher.dispatch(&prompt, &self.audit).await?;
        let reply = self
            .synthesizer
            .synthesize(&persona, &prompt.system, message, &candidates, &self.audit)
            .await?;

        if let Err(e) = self
            .stores
            .conversations
            .append(ConversationTurn::ai(user_id.as_str(), &persona.id, &reply))
            .await
        {
            warn!(error = %e, "Failed to store AI reply");
        }

        Ok(ChatReply {
            reply,
            persona: persona.name,
        })
    }

    async fn lookup_persona(&self, user_id: &UserId, name: &str) -> Result<Persona, PipelineError> {
        match self.stores.personas.find_by_name(name).await {
            Ok(Some(persona)) => Ok(persona),
            Ok(None) => Err(PipelineError::PersonaNotFound(name.to_string())),
            Err(e) => {
                warn!(persona = %name, error = %e, "Persona lookup failed");
                let err = PipelineError::PersonaLookup(e);
                self.record_fatal(user_id, &err).await;
                Err(err)
            }
        }
    }

    /// Store faults that end the request are audited with full detail.
    async fn record_fatal(&self, user_id: &UserId, err: &PipelineError) {
        self.audit
            .record(
                AuditEvent::FatalError,
                json!({
                    "user_id": user_id.as_str(),
                    "stage": err.stage_code(),
                    "error": err.to_string(),
                }),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::KNOWLEDGE_UNAVAILABLE;
    use crate::test_helpers::{BrokenStore, MockFetcher, MockProvider};
    use hydra_core::persona::Sender;
    use hydra_core::store::KnowledgeChunk;
    use hydra_memory::InMemoryStore;

    struct Harness {
        store: Arc<InMemoryStore>,
        audit: Arc<AuditLogger>,
        pipeline: HydraPipeline,
    }

    async fn harness(registry: ProviderRegistry) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        store
            .upsert(
                Persona::new("Janus", "Chief Strategist")
                    .with_attributes("Measured")
                    .with_summary("Keeper of thresholds."),
            )
            .await
            .unwrap();
        let audit = Arc::new(AuditLogger::new());
        let pipeline = HydraPipeline::from_config(
            &AppConfig::default(),
            registry,
            Stores::shared(store.clone()),
            audit.clone(),
        )
        .with_scraper(WebScraper::new(Arc::new(MockFetcher::new())));
        Harness {
            store,
            audit,
            pipeline,
        }
    }

    fn user() -> UserId {
        UserId::new("user-1")
    }

    #[tokio::test]
    async fn happy_path_persists_both_turns() {
        let openai = Arc::new(MockProvider::replying("openai", "Final answer."));
        let h = harness(ProviderRegistry::new().with(openai.clone())).await;

        let reply = h
            .pipeline
            .handle(&user(), ChatRequest::new("  What now?  ").with_image_url("https://img/x.png"))
            .await
            .unwrap();

        assert_eq!(reply.persona, "Janus");
        assert_eq!(reply.reply, "Final answer.");
        // One fan-out call plus one synthesis call.
        assert_eq!(openai.calls(), 2);

        let turns = h.store.turns().await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].sender, Sender::User);
        assert_eq!(turns[0].content, "What now?");
        assert_eq!(turns[0].image_url.as_deref(), Some("https://img/x.png"));
        assert_eq!(turns[1].sender, Sender::Ai);
        assert_eq!(turns[1].content, "Final answer.");
    }

    #[tokio::test]
    async fn empty_message_has_no_side_effects() {
        let openai = Arc::new(MockProvider::replying("openai", "x"));
        let h = harness(ProviderRegistry::new().with(openai.clone())).await;

        let err = h.pipeline.handle(&user(), ChatRequest::new("   ")).await.unwrap_err();
        assert_eq!(err.stage_code(), "MESSAGE_REQUIRED");
        assert_eq!(openai.calls(), 0);
        assert!(h.store.turns().await.is_empty());
    }

    #[tokio::test]
    async fn no_providers_fails_before_any_call() {
        let h = harness(ProviderRegistry::new()).await;
        let err = h.pipeline.handle(&user(), ChatRequest::new("hi")).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoProviders));
        assert!(h.store.turns().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_persona_is_lookup_error() {
        let h = harness(ProviderRegistry::new().with(Arc::new(MockProvider::replying("openai", "x")))).await;
        let err = h
            .pipeline
            .handle(&user(), ChatRequest::new("hi").with_persona("Nyx"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::PersonaNotFound(ref name) if name == "Nyx"));
    }

    #[tokio::test]
    async fn all_providers_failing_persists_only_user_turn() {
        let h = harness(
            ProviderRegistry::new()
                .with(Arc::new(MockProvider::failing("openai")))
                .with(Arc::new(MockProvider::failing("gemini"))),
        )
        .await;

        let err = h.pipeline.handle(&user(), ChatRequest::new("hi")).await.unwrap_err();
        assert_eq!(err.stage_code(), "ALL_PROVIDERS_FAILED");
        assert_eq!(h.audit.count_by_event(AuditEvent::AllProvidersFailed), 1);
        assert_eq!(h.audit.count_by_event(AuditEvent::ApiFailure), 2);

        let turns = h.store.turns().await;
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].sender, Sender::User);
    }

    #[tokio::test]
    async fn turns_accumulate_across_requests() {
        let openai = Arc::new(MockProvider::replying("openai", "reply"));
        let h = harness(ProviderRegistry::new().with(openai.clone())).await;

        h.pipeline.handle(&user(), ChatRequest::new("first")).await.unwrap();
        h.pipeline.handle(&user(), ChatRequest::new("second")).await.unwrap();

        let turns = h.store.turns().await;
        let contents: Vec<&str> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "reply", "second", "reply"]);
    }

    #[tokio::test]
    async fn context_reaches_the_system_prompt() {
        let openai = Arc::new(
            MockProvider::replying("openai", "In character.").with_embedding(vec![1.0, 0.0]),
        );
        let h = harness(ProviderRegistry::new().with(openai.clone())).await;
        h.store
            .insert(vec![KnowledgeChunk {
                user_id: "user-1".into(),
                file_name: "plan.md".into(),
                content: "Launch in Q3.".into(),
                embedding: vec![1.0, 0.0],
            }])
            .await
            .unwrap();
        let pipeline = h.pipeline.with_scraper(WebScraper::new(Arc::new(
            MockFetcher::new().page("https://example.com", "<h1>Example Domain</h1>"),
        )));

        pipeline
            .handle(
                &user(),
                ChatRequest::new("Summarize https://example.com and tell me next steps"),
            )
            .await
            .unwrap();

        let synthesis = openai.last_request().unwrap();
        let body = &synthesis.messages[0].content;
        assert!(body.contains("[Source: https://example.com]\nExample Domain"));
        assert!(body.contains("[Source: plan.md]\nLaunch in Q3."));
        assert!(body.contains("[openai]\nIn character."));
    }

    #[tokio::test]
    async fn degraded_context_still_answers() {
        let openai = Arc::new(MockProvider::replying("openai", "Still here."));
        let h = harness(ProviderRegistry::new().with(openai.clone())).await;
        // Knowledge retrieval with a broken embedder, scraping with a dead URL.
        let pipeline = h
            .pipeline
            .with_knowledge(KnowledgeRetriever::new(
                Arc::new(BrokenStore),
                Some(Arc::new(MockProvider::replying("openai", "x"))),
            ))
            .with_scraper(WebScraper::new(Arc::new(MockFetcher::new().failing("https://down.example"))));

        let reply = pipeline
            .handle(&user(), ChatRequest::new("check https://down.example"))
            .await
            .unwrap();
        assert_eq!(reply.reply, "Still here.");

        let synthesis = openai.last_request().unwrap();
        let body = &synthesis.messages[0].content;
        assert!(body.contains(KNOWLEDGE_UNAVAILABLE));
        assert!(body.contains("[Could not retrieve content from https://down.example]"));
        assert_eq!(h.audit.count_by_event(AuditEvent::EmbeddingFailure), 1);
        assert_eq!(h.audit.count_by_event(AuditEvent::WebScrapeFailure), 1);
    }

    #[tokio::test]
    async fn user_message_store_failure_aborts() {
        let openai = Arc::new(MockProvider::replying("openai", "x"));
        let store = Arc::new(InMemoryStore::new());
        store.upsert(Persona::new("Janus", "Strategist")).await.unwrap();
        let stores = Stores {
            personas: store.clone(),
            conversations: Arc::new(BrokenStore),
            knowledge: store,
        };
        let audit = Arc::new(AuditLogger::new());
        let pipeline = HydraPipeline::from_config(
            &AppConfig::default(),
            ProviderRegistry::new().with(openai.clone()),
            stores,
            audit.clone(),
        );

        let err = pipeline.handle(&user(), ChatRequest::new("hi")).await.unwrap_err();
        assert_eq!(err.stage_code(), "INSERT_USER_MSG");
        assert_eq!(openai.calls(), 0);
        assert_eq!(audit.count_by_event(AuditEvent::HistoryFailure), 1);
        assert_eq!(audit.count_by_event(AuditEvent::FatalError), 1);
    }

    #[tokio::test]
    async fn persona_store_failure_is_audited() {
        let openai = Arc::new(MockProvider::replying("openai", "x"));
        let store = Arc::new(InMemoryStore::new());
        let stores = Stores {
            personas: Arc::new(BrokenStore),
            conversations: store.clone(),
            knowledge: store,
        };
        let audit = Arc::new(AuditLogger::new());
        let pipeline = HydraPipeline::from_config(
            &AppConfig::default(),
            ProviderRegistry::new().with(openai.clone()),
            stores,
            audit.clone(),
        );

        let err = pipeline.handle(&user(), ChatRequest::new("hi")).await.unwrap_err();
        assert_eq!(err.stage_code(), "PERSONA_LOOKUP");
        assert_eq!(openai.calls(), 0);

        let fatal: Vec<_> = audit
            .entries()
            .into_iter()
            .filter(|e| e.event == AuditEvent::FatalError)
            .collect();
        assert_eq!(fatal.len(), 1);
        assert_eq!(fatal[0].metadata["stage"], "PERSONA_LOOKUP");
        assert!(fatal[0].metadata["error"].as_str().unwrap().contains("database is locked"));
    }

    #[tokio::test]
    async fn identical_inputs_give_identical_replies() {
        let h = harness(ProviderRegistry::new().with(Arc::new(MockProvider::replying("openai", "Same.")))).await;
        let a = h.pipeline.handle(&user(), ChatRequest::new("repeat")).await.unwrap();
        let b = h.pipeline.handle(&user(), ChatRequest::new("repeat")).await.unwrap();
        assert_eq!(a, b);
    }
}
