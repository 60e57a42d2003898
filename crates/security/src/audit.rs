//! Audit logging: structured pipeline event logging.
//!
//! Records failures and terminal outcomes for observability. Recording is
//! best-effort: a sink that fails to write is reported on the tracing
//! channel (stderr) and the request carries on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hydra_core::error::StoreError;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// How many entries the in-memory ring keeps.
const MAX_RECENT: usize = 1000;

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    pub metadata: serde_json::Value,
}

/// Types of auditable pipeline events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEvent {
    /// One provider call failed during fan-out
    ApiFailure,
    /// A URL could not be fetched or parsed
    WebScrapeFailure,
    /// The embedding service failed
    EmbeddingFailure,
    /// Every dispatched provider call failed
    AllProvidersFailed,
    /// An unexpected failure ended the request
    FatalError,
    /// Conversation history could not be read
    HistoryFailure,
    /// Every synthesizer attempt failed
    SynthesisFailed,
    /// Knowledge chunks were stored for a user
    KnowledgeIngested,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEvent::ApiFailure => "API_FAILURE",
            AuditEvent::WebScrapeFailure => "WEB_SCRAPE_FAILURE",
            AuditEvent::EmbeddingFailure => "EMBEDDING_FAILURE",
            AuditEvent::AllProvidersFailed => "ALL_PROVIDERS_FAILED",
            AuditEvent::FatalError => "FATAL_ERROR",
            AuditEvent::HistoryFailure => "HISTORY_FAILURE",
            AuditEvent::SynthesisFailed => "SYNTHESIS_FAILED",
            AuditEvent::KnowledgeIngested => "KNOWLEDGE_INGESTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            AuditEvent::ApiFailure,
            AuditEvent::WebScrapeFailure,
            AuditEvent::EmbeddingFailure,
            AuditEvent::AllProvidersFailed,
            AuditEvent::FatalError,
            AuditEvent::HistoryFailure,
            AuditEvent::SynthesisFailed,
            AuditEvent::KnowledgeIngested,
        ]
        .into_iter()
        .find(|e| e.as_str() == s)
    }
}

impl std::fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where audit entries are written.
#[async_trait]
pub trait AuditSink: Send + Sync {
    fn name(&self) -> &str;

    async fn write(&self, entry: &AuditEntry) -> std::result::Result<(), StoreError>;
}

/// Audit logger: keeps recent entries in memory and forwards every entry
/// to its sinks.
pub struct AuditLogger {
    entries: Mutex<Vec<AuditEntry>>,
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("entry_count", &self.count())
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    /// Create a new audit logger with no sinks.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            sinks: Vec::new(),
        }
    }

    /// Add a sink.
    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AuditEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record an audit event. Never fails.
    pub async fn record(&self, event: AuditEvent, metadata: serde_json::Value) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            event,
            metadata,
        };

        {
            let mut entries = self.lock();
            if entries.len() >= MAX_RECENT {
                entries.remove(0);
            }
            entries.push(entry.clone());
        }

        for sink in &self.sinks {
            if let Err(e) = sink.write(&entry).await {
                tracing::error!(
                    sink = sink.name(),
                    event = %entry.event,
                    error = %e,
                    "Audit sink write failed"
                );
            }
        }
    }

    /// Get all recorded entries.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().clone()
    }

    /// Count of entries for one event type.
    pub fn count_by_event(&self, event: AuditEvent) -> usize {
        self.lock().iter().filter(|e| e.event == event).count()
    }

    /// Clear all stored entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Count of stored entries.
    pub fn count(&self) -> usize {
        self.lock().len()
    }
}

/// A tracing-based audit sink that logs entries via `tracing::warn!`.
pub struct TracingSink;

#[async_trait]
impl AuditSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn write(&self, entry: &AuditEntry) -> std::result::Result<(), StoreError> {
        match entry.event {
            AuditEvent::KnowledgeIngested => tracing::info!(
                event = %entry.event,
                metadata = %entry.metadata,
                "AUDIT"
            ),
            _ => tracing::warn!(
                event = %entry.event,
                metadata = %entry.metadata,
                "AUDIT"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct BrokenSink;

    #[async_trait]
    impl AuditSink for BrokenSink {
        fn name(&self) -> &str {
            "broken"
        }

        async fn write(&self, _entry: &AuditEntry) -> std::result::Result<(), StoreError> {
            Err(StoreError::Storage("disk full".into()))
        }
    }

    struct CollectingSink {
        received: Mutex<Vec<AuditEvent>>,
    }

    #[async_trait]
    impl AuditSink for CollectingSink {
        fn name(&self) -> &str {
            "collecting"
        }

        async fn write(&self, entry: &AuditEntry) -> std::result::Result<(), StoreError> {
            self.received.lock().unwrap().push(entry.event);
            Ok(())
        }
    }

    #[tokio::test]
    async fn record_and_retrieve_entries() {
        let logger = AuditLogger::new();
        logger
            .record(AuditEvent::ApiFailure, json!({"provider": "grok", "error": "timeout"}))
            .await;
        logger
            .record(AuditEvent::AllProvidersFailed, json!({"attempted": 1}))
            .await;

        assert_eq!(logger.count(), 2);
        let entries = logger.entries();
        assert_eq!(entries[0].metadata["provider"], "grok");
        assert_eq!(logger.count_by_event(AuditEvent::AllProvidersFailed), 1);
    }

    #[tokio::test]
    async fn failing_sink_is_swallowed() {
        let collecting = Arc::new(CollectingSink {
            received: Mutex::new(Vec::new()),
        });
        let logger = AuditLogger::new()
            .with_sink(Arc::new(BrokenSink))
            .with_sink(collecting.clone());

        logger.record(AuditEvent::FatalError, json!({})).await;

        // The later sink still receives the entry
        assert_eq!(*collecting.received.lock().unwrap(), vec![AuditEvent::FatalError]);
        assert_eq!(logger.count(), 1);
    }

    #[tokio::test]
    async fn ring_is_bounded() {
        let logger = AuditLogger::new();
        for _ in 0..(MAX_RECENT + 5) {
            logger.record(AuditEvent::WebScrapeFailure, json!({})).await;
        }
        assert_eq!(logger.count(), MAX_RECENT);
    }

    #[tokio::test]
    async fn clear_entries() {
        let logger = AuditLogger::new().with_sink(Arc::new(TracingSink));
        logger.record(AuditEvent::KnowledgeIngested, json!({"chunks": 3})).await;
        assert_eq!(logger.count(), 1);
        logger.clear();
        assert_eq!(logger.count(), 0);
    }

    #[test]
    fn event_names_match_wire_format() {
        let json = serde_json::to_string(&AuditEvent::WebScrapeFailure).unwrap();
        assert_eq!(json, "\"WEB_SCRAPE_FAILURE\"");
        assert_eq!(AuditEvent::AllProvidersFailed.as_str(), "ALL_PROVIDERS_FAILED");
        assert_eq!(AuditEvent::parse("EMBEDDING_FAILURE"), Some(AuditEvent::EmbeddingFailure));
        assert_eq!(AuditEvent::parse("NOPE"), None);
    }

    #[test]
    fn debug_format() {
        let logger = AuditLogger::new();
        let debug_str = format!("{logger:?}");
        assert!(debug_str.contains("AuditLogger"));
        assert!(debug_str.contains("entry_count"));
    }
}
