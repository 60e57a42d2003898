//! HTTP API gateway for Hydra.
//!
//! Exposes the chat pipeline, knowledge ingestion, a liveness ping and a
//! secrets-free diagnostics view. Built on Axum.

pub mod api;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use hydra_config::{AppConfig, StoreBackend};
use hydra_core::error::{AuthError, StoreError};
use hydra_core::identity::IdentityVerifier;
use hydra_memory::{InMemoryStore, SqliteStore};
use hydra_pipeline::{HydraPipeline, KnowledgeIngestor, Stores};
use hydra_security::audit::{AuditLogger, TracingSink};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub pipeline: Arc<HydraPipeline>,
    pub ingestor: Arc<KnowledgeIngestor>,
    pub verifier: Arc<dyn IdentityVerifier>,
    /// Names of the providers the registry was built with.
    pub providers: Vec<String>,
}

pub type SharedState = Arc<GatewayState>;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("Auth setup failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The persistence layer and audit logger for one process.
pub struct Backend {
    pub stores: Stores,
    pub audit: Arc<AuditLogger>,
}

/// Open the configured store and an audit logger that writes to both
/// tracing and the store.
pub async fn open_backend(config: &AppConfig) -> Result<Backend, StoreError> {
    let audit = AuditLogger::new().with_sink(Arc::new(TracingSink));

    match config.store.backend {
        StoreBackend::Memory => {
            let store = Arc::new(InMemoryStore::new());
            Ok(Backend {
                stores: Stores::shared(store.clone()),
                audit: Arc::new(audit.with_sink(store)),
            })
        }
        StoreBackend::Sqlite => {
            let url = &config.store.database_url;
            ensure_parent_dir(url)?;
            let store = Arc::new(SqliteStore::new(url).await?);
            Ok(Backend {
                stores: Stores::shared(store.clone()),
                audit: Arc::new(audit.with_sink(store)),
            })
        }
    }
}

fn ensure_parent_dir(url: &str) -> Result<(), StoreError> {
    let Some(path) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.contains(":memory:") {
        return Ok(());
    }
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|e| StoreError::Storage(format!("Cannot create {}: {e}", parent.display()))),
        _ => Ok(()),
    }
}

/// Build the gateway state from configuration: providers, stores, pipeline,
/// ingestor and identity verifier, each created once.
pub async fn build_state(config: AppConfig) -> Result<SharedState, GatewayError> {
    let registry = hydra_providers::build_from_config(&config);
    if registry.is_empty() {
        warn!("No providers available; chat requests will fail until an API key is set");
    }
    let providers = registry.names().iter().map(|s| s.to_string()).collect();

    let backend = open_backend(&config).await?;
    let verifier = hydra_security::verifier_from_config(&config.auth)?;

    let ingestor =
        KnowledgeIngestor::from_config(&config, &registry, backend.stores.knowledge.clone());
    let pipeline = HydraPipeline::from_config(&config, registry, backend.stores, backend.audit);

    Ok(Arc::new(GatewayState {
        config,
        pipeline: Arc::new(pipeline),
        ingestor: Arc::new(ingestor),
        verifier,
        providers,
    }))
}

/// Build the full router.
///
/// Layers applied:
/// - CORS from `gateway.allowed_origins` (empty = any origin)
/// - Request body size limit
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.gateway.allowed_origins);
    let body_limit = state.config.gateway.body_limit_bytes;

    api::api_router(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), GatewayError> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = build_state(config).await?;

    info!(
        addr = %addr,
        providers = ?state.providers,
        store = state.config.store.backend.as_str(),
        auth = state.verifier.name(),
        "Gateway starting"
    );

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_dir_is_skipped_for_memory_urls() {
        assert!(ensure_parent_dir("sqlite::memory:").is_ok());
        assert!(ensure_parent_dir("sqlite://:memory:").is_ok());
    }

    #[test]
    fn parent_dir_is_created_for_file_urls() {
        let dir = std::env::temp_dir().join(format!("hydra-gw-{}", std::process::id()));
        let url = format!("sqlite://{}/nested/hydra.db", dir.display());
        ensure_parent_dir(&url).unwrap();
        assert!(dir.join("nested").is_dir());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn memory_backend_mirrors_audit_into_store() {
        let mut config = AppConfig::default();
        config.store.backend = StoreBackend::Memory;
        let backend = open_backend(&config).await.unwrap();

        backend
            .audit
            .record(
                hydra_security::AuditEvent::ApiFailure,
                serde_json::json!({ "provider": "openai" }),
            )
            .await;
        assert_eq!(backend.audit.count(), 1);
        assert!(backend.stores.personas.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn build_state_without_keys_still_serves() {
        let mut config = AppConfig::default();
        config.store.backend = StoreBackend::Memory;
        let state = build_state(config).await.unwrap();
        assert!(state.providers.is_empty());
        assert_eq!(state.pipeline.provider_count(), 0);
    }
}
