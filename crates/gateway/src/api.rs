//! HTTP API.
//!
//! Endpoints:
//!
//! - `POST /api/chat`      : Answer a message as a persona (bearer auth)
//! - `POST /api/knowledge` : Chunk, embed and store a document (bearer auth)
//! - `GET  /api/ping`      : Liveness
//! - `GET  /api/diag`      : Provider key presence and store health, no secrets
//!
//! Every failure is `{ "error": <stage code>, "detail": <message> }`.

use axum::{
    Router,
    extract::State,
    extract::rejection::JsonRejection,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{info, warn};

use hydra_config::WELL_KNOWN_PROVIDERS;
use hydra_core::error::AuthError;
use hydra_core::identity::UserId;
use hydra_pipeline::{ChatReply, ChatRequest, IngestError, PipelineError};
use hydra_security::parse_bearer;

use crate::SharedState;

// ── Router ────────────────────────────────────────────────────────────────

pub fn api_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler).fallback(method_not_allowed))
        .route(
            "/api/knowledge",
            post(ingest_handler).fallback(method_not_allowed),
        )
        .route("/api/ping", get(ping_handler).fallback(method_not_allowed))
        .route("/api/diag", get(diag_handler).fallback(method_not_allowed))
        .with_state(state)
}

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
}

/// A client-visible failure: status, stage code and safe detail.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, detail: impl Into<String>) -> Self {
        Self {
            status,
            code,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.code.to_string(),
                detail: self.detail,
            }),
        )
            .into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        let status = match &e {
            PipelineError::MessageRequired => StatusCode::BAD_REQUEST,
            PipelineError::PersonaNotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::AllProvidersFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::SynthesisFailed { .. } => StatusCode::BAD_GATEWAY,
            PipelineError::NoProviders
            | PipelineError::PersonaLookup(_)
            | PipelineError::InsertUserMessage(_)
            | PipelineError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.stage_code(), e.detail())
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        let status = match &e {
            IngestError::FileMissing => StatusCode::BAD_REQUEST,
            IngestError::EmbeddingFailed(_) => StatusCode::BAD_GATEWAY,
            IngestError::VectorInsertFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.stage_code(), e.detail())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BODY_PARSE", e.body_text())
    }
}

async fn method_not_allowed() -> ApiError {
    ApiError::new(
        StatusCode::METHOD_NOT_ALLOWED,
        "METHOD_NOT_ALLOWED",
        "Method not allowed.",
    )
}

// ── Auth ──────────────────────────────────────────────────────────────────

/// Resolve the caller from `Authorization: Bearer <token>`.
async fn authenticate(state: &SharedState, headers: &HeaderMap) -> Result<UserId, ApiError> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = parse_bearer(raw).map_err(|_| {
        ApiError::new(
            StatusCode::UNAUTHORIZED,
            "AUTH_HEADER_MISSING",
            "Missing or malformed Authorization header.",
        )
    })?;

    state.verifier.verify(token).await.map_err(|e| {
        warn!(verifier = state.verifier.name(), error = %e, "Bearer token rejected");
        let detail = match e {
            AuthError::Unavailable(_) => "The identity service is unavailable.",
            _ => "Invalid or expired credential.",
        };
        ApiError::new(StatusCode::UNAUTHORIZED, "AUTH_GETUSER", detail)
    })
}

// ── Chat ──────────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let user_id = authenticate(&state, &headers).await?;
    let Json(request) = body?;

    info!(user_id = %user_id, persona = ?request.persona_name, "Chat request");

    match state.pipeline.handle(&user_id, request).await {
        Ok(reply) => Ok(Json(reply)),
        Err(e) => {
            warn!(user_id = %user_id, stage = e.stage_code(), error = %e, "Chat request failed");
            Err(e.into())
        }
    }
}

// ── Knowledge ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub ok: bool,
    pub message: String,
    pub chunks: usize,
}

async fn ingest_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let user_id = authenticate(&state, &headers).await?;
    let Json(request) = body?;

    let report = state
        .ingestor
        .ingest(
            &user_id,
            &request.file_name,
            &request.content,
            state.pipeline.audit(),
        )
        .await?;

    Ok(Json(IngestResponse {
        ok: true,
        message: format!(
            "Ingested {} chunk(s) from {}.",
            report.chunks, report.file_name
        ),
        chunks: report.chunks,
    }))
}

// ── Ping / Diag ───────────────────────────────────────────────────────────

async fn ping_handler() -> Json<serde_json::Value> {
    Json(json!({
        "ok": true,
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagResponse {
    pub ok: bool,
    pub version: String,
    /// Well-known provider → `present` / `missing`.
    pub keys: BTreeMap<String, String>,
    /// Providers the registry was built with.
    pub registered: Vec<String>,
    pub synthesis_priority: Vec<String>,
    pub store: String,
    pub personas: serde_json::Value,
}

async fn diag_handler(State(state): State<SharedState>) -> Json<DiagResponse> {
    let config = &state.config;

    let keys = WELL_KNOWN_PROVIDERS
        .iter()
        .map(|wk| {
            let present = config
                .providers
                .get(wk.name)
                .is_some_and(|p| p.is_available());
            let status = if present { "present" } else { "missing" };
            (wk.name.to_string(), status.to_string())
        })
        .collect();

    let personas = match state.pipeline.stores().personas.list().await {
        Ok(list) => json!({ "readable": true, "count": list.len() }),
        Err(e) => json!({ "readable": false, "error": e.to_string() }),
    };

    Json(DiagResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        keys,
        registered: state.providers.clone(),
        synthesis_priority: config.synthesis.priority.clone(),
        store: config.store.backend.as_str().to_string(),
        personas,
    })
}
