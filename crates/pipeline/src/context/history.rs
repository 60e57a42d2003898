//! Recent conversation turns for one user/persona thread.

use hydra_core::persona::ConversationTurn;
use hydra_core::store::ConversationLog;
use hydra_security::audit::{AuditEvent, AuditLogger};
use serde_json::json;
use tracing::{debug, warn};

/// Fetch the latest `limit` turns, oldest first.
///
/// A store failure yields an empty history and a `HISTORY_FAILURE` entry.
pub async fn fetch_history(
    log: &dyn ConversationLog,
    audit: &AuditLogger,
    user_id: &str,
    persona_id: &str,
    limit: usize,
) -> Vec<ConversationTurn> {
    match log.recent(user_id, persona_id, limit).await {
        Ok(mut turns) => {
            turns.reverse();
            debug!(turns = turns.len(), "Loaded conversation history");
            turns
        }
        Err(e) => {
            warn!(error = %e, "History fetch failed, continuing without history");
            audit
                .record(
                    AuditEvent::HistoryFailure,
                    json!({ "user_id": user_id, "persona_id": persona_id, "error": e.to_string() }),
                )
                .await;
            Vec::new()
        }
    }
}
