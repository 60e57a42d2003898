//! SQLite store.
//!
//! One database file with four tables:
//! - `personas`: persona profiles, unique by name
//! - `conversation_history`: user and AI turns, ordered by `created_at`
//! - `knowledge`: embedded document chunks (embedding as little-endian f32 BLOB)
//! - `audit_log`: durable audit entries
//!
//! Similarity search loads the caller's chunks and ranks them in process.

use crate::vector;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use hydra_core::error::StoreError;
use hydra_core::persona::{ConversationTurn, Persona, Sender};
use hydra_core::store::{
    ConversationLog, KnowledgeChunk, KnowledgeMatch, KnowledgeStore, PersonaStore,
};
use hydra_security::audit::{AuditEntry, AuditSink};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// A SQLite-backed implementation of every Hydra store trait.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `url` and run migrations.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database (useful for tests).
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite url: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // Each connection to an in-memory database sees its own empty database.
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {url}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements = [
            (
                "personas table",
                r#"
                CREATE TABLE IF NOT EXISTS personas (
                    id               TEXT PRIMARY KEY,
                    name             TEXT UNIQUE NOT NULL,
                    role             TEXT NOT NULL,
                    key_attributes   TEXT NOT NULL DEFAULT '',
                    dossier_summary  TEXT NOT NULL DEFAULT ''
                )
                "#,
            ),
            (
                "conversation_history table",
                r#"
                CREATE TABLE IF NOT EXISTS conversation_history (
                    iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id     TEXT NOT NULL,
                    persona_id  TEXT NOT NULL,
                    sender      TEXT NOT NULL,
                    content     TEXT NOT NULL,
                    image_url   TEXT,
                    created_at  TEXT NOT NULL
                )
                "#,
            ),
            (
                "conversation index",
                "CREATE INDEX IF NOT EXISTS idx_history_thread \
                 ON conversation_history(user_id, persona_id, created_at DESC)",
            ),
            (
                "knowledge table",
                r#"
                CREATE TABLE IF NOT EXISTS knowledge (
                    iid        INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id    TEXT NOT NULL,
                    file_name  TEXT NOT NULL,
                    content    TEXT NOT NULL,
                    embedding  BLOB NOT NULL
                )
                "#,
            ),
            (
                "knowledge index",
                "CREATE INDEX IF NOT EXISTS idx_knowledge_user ON knowledge(user_id)",
            ),
            (
                "audit_log table",
                r#"
                CREATE TABLE IF NOT EXISTS audit_log (
                    iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                    event_type  TEXT NOT NULL,
                    metadata    TEXT NOT NULL,
                    created_at  TEXT NOT NULL
                )
                "#,
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{what}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Number of rows in `audit_log`.
    pub async fn audit_count(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM audit_log")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("audit count: {e}")))?;
        let n: i64 = get(&row, "n")?;
        Ok(n as usize)
    }

    fn row_to_persona(row: &sqlx::sqlite::SqliteRow) -> Result<Persona, StoreError> {
        Ok(Persona {
            id: get(row, "id")?,
            name: get(row, "name")?,
            role: get(row, "role")?,
            key_attributes: get(row, "key_attributes")?,
            dossier_summary: get(row, "dossier_summary")?,
        })
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationTurn, StoreError> {
        let sender: String = get(row, "sender")?;
        let sender = Sender::parse(&sender)
            .ok_or_else(|| StoreError::QueryFailed(format!("unknown sender '{sender}'")))?;
        let created_at: String = get(row, "created_at")?;
        let timestamp = DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        Ok(ConversationTurn {
            user_id: get(row, "user_id")?,
            persona_id: get(row, "persona_id")?,
            sender,
            content: get(row, "content")?,
            image_url: get(row, "image_url")?,
            timestamp,
        })
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Result<KnowledgeChunk, StoreError> {
        let blob: Vec<u8> = get(row, "embedding")?;
        Ok(KnowledgeChunk {
            user_id: get(row, "user_id")?,
            file_name: get(row, "file_name")?,
            content: get(row, "content")?,
            embedding: blob_to_embedding(&blob),
        })
    }
}

fn get<'r, T>(row: &'r sqlx::sqlite::SqliteRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column)
        .map_err(|e| StoreError::QueryFailed(format!("{column} column: {e}")))
}

/// Fixed-width timestamps so text ordering matches time ordering.
fn timestamp_text(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[async_trait]
impl PersonaStore for SqliteStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<Persona>, StoreError> {
        let row = sqlx::query("SELECT * FROM personas WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("persona lookup: {e}")))?;
        row.as_ref().map(Self::row_to_persona).transpose()
    }

    async fn upsert(&self, persona: Persona) -> Result<Persona, StoreError> {
        // On conflict the existing id is kept so history stays attached.
        let row = sqlx::query(
            r#"
            INSERT INTO personas (id, name, role, key_attributes, dossier_summary)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(name) DO UPDATE SET
                role = excluded.role,
                key_attributes = excluded.key_attributes,
                dossier_summary = excluded.dossier_summary
            RETURNING *
            "#,
        )
        .bind(&persona.id)
        .bind(&persona.name)
        .bind(&persona.role)
        .bind(&persona.key_attributes)
        .bind(&persona.dossier_summary)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("persona upsert: {e}")))?;

        debug!(persona = %persona.name, "Stored persona");
        Self::row_to_persona(&row)
    }

    async fn list(&self) -> Result<Vec<Persona>, StoreError> {
        let rows = sqlx::query("SELECT * FROM personas ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("persona list: {e}")))?;
        rows.iter().map(Self::row_to_persona).collect()
    }
}

#[async_trait]
impl ConversationLog for SqliteStore {
    async fn recent(
        &self,
        user_id: &str,
        persona_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM conversation_history
            WHERE user_id = ?1 AND persona_id = ?2
            ORDER BY created_at DESC, iid DESC
            LIMIT ?3
            "#,
        )
        .bind(user_id)
        .bind(persona_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("history select: {e}")))?;

        rows.iter().map(Self::row_to_turn).collect()
    }

    async fn append(&self, turn: ConversationTurn) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO conversation_history
                (user_id, persona_id, sender, content, image_url, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&turn.user_id)
        .bind(&turn.persona_id)
        .bind(turn.sender.as_str())
        .bind(&turn.content)
        .bind(&turn.image_url)
        .bind(timestamp_text(&turn.timestamp))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("history insert: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn insert(&self, chunks: Vec<KnowledgeChunk>) -> Result<usize, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("begin: {e}")))?;

        for chunk in &chunks {
            sqlx::query(
                "INSERT INTO knowledge (user_id, file_name, content, embedding) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&chunk.user_id)
            .bind(&chunk.file_name)
            .bind(&chunk.content)
            .bind(embedding_to_blob(&chunk.embedding))
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("knowledge insert: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("commit: {e}")))?;
        Ok(chunks.len())
    }

    async fn search(
        &self,
        user_id: &str,
        embedding: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<KnowledgeMatch>, StoreError> {
        let rows = sqlx::query("SELECT * FROM knowledge WHERE user_id = ?1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("knowledge select: {e}")))?;

        let chunks = rows
            .iter()
            .map(Self::row_to_chunk)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(vector::top_matches(&chunks, embedding, limit, min_similarity))
    }
}

#[async_trait]
impl AuditSink for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn write(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO audit_log (event_type, metadata, created_at) VALUES (?1, ?2, ?3)")
            .bind(entry.event.as_str())
            .bind(entry.metadata.to_string())
            .bind(timestamp_text(&entry.timestamp))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("audit insert: {e}")))?;
        Ok(())
    }
}
