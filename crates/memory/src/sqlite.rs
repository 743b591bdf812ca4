//! SQLite thread store.
//!
//! Two tables:
//! - `thread_messages` holds each entry as JSON, ordered by an integer rowid
//! - `threads` holds per-thread state (the fact flag)
//!
//! An append writes both in one transaction so a turn is persisted whole.

use async_trait::async_trait;
use chrono::Utc;
use secretary_core::error::HistoryError;
use secretary_core::history::{Thread, ThreadId, ThreadStore};
use secretary_core::message::Message;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// Durable conversation history in a single SQLite file.
pub struct SqliteThreadStore {
    pool: SqlitePool,
}

impl SqliteThreadStore {
    /// Open (or create) the database at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, HistoryError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| HistoryError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Every in-memory connection is its own database.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| HistoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite history store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, HistoryError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), HistoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS thread_messages (
                iid        INTEGER PRIMARY KEY AUTOINCREMENT,
                thread_id  TEXT NOT NULL,
                body       TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Storage(format!("thread_messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_thread_messages_thread ON thread_messages(thread_id, iid)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Storage(format!("thread index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS threads (
                thread_id              TEXT PRIMARY KEY,
                fact_added_in_last_run INTEGER NOT NULL DEFAULT 0,
                updated_at             TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Storage(format!("threads table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }
}

#[async_trait]
impl ThreadStore for SqliteThreadStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn load(&self, thread: &ThreadId) -> Result<Thread, HistoryError> {
        let rows = sqlx::query("SELECT body FROM thread_messages WHERE thread_id = ? ORDER BY iid ASC")
            .bind(&thread.0)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| HistoryError::Storage(format!("load messages: {e}")))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            let body: String = row
                .try_get("body")
                .map_err(|e| HistoryError::Storage(format!("body column: {e}")))?;
            let message: Message = serde_json::from_str(&body)
                .map_err(|e| HistoryError::Corrupt(format!("thread {thread}: {e}")))?;
            messages.push(message);
        }

        let fact_added_in_last_run = sqlx::query(
            "SELECT fact_added_in_last_run FROM threads WHERE thread_id = ?",
        )
        .bind(&thread.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| HistoryError::Storage(format!("load thread state: {e}")))?
        .map(|row| row.try_get::<bool, _>("fact_added_in_last_run"))
        .transpose()
        .map_err(|e| HistoryError::Storage(format!("flag column: {e}")))?
        .unwrap_or(false);

        Ok(Thread {
            messages,
            fact_added_in_last_run,
        })
    }

    async fn append(
        &self,
        thread: &ThreadId,
        messages: &[Message],
        fact_added_in_last_run: bool,
    ) -> Result<(), HistoryError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| HistoryError::Storage(format!("begin: {e}")))?;

        for message in messages {
            let body = serde_json::to_string(message)
                .map_err(|e| HistoryError::Storage(format!("encode message: {e}")))?;
            sqlx::query("INSERT INTO thread_messages (thread_id, body, created_at) VALUES (?, ?, ?)")
                .bind(&thread.0)
                .bind(body)
                .bind(&now)
                .execute(&mut *tx)
                .await
                .map_err(|e| HistoryError::Storage(format!("insert message: {e}")))?;
        }

        sqlx::query(
            r#"
            INSERT INTO threads (thread_id, fact_added_in_last_run, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(thread_id) DO UPDATE SET
                fact_added_in_last_run = excluded.fact_added_in_last_run,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&thread.0)
        .bind(fact_added_in_last_run)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| HistoryError::Storage(format!("upsert thread: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| HistoryError::Storage(format!("commit: {e}")))?;

        debug!(thread = %thread, appended = messages.len(), "History appended");
        Ok(())
    }
}
