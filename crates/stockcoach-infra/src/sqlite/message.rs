//! SQLite chat message repository.
//!
//! Implements `RemoteMessageRepository` from `stockcoach-core`. One row per
//! message; `image_url` has no column and is dropped on save.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use stockcoach_core::repository::message::RemoteMessageRepository;
use stockcoach_types::error::RepositoryError;
use stockcoach_types::message::Message;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `RemoteMessageRepository`.
pub struct SqliteMessageRepository {
    pool: DatabasePool,
}

impl SqliteMessageRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct ChatMessageRow {
    id: String,
    sender_id: String,
    content: String,
    is_ai: i64,
    created_at: String,
}

impl ChatMessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            sender_id: row.try_get("sender_id")?,
            content: row.try_get("content")?,
            is_ai: row.try_get("is_ai")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<Message, RepositoryError> {
        Ok(Message {
            id: parse_uuid(&self.id)?,
            sender_id: self.sender_id,
            content: self.content,
            timestamp: parse_datetime(&self.created_at)?,
            is_ai: self.is_ai != 0,
            image_url: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width UTC so that text order is time order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn map_write_error(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(db.message().to_string())
        }
        other => RepositoryError::Query(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// RemoteMessageRepository impl
// ---------------------------------------------------------------------------

impl RemoteMessageRepository for SqliteMessageRepository {
    async fn save_message(&self, user_id: &str, message: &Message) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO chat_messages (id, user_id, sender_id, content, is_ai, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(user_id)
        .bind(&message.sender_id)
        .bind(&message.content)
        .bind(i64::from(message.is_ai))
        .bind(format_datetime(&message.timestamp))
        .execute(&self.pool.writer)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn get_messages(&self, user_id: &str) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT id, sender_id, content, is_ai, created_at FROM chat_messages
               WHERE user_id = ?
               ORDER BY created_at ASC, rowid ASC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = ChatMessageRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(r.into_message()?);
        }
        Ok(messages)
    }

    async fn count_user_messages(&self, user_id: &str) -> Result<u32, RepositoryError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM chat_messages WHERE user_id = ? AND is_ai = 0",
        )
        .bind(user_id)
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let n: i64 = row
            .try_get("n")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(u32::try_from(n).unwrap_or(u32::MAX))
    }

    async fn delete_messages(&self, user_id: &str, ids: &[Uuid]) -> Result<u64, RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut removed = 0;
        for id in ids {
            let result = sqlx::query("DELETE FROM chat_messages WHERE user_id = ? AND id = ?")
                .bind(user_id)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            removed += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(removed)
    }
}
