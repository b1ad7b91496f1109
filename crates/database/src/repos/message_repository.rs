//! Repository for message data access operations.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, info};

use crate::entities::{Message, NewMessage};
use crate::store::{MessageStore, MonotonicClock};
use crate::types::{DatabaseError, DatabaseResult};

/// SQLite backed message store
pub struct MessageRepository {
    pool: SqlitePool,
    clock: MonotonicClock,
}

impl MessageRepository {
    /// Create a new message repository
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            clock: MonotonicClock::new(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn map_row(row: &SqliteRow) -> DatabaseResult<Message> {
        let created_at: String = row.try_get("created_at")?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| DatabaseError::QueryError(format!("invalid created_at: {e}")))?
            .with_timezone(&Utc);

        Ok(Message {
            id: row.try_get("msg_id")?,
            author: row.try_get("author")?,
            body: row.try_get("body")?,
            created_at,
        })
    }
}

#[async_trait]
impl MessageStore for MessageRepository {
    async fn save(&self, message: NewMessage) -> DatabaseResult<Message> {
        let message = message.into_message(self.clock.now());
        let created_at = message
            .created_at
            .to_rfc3339_opts(SecondsFormat::Micros, true);

        sqlx::query(
            "INSERT INTO messages (msg_id, author, body, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.author)
        .bind(&message.body)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        info!(msg_id = %message.id, author = %message.author, "stored message");
        Ok(message)
    }

    async fn find(&self, id: &str) -> DatabaseResult<Option<Message>> {
        let row = sqlx::query(
            "SELECT msg_id, author, body, created_at FROM messages WHERE msg_id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn recent(&self, limit: u32) -> DatabaseResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT msg_id, author, body, created_at FROM messages ORDER BY seq DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut messages = rows
            .iter()
            .map(Self::map_row)
            .collect::<DatabaseResult<Vec<_>>>()?;
        messages.reverse();
        debug!(count = messages.len(), "loaded recent messages");
        Ok(messages)
    }

    async fn ping(&self) -> DatabaseResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::Unavailable(e.to_string()))?;
        Ok(())
    }
}
