//! Message repository: append-only per-room logs.
//!
//! Timestamps are unix nanoseconds for precise ordering; row ids are
//! monotonically increasing and break ties.

use super::DbError;
use super::models::MessageRecord;
use regex::Regex;
use sqlx::SqlitePool;

type MessageRow = (i64, i64, String, String, i64);

fn into_record(row: MessageRow) -> MessageRecord {
    let (id, room_id, display_name, content, created_at) = row;
    MessageRecord {
        id,
        room_id,
        display_name,
        content,
        created_at,
    }
}

/// Repository for message operations.
pub struct MessageRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MessageRepository<'a> {
    /// Create a new message repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a message to a room's log.
    pub async fn create_message(
        &self,
        room_id: i64,
        display_name: &str,
        content: &str,
    ) -> Result<(), DbError> {
        let nanotime = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0);

        sqlx::query(
            r#"
            INSERT INTO messages (room_id, display_name, content, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(room_id)
        .bind(display_name)
        .bind(content)
        .bind(nanotime)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// The most recent `limit` messages, returned oldest first.
    pub async fn list_messages(
        &self,
        room_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MessageRecord>, DbError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT id, room_id, display_name, content, created_at
            FROM messages
            WHERE room_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(room_id)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(self.pool)
        .await?;

        let mut messages: Vec<MessageRecord> = rows.into_iter().map(into_record).collect();
        messages.reverse();
        Ok(messages)
    }

    /// Messages whose content matches the given regular expression, oldest
    /// first.
    ///
    /// The pattern compiles to a `regex::Regex` applied as the row predicate
    /// over the room's log; sqlx exposes no scalar-function hook, so the
    /// matcher runs at the repository boundary.
    pub async fn search_messages(
        &self,
        room_id: i64,
        pattern: &str,
    ) -> Result<Vec<MessageRecord>, DbError> {
        let matcher = Regex::new(pattern)?;

        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT id, room_id, display_name, content, created_at
            FROM messages
            WHERE room_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(room_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(into_record)
            .filter(|message| matcher.is_match(&message.content))
            .collect())
    }
}
