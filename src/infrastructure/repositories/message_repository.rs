//! Message Repository Implementation
//!
//! Cursor-paged message storage. `sent_at` is never overwritten by an
//! upsert; everything else non-key is.

use async_trait::async_trait;
use sqlx::{Any, AnyPool, Executor};

use super::{format_timestamp, parse_timestamp, parse_timestamp_opt};
use crate::domain::{Message, MessagePage, MessageRepository};
use crate::shared::error::AppError;

const MESSAGE_COLUMNS: &str = "id, channel_id, author_id, content, clean_content, sent_at, \
                               edited_at, pinned, tts, mention_everyone, embeds_json, \
                               reference_id, created_at, updated_at";

/// Store-agnostic message repository.
pub struct SqlMessageRepository {
    pool: AnyPool,
}

impl SqlMessageRepository {
    /// Creates a new SqlMessageRepository with the given connection pool.
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for message queries.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    channel_id: i64,
    author_id: i64,
    content: String,
    clean_content: String,
    sent_at: String,
    edited_at: Option<String>,
    pinned: i64,
    tts: i64,
    mention_everyone: i64,
    embeds_json: String,
    reference_id: Option<i64>,
    created_at: String,
    updated_at: String,
}

impl MessageRow {
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            channel_id: self.channel_id,
            author_id: self.author_id,
            content: self.content,
            clean_content: self.clean_content,
            sent_at: parse_timestamp(&self.sent_at),
            edited_at: parse_timestamp_opt(self.edited_at.as_deref()),
            pinned: self.pinned != 0,
            tts: self.tts != 0,
            mention_everyone: self.mention_everyone != 0,
            embeds_json: self.embeds_json,
            reference_id: self.reference_id,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        }
    }
}

impl SqlMessageRepository {
    /// Upsert against an arbitrary executor, usable inside a transaction.
    pub async fn upsert_with<'e, E>(executor: E, message: &Message) -> Result<Message, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (id, channel_id, author_id, content, clean_content,
                                  sent_at, edited_at, pinned, tts, mention_everyone,
                                  embeds_json, reference_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO UPDATE SET
                channel_id = $2, author_id = $3, content = $4, clean_content = $5,
                edited_at = $7, pinned = $8, tts = $9, mention_everyone = $10,
                embeds_json = $11, reference_id = $12, updated_at = $14
            RETURNING id, channel_id, author_id, content, clean_content, sent_at,
                      edited_at, pinned, tts, mention_everyone, embeds_json,
                      reference_id, created_at, updated_at
            "#,
        )
        .bind(message.id)
        .bind(message.channel_id)
        .bind(message.author_id)
        .bind(&message.content)
        .bind(&message.clean_content)
        .bind(format_timestamp(message.sent_at))
        .bind(message.edited_at.map(format_timestamp))
        .bind(message.pinned as i64)
        .bind(message.tts as i64)
        .bind(message.mention_everyone as i64)
        .bind(&message.embeds_json)
        .bind(message.reference_id)
        .bind(format_timestamp(message.created_at))
        .bind(format_timestamp(message.updated_at))
        .fetch_one(executor)
        .await?;

        Ok(row.into_message())
    }

    /// Substring search over message content within a guild, newest first.
    pub async fn search(
        &self,
        guild_id: i64,
        query: &str,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let limit = limit.clamp(1, 200);
        let pattern = format!("%{}%", query);

        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT m.id, m.channel_id, m.author_id, m.content, m.clean_content,
                   m.sent_at, m.edited_at, m.pinned, m.tts, m.mention_everyone,
                   m.embeds_json, m.reference_id, m.created_at, m.updated_at
            FROM messages m
            JOIN channels c ON c.id = m.channel_id
            WHERE c.guild_id = $1 AND m.content LIKE $2
            ORDER BY m.id DESC
            LIMIT $3
            "#,
        )
        .bind(guild_id)
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }
}

#[async_trait]
impl MessageRepository for SqlMessageRepository {
    async fn get(&self, id: i64) -> Result<Option<Message>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {} FROM messages WHERE id = $1",
            MESSAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_message()))
    }

    async fn upsert(&self, message: &Message) -> Result<Message, AppError> {
        Ok(Self::upsert_with(&self.pool, message).await?)
    }

    async fn bulk_upsert(&self, messages: &[Message]) -> Result<u64, AppError> {
        if messages.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for message in messages {
            Self::upsert_with(&mut *tx, message).await?;
        }
        tx.commit().await?;
        Ok(messages.len() as u64)
    }

    /// List messages with cursor-based pagination.
    ///
    /// - `after`: messages newer than the cursor, ascending
    /// - `before`: messages older than the cursor, descending
    /// - neither: the most recent messages, descending
    async fn list_by_channel(
        &self,
        channel_id: i64,
        page: MessagePage,
    ) -> Result<Vec<Message>, AppError> {
        let limit = page.effective_limit();

        let rows = match (page.before, page.after) {
            (_, Some(after_id)) => {
                sqlx::query_as::<_, MessageRow>(&format!(
                    "SELECT {} FROM messages WHERE channel_id = $1 AND id > $2 \
                     ORDER BY id ASC LIMIT $3",
                    MESSAGE_COLUMNS
                ))
                .bind(channel_id)
                .bind(after_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            (Some(before_id), None) => {
                sqlx::query_as::<_, MessageRow>(&format!(
                    "SELECT {} FROM messages WHERE channel_id = $1 AND id < $2 \
                     ORDER BY id DESC LIMIT $3",
                    MESSAGE_COLUMNS
                ))
                .bind(channel_id)
                .bind(before_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            (None, None) => {
                sqlx::query_as::<_, MessageRow>(&format!(
                    "SELECT {} FROM messages WHERE channel_id = $1 \
                     ORDER BY id DESC LIMIT $2",
                    MESSAGE_COLUMNS
                ))
                .bind(channel_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }

    async fn count(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_by_channel(&self, channel_id: i64) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE channel_id = $1")
                .bind(channel_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<Message>, AppError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {} FROM messages ORDER BY id ASC LIMIT $1 OFFSET $2",
            MESSAGE_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }
}
