//! Channel Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Any, AnyPool, Executor};

use super::{format_timestamp, parse_timestamp, parse_timestamp_opt};
use crate::domain::{Channel, ChannelKind, ChannelRepository};
use crate::shared::error::AppError;

const CHANNEL_COLUMNS: &str = "id, guild_id, name, kind, topic, position, parent_id, \
                               message_count, last_scraped_at, last_message_id, \
                               created_at, updated_at";

/// Store-agnostic channel repository.
pub struct SqlChannelRepository {
    pool: AnyPool,
}

impl SqlChannelRepository {
    /// Creates a new SqlChannelRepository with the given connection pool.
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for channel queries.
#[derive(Debug, sqlx::FromRow)]
struct ChannelRow {
    id: i64,
    guild_id: i64,
    name: String,
    kind: String,
    topic: Option<String>,
    position: i64,
    parent_id: Option<i64>,
    message_count: i64,
    last_scraped_at: Option<String>,
    last_message_id: Option<i64>,
    created_at: String,
    updated_at: String,
}

impl ChannelRow {
    fn into_channel(self) -> Channel {
        Channel {
            id: self.id,
            guild_id: self.guild_id,
            name: self.name,
            kind: ChannelKind::from_str(&self.kind),
            topic: self.topic,
            position: self.position,
            parent_id: self.parent_id,
            message_count: self.message_count,
            last_scraped_at: parse_timestamp_opt(self.last_scraped_at.as_deref()),
            last_message_id: self.last_message_id,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        }
    }
}

impl SqlChannelRepository {
    /// Upsert against an arbitrary executor, usable inside a transaction.
    pub async fn upsert_with<'e, E>(executor: E, channel: &Channel) -> Result<Channel, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let row = sqlx::query_as::<_, ChannelRow>(
            r#"
            INSERT INTO channels (id, guild_id, name, kind, topic, position, parent_id,
                                  message_count, last_scraped_at, last_message_id,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                guild_id = $2, name = $3, kind = $4, topic = $5, position = $6,
                parent_id = $7, message_count = $8, last_scraped_at = $9,
                last_message_id = $10, updated_at = $12
            RETURNING id, guild_id, name, kind, topic, position, parent_id,
                      message_count, last_scraped_at, last_message_id,
                      created_at, updated_at
            "#,
        )
        .bind(channel.id)
        .bind(channel.guild_id)
        .bind(&channel.name)
        .bind(channel.kind.as_str())
        .bind(&channel.topic)
        .bind(channel.position)
        .bind(channel.parent_id)
        .bind(channel.message_count)
        .bind(channel.last_scraped_at.map(format_timestamp))
        .bind(channel.last_message_id)
        .bind(format_timestamp(channel.created_at))
        .bind(format_timestamp(channel.updated_at))
        .fetch_one(executor)
        .await?;

        Ok(row.into_channel())
    }
}

#[async_trait]
impl ChannelRepository for SqlChannelRepository {
    async fn get(&self, id: i64) -> Result<Option<Channel>, AppError> {
        let row = sqlx::query_as::<_, ChannelRow>(&format!(
            "SELECT {} FROM channels WHERE id = $1",
            CHANNEL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_channel()))
    }

    async fn upsert(&self, channel: &Channel) -> Result<Channel, AppError> {
        Ok(Self::upsert_with(&self.pool, channel).await?)
    }

    async fn bulk_upsert(&self, channels: &[Channel]) -> Result<u64, AppError> {
        if channels.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for channel in channels {
            Self::upsert_with(&mut *tx, channel).await?;
        }
        tx.commit().await?;
        Ok(channels.len() as u64)
    }

    async fn list_by_guild(&self, guild_id: i64) -> Result<Vec<Channel>, AppError> {
        let rows = sqlx::query_as::<_, ChannelRow>(&format!(
            "SELECT {} FROM channels WHERE guild_id = $1 ORDER BY id ASC",
            CHANNEL_COLUMNS
        ))
        .bind(guild_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_channel()).collect())
    }

    async fn count(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM channels")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<Channel>, AppError> {
        let rows = sqlx::query_as::<_, ChannelRow>(&format!(
            "SELECT {} FROM channels ORDER BY id ASC LIMIT $1 OFFSET $2",
            CHANNEL_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_channel()).collect())
    }

    async fn mark_scraped(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        let at = format_timestamp(at);
        sqlx::query("UPDATE channels SET last_scraped_at = $2, updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn record_scrape_result(
        &self,
        id: i64,
        last_message_id: i64,
        new_messages: i64,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let at = format_timestamp(at);
        sqlx::query(
            r#"
            UPDATE channels
            SET last_message_id = $2,
                message_count = message_count + $3,
                last_scraped_at = $4,
                updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(last_message_id)
        .bind(new_messages)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
