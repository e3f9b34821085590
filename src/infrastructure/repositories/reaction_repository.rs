//! Reaction Repository Implementation
//!
//! Reactions are keyed by (message_id, emoji_id, emoji_name) and store an
//! aggregate count. The schema enforces `count >= 1`; the scraper relies on
//! that rejection to isolate malformed reactions per row.

use async_trait::async_trait;
use sqlx::{Any, AnyPool, Executor};

use super::{format_timestamp, parse_timestamp};
use crate::domain::{Reaction, ReactionRepository};
use crate::shared::error::AppError;

const REACTION_COLUMNS: &str =
    "message_id, emoji_id, emoji_name, emoji_animated, count, created_at, updated_at";

/// Store-agnostic reaction repository.
pub struct SqlReactionRepository {
    pool: AnyPool,
}

impl SqlReactionRepository {
    /// Creates a new SqlReactionRepository with the given connection pool.
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for reaction queries.
#[derive(Debug, sqlx::FromRow)]
struct ReactionRow {
    message_id: i64,
    emoji_id: i64,
    emoji_name: String,
    emoji_animated: i64,
    count: i64,
    created_at: String,
    updated_at: String,
}

impl ReactionRow {
    fn into_reaction(self) -> Reaction {
        Reaction {
            message_id: self.message_id,
            emoji_id: self.emoji_id,
            emoji_name: self.emoji_name,
            emoji_animated: self.emoji_animated != 0,
            count: self.count,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        }
    }
}

impl SqlReactionRepository {
    /// Upsert against an arbitrary executor, usable inside a transaction.
    pub async fn upsert_with<'e, E>(executor: E, reaction: &Reaction) -> Result<Reaction, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let row = sqlx::query_as::<_, ReactionRow>(
            r#"
            INSERT INTO reactions (message_id, emoji_id, emoji_name, emoji_animated,
                                   count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (message_id, emoji_id, emoji_name) DO UPDATE SET
                emoji_animated = $4, count = $5, updated_at = $7
            RETURNING message_id, emoji_id, emoji_name, emoji_animated, count,
                      created_at, updated_at
            "#,
        )
        .bind(reaction.message_id)
        .bind(reaction.emoji_id)
        .bind(&reaction.emoji_name)
        .bind(reaction.emoji_animated as i64)
        .bind(reaction.count)
        .bind(format_timestamp(reaction.created_at))
        .bind(format_timestamp(reaction.updated_at))
        .fetch_one(executor)
        .await?;

        Ok(row.into_reaction())
    }
}

#[async_trait]
impl ReactionRepository for SqlReactionRepository {
    async fn get(
        &self,
        message_id: i64,
        emoji_id: i64,
        emoji_name: &str,
    ) -> Result<Option<Reaction>, AppError> {
        let row = sqlx::query_as::<_, ReactionRow>(&format!(
            "SELECT {} FROM reactions \
             WHERE message_id = $1 AND emoji_id = $2 AND emoji_name = $3",
            REACTION_COLUMNS
        ))
        .bind(message_id)
        .bind(emoji_id)
        .bind(emoji_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_reaction()))
    }

    async fn upsert(&self, reaction: &Reaction) -> Result<Reaction, AppError> {
        Ok(Self::upsert_with(&self.pool, reaction).await?)
    }

    async fn bulk_upsert(&self, reactions: &[Reaction]) -> Result<u64, AppError> {
        if reactions.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for reaction in reactions {
            Self::upsert_with(&mut *tx, reaction).await?;
        }
        tx.commit().await?;
        Ok(reactions.len() as u64)
    }

    async fn list_by_message(&self, message_id: i64) -> Result<Vec<Reaction>, AppError> {
        let rows = sqlx::query_as::<_, ReactionRow>(&format!(
            "SELECT {} FROM reactions WHERE message_id = $1 \
             ORDER BY emoji_id ASC, emoji_name ASC",
            REACTION_COLUMNS
        ))
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_reaction()).collect())
    }

    async fn count(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<Reaction>, AppError> {
        let rows = sqlx::query_as::<_, ReactionRow>(&format!(
            "SELECT {} FROM reactions \
             ORDER BY message_id ASC, emoji_id ASC, emoji_name ASC \
             LIMIT $1 OFFSET $2",
            REACTION_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_reaction()).collect())
    }
}
