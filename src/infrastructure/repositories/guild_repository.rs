//! Guild Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Any, AnyPool, Executor};

use super::{format_timestamp, parse_timestamp, parse_timestamp_opt};
use crate::domain::{Guild, GuildRepository};
use crate::shared::error::AppError;

const GUILD_COLUMNS: &str = "id, name, owner_id, member_count, first_scraped_at, \
                             last_scraped_at, scrape_count, created_at, updated_at";

/// Store-agnostic guild repository.
pub struct SqlGuildRepository {
    pool: AnyPool,
}

impl SqlGuildRepository {
    /// Creates a new SqlGuildRepository with the given connection pool.
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for guild queries.
#[derive(Debug, sqlx::FromRow)]
struct GuildRow {
    id: i64,
    name: String,
    owner_id: i64,
    member_count: i64,
    first_scraped_at: Option<String>,
    last_scraped_at: Option<String>,
    scrape_count: i64,
    created_at: String,
    updated_at: String,
}

impl GuildRow {
    fn into_guild(self) -> Guild {
        Guild {
            id: self.id,
            name: self.name,
            owner_id: self.owner_id,
            member_count: self.member_count,
            first_scraped_at: parse_timestamp_opt(self.first_scraped_at.as_deref()),
            last_scraped_at: parse_timestamp_opt(self.last_scraped_at.as_deref()),
            scrape_count: self.scrape_count,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        }
    }
}

impl SqlGuildRepository {
    /// Upsert against an arbitrary executor, usable inside a transaction.
    pub async fn upsert_with<'e, E>(executor: E, guild: &Guild) -> Result<Guild, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let row = sqlx::query_as::<_, GuildRow>(
            r#"
            INSERT INTO guilds (id, name, owner_id, member_count, first_scraped_at,
                                last_scraped_at, scrape_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                name = $2, owner_id = $3, member_count = $4,
                first_scraped_at = $5, last_scraped_at = $6, scrape_count = $7,
                updated_at = $9
            RETURNING id, name, owner_id, member_count, first_scraped_at,
                      last_scraped_at, scrape_count, created_at, updated_at
            "#,
        )
        .bind(guild.id)
        .bind(&guild.name)
        .bind(guild.owner_id)
        .bind(guild.member_count)
        .bind(guild.first_scraped_at.map(format_timestamp))
        .bind(guild.last_scraped_at.map(format_timestamp))
        .bind(guild.scrape_count)
        .bind(format_timestamp(guild.created_at))
        .bind(format_timestamp(guild.updated_at))
        .fetch_one(executor)
        .await?;

        Ok(row.into_guild())
    }
}

#[async_trait]
impl GuildRepository for SqlGuildRepository {
    async fn get(&self, id: i64) -> Result<Option<Guild>, AppError> {
        let row = sqlx::query_as::<_, GuildRow>(&format!(
            "SELECT {} FROM guilds WHERE id = $1",
            GUILD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_guild()))
    }

    async fn upsert(&self, guild: &Guild) -> Result<Guild, AppError> {
        Ok(Self::upsert_with(&self.pool, guild).await?)
    }

    async fn bulk_upsert(&self, guilds: &[Guild]) -> Result<u64, AppError> {
        if guilds.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for guild in guilds {
            Self::upsert_with(&mut *tx, guild).await?;
        }
        tx.commit().await?;
        Ok(guilds.len() as u64)
    }

    async fn list_all(&self) -> Result<Vec<Guild>, AppError> {
        let rows = sqlx::query_as::<_, GuildRow>(&format!(
            "SELECT {} FROM guilds ORDER BY id ASC",
            GUILD_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_guild()).collect())
    }

    async fn count(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM guilds")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<Guild>, AppError> {
        let rows = sqlx::query_as::<_, GuildRow>(&format!(
            "SELECT {} FROM guilds ORDER BY id ASC LIMIT $1 OFFSET $2",
            GUILD_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_guild()).collect())
    }

    async fn record_scrape(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        let at = format_timestamp(at);
        sqlx::query(
            r#"
            UPDATE guilds
            SET scrape_count = scrape_count + 1,
                first_scraped_at = COALESCE(first_scraped_at, $2),
                last_scraped_at = $2,
                updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
