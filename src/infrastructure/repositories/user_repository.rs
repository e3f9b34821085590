//! User Repository Implementation

use async_trait::async_trait;
use sqlx::{Any, AnyPool, Executor};

use super::{format_timestamp, parse_timestamp};
use crate::domain::{User, UserRepository};
use crate::shared::error::AppError;

const USER_COLUMNS: &str =
    "id, username, discriminator, display_name, avatar_url, bot, created_at, updated_at";

/// Store-agnostic user repository.
pub struct SqlUserRepository {
    pool: AnyPool,
}

impl SqlUserRepository {
    /// Creates a new SqlUserRepository with the given connection pool.
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for user queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    discriminator: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    bot: i64,
    created_at: String,
    updated_at: String,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            id: self.id,
            username: self.username,
            discriminator: self.discriminator,
            display_name: self.display_name,
            avatar_url: self.avatar_url,
            bot: self.bot != 0,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        }
    }
}

impl SqlUserRepository {
    /// Upsert against an arbitrary executor, usable inside a transaction.
    pub async fn upsert_with<'e, E>(executor: E, user: &User) -> Result<User, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, username, discriminator, display_name, avatar_url,
                               bot, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                username = $2, discriminator = $3, display_name = $4,
                avatar_url = $5, bot = $6, updated_at = $8
            RETURNING id, username, discriminator, display_name, avatar_url,
                      bot, created_at, updated_at
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.discriminator)
        .bind(&user.display_name)
        .bind(&user.avatar_url)
        .bind(user.bot as i64)
        .bind(format_timestamp(user.created_at))
        .bind(format_timestamp(user.updated_at))
        .fetch_one(executor)
        .await?;

        Ok(row.into_user())
    }
}

#[async_trait]
impl UserRepository for SqlUserRepository {
    async fn get(&self, id: i64) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_user()))
    }

    async fn upsert(&self, user: &User) -> Result<User, AppError> {
        Ok(Self::upsert_with(&self.pool, user).await?)
    }

    async fn bulk_upsert(&self, users: &[User]) -> Result<u64, AppError> {
        if users.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for user in users {
            Self::upsert_with(&mut *tx, user).await?;
        }
        tx.commit().await?;
        Ok(users.len() as u64)
    }

    async fn count(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY id ASC LIMIT $1 OFFSET $2",
            USER_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_user()).collect())
    }
}
