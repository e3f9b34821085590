//! User entity and repository trait.
//!
//! Maps to the `users` table in the archive schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Represents an archived message author.
///
/// Maps to the `users` table:
/// - id: BIGINT PRIMARY KEY (snowflake)
/// - username: TEXT NOT NULL
/// - discriminator: TEXT NOT NULL ("0" for migrated accounts)
/// - display_name: TEXT NULL
/// - avatar_url: TEXT NULL
/// - bot: INTEGER NOT NULL DEFAULT 0
/// - created_at / updated_at: TEXT NOT NULL (RFC 3339)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Account username
    pub username: String,

    /// Legacy discriminator ("0" on the new username system)
    pub discriminator: String,

    /// Server- or account-level display name
    pub display_name: Option<String>,

    /// Avatar CDN URL
    pub avatar_url: Option<String>,

    /// Whether the account is a bot
    pub bot: bool,

    /// Row creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last row update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The name to show in archive views.
    pub fn effective_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

impl Default for User {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username: String::new(),
            discriminator: "0".to_string(),
            display_name: None,
            avatar_url: None,
            bot: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Repository trait for User data access operations.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by its snowflake ID. Absent is not an error.
    async fn get(&self, id: i64) -> Result<Option<User>, AppError>;

    /// Insert the user or overwrite its non-key fields, returning the
    /// persisted form.
    async fn upsert(&self, user: &User) -> Result<User, AppError>;

    /// Upsert a batch of users, returning the number written.
    async fn bulk_upsert(&self, users: &[User]) -> Result<u64, AppError>;

    /// Count all user rows.
    async fn count(&self) -> Result<i64, AppError>;

    /// Page user rows by offset, snowflake ascending.
    async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<User>, AppError>;
}
