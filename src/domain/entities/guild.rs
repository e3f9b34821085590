//! Guild entity and repository trait.
//!
//! Maps to the `guilds` table in the archive schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Represents an archived Discord guild (server).
///
/// Maps to the `guilds` table:
/// - id: BIGINT PRIMARY KEY (Discord-assigned snowflake)
/// - name: TEXT NOT NULL
/// - owner_id: BIGINT NOT NULL
/// - member_count: BIGINT NOT NULL DEFAULT 0
/// - first_scraped_at: TEXT NULL (RFC 3339)
/// - last_scraped_at: TEXT NULL (RFC 3339)
/// - scrape_count: BIGINT NOT NULL DEFAULT 0
/// - created_at / updated_at: TEXT NOT NULL (RFC 3339)
///
/// `scrape_count` only ever increases and `last_scraped_at` never moves
/// before `first_scraped_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guild {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Guild name as last fetched from Discord
    pub name: String,

    /// Owner user ID
    pub owner_id: i64,

    /// Member count as last reported by Discord
    pub member_count: i64,

    /// When the guild was first scraped (None before the first run)
    pub first_scraped_at: Option<DateTime<Utc>>,

    /// When the guild was last scraped
    pub last_scraped_at: Option<DateTime<Utc>>,

    /// Number of completed scrape runs
    pub scrape_count: i64,

    /// Row creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last row update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Guild {
    /// Check whether this guild has ever been scraped.
    pub fn has_been_scraped(&self) -> bool {
        self.scrape_count > 0
    }
}

impl Default for Guild {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: String::new(),
            owner_id: 0,
            member_count: 0,
            first_scraped_at: None,
            last_scraped_at: None,
            scrape_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Repository trait for Guild data access operations.
#[async_trait]
pub trait GuildRepository: Send + Sync {
    /// Find a guild by its snowflake ID. Absent is not an error.
    async fn get(&self, id: i64) -> Result<Option<Guild>, AppError>;

    /// Insert the guild or overwrite its non-key fields, returning the
    /// persisted form.
    async fn upsert(&self, guild: &Guild) -> Result<Guild, AppError>;

    /// Upsert a batch of guilds, returning the number written.
    async fn bulk_upsert(&self, guilds: &[Guild]) -> Result<u64, AppError>;

    /// List all archived guilds, snowflake ascending.
    async fn list_all(&self) -> Result<Vec<Guild>, AppError>;

    /// Count all guild rows.
    async fn count(&self) -> Result<i64, AppError>;

    /// Page guild rows by offset, snowflake ascending.
    async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<Guild>, AppError>;

    /// Record a completed scrape run: bump `scrape_count`, advance
    /// `last_scraped_at` and set `first_scraped_at` once.
    async fn record_scrape(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError>;
}
