//! Channel entity and repository trait.
//!
//! Maps to the `channels` table in the archive schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Channel kinds stored as TEXT in the `channels.kind` column.
///
/// This is a closed enum; unknown values coming off the wire map to `Text`
/// so that an archive created against a newer Discord API still loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// A guild text channel
    #[default]
    Text,
    /// A guild voice channel
    Voice,
    /// An announcement (news) channel
    Announcement,
    /// A category that groups channels; never scraped for messages
    Category,
    /// A public thread under a text or forum channel
    PublicThread,
    /// A private thread under a text channel
    PrivateThread,
    /// A stage voice channel
    StageVoice,
    /// A forum channel; its posts are threads
    Forum,
}

impl ChannelKind {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "text" => Self::Text,
            "voice" => Self::Voice,
            "announcement" => Self::Announcement,
            "category" => Self::Category,
            "public_thread" => Self::PublicThread,
            "private_thread" => Self::PrivateThread,
            "stage_voice" => Self::StageVoice,
            "forum" => Self::Forum,
            _ => Self::Text,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
            Self::Announcement => "announcement",
            Self::Category => "category",
            Self::PublicThread => "public_thread",
            Self::PrivateThread => "private_thread",
            Self::StageVoice => "stage_voice",
            Self::Forum => "forum",
        }
    }

    /// Check if this is a category (a non-message parent).
    pub fn is_category(&self) -> bool {
        matches!(self, Self::Category)
    }

    /// Check if this is a thread kind.
    pub fn is_thread(&self) -> bool {
        matches!(self, Self::PublicThread | Self::PrivateThread)
    }

    /// Check if channels of this kind own threads worth enumerating.
    pub fn has_threads(&self) -> bool {
        matches!(self, Self::Text | Self::Forum)
    }

    /// Check if the scraper should pull message history for this kind.
    ///
    /// Everything except categories is traversed; an empty voice channel
    /// simply yields no pages.
    pub fn is_scrapeable(&self) -> bool {
        !self.is_category()
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents an archived channel or thread.
///
/// Maps to the `channels` table:
/// - id: BIGINT PRIMARY KEY (snowflake)
/// - guild_id: BIGINT NOT NULL REFERENCES guilds(id)
/// - name: TEXT NOT NULL
/// - kind: TEXT NOT NULL
/// - topic: TEXT NULL
/// - position: BIGINT NOT NULL DEFAULT 0
/// - parent_id: BIGINT NULL -- category or parent channel, same guild
/// - message_count: BIGINT NOT NULL DEFAULT 0
/// - last_scraped_at: TEXT NULL (RFC 3339)
/// - last_message_id: BIGINT NULL -- highest snowflake seen by the scraper
/// - created_at / updated_at: TEXT NOT NULL (RFC 3339)
///
/// `parent_id` is a plain snowflake field, not an owning reference; it is
/// resolved on read where a parent name is needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Guild this channel belongs to
    pub guild_id: i64,

    /// Channel name
    pub name: String,

    /// Channel kind
    pub kind: ChannelKind,

    /// Channel topic/description
    pub topic: Option<String>,

    /// Sorting position within the guild listing
    pub position: i64,

    /// Parent category, or parent channel for threads
    pub parent_id: Option<i64>,

    /// Number of messages archived for this channel
    pub message_count: i64,

    /// When this channel last completed a scrape
    pub last_scraped_at: Option<DateTime<Utc>>,

    /// Highest message snowflake seen by the scraper (None until the first
    /// message is archived)
    pub last_message_id: Option<i64>,

    /// Row creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last row update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Channel {
    /// Check whether this channel has ever completed a scrape.
    pub fn has_been_scraped(&self) -> bool {
        self.last_scraped_at.is_some()
    }
}

impl Default for Channel {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            guild_id: 0,
            name: String::new(),
            kind: ChannelKind::default(),
            topic: None,
            position: 0,
            parent_id: None,
            message_count: 0,
            last_scraped_at: None,
            last_message_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Repository trait for Channel data access operations.
#[async_trait]
pub trait ChannelRepository: Send + Sync {
    /// Find a channel by its snowflake ID. Absent is not an error.
    async fn get(&self, id: i64) -> Result<Option<Channel>, AppError>;

    /// Insert the channel or overwrite its non-key fields, returning the
    /// persisted form.
    async fn upsert(&self, channel: &Channel) -> Result<Channel, AppError>;

    /// Upsert a batch of channels, returning the number written.
    async fn bulk_upsert(&self, channels: &[Channel]) -> Result<u64, AppError>;

    /// List all channels of a guild, snowflake ascending.
    async fn list_by_guild(&self, guild_id: i64) -> Result<Vec<Channel>, AppError>;

    /// Count all channel rows.
    async fn count(&self) -> Result<i64, AppError>;

    /// Page channel rows by offset, snowflake ascending.
    async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<Channel>, AppError>;

    /// Record a completed traversal that found no new messages: advance
    /// `last_scraped_at` only.
    async fn mark_scraped(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Record a completed traversal that archived `new_messages` messages:
    /// advance the high-water mark, the archived count and `last_scraped_at`.
    async fn record_scrape_result(
        &self,
        id: i64,
        last_message_id: i64,
        new_messages: i64,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;
}
