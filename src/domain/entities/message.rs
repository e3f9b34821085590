//! Message entity and repository trait.
//!
//! Maps to the `messages` table in the archive schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Maximum page size for cursor-based message listing.
pub const MAX_MESSAGE_PAGE: i64 = 200;

/// Represents an archived message.
///
/// Maps to the `messages` table:
/// - id: BIGINT PRIMARY KEY (snowflake)
/// - channel_id: BIGINT NOT NULL REFERENCES channels(id)
/// - author_id: BIGINT NOT NULL REFERENCES users(id)
/// - content: TEXT NOT NULL (raw markup)
/// - clean_content: TEXT NOT NULL (mention markup resolved)
/// - sent_at: TEXT NOT NULL (RFC 3339, immutable across upserts)
/// - edited_at: TEXT NULL
/// - pinned / tts / mention_everyone: INTEGER NOT NULL DEFAULT 0
/// - embeds_json: TEXT NOT NULL -- canonical JSON array of embed objects
/// - reference_id: BIGINT NULL -- replied-to message, no FK enforced
/// - created_at / updated_at: TEXT NOT NULL (RFC 3339)
///
/// `reference_id` should name an existing message but an archive is allowed
/// to hold replies whose target was never fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Channel the message was sent in
    pub channel_id: i64,

    /// Author user ID
    pub author_id: i64,

    /// Raw message content
    pub content: String,

    /// Content with mention markup resolved to readable names
    pub clean_content: String,

    /// When the message was sent on Discord
    pub sent_at: DateTime<Utc>,

    /// When the message was last edited (None if never edited)
    pub edited_at: Option<DateTime<Utc>>,

    /// Whether the message is pinned
    pub pinned: bool,

    /// Whether the message was sent with text-to-speech
    pub tts: bool,

    /// Whether the message mentions @everyone
    pub mention_everyone: bool,

    /// Embeds as a canonical JSON array ("[]" when none)
    pub embeds_json: String,

    /// Replied-to message, when this is a reply
    pub reference_id: Option<i64>,

    /// Row creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last row update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Check if this message has been edited.
    pub fn is_edited(&self) -> bool {
        self.edited_at.is_some()
    }

    /// Check if this is a reply message.
    pub fn is_reply(&self) -> bool {
        self.reference_id.is_some()
    }

    /// Check if this message carries embeds.
    pub fn has_embeds(&self) -> bool {
        !matches!(self.embeds_json.trim(), "" | "[]" | "null")
    }
}

impl Default for Message {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            channel_id: 0,
            author_id: 0,
            content: String::new(),
            clean_content: String::new(),
            sent_at: now,
            edited_at: None,
            pinned: false,
            tts: false,
            mention_everyone: false,
            embeds_json: "[]".to_string(),
            reference_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Cursor parameters for paging message history.
///
/// `before` pages newest-first, `after` pages oldest-first; with neither,
/// the most recent messages are returned. The limit is clamped to
/// 1..=[`MAX_MESSAGE_PAGE`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePage {
    pub before: Option<i64>,
    pub after: Option<i64>,
    pub limit: i64,
}

impl MessagePage {
    /// The effective limit after clamping.
    pub fn effective_limit(&self) -> i64 {
        self.limit.clamp(1, MAX_MESSAGE_PAGE)
    }
}

/// Repository trait for Message data access operations.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Find a message by its snowflake ID. Absent is not an error.
    async fn get(&self, id: i64) -> Result<Option<Message>, AppError>;

    /// Insert the message or overwrite its non-key fields (except the
    /// immutable `sent_at`), returning the persisted form.
    async fn upsert(&self, message: &Message) -> Result<Message, AppError>;

    /// Upsert a batch of messages, returning the number written.
    async fn bulk_upsert(&self, messages: &[Message]) -> Result<u64, AppError>;

    /// List messages of a channel with cursor-based pagination.
    async fn list_by_channel(
        &self,
        channel_id: i64,
        page: MessagePage,
    ) -> Result<Vec<Message>, AppError>;

    /// Count all message rows.
    async fn count(&self) -> Result<i64, AppError>;

    /// Count messages archived for one channel.
    async fn count_by_channel(&self, channel_id: i64) -> Result<i64, AppError>;

    /// Page message rows by offset, snowflake ascending.
    async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<Message>, AppError>;
}
