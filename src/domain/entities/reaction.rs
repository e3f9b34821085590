//! Reaction entity and repository trait.
//!
//! Maps to the `reactions` table in the archive schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Represents an aggregated emoji reaction on a message.
///
/// Maps to the `reactions` table:
/// - message_id: BIGINT NOT NULL REFERENCES messages(id) (composite PK)
/// - emoji_id: BIGINT NOT NULL (composite PK; 0 for Unicode emoji)
/// - emoji_name: TEXT NOT NULL (composite PK)
/// - emoji_animated: INTEGER NOT NULL DEFAULT 0
/// - count: BIGINT NOT NULL CHECK (count >= 1)
/// - created_at / updated_at: TEXT NOT NULL (RFC 3339)
///
/// The composite primary key (message_id, emoji_id, emoji_name) identifies
/// one emoji per message; the row stores the reactor count, not individual
/// reactors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    /// Message this reaction is on
    pub message_id: i64,

    /// Custom emoji snowflake, or 0 for Unicode emoji
    pub emoji_id: i64,

    /// Emoji name (the Unicode glyph, or the custom emoji's name)
    pub emoji_name: String,

    /// Whether the custom emoji is animated
    pub emoji_animated: bool,

    /// Number of users who reacted; at least 1
    pub count: i64,

    /// Row creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last row update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Reaction {
    /// Check if this is a custom (guild-uploaded) emoji.
    pub fn is_custom_emoji(&self) -> bool {
        self.emoji_id != 0
    }
}

impl Default for Reaction {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            message_id: 0,
            emoji_id: 0,
            emoji_name: String::new(),
            emoji_animated: false,
            count: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Repository trait for Reaction data access operations.
#[async_trait]
pub trait ReactionRepository: Send + Sync {
    /// Find a reaction by its composite key. Absent is not an error.
    async fn get(
        &self,
        message_id: i64,
        emoji_id: i64,
        emoji_name: &str,
    ) -> Result<Option<Reaction>, AppError>;

    /// Insert the reaction or overwrite its non-key fields, returning the
    /// persisted form.
    async fn upsert(&self, reaction: &Reaction) -> Result<Reaction, AppError>;

    /// Upsert a batch of reactions, returning the number written.
    async fn bulk_upsert(&self, reactions: &[Reaction]) -> Result<u64, AppError>;

    /// List reactions of a message, ordered by emoji key.
    async fn list_by_message(&self, message_id: i64) -> Result<Vec<Reaction>, AppError>;

    /// Count all reaction rows.
    async fn count(&self) -> Result<i64, AppError>;

    /// Page reaction rows by offset, ordered by the composite key.
    async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<Reaction>, AppError>;
}
