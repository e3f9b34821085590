//! Discord Capability
//!
//! The scraper and analyzer talk to Discord through the [`DiscordClient`]
//! trait so that tests can substitute a deterministic fake producing
//! scripted pages and threads. The production implementation speaks REST
//! directly ([`RestDiscordClient`]).

pub mod rest_client;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;

pub use rest_client::RestDiscordClient;
pub use types::{
    DiscordAttachment, DiscordChannel, DiscordEmoji, DiscordGuild, DiscordMessage,
    DiscordReaction, DiscordUser,
};

use crate::shared::error::AppError;

/// Errors surfaced by the Discord capability.
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("authentication failed: {0}")]
    Unauthorized(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("rate limited (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: f64 },

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Pagination boundary for message history pulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCursor {
    /// The most recent messages
    Latest,
    /// Messages older than this snowflake
    Before(i64),
    /// Messages newer than this snowflake
    After(i64),
}

/// Which thread listing of a channel to enumerate.
///
/// Active and archived listings can overlap; callers deduplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadKind {
    Active,
    ArchivedPublic,
    ArchivedPrivate,
}

impl ThreadKind {
    /// Enumeration order used by the scraper: active first, then archived.
    pub const ALL: [ThreadKind; 3] = [
        ThreadKind::Active,
        ThreadKind::ArchivedPublic,
        ThreadKind::ArchivedPrivate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::ArchivedPublic => "archived/public",
            Self::ArchivedPrivate => "archived/private",
        }
    }
}

/// The single-responsibility interface to Discord.
#[async_trait]
pub trait DiscordClient: Send + Sync {
    /// Validate the credential and return the account it belongs to.
    async fn login(&self) -> Result<DiscordUser, DiscordError>;

    /// Fetch guild metadata.
    async fn get_guild(&self, guild_id: i64) -> Result<DiscordGuild, DiscordError>;

    /// List all channels of a guild, including categories.
    async fn get_guild_channels(&self, guild_id: i64)
        -> Result<Vec<DiscordChannel>, DiscordError>;

    /// Pull one page of message history. `limit` is capped at 100 by the
    /// API. Page-internal ordering is whatever Discord emits; callers
    /// normalize.
    async fn get_channel_messages(
        &self,
        channel_id: i64,
        cursor: MessageCursor,
        limit: u8,
    ) -> Result<Vec<DiscordMessage>, DiscordError>;

    /// Enumerate one thread listing of a channel.
    async fn list_threads(
        &self,
        channel_id: i64,
        kind: ThreadKind,
    ) -> Result<Vec<DiscordChannel>, DiscordError>;
}

/// Builds Discord clients on demand.
///
/// Job managers construct a fresh client per task (and per live-channel
/// lookup); going through a provider keeps that constructible in tests.
pub trait DiscordClientProvider: Send + Sync {
    /// Whether a credential is configured at all.
    fn has_token(&self) -> bool;

    /// Construct a client, failing when no credential is configured.
    fn client(&self) -> Result<Arc<dyn DiscordClient>, AppError>;
}

/// Provider backed by the configured bot token and the REST client.
pub struct RestClientProvider {
    token: String,
}

impl RestClientProvider {
    pub fn new(token: String) -> Self {
        Self { token }
    }
}

impl DiscordClientProvider for RestClientProvider {
    fn has_token(&self) -> bool {
        !self.token.is_empty()
    }

    fn client(&self) -> Result<Arc<dyn DiscordClient>, AppError> {
        if self.token.is_empty() {
            return Err(AppError::Config("DISCORD_TOKEN is not set".into()));
        }
        Ok(Arc::new(RestDiscordClient::new(self.token.clone())))
    }
}
