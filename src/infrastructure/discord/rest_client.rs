//! Discord REST client.
//!
//! Speaks the plain HTTP API with a bot token. Rate limiting is handled
//! here and nowhere else: a 429 sleeps for the advertised `retry_after`
//! and retries, bounded.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::types::{DiscordChannel, DiscordGuild, DiscordMessage, DiscordUser, ThreadListing};
use super::{DiscordClient, DiscordError, MessageCursor, ThreadKind};

/// Discord API base URL
const API_URL: &str = "https://discord.com/api/v10";

/// How many consecutive 429s to absorb before giving up on a request.
const MAX_RATE_LIMIT_RETRIES: u32 = 5;

/// Body shape of a 429 response.
#[derive(Debug, Deserialize)]
struct RateLimitBody {
    #[serde(default)]
    retry_after: Option<f64>,
}

/// REST implementation of the Discord capability.
pub struct RestDiscordClient {
    http: reqwest::Client,
    token: String,
}

impl RestDiscordClient {
    /// Creates a client authenticating with the given bot token.
    pub fn new(token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, DiscordError> {
        let url = format!("{}/{}", API_URL, path);
        let mut rate_limit_hits = 0;

        loop {
            let response = self
                .http
                .get(&url)
                .query(query)
                .header("Authorization", format!("Bot {}", self.token))
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .json::<RateLimitBody>()
                    .await
                    .ok()
                    .and_then(|b| b.retry_after)
                    .unwrap_or(1.0);
                rate_limit_hits += 1;
                if rate_limit_hits > MAX_RATE_LIMIT_RETRIES {
                    return Err(DiscordError::RateLimited {
                        retry_after_secs: retry_after,
                    });
                }
                tracing::warn!(
                    path = %path,
                    retry_after_secs = retry_after,
                    "Rate limited by Discord, backing off"
                );
                tokio::time::sleep(std::time::Duration::from_secs_f64(retry_after)).await;
                continue;
            }

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                let body = response.text().await.unwrap_or_default();
                return Err(DiscordError::Unauthorized(body));
            }
            if status == StatusCode::NOT_FOUND {
                return Err(DiscordError::NotFound(path.to_string()));
            }
            if status.is_client_error() || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                return Err(DiscordError::Api {
                    status: status.as_u16(),
                    body,
                });
            }

            return Ok(response.json::<T>().await?);
        }
    }
}

#[async_trait]
impl DiscordClient for RestDiscordClient {
    async fn login(&self) -> Result<DiscordUser, DiscordError> {
        self.get_json("users/@me", &[]).await
    }

    async fn get_guild(&self, guild_id: i64) -> Result<DiscordGuild, DiscordError> {
        self.get_json(
            &format!("guilds/{}", guild_id),
            &[("with_counts", "true".to_string())],
        )
        .await
    }

    async fn get_guild_channels(
        &self,
        guild_id: i64,
    ) -> Result<Vec<DiscordChannel>, DiscordError> {
        self.get_json(&format!("guilds/{}/channels", guild_id), &[]).await
    }

    async fn get_channel_messages(
        &self,
        channel_id: i64,
        cursor: MessageCursor,
        limit: u8,
    ) -> Result<Vec<DiscordMessage>, DiscordError> {
        let mut query = vec![("limit", limit.min(100).to_string())];
        match cursor {
            MessageCursor::Latest => {}
            MessageCursor::Before(id) => query.push(("before", id.to_string())),
            MessageCursor::After(id) => query.push(("after", id.to_string())),
        }
        self.get_json(&format!("channels/{}/messages", channel_id), &query)
            .await
    }

    async fn list_threads(
        &self,
        channel_id: i64,
        kind: ThreadKind,
    ) -> Result<Vec<DiscordChannel>, DiscordError> {
        let path = match kind {
            ThreadKind::Active => format!("channels/{}/threads/active", channel_id),
            ThreadKind::ArchivedPublic => {
                format!("channels/{}/threads/archived/public", channel_id)
            }
            ThreadKind::ArchivedPrivate => {
                format!("channels/{}/threads/archived/private", channel_id)
            }
        };
        let listing: ThreadListing = self.get_json(&path, &[]).await?;
        Ok(listing.threads)
    }
}
