//! Response DTOs
//!
//! Data structures for API response bodies. Snowflakes serialize as
//! strings (JavaScript clients cannot hold them as numbers) and
//! timestamps as RFC 3339.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::application::jobs::{DownloadJob, ScrapeJob, TransferJob};
use crate::domain::{Attachment, Channel, ChannelAttachment, Guild, Message, User};
use crate::infrastructure::database::SourceDescription;

/// Guild response
#[derive(Debug, Serialize)]
pub struct GuildResponse {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub member_count: i64,
    pub first_scraped_at: Option<String>,
    pub last_scraped_at: Option<String>,
    pub scrape_count: i64,
    pub created_at: String,
}

impl From<Guild> for GuildResponse {
    fn from(guild: Guild) -> Self {
        Self {
            id: guild.id.to_string(),
            name: guild.name,
            owner_id: guild.owner_id.to_string(),
            member_count: guild.member_count,
            first_scraped_at: guild.first_scraped_at.map(|t| t.to_rfc3339()),
            last_scraped_at: guild.last_scraped_at.map(|t| t.to_rfc3339()),
            scrape_count: guild.scrape_count,
            created_at: guild.created_at.to_rfc3339(),
        }
    }
}

/// Channel response; also the per-channel shape of the channel-selector.
#[derive(Debug, Serialize)]
pub struct ChannelResponse {
    pub id: String,
    pub guild_id: String,
    pub name: String,
    pub kind: String,
    pub topic: Option<String>,
    pub position: i64,
    pub parent_id: Option<String>,
    pub message_count: i64,
    pub last_scraped_at: Option<String>,
    pub last_message_id: Option<String>,
}

impl From<Channel> for ChannelResponse {
    fn from(channel: Channel) -> Self {
        Self {
            id: channel.id.to_string(),
            guild_id: channel.guild_id.to_string(),
            name: channel.name,
            kind: channel.kind.as_str().to_string(),
            topic: channel.topic,
            position: channel.position,
            parent_id: channel.parent_id.map(|id| id.to_string()),
            message_count: channel.message_count,
            last_scraped_at: channel.last_scraped_at.map(|t| t.to_rfc3339()),
            last_message_id: channel.last_message_id.map(|id| id.to_string()),
        }
    }
}

/// User response
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub discriminator: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bot: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username,
            discriminator: user.discriminator,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            bot: user.bot,
        }
    }
}

/// Message response. The stored embed encoding is decoded back into a
/// JSON array for clients.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: String,
    pub channel_id: String,
    pub author_id: String,
    pub content: String,
    pub clean_content: String,
    pub sent_at: String,
    pub edited_at: Option<String>,
    pub pinned: bool,
    pub tts: bool,
    pub mention_everyone: bool,
    pub embeds: serde_json::Value,
    pub reference_id: Option<String>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        let embeds = serde_json::from_str(&message.embeds_json)
            .unwrap_or(serde_json::Value::Array(vec![]));
        Self {
            id: message.id.to_string(),
            channel_id: message.channel_id.to_string(),
            author_id: message.author_id.to_string(),
            content: message.content,
            clean_content: message.clean_content,
            sent_at: message.sent_at.to_rfc3339(),
            edited_at: message.edited_at.map(|t| t.to_rfc3339()),
            pinned: message.pinned,
            tts: message.tts,
            mention_everyone: message.mention_everyone,
            embeds,
            reference_id: message.reference_id.map(|id| id.to_string()),
        }
    }
}

/// Attachment response
#[derive(Debug, Serialize)]
pub struct AttachmentResponse {
    pub id: String,
    pub message_id: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub size: i64,
    pub remote_url: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub local_path: Option<String>,
    pub download_state: String,
}

impl From<Attachment> for AttachmentResponse {
    fn from(attachment: Attachment) -> Self {
        Self {
            id: attachment.id.to_string(),
            message_id: attachment.message_id.to_string(),
            filename: attachment.filename,
            content_type: attachment.content_type,
            size: attachment.size,
            remote_url: attachment.remote_url,
            width: attachment.width,
            height: attachment.height,
            local_path: attachment.local_path,
            download_state: attachment.download_state.as_str().to_string(),
        }
    }
}

/// Gallery image response (attachment plus owning channel)
#[derive(Debug, Serialize)]
pub struct GalleryImageResponse {
    pub channel_id: String,
    #[serde(flatten)]
    pub attachment: AttachmentResponse,
}

impl From<ChannelAttachment> for GalleryImageResponse {
    fn from(joined: ChannelAttachment) -> Self {
        Self {
            channel_id: joined.channel_id.to_string(),
            attachment: AttachmentResponse::from(joined.attachment),
        }
    }
}

/// `GET /api/scrape/status`
#[derive(Debug, Serialize)]
pub struct ScrapeStatusResponse {
    pub busy: bool,
    pub current_job: Option<ScrapeJob>,
    pub has_token: bool,
}

/// `GET /api/scrape/history`
#[derive(Debug, Serialize)]
pub struct ScrapeHistoryResponse {
    pub jobs: Vec<ScrapeJob>,
}

/// `POST /api/{scrape,downloads,transfer}/cancel`
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub message: String,
}

/// `GET /api/downloads/job`; `idle` when no job has run yet
#[derive(Debug, Serialize)]
pub struct DownloadJobResponse {
    pub busy: bool,
    pub job: Option<DownloadJob>,
}

/// `GET /api/transfer/status`; `idle` when no job has run yet
#[derive(Debug, Serialize)]
pub struct TransferStatusResponse {
    pub busy: bool,
    pub job: Option<TransferJob>,
}

/// `GET /api/scrape/guilds/{id}/channels`
#[derive(Debug, Serialize)]
pub struct ScrapeableChannelsResponse {
    pub guild_id: String,
    pub guild_name: Option<String>,
    pub channels: Vec<ChannelResponse>,
    pub total: usize,
}

/// Per-source entry of the `/api/datasource` response
#[derive(Debug, Serialize)]
pub struct DataSourceEntry {
    pub label: String,
    pub detail: String,
    pub available: bool,
}

/// `GET /api/datasource`
#[derive(Debug, Serialize)]
pub struct DataSourcesResponse {
    pub active: String,
    pub sources: BTreeMap<String, DataSourceEntry>,
}

impl DataSourcesResponse {
    pub fn new(active: String, descriptions: Vec<SourceDescription>) -> Self {
        let sources = descriptions
            .into_iter()
            .map(|d| {
                (
                    d.name,
                    DataSourceEntry {
                        label: d.label,
                        detail: d.detail,
                        available: d.available,
                    },
                )
            })
            .collect();
        Self { active, sources }
    }
}

/// `GET /api/stats`
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub guilds: i64,
    pub channels: i64,
    pub users: i64,
    pub messages: i64,
    pub attachments: i64,
    pub reactions: i64,
}
