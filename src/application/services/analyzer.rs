//! Guild Freshness Analyzer
//!
//! Classifies a guild's channels by scrape state so the UI can pre-select
//! what is worth re-scraping. Persisted channel rows are merged with a
//! point-in-time live channel listing when one is available; without a
//! live listing the classification degrades to what the store alone can
//! prove.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::AnyPool;

use crate::domain::{Channel, ChannelKind, ChannelRepository};
use crate::infrastructure::discord::DiscordChannel;
use crate::infrastructure::repositories::SqlChannelRepository;
use crate::shared::error::AppError;

/// Scrape-state classification of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Present live but not in the store
    New,
    /// The live head has moved past what is archived
    HasNewMessages,
    /// The archive matches the live head (or no live data contradicts it)
    UpToDate,
    /// Persisted but never traversed
    NeverScraped,
}

impl ChannelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::HasNewMessages => "has_new_messages",
            Self::UpToDate => "up_to_date",
            Self::NeverScraped => "never_scraped",
        }
    }
}

/// One classified channel.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelFreshness {
    #[serde(with = "crate::shared::snowflake::serde_string")]
    pub channel_id: i64,
    pub name: String,
    pub kind: ChannelKind,
    pub parent_name: Option<String>,
    pub position: i64,
    pub status: ChannelStatus,
    pub archived_message_count: i64,
    pub last_scraped_at: Option<DateTime<Utc>>,
}

/// Histogram over the classification states.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FreshnessSummary {
    pub new: u64,
    pub has_new_messages: u64,
    pub up_to_date: u64,
    pub never_scraped: u64,
}

impl FreshnessSummary {
    fn record(&mut self, status: ChannelStatus) {
        match status {
            ChannelStatus::New => self.new += 1,
            ChannelStatus::HasNewMessages => self.has_new_messages += 1,
            ChannelStatus::UpToDate => self.up_to_date += 1,
            ChannelStatus::NeverScraped => self.never_scraped += 1,
        }
    }
}

/// Full analyzer output for one guild.
#[derive(Debug, Clone, Serialize)]
pub struct GuildAnalysis {
    #[serde(with = "crate::shared::snowflake::serde_string")]
    pub guild_id: i64,
    pub live_data: bool,
    pub channels: Vec<ChannelFreshness>,
    pub summary: FreshnessSummary,
}

/// Classify a live channel against its persisted row, if any.
fn classify_live(persisted: Option<&Channel>, live: &DiscordChannel) -> ChannelStatus {
    match persisted {
        None => ChannelStatus::New,
        Some(channel) => {
            if channel.last_scraped_at.is_none() {
                return ChannelStatus::NeverScraped;
            }
            match (channel.last_message_id, live.last_message_id) {
                (Some(archived), Some(head)) if archived < head => ChannelStatus::HasNewMessages,
                (None, Some(_)) => ChannelStatus::HasNewMessages,
                _ => ChannelStatus::UpToDate,
            }
        }
    }
}

/// Classify a persisted channel with no live counterpart.
fn classify_persisted(channel: &Channel) -> ChannelStatus {
    if channel.last_scraped_at.is_some() {
        ChannelStatus::UpToDate
    } else {
        ChannelStatus::NeverScraped
    }
}

/// Produce the per-channel classification for a guild.
///
/// `live` is the optional point-in-time channel listing; pass `None` when
/// Discord is unreachable and only store-derived states are emitted.
pub async fn analyze_guild(
    pool: &AnyPool,
    guild_id: i64,
    live: Option<Vec<DiscordChannel>>,
) -> Result<GuildAnalysis, AppError> {
    let channel_repo = SqlChannelRepository::new(pool.clone());
    let persisted = channel_repo.list_by_guild(guild_id).await?;

    let names_by_id: HashMap<i64, String> =
        persisted.iter().map(|c| (c.id, c.name.clone())).collect();
    let mut persisted_by_id: HashMap<i64, Channel> =
        persisted.into_iter().map(|c| (c.id, c)).collect();

    let mut summary = FreshnessSummary::default();
    let mut channels = Vec::new();
    let live_data = live.is_some();

    if let Some(live_channels) = live {
        let live_names: HashMap<i64, String> = live_channels
            .iter()
            .map(|c| (c.id, c.display_name()))
            .collect();

        for live_channel in &live_channels {
            if live_channel.kind().is_category() {
                continue;
            }
            let persisted = persisted_by_id.remove(&live_channel.id);
            let status = classify_live(persisted.as_ref(), live_channel);
            summary.record(status);

            let parent_name = live_channel.parent_id.and_then(|id| {
                names_by_id
                    .get(&id)
                    .or_else(|| live_names.get(&id))
                    .cloned()
            });
            channels.push(ChannelFreshness {
                channel_id: live_channel.id,
                name: live_channel.display_name(),
                kind: live_channel.kind(),
                parent_name,
                position: live_channel
                    .position
                    .or(persisted.as_ref().map(|c| c.position))
                    .unwrap_or(0),
                status,
                archived_message_count: persisted.as_ref().map_or(0, |c| c.message_count),
                last_scraped_at: persisted.as_ref().and_then(|c| c.last_scraped_at),
            });
        }
    }

    // Whatever remains was not observed live (or no live data exists);
    // only store-derived states apply.
    let mut leftover: Vec<Channel> = persisted_by_id.into_values().collect();
    leftover.sort_by_key(|c| c.id);
    for channel in leftover {
        if channel.kind.is_category() {
            continue;
        }
        let status = classify_persisted(&channel);
        summary.record(status);
        let parent_name = channel.parent_id.and_then(|id| names_by_id.get(&id).cloned());
        channels.push(ChannelFreshness {
            channel_id: channel.id,
            name: channel.name.clone(),
            kind: channel.kind,
            parent_name,
            position: channel.position,
            status,
            archived_message_count: channel.message_count,
            last_scraped_at: channel.last_scraped_at,
        });
    }

    channels.sort_by_key(|c| (c.position, c.channel_id));

    Ok(GuildAnalysis {
        guild_id,
        live_data,
        channels,
        summary,
    })
}
