//! Guild Scraper
//!
//! Traverses a guild's channels and threads, pages message history via
//! snowflake cursors, and writes through the repositories on the active
//! store. The scraper is incremental: each channel remembers the highest
//! message snowflake it has archived and later runs resume from there.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::AnyPool;

use crate::application::jobs::CancelSignal;
use crate::domain::{
    Attachment, Channel, ChannelRepository, DownloadState, Guild, GuildRepository, Message,
    Reaction, User,
};
use crate::infrastructure::discord::{
    DiscordAttachment, DiscordChannel, DiscordClient, DiscordGuild, DiscordMessage,
    DiscordReaction, DiscordUser, MessageCursor, ThreadKind,
};
use crate::infrastructure::repositories::{
    SqlAttachmentRepository, SqlChannelRepository, SqlGuildRepository, SqlMessageRepository,
    SqlReactionRepository, SqlUserRepository,
};
use crate::shared::error::AppError;
use crate::shared::snowflake;

/// What and how to scrape.
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    /// Target guild
    pub guild_id: i64,
    /// Explicit channel subset; `None` traverses the full guild
    pub channel_ids: Option<Vec<i64>>,
    /// Commit granularity; the API caps each request at 100 regardless
    pub batch_size: usize,
    /// Delay between history requests to smooth rate limits
    pub request_delay: Duration,
}

/// Terminal result of one scrape run.
///
/// `errors` holds non-fatal per-channel and per-reaction warnings; fatal
/// failures (authentication, store loss) are raised instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeSummary {
    pub channels_scraped: u64,
    pub messages_added: u64,
    pub attachments_added: u64,
    pub errors: Vec<String>,
}

/// Cumulative progress emitted after each top-level channel completes.
#[derive(Debug, Clone)]
pub struct ScrapeProgressEvent {
    pub current_channel: String,
    pub channels_done: u64,
    pub channels_total: u64,
    pub messages_scraped: u64,
    pub attachments_found: u64,
    pub errors: Vec<String>,
}

/// Incremental guild scraper bound to one Discord client and one store.
pub struct Scraper {
    discord: Arc<dyn DiscordClient>,
    pool: AnyPool,
    options: ScrapeOptions,
}

impl Scraper {
    pub fn new(discord: Arc<dyn DiscordClient>, pool: AnyPool, options: ScrapeOptions) -> Self {
        Self {
            discord,
            pool,
            options,
        }
    }

    /// Run the traversal to completion, cancellation, or fatal error.
    ///
    /// The cancellation signal is checked between channels and between
    /// pages; a cancelled run keeps everything written so far.
    pub async fn run(
        &self,
        cancel: &CancelSignal,
        on_progress: &(dyn Fn(ScrapeProgressEvent) + Send + Sync),
    ) -> Result<ScrapeSummary, AppError> {
        let mut summary = ScrapeSummary::default();

        let guild = self.discord.get_guild(self.options.guild_id).await?;
        self.archive_guild(&guild).await?;

        let all_channels = self.discord.get_guild_channels(self.options.guild_id).await?;
        let targets = self.select_targets(&all_channels, &mut summary);

        let channels_total = targets.len() as u64;
        let mut channels_done = 0u64;
        let mut seen_threads: HashSet<i64> = HashSet::new();

        for channel in &targets {
            if cancel.is_cancelled() {
                break;
            }
            self.scrape_channel(channel, &mut summary, cancel).await;

            if channel.kind().has_threads() {
                self.scrape_threads(channel, &mut seen_threads, &mut summary, cancel)
                    .await;
            }

            channels_done += 1;
            on_progress(ScrapeProgressEvent {
                current_channel: channel.display_name(),
                channels_done,
                channels_total,
                messages_scraped: summary.messages_added,
                attachments_found: summary.attachments_added,
                errors: summary.errors.clone(),
            });
        }

        if !cancel.is_cancelled() {
            let guild_repo = SqlGuildRepository::new(self.pool.clone());
            guild_repo.record_scrape(self.options.guild_id, Utc::now()).await?;
        }

        Ok(summary)
    }

    /// Upsert the guild row, carrying over scrape bookkeeping from any
    /// existing row so that metadata refreshes never reset counters.
    async fn archive_guild(&self, guild: &DiscordGuild) -> Result<(), AppError> {
        let repo = SqlGuildRepository::new(self.pool.clone());
        let existing = repo.get(guild.id).await?;
        let now = Utc::now();

        let entity = Guild {
            id: guild.id,
            name: guild.name.clone(),
            owner_id: guild.owner_id.unwrap_or(0),
            member_count: guild.effective_member_count(),
            first_scraped_at: existing.as_ref().and_then(|g| g.first_scraped_at),
            last_scraped_at: existing.as_ref().and_then(|g| g.last_scraped_at),
            scrape_count: existing.as_ref().map_or(0, |g| g.scrape_count),
            created_at: existing.as_ref().map_or(now, |g| g.created_at),
            updated_at: now,
        };
        repo.upsert(&entity).await?;
        Ok(())
    }

    /// Resolve the channel set to traverse. Categories are never
    /// traversed; in selective mode unknown ids become warnings.
    fn select_targets(
        &self,
        all_channels: &[DiscordChannel],
        summary: &mut ScrapeSummary,
    ) -> Vec<DiscordChannel> {
        match &self.options.channel_ids {
            None => all_channels
                .iter()
                .filter(|c| c.kind().is_scrapeable())
                .cloned()
                .collect(),
            Some(ids) => {
                let mut targets = Vec::with_capacity(ids.len());
                for id in ids {
                    match all_channels.iter().find(|c| c.id == *id) {
                        Some(channel) if channel.kind().is_scrapeable() => {
                            targets.push(channel.clone());
                        }
                        Some(_) => summary
                            .errors
                            .push(format!("channel {} is a category, skipped", id)),
                        None => summary.errors.push(format!(
                            "channel {} not found in guild {}",
                            id, self.options.guild_id
                        )),
                    }
                }
                targets
            }
        }
    }

    /// Enumerate and scrape the threads of a text or forum channel,
    /// active listing first, deduplicated across listings for this run.
    async fn scrape_threads(
        &self,
        parent: &DiscordChannel,
        seen_threads: &mut HashSet<i64>,
        summary: &mut ScrapeSummary,
        cancel: &CancelSignal,
    ) {
        for kind in ThreadKind::ALL {
            if cancel.is_cancelled() {
                return;
            }
            let threads = match self.discord.list_threads(parent.id, kind).await {
                Ok(threads) => threads,
                Err(e) => {
                    summary.errors.push(format!(
                        "thread listing {} for channel {} failed: {}",
                        kind.as_str(),
                        parent.id,
                        e
                    ));
                    continue;
                }
            };
            for thread in threads {
                if cancel.is_cancelled() {
                    return;
                }
                if !seen_threads.insert(thread.id) {
                    continue;
                }
                self.scrape_channel(&thread, summary, cancel).await;
            }
        }
    }

    /// Scrape one channel, downgrading its failure to a warning so the
    /// rest of the traversal continues.
    async fn scrape_channel(
        &self,
        channel: &DiscordChannel,
        summary: &mut ScrapeSummary,
        cancel: &CancelSignal,
    ) {
        if let Err(e) = self.scrape_channel_inner(channel, summary, cancel).await {
            summary.errors.push(format!(
                "channel {} ({}): {}",
                channel.display_name(),
                channel.id,
                e
            ));
        }
    }

    async fn scrape_channel_inner(
        &self,
        channel: &DiscordChannel,
        summary: &mut ScrapeSummary,
        cancel: &CancelSignal,
    ) -> Result<(), AppError> {
        let channel_repo = SqlChannelRepository::new(self.pool.clone());
        let existing = channel_repo.get(channel.id).await?;
        let entity = channel_entity(channel, self.options.guild_id, existing.as_ref());
        channel_repo.upsert(&entity).await?;

        // Incremental channels page forward from the high-water mark;
        // fresh channels page backward from the newest message.
        let forward = entity.last_message_id.is_some();
        let mut cursor = match entity.last_message_id {
            Some(id) => MessageCursor::After(id),
            None => MessageCursor::Latest,
        };
        let page_size = self.options.batch_size.clamp(1, 100) as u8;

        let mut new_messages = 0i64;
        let mut new_attachments = 0i64;
        let mut min_id: Option<i64> = None;
        let mut max_id: Option<i64> = None;
        let mut first_request = true;

        loop {
            if cancel.is_cancelled() {
                break;
            }
            if !first_request {
                tokio::time::sleep(self.options.request_delay).await;
            }
            first_request = false;

            let mut page = self
                .discord
                .get_channel_messages(channel.id, cursor, page_size)
                .await?;
            if page.is_empty() {
                break;
            }

            // Normalize to emitted order: oldest-first when incremental,
            // newest-first on the initial backward pull.
            if forward {
                page.sort_by_key(|m| m.id);
            } else {
                page.sort_by_key(|m| std::cmp::Reverse(m.id));
            }

            let page_len = page.len();
            for message in &page {
                self.archive_message(message, channel.id, summary).await?;
                new_messages += 1;
                new_attachments += message.attachments.len() as i64;
                min_id = Some(min_id.map_or(message.id, |m| m.min(message.id)));
                max_id = Some(max_id.map_or(message.id, |m| m.max(message.id)));
            }

            cursor = if forward {
                MessageCursor::After(max_id.unwrap_or(0))
            } else {
                MessageCursor::Before(min_id.unwrap_or(0))
            };
            if page_len < page_size as usize {
                break;
            }
        }

        summary.channels_scraped += 1;
        summary.messages_added += new_messages as u64;
        summary.attachments_added += new_attachments as u64;

        if cancel.is_cancelled() {
            // The channel did not complete; leave its high-water mark
            // untouched so the next run re-covers the gap.
            return Ok(());
        }

        tracing::debug!(
            channel_id = channel.id,
            new_messages,
            min_id = ?min_id,
            max_id = ?max_id,
            "channel history pull finished"
        );

        match max_id {
            Some(max) if new_messages > 0 => {
                channel_repo
                    .record_scrape_result(channel.id, max, new_messages, Utc::now())
                    .await?
            }
            _ => channel_repo.mark_scraped(channel.id, Utc::now()).await?,
        }
        Ok(())
    }

    /// Archive one message: author, message and attachments commit as one
    /// work unit, then each reaction commits on its own so a malformed
    /// reaction cannot poison the batch.
    async fn archive_message(
        &self,
        message: &DiscordMessage,
        channel_id: i64,
        summary: &mut ScrapeSummary,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        let author = user_entity(&message.author, now);
        let entity = message_entity(message, channel_id, now);

        let mut tx = self.pool.begin().await?;
        SqlUserRepository::upsert_with(&mut *tx, &author).await?;
        SqlMessageRepository::upsert_with(&mut *tx, &entity).await?;
        for attachment in &message.attachments {
            let attachment = attachment_entity(attachment, message.id, now);
            SqlAttachmentRepository::upsert_with(&mut *tx, &attachment).await?;
        }
        tx.commit().await?;

        for reaction in message.reactions.as_deref().unwrap_or_default() {
            let reaction = reaction_entity(reaction, message.id, now);
            let written: Result<(), sqlx::Error> = async {
                let mut tx = self.pool.begin().await?;
                SqlReactionRepository::upsert_with(&mut *tx, &reaction).await?;
                tx.commit().await
            }
            .await;
            if let Err(e) = written {
                summary.errors.push(format!(
                    "reaction {:?} on message {}: {}",
                    reaction.emoji_name, message.id, e
                ));
            }
        }
        Ok(())
    }
}

/// Build the channel entity for upsert, carrying scrape bookkeeping over
/// from the persisted row.
pub(crate) fn channel_entity(
    channel: &DiscordChannel,
    guild_id: i64,
    existing: Option<&Channel>,
) -> Channel {
    let now = Utc::now();
    Channel {
        id: channel.id,
        guild_id: channel.guild_id.unwrap_or(guild_id),
        name: channel.display_name(),
        kind: channel.kind(),
        topic: channel.topic.clone(),
        position: channel.position.unwrap_or_else(|| existing.map_or(0, |c| c.position)),
        parent_id: channel.parent_id,
        message_count: existing.map_or(0, |c| c.message_count),
        last_scraped_at: existing.and_then(|c| c.last_scraped_at),
        last_message_id: existing.and_then(|c| c.last_message_id),
        created_at: existing.map_or(now, |c| c.created_at),
        updated_at: now,
    }
}

/// Build the user entity for a message author.
pub(crate) fn user_entity(user: &DiscordUser, now: DateTime<Utc>) -> User {
    User {
        id: user.id,
        username: user.username.clone(),
        discriminator: user.discriminator.clone().unwrap_or_else(|| "0".to_string()),
        display_name: user.global_name.clone(),
        avatar_url: user.avatar_url(),
        bot: user.bot.unwrap_or(false),
        created_at: now,
        updated_at: now,
    }
}

/// Build the message entity. Embeds are re-encoded as one canonical JSON
/// array; the sent timestamp falls back to the snowflake's embedded time
/// when the wire value does not parse.
pub(crate) fn message_entity(message: &DiscordMessage, channel_id: i64, now: DateTime<Utc>) -> Message {
    let sent_at = DateTime::parse_from_rfc3339(&message.timestamp)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| snowflake::created_at(message.id));
    let edited_at = message
        .edited_timestamp
        .as_deref()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|dt| dt.with_timezone(&Utc));
    let embeds_json =
        serde_json::to_string(&message.embeds).unwrap_or_else(|_| "[]".to_string());

    Message {
        id: message.id,
        channel_id,
        author_id: message.author.id,
        content: message.content.clone(),
        clean_content: message.clean_content(),
        sent_at,
        edited_at,
        pinned: message.pinned,
        tts: message.tts,
        mention_everyone: message.mention_everyone,
        embeds_json,
        reference_id: message.message_reference.as_ref().and_then(|r| r.message_id),
        created_at: now,
        updated_at: now,
    }
}

/// Build an attachment entity in the `pending` download state.
pub(crate) fn attachment_entity(
    attachment: &DiscordAttachment,
    message_id: i64,
    now: DateTime<Utc>,
) -> Attachment {
    Attachment {
        id: attachment.id,
        message_id,
        filename: attachment.filename.clone(),
        content_type: attachment.content_type.clone(),
        size: attachment.size,
        remote_url: attachment.url.clone(),
        proxy_url: attachment.proxy_url.clone(),
        width: attachment.width,
        height: attachment.height,
        local_path: None,
        download_state: DownloadState::Pending,
        created_at: now,
        updated_at: now,
    }
}

/// Build a reaction entity; Unicode emoji normalize to `emoji_id = 0`.
pub(crate) fn reaction_entity(
    reaction: &DiscordReaction,
    message_id: i64,
    now: DateTime<Utc>,
) -> Reaction {
    Reaction {
        message_id,
        emoji_id: reaction.emoji.id.unwrap_or(0),
        emoji_name: reaction.emoji.name.clone().unwrap_or_default(),
        emoji_animated: reaction.emoji.animated.unwrap_or(false),
        count: reaction.count,
        created_at: now,
        updated_at: now,
    }
}
