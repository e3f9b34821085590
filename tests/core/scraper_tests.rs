//! Scraper end-to-end tests against the scripted Discord client and an
//! in-memory store.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use guild_archiver::application::jobs::CancelSignal;
use guild_archiver::application::services::{ScrapeOptions, Scraper};
use guild_archiver::domain::{
    AttachmentRepository, ChannelKind, ChannelRepository, GuildRepository, MessagePage,
    MessageRepository, ReactionRepository, UserRepository,
};
use guild_archiver::infrastructure::repositories::{
    SqlAttachmentRepository, SqlChannelRepository, SqlGuildRepository, SqlMessageRepository,
    SqlReactionRepository, SqlUserRepository,
};

use crate::common::*;

fn options(guild_id: i64, channel_ids: Option<Vec<i64>>) -> ScrapeOptions {
    ScrapeOptions {
        guild_id,
        channel_ids,
        batch_size: 1000,
        request_delay: Duration::from_millis(0),
    }
}

fn scripted_guild() -> Arc<ScriptedDiscordClient> {
    Arc::new(ScriptedDiscordClient::with_guild(wire_guild(1, "archive-me")))
}

async fn run_scraper(
    discord: &Arc<ScriptedDiscordClient>,
    pool: &sqlx::AnyPool,
    channel_ids: Option<Vec<i64>>,
) -> guild_archiver::application::services::ScrapeSummary {
    let scraper = Scraper::new(discord.clone(), pool.clone(), options(1, channel_ids));
    scraper
        .run(&CancelSignal::new(), &|_| {})
        .await
        .expect("scrape run")
}

#[tokio::test]
async fn fresh_scrape_archives_guild_channel_and_messages() {
    let discord = scripted_guild();
    discord.add_channel(wire_channel(2, 1, "general", 0));
    for id in [3, 4, 5] {
        discord.add_message(wire_message(id, 2, wire_user(7, "author"), "hello"));
    }
    let pool = test_pool().await;

    let summary = run_scraper(&discord, &pool, None).await;
    assert_eq!(summary.channels_scraped, 1);
    assert_eq!(summary.messages_added, 3);
    assert!(summary.errors.is_empty());

    let guild = SqlGuildRepository::new(pool.clone()).get(1).await.unwrap().unwrap();
    assert_eq!(guild.scrape_count, 1);
    assert!(guild.first_scraped_at.is_some());
    assert!(guild.last_scraped_at.is_some());

    let channel = SqlChannelRepository::new(pool.clone()).get(2).await.unwrap().unwrap();
    assert_eq!(channel.kind, ChannelKind::Text);
    assert_eq!(channel.last_message_id, Some(5));
    assert_eq!(channel.message_count, 3);
    assert!(channel.last_scraped_at.is_some());

    let messages = SqlMessageRepository::new(pool.clone())
        .list_by_channel(2, MessagePage { after: Some(0), before: None, limit: 10 })
        .await
        .unwrap();
    let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![3, 4, 5]);

    let author = SqlUserRepository::new(pool).get(7).await.unwrap();
    assert!(author.is_some());
}

#[tokio::test]
async fn incremental_scrape_picks_up_only_new_messages() {
    let discord = scripted_guild();
    discord.add_channel(wire_channel(2, 1, "general", 0));
    for id in [3, 4, 5] {
        discord.add_message(wire_message(id, 2, wire_user(7, "author"), "hello"));
    }
    let pool = test_pool().await;
    run_scraper(&discord, &pool, None).await;

    for id in [6, 7] {
        discord.add_message(wire_message(id, 2, wire_user(7, "author"), "more"));
    }
    let summary = run_scraper(&discord, &pool, None).await;
    assert_eq!(summary.messages_added, 2);

    let channel = SqlChannelRepository::new(pool.clone()).get(2).await.unwrap().unwrap();
    assert_eq!(channel.last_message_id, Some(7));
    assert_eq!(channel.message_count, 5);

    let guild = SqlGuildRepository::new(pool).get(1).await.unwrap().unwrap();
    assert_eq!(guild.scrape_count, 2);
}

#[tokio::test]
async fn repeat_scrape_without_new_activity_is_idempotent() {
    let discord = scripted_guild();
    discord.add_channel(wire_channel(2, 1, "general", 0));
    for id in [3, 4, 5] {
        discord.add_message(wire_message(id, 2, wire_user(7, "author"), "hello"));
    }
    let pool = test_pool().await;
    run_scraper(&discord, &pool, None).await;
    let first = SqlChannelRepository::new(pool.clone()).get(2).await.unwrap().unwrap();

    let summary = run_scraper(&discord, &pool, None).await;
    assert_eq!(summary.messages_added, 0);

    let channel = SqlChannelRepository::new(pool.clone()).get(2).await.unwrap().unwrap();
    assert_eq!(channel.last_message_id, Some(5));
    assert_eq!(channel.message_count, 3);
    // A no-new-messages traversal still refreshes last_scraped_at.
    assert!(channel.last_scraped_at >= first.last_scraped_at);

    let count = SqlMessageRepository::new(pool).count_by_channel(2).await.unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn selective_scrape_only_touches_requested_channels() {
    let discord = scripted_guild();
    for channel_id in 10..15 {
        discord.add_channel(wire_channel(channel_id, 1, &format!("ch-{}", channel_id), 0));
        discord.add_message(wire_message(
            channel_id * 100,
            channel_id,
            wire_user(7, "author"),
            "hi",
        ));
    }
    let pool = test_pool().await;

    let summary = run_scraper(&discord, &pool, Some(vec![10, 11])).await;
    assert_eq!(summary.channels_scraped, 2);
    assert_eq!(summary.messages_added, 2);

    let repo = SqlMessageRepository::new(pool);
    assert_eq!(repo.count_by_channel(10).await.unwrap(), 1);
    assert_eq!(repo.count_by_channel(11).await.unwrap(), 1);
    assert_eq!(repo.count_by_channel(12).await.unwrap(), 0);
}

#[tokio::test]
async fn empty_channel_completes_without_high_water_mark() {
    let discord = scripted_guild();
    discord.add_channel(wire_channel(9, 1, "quiet", 0));
    let pool = test_pool().await;

    let summary = run_scraper(&discord, &pool, None).await;
    assert_eq!(summary.channels_scraped, 1);
    assert_eq!(summary.messages_added, 0);

    let channel = SqlChannelRepository::new(pool).get(9).await.unwrap().unwrap();
    assert!(channel.last_scraped_at.is_some());
    assert_eq!(channel.last_message_id, None);
}

#[tokio::test]
async fn threads_are_scraped_once_across_listings() {
    let discord = scripted_guild();
    discord.add_channel(wire_channel(2, 1, "general", 0));
    // The same thread is reachable via the active and the archived
    // listing; it must be scraped exactly once.
    discord.add_thread(
        2,
        guild_archiver::infrastructure::discord::ThreadKind::Active,
        wire_thread(20, 1, 2, "thread"),
    );
    discord.add_thread(
        2,
        guild_archiver::infrastructure::discord::ThreadKind::ArchivedPublic,
        wire_thread(20, 1, 2, "thread"),
    );
    discord.add_message(wire_message(21, 20, wire_user(7, "author"), "in thread"));
    let pool = test_pool().await;

    let summary = run_scraper(&discord, &pool, None).await;
    assert_eq!(summary.channels_scraped, 2);
    assert_eq!(summary.messages_added, 1);

    let thread = SqlChannelRepository::new(pool.clone()).get(20).await.unwrap().unwrap();
    assert_eq!(thread.kind, ChannelKind::PublicThread);
    assert_eq!(thread.parent_id, Some(2));
    assert_eq!(
        SqlMessageRepository::new(pool).count_by_channel(20).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn malformed_reaction_is_isolated_per_row() {
    let discord = scripted_guild();
    discord.add_channel(wire_channel(2, 1, "general", 0));
    let mut message = wire_message(3, 2, wire_user(7, "author"), "reacted");
    // The middle reaction violates the count >= 1 constraint.
    message.reactions = Some(vec![
        wire_reaction("👍", 2),
        wire_reaction("💀", 0),
        wire_reaction("😎", 1),
    ]);
    discord.add_message(message);
    let pool = test_pool().await;

    let summary = run_scraper(&discord, &pool, None).await;
    assert!(!summary.errors.is_empty());
    assert!(summary.errors.iter().any(|e| e.contains("💀")));

    // The message and the two well-formed reactions persist.
    assert!(SqlMessageRepository::new(pool.clone()).get(3).await.unwrap().is_some());
    let reactions = SqlReactionRepository::new(pool).list_by_message(3).await.unwrap();
    assert_eq!(reactions.len(), 2);
}

#[tokio::test]
async fn attachments_are_archived_pending() {
    let discord = scripted_guild();
    discord.add_channel(wire_channel(2, 1, "general", 0));
    let mut message = wire_message(3, 2, wire_user(7, "author"), "with file");
    message.attachments = vec![wire_attachment(9001, "cat.png", Some("image/png"))];
    discord.add_message(message);
    let pool = test_pool().await;

    let summary = run_scraper(&discord, &pool, None).await;
    assert_eq!(summary.attachments_added, 1);

    let pending = SqlAttachmentRepository::new(pool).list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].channel_id, 2);
    assert_eq!(pending[0].attachment.id, 9001);
}

#[tokio::test]
async fn progress_callback_reports_cumulative_counts() {
    let discord = scripted_guild();
    discord.add_channel(wire_channel(2, 1, "one", 0));
    discord.add_channel(wire_channel(3, 1, "two", 0));
    discord.add_message(wire_message(30, 2, wire_user(7, "author"), "a"));
    discord.add_message(wire_message(31, 3, wire_user(7, "author"), "b"));
    let pool = test_pool().await;

    let events = Mutex::new(Vec::new());
    let scraper = Scraper::new(discord.clone(), pool, options(1, None));
    scraper
        .run(&CancelSignal::new(), &|event| events.lock().push(event))
        .await
        .unwrap();

    let events = events.into_inner();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].channels_total, 2);
    assert_eq!(events[1].channels_done, 2);
    assert_eq!(events[1].messages_scraped, 2);
}

#[tokio::test]
async fn cancelled_run_keeps_partial_state_and_skips_counters() {
    let discord = scripted_guild();
    discord.add_channel(wire_channel(2, 1, "general", 0));
    discord.add_message(wire_message(3, 2, wire_user(7, "author"), "hello"));
    let pool = test_pool().await;

    let cancel = CancelSignal::new();
    cancel.cancel();
    let scraper = Scraper::new(discord.clone(), pool.clone(), options(1, None));
    let summary = scraper.run(&cancel, &|_| {}).await.unwrap();

    assert_eq!(summary.channels_scraped, 0);
    // A cancelled run is not a completed scrape.
    let guild = SqlGuildRepository::new(pool).get(1).await.unwrap().unwrap();
    assert_eq!(guild.scrape_count, 0);
}
