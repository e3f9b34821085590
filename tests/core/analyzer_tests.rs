//! Analyzer tests: classification against a live listing, graceful
//! degradation without one, and the summary histogram.

use chrono::Utc;
use pretty_assertions::assert_eq;

use guild_archiver::application::services::{analyze_guild, ChannelStatus};
use guild_archiver::domain::{Channel, ChannelKind, ChannelRepository, Guild, GuildRepository};
use guild_archiver::infrastructure::discord::DiscordChannel;
use guild_archiver::infrastructure::repositories::{SqlChannelRepository, SqlGuildRepository};

use crate::common::*;

fn live_channel(id: i64, head: Option<i64>, channel_type: u8) -> DiscordChannel {
    DiscordChannel {
        id,
        guild_id: Some(1),
        name: Some(format!("live-{}", id)),
        channel_type,
        topic: None,
        position: Some(0),
        parent_id: None,
        last_message_id: head,
    }
}

async fn seed_channels(pool: &sqlx::AnyPool) {
    SqlGuildRepository::new(pool.clone())
        .upsert(&Guild { id: 1, name: "g".into(), owner_id: 1, ..Default::default() })
        .await
        .unwrap();
    let repo = SqlChannelRepository::new(pool.clone());
    // A: scraped, head 100
    repo.upsert(&Channel {
        id: 10,
        guild_id: 1,
        name: "a".into(),
        last_message_id: Some(100),
        last_scraped_at: Some(Utc::now()),
        message_count: 40,
        ..Default::default()
    })
    .await
    .unwrap();
    // B: persisted but never scraped
    repo.upsert(&Channel {
        id: 11,
        guild_id: 1,
        name: "b".into(),
        ..Default::default()
    })
    .await
    .unwrap();
    // C: scraped, head 200
    repo.upsert(&Channel {
        id: 12,
        guild_id: 1,
        name: "c".into(),
        last_message_id: Some(200),
        last_scraped_at: Some(Utc::now()),
        message_count: 7,
        ..Default::default()
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn four_channel_mix_classifies_correctly() {
    let pool = test_pool().await;
    seed_channels(&pool).await;

    let live = vec![
        live_channel(10, Some(100), 0),
        live_channel(11, Some(50), 0),
        live_channel(12, Some(250), 0),
        live_channel(13, Some(10), 0),
    ];
    let analysis = analyze_guild(&pool, 1, Some(live)).await.unwrap();

    assert!(analysis.live_data);
    assert_eq!(analysis.channels.len(), 4);
    let status_of = |id: i64| {
        analysis
            .channels
            .iter()
            .find(|c| c.channel_id == id)
            .unwrap()
            .status
    };
    assert_eq!(status_of(10), ChannelStatus::UpToDate);
    assert_eq!(status_of(11), ChannelStatus::NeverScraped);
    assert_eq!(status_of(12), ChannelStatus::HasNewMessages);
    assert_eq!(status_of(13), ChannelStatus::New);

    assert_eq!(analysis.summary.new, 1);
    assert_eq!(analysis.summary.has_new_messages, 1);
    assert_eq!(analysis.summary.up_to_date, 1);
    assert_eq!(analysis.summary.never_scraped, 1);

    // Archived counts ride along for persisted channels.
    let a = analysis.channels.iter().find(|c| c.channel_id == 10).unwrap();
    assert_eq!(a.archived_message_count, 40);
    assert!(a.last_scraped_at.is_some());
}

#[tokio::test]
async fn categories_are_not_classified() {
    let pool = test_pool().await;
    seed_channels(&pool).await;

    let live = vec![live_channel(10, Some(100), 0), live_channel(99, None, 4)];
    let analysis = analyze_guild(&pool, 1, Some(live)).await.unwrap();
    assert!(analysis.channels.iter().all(|c| c.channel_id != 99));
    assert!(analysis.channels.iter().all(|c| c.kind != ChannelKind::Category));
}

#[tokio::test]
async fn without_live_data_only_store_states_are_emitted() {
    let pool = test_pool().await;
    seed_channels(&pool).await;

    let analysis = analyze_guild(&pool, 1, None).await.unwrap();
    assert!(!analysis.live_data);
    assert_eq!(analysis.channels.len(), 3);
    // Never `new` or `has_new_messages` without a live listing.
    assert_eq!(analysis.summary.new, 0);
    assert_eq!(analysis.summary.has_new_messages, 0);
    assert_eq!(analysis.summary.up_to_date, 2);
    assert_eq!(analysis.summary.never_scraped, 1);
}

#[tokio::test]
async fn persisted_channels_missing_live_keep_their_state() {
    let pool = test_pool().await;
    seed_channels(&pool).await;

    // Only channel A is observed live; B and C fall back to their
    // persisted classification.
    let live = vec![live_channel(10, Some(100), 0)];
    let analysis = analyze_guild(&pool, 1, Some(live)).await.unwrap();

    let status_of = |id: i64| {
        analysis
            .channels
            .iter()
            .find(|c| c.channel_id == id)
            .unwrap()
            .status
    };
    assert_eq!(status_of(10), ChannelStatus::UpToDate);
    assert_eq!(status_of(11), ChannelStatus::NeverScraped);
    assert_eq!(status_of(12), ChannelStatus::UpToDate);
}

#[tokio::test]
async fn parent_names_resolve_from_the_store() {
    let pool = test_pool().await;
    SqlGuildRepository::new(pool.clone())
        .upsert(&Guild { id: 1, name: "g".into(), owner_id: 1, ..Default::default() })
        .await
        .unwrap();
    let repo = SqlChannelRepository::new(pool.clone());
    repo.upsert(&Channel {
        id: 20,
        guild_id: 1,
        name: "Category".into(),
        kind: ChannelKind::Category,
        ..Default::default()
    })
    .await
    .unwrap();
    repo.upsert(&Channel {
        id: 21,
        guild_id: 1,
        name: "child".into(),
        parent_id: Some(20),
        last_scraped_at: Some(Utc::now()),
        ..Default::default()
    })
    .await
    .unwrap();

    let analysis = analyze_guild(&pool, 1, None).await.unwrap();
    let child = analysis.channels.iter().find(|c| c.channel_id == 21).unwrap();
    assert_eq!(child.parent_name.as_deref(), Some("Category"));
}
