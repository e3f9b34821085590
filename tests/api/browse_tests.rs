//! Read surface tests: guilds, messages, search and stats.

use std::sync::Arc;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;

use guild_archiver::domain::{
    Channel, ChannelRepository, Guild, GuildRepository, Message, MessageRepository, User,
    UserRepository,
};
use guild_archiver::infrastructure::repositories::{
    SqlChannelRepository, SqlGuildRepository, SqlMessageRepository, SqlUserRepository,
};
use guild_archiver::presentation::http::routes;
use guild_archiver::startup::AppState;

use crate::common::*;

/// State with a seeded archive: one guild, one channel, five messages.
async fn seeded_state() -> AppState {
    let state = test_state(Arc::new(ScriptedDiscordClient::default())).await;
    let pool = state.registry.get("sqlite").unwrap();

    SqlGuildRepository::new(pool.clone())
        .upsert(&Guild { id: 1, name: "g".into(), owner_id: 1, ..Default::default() })
        .await
        .unwrap();
    SqlChannelRepository::new(pool.clone())
        .upsert(&Channel { id: 2, guild_id: 1, name: "general".into(), ..Default::default() })
        .await
        .unwrap();
    SqlUserRepository::new(pool.clone())
        .upsert(&User { id: 7, username: "author".into(), ..Default::default() })
        .await
        .unwrap();
    let messages = SqlMessageRepository::new(pool);
    for id in 10..15 {
        messages
            .upsert(&Message {
                id,
                channel_id: 2,
                author_id: 7,
                content: format!("message number {}", id),
                clean_content: format!("message number {}", id),
                ..Default::default()
            })
            .await
            .unwrap();
    }
    state
}

#[tokio::test]
async fn empty_archive_lists_nothing() {
    let router = test_router().await;

    let (status, guilds) = get_json(&router, "/api/guilds").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(guilds.as_array().unwrap().len(), 0);

    let (status, _) = get_json(&router, "/api/guilds/1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, stats) = get_json(&router, "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["messages"], 0);
}

#[tokio::test]
async fn malformed_snowflake_is_a_bad_request() {
    let router = test_router().await;
    let (status, _) = get_json(&router, "/api/guilds/not-a-snowflake").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn guilds_and_channels_are_served_with_string_ids() {
    let state = seeded_state().await;
    let router = routes::create_router(state);

    let (status, guilds) = get_json(&router, "/api/guilds").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(guilds[0]["id"], "1");
    assert_eq!(guilds[0]["name"], "g");

    let (status, channels) = get_json(&router, "/api/guilds/1/channels").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(channels[0]["id"], "2");
    assert_eq!(channels[0]["kind"], "text");

    let (status, user) = get_json(&router, "/api/users/7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["username"], "author");
}

#[tokio::test]
async fn messages_page_with_cursors() {
    let state = seeded_state().await;
    let router = routes::create_router(state);

    let (status, newest) = get_json(&router, "/api/channels/2/messages?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = newest
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["14", "13"]);

    let (_, ascending) = get_json(&router, "/api/channels/2/messages?after=11&limit=2").await;
    let ids: Vec<&str> = ascending
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["12", "13"]);
}

#[tokio::test]
async fn search_matches_substrings() {
    let state = seeded_state().await;
    let router = routes::create_router(state);

    let (status, hits) = get_json(&router, "/api/guilds/1/search?q=number%2012").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hits.as_array().unwrap().len(), 1);
    assert_eq!(hits[0]["id"], "12");

    let (status, _) = get_json(&router, "/api/guilds/1/search?q=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stats_count_rows_per_entity() {
    let state = seeded_state().await;
    let router = routes::create_router(state);

    let (status, stats) = get_json(&router, "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["guilds"], 1);
    assert_eq!(stats["channels"], 1);
    assert_eq!(stats["users"], 1);
    assert_eq!(stats["messages"], 5);
    assert_eq!(stats["attachments"], 0);
    assert_eq!(stats["reactions"], 0);
}
