//! Control-plane endpoint tests: scrape, downloads, transfer and the
//! data source switch.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;

use guild_archiver::presentation::http::routes;

use crate::common::*;

#[tokio::test]
async fn health_endpoint_reports_active_source() {
    let router = test_router().await;
    let (status, body) = get_json(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["active_source"], "sqlite");
}

#[tokio::test]
async fn scrape_start_rejects_empty_channel_list() {
    let router = test_router().await;
    let (status, _) = send_json(
        &router,
        "POST",
        "/api/scrape/start",
        r#"{"guild_id": "1", "channel_ids": []}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn scrape_start_rejects_malformed_guild_id() {
    let router = test_router().await;
    let (status, _) = send_json(
        &router,
        "POST",
        "/api/scrape/start",
        r#"{"guild_id": "not-a-snowflake"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn scrape_cancel_without_job_is_not_found() {
    let router = test_router().await;
    let (status, _) = send_json(&router, "POST", "/api/scrape/cancel", "{}").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn scrape_lifecycle_over_http() {
    let discord = Arc::new(ScriptedDiscordClient::with_guild(wire_guild(1, "g")));
    discord.add_channel(wire_channel(2, 1, "general", 0));
    discord.add_message(wire_message(3, 2, wire_user(7, "author"), "hi"));
    let state = test_state(discord).await;
    let router = routes::create_router(state);

    let (status, job) = send_json(
        &router,
        "POST",
        "/api/scrape/start",
        r#"{"guild_id": "1"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["scope"], "guild");
    assert_eq!(job["guild_id"], "1");

    // Drive the runtime until the background task lands.
    let mut last = serde_json::Value::Null;
    for _ in 0..500 {
        let (_, body) = get_json(&router, "/api/scrape/status").await;
        last = body;
        let status = last["current_job"]["status"].as_str().unwrap_or_default().to_string();
        if matches!(status.as_str(), "completed" | "failed" | "cancelled") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(last["current_job"]["status"], "completed");
    assert_eq!(last["busy"], false);
    assert_eq!(last["has_token"], true);
    assert_eq!(last["current_job"]["result"]["messages_added"], 1);

    // A second start while idle is fine; 409 only applies while busy.
    let (_, history) = get_json(&router, "/api/scrape/history").await;
    assert_eq!(history["jobs"].as_array().unwrap().len(), 1);

    // The archived channel list now serves the channel-selector.
    let (status, channels) = get_json(&router, "/api/scrape/guilds/1/channels").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(channels["total"], 1);
    assert_eq!(channels["guild_name"], "g");

    // And the analyzer sees everything up to date.
    let (status, analysis) = get_json(&router, "/api/scrape/analyze/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analysis["summary"]["up_to_date"], 1);
    assert_eq!(analysis["summary"]["has_new_messages"], 0);
}

#[tokio::test]
async fn downloads_endpoints_idle_shape() {
    let router = test_router().await;

    let (status, body) = get_json(&router, "/api/downloads/job").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["busy"], false);
    assert!(body["job"].is_null());

    let (status, _) = send_json(&router, "POST", "/api/downloads/cancel", "{}").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn transfer_start_requires_dual_sources() {
    let router = test_router().await;

    let (status, _) = send_json(&router, "POST", "/api/transfer/start", "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get_json(&router, "/api/transfer/status").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["job"].is_null());
}

#[tokio::test]
async fn datasource_roundtrip() {
    let router = test_router().await;

    let (status, body) = get_json(&router, "/api/datasource").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], "sqlite");
    assert_eq!(body["sources"]["sqlite"]["available"], true);

    let (status, _) = send_json(
        &router,
        "PUT",
        "/api/datasource",
        r#"{"active": "mysql"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send_json(
        &router,
        "PUT",
        "/api/datasource",
        r#"{"active": "sqlite"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], "sqlite");
}
