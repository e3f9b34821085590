//! Common Test Utilities
//!
//! In-memory stores, a scripted Discord client, wire-object builders and
//! router helpers shared across the integration suites.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tower::ServiceExt;

use guild_archiver::application::jobs::{DownloadManager, ScrapeManager, TransferManager};
use guild_archiver::config::{
    DatabaseSettings, DiscordSettings, DownloadSettings, ScrapeSettings, ServerSettings, Settings,
    TransferSettings,
};
use guild_archiver::infrastructure::database::{ensure_schema, DataSourceRegistry};
use guild_archiver::infrastructure::discord::{
    DiscordAttachment, DiscordChannel, DiscordClient, DiscordClientProvider, DiscordEmoji,
    DiscordError, DiscordGuild, DiscordMessage, DiscordReaction, DiscordUser, MessageCursor,
    ThreadKind,
};
use guild_archiver::presentation::http::routes;
use guild_archiver::shared::error::AppError;
use guild_archiver::startup::AppState;

/// A fresh single-connection in-memory store with the archive schema.
pub async fn test_pool() -> AnyPool {
    static DRIVERS: Once = Once::new();
    DRIVERS.call_once(sqlx::any::install_default_drivers);

    let pool = AnyPoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory store");
    ensure_schema(&pool).await.expect("schema");
    pool
}

/// Settings tuned for tests: no delays, temp attachment dir, one attempt
/// wiggle room kept small.
pub fn test_settings() -> Settings {
    let attachments = std::env::temp_dir()
        .join(format!("guild-archiver-test-{}", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .to_string();
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        discord: DiscordSettings {
            token: "test-token".into(),
            default_guild_id: None,
        },
        database: DatabaseSettings {
            url: "sqlite::memory:".into(),
            secondary_url: None,
            max_connections: 1,
        },
        scrape: ScrapeSettings {
            batch_size: 1000,
            request_delay_ms: 0,
            auto_download: false,
        },
        downloads: DownloadSettings {
            attachments_path: attachments,
            concurrency: 4,
            max_attempts: 1,
        },
        transfer: TransferSettings { batch_size: 1000 },
        environment: "test".into(),
    }
}

/// Registry with one connected in-memory source named `sqlite`.
pub async fn test_registry() -> Arc<DataSourceRegistry> {
    // Force driver installation before the registry connects.
    let _ = test_pool().await;
    let registry = Arc::new(DataSourceRegistry::new(1));
    registry.register("sqlite", "SQLite (file)", "sqlite::memory:");
    registry.connect_all().await.expect("registry connect");
    registry
}

/// Registry with two connected in-memory sources named `sqlite` and
/// `postgres` (both SQLite-backed; transfer resolves sources by name).
pub async fn dual_registry() -> Arc<DataSourceRegistry> {
    let _ = test_pool().await;
    let registry = Arc::new(DataSourceRegistry::new(1));
    registry.register("sqlite", "SQLite (file)", "sqlite::memory:");
    registry.register("postgres", "PostgreSQL (server)", "sqlite::memory:");
    registry.connect_all().await.expect("registry connect");
    registry
}

/// Full application state over a scripted Discord client.
pub async fn test_state(discord: Arc<ScriptedDiscordClient>) -> AppState {
    let registry = test_registry().await;
    let settings = Arc::new(test_settings());
    let downloads = Arc::new(DownloadManager::new(registry.clone(), settings.clone()));
    let scrape = Arc::new(ScrapeManager::new(
        registry.clone(),
        Arc::new(ScriptedProvider::new(discord)),
        settings.clone(),
        Some(downloads.clone()),
    ));
    let transfer = Arc::new(TransferManager::new(registry.clone(), settings.clone()));
    AppState {
        registry,
        scrape,
        downloads,
        transfer,
        settings,
    }
}

/// Router over a default (empty-guild) scripted client.
pub async fn test_router() -> Router {
    let state = test_state(Arc::new(ScriptedDiscordClient::default())).await;
    routes::create_router(state)
}

/// One-shot a GET request, returning status and parsed JSON body.
pub async fn get_json(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    split_response(response).await
}

/// One-shot a POST/PUT request with a JSON body.
pub async fn send_json(
    router: &Router,
    method: &str,
    uri: &str,
    body: &str,
) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    split_response(response).await
}

async fn split_response(response: axum::response::Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

/// Deterministic Discord fake driven by scripted guilds, channels,
/// messages and threads. Message pages honor the cursor semantics the
/// scraper relies on: `After` pages oldest-first, `Before`/`Latest`
/// newest-first.
#[derive(Default)]
pub struct ScriptedDiscordClient {
    pub guild: Mutex<Option<DiscordGuild>>,
    pub channels: Mutex<Vec<DiscordChannel>>,
    pub messages: Mutex<BTreeMap<i64, Vec<DiscordMessage>>>,
    pub threads: Mutex<HashMap<i64, Vec<(ThreadKind, DiscordChannel)>>>,
}

impl ScriptedDiscordClient {
    pub fn with_guild(guild: DiscordGuild) -> Self {
        let client = Self::default();
        *client.guild.lock() = Some(guild);
        client
    }

    pub fn add_channel(&self, channel: DiscordChannel) {
        self.channels.lock().push(channel);
    }

    pub fn add_message(&self, message: DiscordMessage) {
        self.messages
            .lock()
            .entry(message.channel_id)
            .or_default()
            .push(message);
    }

    pub fn add_thread(&self, parent_id: i64, kind: ThreadKind, thread: DiscordChannel) {
        self.threads
            .lock()
            .entry(parent_id)
            .or_default()
            .push((kind, thread));
    }
}

#[async_trait]
impl DiscordClient for ScriptedDiscordClient {
    async fn login(&self) -> Result<DiscordUser, DiscordError> {
        Ok(wire_user(1, "scripted-bot"))
    }

    async fn get_guild(&self, guild_id: i64) -> Result<DiscordGuild, DiscordError> {
        self.guild
            .lock()
            .clone()
            .filter(|g| g.id == guild_id)
            .ok_or_else(|| DiscordError::NotFound(format!("guild {}", guild_id)))
    }

    async fn get_guild_channels(
        &self,
        _guild_id: i64,
    ) -> Result<Vec<DiscordChannel>, DiscordError> {
        Ok(self.channels.lock().clone())
    }

    async fn get_channel_messages(
        &self,
        channel_id: i64,
        cursor: MessageCursor,
        limit: u8,
    ) -> Result<Vec<DiscordMessage>, DiscordError> {
        let mut messages: Vec<DiscordMessage> = self
            .messages
            .lock()
            .get(&channel_id)
            .cloned()
            .unwrap_or_default();
        messages.sort_by_key(|m| m.id);
        let limit = limit as usize;

        let page = match cursor {
            MessageCursor::Latest => {
                messages.into_iter().rev().take(limit).collect()
            }
            MessageCursor::Before(id) => messages
                .into_iter()
                .filter(|m| m.id < id)
                .rev()
                .take(limit)
                .collect(),
            MessageCursor::After(id) => messages
                .into_iter()
                .filter(|m| m.id > id)
                .take(limit)
                .collect(),
        };
        Ok(page)
    }

    async fn list_threads(
        &self,
        channel_id: i64,
        kind: ThreadKind,
    ) -> Result<Vec<DiscordChannel>, DiscordError> {
        Ok(self
            .threads
            .lock()
            .get(&channel_id)
            .map(|threads| {
                threads
                    .iter()
                    .filter(|(k, _)| *k == kind)
                    .map(|(_, t)| t.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Provider handing out one shared scripted client.
pub struct ScriptedProvider {
    client: Arc<ScriptedDiscordClient>,
    has_token: bool,
}

impl ScriptedProvider {
    pub fn new(client: Arc<ScriptedDiscordClient>) -> Self {
        Self {
            client,
            has_token: true,
        }
    }

    pub fn without_token(client: Arc<ScriptedDiscordClient>) -> Self {
        Self {
            client,
            has_token: false,
        }
    }
}

impl DiscordClientProvider for ScriptedProvider {
    fn has_token(&self) -> bool {
        self.has_token
    }

    fn client(&self) -> Result<Arc<dyn DiscordClient>, AppError> {
        if !self.has_token {
            return Err(AppError::Config("DISCORD_TOKEN is not set".into()));
        }
        Ok(self.client.clone())
    }
}

// ---- wire object builders ----

pub fn wire_guild(id: i64, name: &str) -> DiscordGuild {
    DiscordGuild {
        id,
        name: name.to_string(),
        owner_id: Some(1),
        member_count: Some(42),
        approximate_member_count: None,
    }
}

pub fn wire_channel(id: i64, guild_id: i64, name: &str, channel_type: u8) -> DiscordChannel {
    DiscordChannel {
        id,
        guild_id: Some(guild_id),
        name: Some(name.to_string()),
        channel_type,
        topic: None,
        position: Some(0),
        parent_id: None,
        last_message_id: None,
    }
}

pub fn wire_thread(id: i64, guild_id: i64, parent_id: i64, name: &str) -> DiscordChannel {
    DiscordChannel {
        parent_id: Some(parent_id),
        ..wire_channel(id, guild_id, name, 11)
    }
}

pub fn wire_user(id: i64, username: &str) -> DiscordUser {
    DiscordUser {
        id,
        username: username.to_string(),
        discriminator: Some("0".to_string()),
        global_name: None,
        avatar: None,
        bot: Some(false),
    }
}

pub fn wire_message(id: i64, channel_id: i64, author: DiscordUser, content: &str) -> DiscordMessage {
    DiscordMessage {
        id,
        channel_id,
        author,
        content: content.to_string(),
        timestamp: "2023-06-01T12:00:00+00:00".to_string(),
        edited_timestamp: None,
        pinned: false,
        tts: false,
        mention_everyone: false,
        embeds: vec![],
        attachments: vec![],
        reactions: None,
        mentions: vec![],
        message_reference: None,
    }
}

pub fn wire_attachment(id: i64, filename: &str, content_type: Option<&str>) -> DiscordAttachment {
    DiscordAttachment {
        id,
        filename: filename.to_string(),
        content_type: content_type.map(String::from),
        size: 1024,
        url: format!("http://127.0.0.1:1/{}", filename),
        proxy_url: None,
        width: Some(64),
        height: Some(64),
    }
}

pub fn wire_reaction(emoji_name: &str, count: i64) -> DiscordReaction {
    DiscordReaction {
        emoji: DiscordEmoji {
            id: None,
            name: Some(emoji_name.to_string()),
            animated: None,
        },
        count,
    }
}
