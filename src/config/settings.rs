//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Discord credential and defaults
    pub discord: DiscordSettings,

    /// Data source configuration
    pub database: DatabaseSettings,

    /// Scraper tuning
    pub scrape: ScrapeSettings,

    /// Attachment download tuning
    pub downloads: DownloadSettings,

    /// Cross-store transfer tuning
    pub transfer: TransferSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// Discord credential and defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordSettings {
    /// Bot token; empty disables everything that needs Discord
    pub token: String,

    /// Guild pre-selected in the UI
    #[serde(default)]
    pub default_guild_id: Option<i64>,
}

/// Data source configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Primary (file-backed) store URL
    pub url: String,

    /// Optional server-backed store URL; enables dual-source mode
    #[serde(default)]
    pub secondary_url: Option<String>,

    /// Maximum number of connections per pool
    pub max_connections: u32,
}

/// Scraper tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeSettings {
    /// Commit granularity of a history pull
    pub batch_size: usize,

    /// Delay between history requests, in milliseconds
    pub request_delay_ms: u64,

    /// Start a download job automatically after a completed scrape
    pub auto_download: bool,
}

/// Attachment download tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadSettings {
    /// Base directory for stored attachments
    pub attachments_path: String,

    /// Simultaneous transfers
    pub concurrency: usize,

    /// Fetch attempts per attachment before it is marked failed
    pub max_attempts: u32,
}

/// Cross-store transfer tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferSettings {
    /// Rows per copy batch
    pub batch_size: usize,
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Determine the running environment
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("discord.token", "")?
            .set_default("database.url", "sqlite://archive.db?mode=rwc")?
            .set_default("database.max_connections", 5)?
            .set_default("scrape.batch_size", 1000)?
            .set_default("scrape.request_delay_ms", 500)?
            .set_default("scrape.auto_download", false)?
            .set_default("downloads.attachments_path", "attachments")?
            .set_default("downloads.concurrency", 4)?
            .set_default("downloads.max_attempts", 3)?
            .set_default("transfer.batch_size", 1000)?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Load from environment variables
            // APP__SCRAPE__BATCH_SIZE=500 -> scrape.batch_size = 500
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Map the well-known environment variables
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("discord.token", std::env::var("DISCORD_TOKEN").ok())?
            .set_override_option(
                "discord.default_guild_id",
                std::env::var("DEFAULT_GUILD_ID").ok(),
            )?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option(
                "database.secondary_url",
                std::env::var("SECONDARY_DATABASE_URL").ok(),
            )?
            .set_override_option("scrape.batch_size", std::env::var("SCRAPE_BATCH_SIZE").ok())?
            .set_override_option(
                "scrape.request_delay_ms",
                std::env::var("SCRAPE_DELAY_MS").ok(),
            )?
            .set_override_option(
                "scrape.auto_download",
                std::env::var("AUTO_DOWNLOAD_ATTACHMENTS").ok(),
            )?
            .set_override_option(
                "downloads.attachments_path",
                std::env::var("ATTACHMENTS_PATH").ok(),
            )?
            .build()?
            .try_deserialize()
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Whether a Discord credential is configured.
    pub fn has_token(&self) -> bool {
        !self.discord.token.is_empty()
    }

    /// Whether a second store is configured (enables transfer).
    pub fn dual_source(&self) -> bool {
        self.database.secondary_url.is_some()
    }
}

impl ServerSettings {
    /// Get the socket address for binding.
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid server address configuration")
    }
}
