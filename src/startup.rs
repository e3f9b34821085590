//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::application::jobs::{DownloadManager, ScrapeManager, TransferManager};
use crate::config::Settings;
use crate::infrastructure::database::{DataSourceRegistry, Dialect};
use crate::infrastructure::discord::{DiscordClientProvider, RestClientProvider};
use crate::presentation::http::routes;
use crate::presentation::middleware::create_cors_layer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DataSourceRegistry>,
    pub scrape: Arc<ScrapeManager>,
    pub downloads: Arc<DownloadManager>,
    pub transfer: Arc<TransferManager>,
    pub settings: Arc<Settings>,
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    registry: Arc<DataSourceRegistry>,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        // The Any driver resolves its backends at runtime
        sqlx::any::install_default_drivers();

        let settings = Arc::new(settings);

        // Register the configured stores; names follow the dialect so the
        // transfer endpoints (sqlite -> postgres) resolve by name
        let registry = Arc::new(DataSourceRegistry::new(settings.database.max_connections));
        let primary = Dialect::from_url(&settings.database.url);
        registry.register(primary.as_str(), source_label(primary), &settings.database.url);
        if let Some(secondary_url) = &settings.database.secondary_url {
            let secondary = Dialect::from_url(secondary_url);
            if secondary == primary {
                tracing::warn!(
                    "SECONDARY_DATABASE_URL has the same dialect as DATABASE_URL; it replaces it"
                );
            }
            registry.register(secondary.as_str(), source_label(secondary), secondary_url);
        }
        registry.connect_all().await?;
        tracing::info!(
            active = %registry.active_name(),
            sources = ?registry.available_sources(),
            "Data sources ready"
        );

        let discord: Arc<dyn DiscordClientProvider> =
            Arc::new(RestClientProvider::new(settings.discord.token.clone()));
        if !settings.has_token() {
            tracing::warn!("DISCORD_TOKEN is not set; scraping is disabled");
        }

        let downloads = Arc::new(DownloadManager::new(registry.clone(), settings.clone()));
        let scrape = Arc::new(ScrapeManager::new(
            registry.clone(),
            discord,
            settings.clone(),
            Some(downloads.clone()),
        ));
        let transfer = Arc::new(TransferManager::new(registry.clone(), settings.clone()));

        let state = AppState {
            registry: registry.clone(),
            scrape,
            downloads,
            transfer,
            settings: settings.clone(),
        };

        // Build router with middleware
        let router = routes::create_router(state)
            .layer(TraceLayer::new_for_http())
            .layer(create_cors_layer());

        // Bind to address
        let addr = settings.server.socket_addr();
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self {
            listener,
            router,
            registry,
        })
    }

    /// Run the server until ctrl-c, then close the data sources
    pub async fn run_until_stopped(self) -> Result<()> {
        let registry = self.registry;
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;
        registry.disconnect_all().await;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

fn source_label(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Sqlite => "SQLite (file)",
        Dialect::Postgres => "PostgreSQL (server)",
    }
}
