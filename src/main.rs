//! # Guild Archiver
//!
//! A Discord guild archiver with a dual-backend relational store.
//!
//! This is the application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Data source registry (SQLite file / PostgreSQL server)
//! - HTTP control plane and background job managers

use anyhow::Result;
use tracing::info;

use guild_archiver::config::Settings;
use guild_archiver::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    guild_archiver::telemetry::init_tracing();

    info!("Starting Guild Archiver...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        dual_source = settings.dual_source(),
        "Configuration loaded"
    );

    // Build and run the application
    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
