//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes())
        // Health check endpoint
        .route("/health", get(handlers::health::health_check))
        .with_state(state)
}

/// API routes
fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/scrape", scrape_routes())
        .nest("/downloads", download_routes())
        .nest("/transfer", transfer_routes())
        .route(
            "/datasource",
            get(handlers::datasource::get).put(handlers::datasource::put),
        )
        .merge(browse_routes())
}

/// Scrape control plane
fn scrape_routes() -> Router<AppState> {
    Router::new()
        .route("/start", post(handlers::scrape::start))
        .route("/status", get(handlers::scrape::status))
        .route("/cancel", post(handlers::scrape::cancel))
        .route("/history", get(handlers::scrape::history))
        .route("/guilds/:guild_id/channels", get(handlers::scrape::guild_channels))
        .route("/analyze/:guild_id", get(handlers::scrape::analyze))
}

/// Download control plane
fn download_routes() -> Router<AppState> {
    Router::new()
        .route("/start", post(handlers::downloads::start))
        .route("/job", get(handlers::downloads::job))
        .route("/cancel", post(handlers::downloads::cancel))
}

/// Transfer control plane
fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route("/start", post(handlers::transfer::start))
        .route("/status", get(handlers::transfer::status))
        .route("/cancel", post(handlers::transfer::cancel))
}

/// Read-only archive browsing
fn browse_routes() -> Router<AppState> {
    Router::new()
        .route("/guilds", get(handlers::browse::list_guilds))
        .route("/guilds/:guild_id", get(handlers::browse::get_guild))
        .route("/guilds/:guild_id/channels", get(handlers::browse::get_guild_channels))
        .route("/guilds/:guild_id/search", get(handlers::browse::search_messages))
        .route("/channels/:channel_id/messages", get(handlers::browse::get_messages))
        .route("/users/:user_id", get(handlers::browse::get_user))
        .route("/gallery", get(handlers::browse::gallery))
        .route("/stats", get(handlers::browse::stats))
}
