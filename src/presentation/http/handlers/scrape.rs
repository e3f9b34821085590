//! Scrape Handlers
//!
//! Control plane of the scrape job manager, the channel-selector listing
//! and the freshness analyzer.

use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use super::parse_snowflake;
use crate::application::dto::request::ScrapeStartRequest;
use crate::application::dto::response::{
    CancelResponse, ChannelResponse, ScrapeHistoryResponse, ScrapeStatusResponse,
    ScrapeableChannelsResponse,
};
use crate::application::jobs::ScrapeJob;
use crate::application::services::{analyze_guild, GuildAnalysis};
use crate::domain::{ChannelRepository, GuildRepository};
use crate::infrastructure::repositories::{SqlChannelRepository, SqlGuildRepository};
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

/// Start a scrape job. 409 while one is busy, 400 for an explicitly
/// empty channel subset or a missing token.
pub async fn start(
    State(state): State<AppState>,
    Json(body): Json<ScrapeStartRequest>,
) -> Result<Json<ScrapeJob>, AppError> {
    body.validate().map_err(validation_error)?;

    let guild_id = parse_snowflake(&body.guild_id, "guild ID")?;
    let channel_ids = match body.channel_ids {
        None => None,
        Some(ids) => Some(
            ids.iter()
                .map(|id| parse_snowflake(id, "channel ID"))
                .collect::<Result<Vec<_>, _>>()?,
        ),
    };

    let job = state.scrape.start(guild_id, channel_ids)?;
    Ok(Json(job))
}

/// Current scrape state.
pub async fn status(State(state): State<AppState>) -> Json<ScrapeStatusResponse> {
    Json(ScrapeStatusResponse {
        busy: state.scrape.is_busy(),
        current_job: state.scrape.current_job(),
        has_token: state.scrape.has_token(),
    })
}

/// Cancel the running scrape job.
pub async fn cancel(State(state): State<AppState>) -> Result<Json<CancelResponse>, AppError> {
    if state.scrape.cancel() {
        Ok(Json(CancelResponse {
            message: "Scrape cancellation requested".into(),
        }))
    } else {
        Err(AppError::NotFound("No scrape job is running".into()))
    }
}

/// Past scrape jobs, most recent first.
pub async fn history(State(state): State<AppState>) -> Json<ScrapeHistoryResponse> {
    Json(ScrapeHistoryResponse {
        jobs: state.scrape.history(),
    })
}

/// Scrapeable channels of a guild from the store only (no Discord call);
/// feeds the channel-selector.
pub async fn guild_channels(
    State(state): State<AppState>,
    Path(guild_id): Path<String>,
) -> Result<Json<ScrapeableChannelsResponse>, AppError> {
    let guild_id = parse_snowflake(&guild_id, "guild ID")?;
    let pool = state.registry.get_active()?;

    let guild = SqlGuildRepository::new(pool.clone()).get(guild_id).await?;
    let channels = SqlChannelRepository::new(pool)
        .list_by_guild(guild_id)
        .await?;

    let channels: Vec<ChannelResponse> = channels
        .into_iter()
        .filter(|c| c.kind.is_scrapeable())
        .map(ChannelResponse::from)
        .collect();

    Ok(Json(ScrapeableChannelsResponse {
        guild_id: guild_id.to_string(),
        guild_name: guild.map(|g| g.name),
        total: channels.len(),
        channels,
    }))
}

/// Classify a guild's channels by scrape state. The live listing is best
/// effort; without it the classification degrades gracefully.
pub async fn analyze(
    State(state): State<AppState>,
    Path(guild_id): Path<String>,
) -> Result<Json<GuildAnalysis>, AppError> {
    let guild_id = parse_snowflake(&guild_id, "guild ID")?;
    let live = state.scrape.fetch_live_channels(guild_id).await;
    let pool = state.registry.get_active()?;

    let analysis = analyze_guild(&pool, guild_id, live).await?;
    Ok(Json(analysis))
}
