//! Browse Handlers
//!
//! Read-only surface over the archive: guilds, channels, paged message
//! history, substring search, the image gallery and row-count stats.
//! Nothing here mutates core state.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use validator::Validate;

use super::parse_snowflake;
use crate::application::dto::request::{GalleryQuery, MessageQuery, SearchQuery};
use crate::application::dto::response::{
    ChannelResponse, GalleryImageResponse, GuildResponse, MessageResponse, StatsResponse,
    UserResponse,
};
use crate::domain::{
    AttachmentRepository, ChannelRepository, GuildRepository, MessagePage, MessageRepository,
    ReactionRepository, UserRepository,
};
use crate::infrastructure::repositories::{
    SqlAttachmentRepository, SqlChannelRepository, SqlGuildRepository, SqlMessageRepository,
    SqlReactionRepository, SqlUserRepository,
};
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

/// List archived guilds.
pub async fn list_guilds(State(state): State<AppState>) -> Result<Json<Vec<GuildResponse>>, AppError> {
    let pool = state.registry.get_active()?;
    let guilds = SqlGuildRepository::new(pool).list_all().await?;
    Ok(Json(guilds.into_iter().map(GuildResponse::from).collect()))
}

/// Fetch one archived guild.
pub async fn get_guild(
    State(state): State<AppState>,
    Path(guild_id): Path<String>,
) -> Result<Json<GuildResponse>, AppError> {
    let guild_id = parse_snowflake(&guild_id, "guild ID")?;
    let pool = state.registry.get_active()?;

    let guild = SqlGuildRepository::new(pool)
        .get(guild_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Guild {} not found", guild_id)))?;

    Ok(Json(GuildResponse::from(guild)))
}

/// List all channels of a guild, categories included.
pub async fn get_guild_channels(
    State(state): State<AppState>,
    Path(guild_id): Path<String>,
) -> Result<Json<Vec<ChannelResponse>>, AppError> {
    let guild_id = parse_snowflake(&guild_id, "guild ID")?;
    let pool = state.registry.get_active()?;

    let channels = SqlChannelRepository::new(pool).list_by_guild(guild_id).await?;
    Ok(Json(channels.into_iter().map(ChannelResponse::from).collect()))
}

/// Fetch one archived user.
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user_id = parse_snowflake(&user_id, "user ID")?;
    let pool = state.registry.get_active()?;

    let user = SqlUserRepository::new(pool)
        .get(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

    Ok(Json(UserResponse::from(user)))
}

/// Cursor-paged message history of a channel.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Query(query): Query<MessageQuery>,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    let channel_id = parse_snowflake(&channel_id, "channel ID")?;
    let pool = state.registry.get_active()?;

    let page = MessagePage {
        before: query
            .before
            .as_deref()
            .map(|id| parse_snowflake(id, "before cursor"))
            .transpose()?,
        after: query
            .after
            .as_deref()
            .map(|id| parse_snowflake(id, "after cursor"))
            .transpose()?,
        limit: query.limit.unwrap_or(50),
    };

    let messages = SqlMessageRepository::new(pool)
        .list_by_channel(channel_id, page)
        .await?;
    Ok(Json(messages.into_iter().map(MessageResponse::from).collect()))
}

/// Substring search over a guild's message content.
pub async fn search_messages(
    State(state): State<AppState>,
    Path(guild_id): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    query.validate().map_err(validation_error)?;
    let guild_id = parse_snowflake(&guild_id, "guild ID")?;
    let pool = state.registry.get_active()?;

    let messages = SqlMessageRepository::new(pool)
        .search(guild_id, &query.q, query.limit.unwrap_or(50))
        .await?;
    Ok(Json(messages.into_iter().map(MessageResponse::from).collect()))
}

/// Downloaded images, newest first, optionally scoped to one channel.
pub async fn gallery(
    State(state): State<AppState>,
    Query(query): Query<GalleryQuery>,
) -> Result<Json<Vec<GalleryImageResponse>>, AppError> {
    let channel_id = query
        .channel_id
        .as_deref()
        .map(|id| parse_snowflake(id, "channel ID"))
        .transpose()?;
    let pool = state.registry.get_active()?;

    let images = SqlAttachmentRepository::new(pool)
        .list_downloaded(channel_id, query.offset.unwrap_or(0), query.limit.unwrap_or(50))
        .await?;
    Ok(Json(images.into_iter().map(GalleryImageResponse::from).collect()))
}

/// Row counts per entity type on the active source.
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let pool = state.registry.get_active()?;

    let stats = StatsResponse {
        guilds: SqlGuildRepository::new(pool.clone()).count().await?,
        channels: SqlChannelRepository::new(pool.clone()).count().await?,
        users: SqlUserRepository::new(pool.clone()).count().await?,
        messages: SqlMessageRepository::new(pool.clone()).count().await?,
        attachments: SqlAttachmentRepository::new(pool.clone()).count().await?,
        reactions: SqlReactionRepository::new(pool).count().await?,
    };
    Ok(Json(stats))
}
