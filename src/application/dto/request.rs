//! Request DTOs
//!
//! Data structures for API request bodies and query strings. Snowflakes
//! arrive as strings and are parsed at the handler boundary.

use serde::Deserialize;
use validator::Validate;

/// Body of `POST /api/scrape/start`.
///
/// `channel_ids` semantics: absent means full-guild; an explicitly empty
/// list is rejected to avoid a no-op scrape.
#[derive(Debug, Deserialize, Validate)]
pub struct ScrapeStartRequest {
    #[validate(length(min = 1, message = "guild_id is required"))]
    pub guild_id: String,

    pub channel_ids: Option<Vec<String>>,
}

/// Body of `PUT /api/datasource`.
#[derive(Debug, Deserialize, Validate)]
pub struct DataSourceUpdateRequest {
    #[validate(length(min = 1, message = "active is required"))]
    pub active: String,
}

/// Query parameters of the message listing endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub before: Option<String>,
    pub after: Option<String>,
    pub limit: Option<i64>,
}

/// Query parameters of the search endpoint.
#[derive(Debug, Deserialize, Validate)]
pub struct SearchQuery {
    #[validate(length(min = 1, message = "q is required"))]
    pub q: String,

    pub limit: Option<i64>,
}

/// Query parameters of the gallery endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct GalleryQuery {
    pub channel_id: Option<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}
