//! HTTP Handlers
//!
//! Request handlers for all HTTP endpoints.

pub mod browse;
pub mod datasource;
pub mod downloads;
pub mod health;
pub mod scrape;
pub mod transfer;

use crate::shared::error::AppError;
use crate::shared::snowflake;

/// Parse a snowflake from its wire (string) form.
pub(crate) fn parse_snowflake(value: &str, what: &str) -> Result<i64, AppError> {
    snowflake::parse(value).ok_or_else(|| AppError::BadRequest(format!("Invalid {}", what)))
}
