//! Data Source Handlers
//!
//! Inspect and switch the active data source at runtime.

use axum::{extract::State, Json};
use validator::Validate;

use crate::application::dto::request::DataSourceUpdateRequest;
use crate::application::dto::response::DataSourcesResponse;
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

/// Describe every registered source and the active selection.
pub async fn get(State(state): State<AppState>) -> Json<DataSourcesResponse> {
    Json(DataSourcesResponse::new(
        state.registry.active_name(),
        state.registry.describe(),
    ))
}

/// Switch the active source. 400 for an unknown name.
pub async fn put(
    State(state): State<AppState>,
    Json(body): Json<DataSourceUpdateRequest>,
) -> Result<Json<DataSourcesResponse>, AppError> {
    body.validate().map_err(validation_error)?;
    state.registry.set_active(&body.active)?;
    Ok(Json(DataSourcesResponse::new(
        state.registry.active_name(),
        state.registry.describe(),
    )))
}
