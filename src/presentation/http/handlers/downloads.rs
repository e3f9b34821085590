//! Download Handlers
//!
//! Control plane of the attachment download manager.

use axum::{extract::State, Json};

use crate::application::dto::response::{CancelResponse, DownloadJobResponse};
use crate::application::jobs::DownloadJob;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Start a download job. 409 while one is busy.
pub async fn start(State(state): State<AppState>) -> Result<Json<DownloadJob>, AppError> {
    let job = state.downloads.start()?;
    Ok(Json(job))
}

/// Current (or last) download job; `job` is null before the first run.
pub async fn job(State(state): State<AppState>) -> Json<DownloadJobResponse> {
    Json(DownloadJobResponse {
        busy: state.downloads.is_busy(),
        job: state.downloads.current_job(),
    })
}

/// Cancel the running download job.
pub async fn cancel(State(state): State<AppState>) -> Result<Json<CancelResponse>, AppError> {
    if state.downloads.cancel() {
        Ok(Json(CancelResponse {
            message: "Download cancellation requested".into(),
        }))
    } else {
        Err(AppError::NotFound("No download job is running".into()))
    }
}
