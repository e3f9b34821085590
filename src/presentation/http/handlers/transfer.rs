//! Transfer Handlers
//!
//! Control plane of the cross-store transfer manager. The endpoints are
//! fixed: the file-backed source copies into the server-backed target.

use axum::{extract::State, Json};

use crate::application::dto::response::{CancelResponse, TransferStatusResponse};
use crate::application::jobs::TransferJob;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Start a transfer job. 400 unless both sources are registered and
/// connected, 409 while one is busy.
pub async fn start(State(state): State<AppState>) -> Result<Json<TransferJob>, AppError> {
    let job = state.transfer.start()?;
    Ok(Json(job))
}

/// Current (or last) transfer job; `job` is null before the first run.
pub async fn status(State(state): State<AppState>) -> Json<TransferStatusResponse> {
    Json(TransferStatusResponse {
        busy: state.transfer.is_busy(),
        job: state.transfer.current_job(),
    })
}

/// Cancel the running transfer job.
pub async fn cancel(State(state): State<AppState>) -> Result<Json<CancelResponse>, AppError> {
    if state.transfer.cancel() {
        Ok(Json(CancelResponse {
            message: "Transfer cancellation requested".into(),
        }))
    } else {
        Err(AppError::NotFound("No transfer job is running".into()))
    }
}
