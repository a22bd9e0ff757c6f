use axum::extract::State;
use axum::Json;
use geotrack_core::scheduler::RunRecord;

use crate::error::AppError;
use crate::state::AppState;

/// POST /api/refresh: run one fetch-update-export cycle now, after any
/// in-flight cycle. Works whether or not auto-update is running.
pub async fn refresh(State(app): State<AppState>) -> Result<Json<RunRecord>, AppError> {
    Ok(Json(app.tracker.refresh().await?))
}
