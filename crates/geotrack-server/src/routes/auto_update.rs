use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use geotrack_core::scheduler::SchedulerStatus;
use serde::Deserialize;

use super::optional_json;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    pub interval_secs: Option<i64>,
}

/// POST /api/auto-update/start: start periodic cycles. Without
/// `interval_secs` the configured interval is used. Starting twice is a no-op.
pub async fn start(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<Json<SchedulerStatus>, AppError> {
    let req: StartRequest = optional_json(&body)?;
    let status = match req.interval_secs {
        Some(secs) => app.tracker.start_auto_update(secs)?,
        None => app.tracker.start_default()?,
    };
    Ok(Json(status))
}

/// POST /api/auto-update/stop: stop periodic cycles; an in-flight cycle finishes.
pub async fn stop(State(app): State<AppState>) -> Json<SchedulerStatus> {
    Json(app.tracker.stop_auto_update())
}
