use axum::extract::State;
use axum::Json;
use geotrack_core::scheduler::SchedulerStatus;

use crate::state::AppState;

/// GET /api/status: scheduler state, last run and cycle counters.
pub async fn get_status(State(app): State<AppState>) -> Json<SchedulerStatus> {
    Json(app.tracker.status())
}

/// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
