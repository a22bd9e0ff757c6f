use axum::extract::State;
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/devices: devices on the vendor account.
pub async fn list_devices(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let devices = app.tracker.list_devices().await?;
    Ok(Json(serde_json::json!({
        "count": devices.len(),
        "devices": devices,
    })))
}
