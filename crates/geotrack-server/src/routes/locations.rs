use axum::extract::State;
use axum::Json;
use geotrack_core::geojson::FeatureCollection;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/locations: the current snapshot.
pub async fn get_locations(State(app): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = app.tracker.current_locations();
    Json(serde_json::json!({
        "captured_at": snapshot.captured_at,
        "count": snapshot.len(),
        "locations": snapshot.to_vec(),
    }))
}

/// GET /api/geojson: the current snapshot as a FeatureCollection, built in memory.
pub async fn get_geojson(State(app): State<AppState>) -> Result<Json<FeatureCollection>, AppError> {
    Ok(Json(app.tracker.current_geojson()?))
}
