use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use chrono::NaiveDate;
use geotrack_core::export::ExportArtifact;
use geotrack_core::{ExportFormat, GeotrackError};
use serde::Deserialize;

use super::{optional_json, required_json};
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ExportCurrentRequest {
    /// File name inside the output directory.
    pub destination: Option<String>,
    #[serde(default)]
    pub format: ExportFormat,
}

#[derive(Debug, Deserialize)]
pub struct ExportHistoryRequest {
    pub imei: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub destination: Option<String>,
    #[serde(default)]
    pub format: ExportFormat,
}

fn artifact_json(artifact: &ExportArtifact) -> serde_json::Value {
    serde_json::json!({
        "path": artifact.path,
        "format": artifact.format,
        "source": artifact.source(),
        "generated_at": artifact.generated_at(),
        "total_features": artifact.total_features(),
    })
}

/// POST /api/export/current: write the current snapshot as GeoJSON, CSV or
/// KML. Does not fetch.
pub async fn export_current(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let req: ExportCurrentRequest = optional_json(&body)?;
    let artifact = app
        .tracker
        .export_current(req.destination.as_deref(), req.format)
        .await?;
    Ok(Json(artifact_json(&artifact)))
}

/// POST /api/export/history: fetch one device's track for a day and export it.
pub async fn export_history(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let req: ExportHistoryRequest = required_json(&body)?;
    let date = NaiveDate::parse_from_str(&req.date, "%Y-%m-%d").map_err(|e| {
        GeotrackError::InvalidDate {
            date: req.date.clone(),
            reason: e.to_string(),
        }
    })?;
    let artifact = app
        .tracker
        .export_history(&req.imei, date, req.destination.as_deref(), req.format)
        .await?;
    Ok(Json(artifact_json(&artifact)))
}
