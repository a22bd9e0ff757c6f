use crate::format::ExportFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeotrackError {
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("invalid interval {0}s: must be greater than zero")]
    InvalidInterval(i64),

    #[error("invalid interval {0}s: must be at most {max}s", max = crate::scheduler::MAX_INTERVAL_SECS)]
    IntervalTooLong(u64),

    #[error("invalid coordinates for device {imei}: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates {
        imei: String,
        latitude: f64,
        longitude: f64,
    },

    #[error("invalid device identifier '{0}': must be 1-64 characters of [A-Za-z0-9_-]")]
    InvalidImei(String),

    #[error("invalid date {date}: {reason}")]
    InvalidDate { date: String, reason: String },

    #[error("invalid export destination '{0}': must be a plain file name")]
    InvalidDestination(String),

    #[error("export to {} failed: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("unknown export format '{0}' (expected geojson, csv or kml)")]
    UnknownFormat(String),

    #[error("failed to render {format} artifact: {message}")]
    Render { format: ExportFormat, message: String },

    #[error("background task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Coarse classification used by status reporting and the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Upstream,
    Validation,
    Export,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Upstream => "upstream",
            ErrorKind::Validation => "validation",
            ErrorKind::Export => "export",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GeotrackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GeotrackError::Upstream(_) => ErrorKind::Upstream,
            GeotrackError::InvalidInterval(_)
            | GeotrackError::IntervalTooLong(_)
            | GeotrackError::InvalidCoordinates { .. }
            | GeotrackError::InvalidImei(_)
            | GeotrackError::InvalidDate { .. }
            | GeotrackError::InvalidDestination(_)
            | GeotrackError::UnknownFormat(_) => ErrorKind::Validation,
            GeotrackError::Export { .. } | GeotrackError::Render { .. } => ErrorKind::Export,
            GeotrackError::ConfigNotFound(_)
            | GeotrackError::InvalidConfig(_)
            | GeotrackError::Task(_)
            | GeotrackError::Io(_)
            | GeotrackError::Yaml(_)
            | GeotrackError::Json(_) => ErrorKind::Internal,
        }
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        GeotrackError::Upstream(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, GeotrackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_classified() {
        assert_eq!(GeotrackError::upstream("rate limited").kind(), ErrorKind::Upstream);
        assert_eq!(GeotrackError::InvalidInterval(0).kind(), ErrorKind::Validation);
        assert_eq!(
            GeotrackError::InvalidCoordinates {
                imei: "860000000000001".into(),
                latitude: 91.0,
                longitude: 0.0,
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            GeotrackError::Export {
                path: PathBuf::from("/nope/out.geojson"),
                source: std::io::Error::other("read-only"),
            }
            .kind(),
            ErrorKind::Export
        );
        assert_eq!(GeotrackError::Task("panicked".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn invalid_coordinates_message_names_device() {
        let err = GeotrackError::InvalidCoordinates {
            imei: "IMEI123".into(),
            latitude: 91.0,
            longitude: 10.0,
        };
        assert!(err.to_string().contains("IMEI123"));
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::Upstream).unwrap();
        assert_eq!(json, "\"upstream\"");
    }
}
