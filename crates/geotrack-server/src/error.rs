use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use geotrack_core::{ErrorKind, GeotrackError};

// ---------------------------------------------------------------------------
// Internal sentinel for request-shape errors
// ---------------------------------------------------------------------------

/// Carries an explicit 400 through the `anyhow::Error` chain for malformed
/// request bodies, which never reach the core.
#[derive(Debug)]
struct BadRequestError(String);

impl std::fmt::Display for BadRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequestError {}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
///
/// Body is always `{"error": "...", "kind": "..."}`.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequestError(msg.into()).into())
    }

    fn status_and_kind(&self) -> (StatusCode, ErrorKind) {
        if self.0.downcast_ref::<BadRequestError>().is_some() {
            return (StatusCode::BAD_REQUEST, ErrorKind::Validation);
        }
        let Some(e) = self.0.downcast_ref::<GeotrackError>() else {
            return (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Internal);
        };
        let status = match e {
            GeotrackError::InvalidCoordinates { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            other => match other.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
                ErrorKind::Export | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        };
        (status, e.kind())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            tracing::warn!(%status, error = %format!("{:#}", self.0), "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string(), "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;
    use std::path::PathBuf;

    fn status_of(e: GeotrackError) -> StatusCode {
        AppError(e.into()).into_response().status()
    }

    #[test]
    fn invalid_interval_maps_to_400() {
        assert_eq!(status_of(GeotrackError::InvalidInterval(0)), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_imei_maps_to_400() {
        assert_eq!(
            status_of(GeotrackError::InvalidImei("../x".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn invalid_destination_maps_to_400() {
        assert_eq!(
            status_of(GeotrackError::InvalidDestination("a/b".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn invalid_coordinates_map_to_422() {
        let e = GeotrackError::InvalidCoordinates {
            imei: "a".into(),
            latitude: 91.0,
            longitude: 0.0,
        };
        assert_eq!(status_of(e), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn upstream_maps_to_502() {
        assert_eq!(
            status_of(GeotrackError::upstream("vendor down")),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn export_maps_to_500() {
        let e = GeotrackError::Export {
            path: PathBuf::from("/ro/current.geojson"),
            source: std::io::Error::other("read-only file system"),
        };
        assert_eq!(status_of(e), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn foreign_error_maps_to_500() {
        let response = AppError(anyhow::anyhow!("something unexpected")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn bad_request_constructor_maps_to_400() {
        let response = AppError::bad_request("body is not JSON").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn body_carries_error_and_kind() {
        let response = AppError(GeotrackError::upstream("timeout").into()).into_response();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["kind"], "upstream");
        assert!(json["error"].as_str().unwrap().contains("timeout"));
    }
}
