use geotrack_core::GeotrackError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackSolidError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TrackSolid returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("TrackSolid API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("malformed TrackSolid response: {0}")]
    Decode(String),

    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(&'static str),
}

impl TrackSolidError {
    /// Whether the cached access token should be discarded after this error.
    pub(crate) fn invalidates_session(&self) -> bool {
        matches!(self, TrackSolidError::Api { .. })
    }
}

impl From<TrackSolidError> for GeotrackError {
    fn from(e: TrackSolidError) -> Self {
        match e {
            TrackSolidError::MissingCredential(_) => GeotrackError::InvalidConfig(e.to_string()),
            other => GeotrackError::Upstream(other.to_string()),
        }
    }
}
