pub mod auto_update;
pub mod devices;
pub mod events;
pub mod exports;
pub mod locations;
pub mod refresh;
pub mod status;

use crate::error::AppError;
use axum::body::Bytes;
use serde::de::DeserializeOwned;

/// Parse an optional JSON body; an empty body yields the default.
pub(crate) fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    required_json(body)
}

pub(crate) fn required_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::bad_request(format!("invalid JSON body: {e}")))
}
