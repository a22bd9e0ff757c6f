//! `tracksolid-client`: TrackSolid Pro open API client for geotrack.
//!
//! Implements [`geotrack_core::VendorClient`] on top of the vendor's single
//! signed REST endpoint.
//!
//! # Protocol
//!
//! ```text
//! POST <endpoint>   application/x-www-form-urlencoded
//!     app_key, format=json, method, sign_method=md5,
//!     timestamp (UTC), v=1.0, [access_token], ...method params,
//!     sign = MD5(secret + sorted k/v pairs + secret), upper-case hex
//!
//! <- { "code": 0, "message": "...", "result": ... }
//! ```
//!
//! | trait method               | API method                 |
//! |----------------------------|----------------------------|
//! | `list_devices`             | `jimi.user.device.list`    |
//! | `fetch_current_locations`  | `jimi.device.location.get` |
//! | `fetch_history`            | `jimi.device.track.list`   |
//!
//! Access tokens come from `jimi.oauth.token.get` and are cached until shortly
//! before they expire.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use tracksolid_client::{Credentials, TrackSolidClient};
//! use geotrack_core::{config::VendorConfig, VendorClient};
//!
//! let client = TrackSolidClient::new(Credentials::from_env()?, &VendorConfig::default())?;
//! for loc in client.fetch_current_locations().await? {
//!     println!("{} {} {}", loc.imei, loc.latitude, loc.longitude);
//! }
//! ```

pub mod client;
pub mod error;
pub mod sign;
pub mod types;

#[cfg(test)]
mod tests;

pub use client::{Credentials, TrackSolidClient};
pub use error::TrackSolidError;

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, TrackSolidError>;
