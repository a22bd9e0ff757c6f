pub mod config;
pub mod devices;
pub mod export;
pub mod serve;

use anyhow::Context;
use geotrack_core::config::Config;
use geotrack_core::Tracker;
use std::sync::Arc;
use tracksolid_client::{Credentials, TrackSolidClient};

/// Build the tracker against the TrackSolid API, with credentials from the
/// environment.
pub fn build_tracker(config: &Config) -> anyhow::Result<Arc<Tracker>> {
    let credentials = Credentials::from_env().context("TrackSolid credentials")?;
    let client = TrackSolidClient::new(credentials, &config.vendor)?;
    tracing::debug!(endpoint = client.endpoint(), "TrackSolid client ready");
    Ok(Arc::new(Tracker::new(Arc::new(client), config)))
}
