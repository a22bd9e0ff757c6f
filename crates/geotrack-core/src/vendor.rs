//! Contract the core consumes from the telemetry vendor.

use crate::error::Result;
use crate::types::{Device, DeviceLocation};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Telemetry vendor operations.
///
/// Every call may block on network I/O and every call can fail with
/// [`GeotrackError::Upstream`](crate::GeotrackError::Upstream). Timeouts belong to
/// the implementation; the core never imposes one.
#[async_trait]
pub trait VendorClient: Send + Sync {
    /// All devices on the account.
    async fn list_devices(&self) -> Result<Vec<Device>>;

    /// Latest known position of every (monitored) device.
    async fn fetch_current_locations(&self) -> Result<Vec<DeviceLocation>>;

    /// Track points reported by `imei` during `date` (UTC day).
    async fn fetch_history(&self, imei: &str, date: NaiveDate) -> Result<Vec<DeviceLocation>>;
}
