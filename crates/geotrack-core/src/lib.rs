pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod geojson;
pub mod io;
pub mod paths;
pub mod scheduler;
pub mod snapshot;
pub mod tracker;
pub mod types;
pub mod vendor;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ErrorKind, GeotrackError, Result};
pub use format::ExportFormat;
pub use tracker::Tracker;
pub use vendor::VendorClient;
