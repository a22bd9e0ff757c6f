//! In-memory store for the latest known device locations.

use crate::types::DeviceLocation;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Latest location per device at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    locations: BTreeMap<String, DeviceLocation>,
}

impl Snapshot {
    /// Empty snapshot stamped with the Unix epoch.
    pub fn empty() -> Self {
        Self {
            captured_at: DateTime::<Utc>::UNIX_EPOCH,
            locations: BTreeMap::new(),
        }
    }

    /// Build a snapshot; later entries win over earlier ones with the same IMEI.
    pub fn from_locations(
        locations: impl IntoIterator<Item = DeviceLocation>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        let mut map = BTreeMap::new();
        for loc in locations {
            map.insert(loc.imei.clone(), loc);
        }
        Self {
            captured_at,
            locations: map,
        }
    }

    pub fn get(&self, imei: &str) -> Option<&DeviceLocation> {
        self.locations.get(imei)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Locations ordered by IMEI.
    pub fn locations(&self) -> impl Iterator<Item = &DeviceLocation> {
        self.locations.values()
    }

    pub fn to_vec(&self) -> Vec<DeviceLocation> {
        self.locations.values().cloned().collect()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Owner of the current [`Snapshot`].
///
/// `replace` builds the new snapshot outside the lock and then swaps the `Arc`,
/// so a reader holding the result of `current()` keeps a complete snapshot for as
/// long as it needs it.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, locations: Vec<DeviceLocation>) -> Arc<Snapshot> {
        self.replace_at(locations, Utc::now())
    }

    pub fn replace_at(
        &self,
        locations: Vec<DeviceLocation>,
        captured_at: DateTime<Utc>,
    ) -> Arc<Snapshot> {
        let next = Arc::new(Snapshot::from_locations(locations, captured_at));
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::clone(&next);
        next
    }

    pub fn current(&self) -> Arc<Snapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }
}
