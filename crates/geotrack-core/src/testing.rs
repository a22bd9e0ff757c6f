//! Scripted [`VendorClient`] used by the scheduler and tracker tests.

use crate::error::{GeotrackError, Result};
use crate::types::{Device, DeviceLocation};
use crate::vendor::VendorClient;
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

pub(crate) fn loc(imei: &str, lat: f64, lon: f64) -> DeviceLocation {
    let ts = Utc.with_ymd_and_hms(2026, 1, 10, 8, 0, 0).unwrap();
    DeviceLocation::new(imei, lat, lon, ts)
}

enum Step {
    Reply(Result<Vec<DeviceLocation>>),
    Panic(&'static str),
}

#[derive(Default)]
pub(crate) struct ScriptedVendor {
    current: Mutex<VecDeque<Step>>,
    history: Mutex<Vec<DeviceLocation>>,
    gated: bool,
    delay: Option<Duration>,
    /// Signalled every time a current-locations fetch starts.
    pub entered: Notify,
    /// Releases one gated fetch.
    pub release: Notify,
    pub current_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedVendor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches of current locations block until [`release`](Self::release) is notified.
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    /// Every fetch of current locations takes `delay` (tokio time).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn then_ok(self, locations: Vec<DeviceLocation>) -> Self {
        self.current.lock().unwrap().push_back(Step::Reply(Ok(locations)));
        self
    }

    pub fn then_err(self, msg: &str) -> Self {
        self.current
            .lock()
            .unwrap()
            .push_back(Step::Reply(Err(GeotrackError::upstream(msg))));
        self
    }

    /// The next fetch panics with `msg`.
    pub fn then_panic(self, msg: &'static str) -> Self {
        self.current.lock().unwrap().push_back(Step::Panic(msg));
        self
    }

    pub fn with_history(self, points: Vec<DeviceLocation>) -> Self {
        *self.history.lock().unwrap() = points;
        self
    }
}

#[async_trait]
impl VendorClient for ScriptedVendor {
    async fn list_devices(&self) -> Result<Vec<Device>> {
        Ok(vec![Device {
            imei: "860000000000001".into(),
            name: Some("Truck 1".into()),
            model: None,
            plate: None,
            enabled: true,
        }])
    }

    async fn fetch_current_locations(&self) -> Result<Vec<DeviceLocation>> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.entered.notify_one();

        if self.gated {
            self.release.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let step = self.current.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(result)) => result,
            Some(Step::Panic(msg)) => panic!("{msg}"),
            None => Err(GeotrackError::upstream("script exhausted")),
        }
    }

    async fn fetch_history(&self, imei: &str, _date: NaiveDate) -> Result<Vec<DeviceLocation>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        if imei == "UNKNOWN" {
            return Err(GeotrackError::upstream("device not found"));
        }
        Ok(self.history.lock().unwrap().clone())
    }
}
