//! Periodic fetch-update-export cycles.
//!
//! The scheduler is a two-state machine (`Stopped`/`Running`). While running, a
//! single tokio task ticks on a fixed interval and runs one cycle per tick:
//!
//! 1. fetch current locations from the vendor
//! 2. build the FeatureCollection (coordinate validation)
//! 3. replace the snapshot and write the artifact, ordered by the
//!    [`ExportFailurePolicy`]
//!
//! Scheduled and manual cycles share an async lock, so at most one cycle is in
//! flight. Cancellation is observed only between cycles: `stop()` never aborts a
//! cycle that has already started, and a tick still queued on the lock is
//! dropped. Each cycle runs in its own task; a panic is recorded as an
//! `internal` failure and the loop carries on.

use crate::config::ExportFailurePolicy;
use crate::error::{ErrorKind, GeotrackError, Result};
use crate::export::{ExportArtifact, Exporter};
use crate::format::ExportFormat;
use crate::snapshot::SnapshotStore;
use crate::types::SourceQuery;
use crate::vendor::VendorClient;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Status types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleTrigger {
    Scheduled,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Success {
        devices: usize,
        artifact: PathBuf,
    },
    Failure {
        kind: ErrorKind,
        error: String,
        /// Whether the snapshot advanced before the failure (export failures
        /// under `keep_fresh`).
        snapshot_updated: bool,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success { .. })
    }
}

/// One completed cycle.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub trigger: CycleTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub interval_secs: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub last_run: Option<RunRecord>,
    pub last_success_at: Option<DateTime<Utc>>,
    /// Most recent failure message; kept after later successes.
    pub last_error: Option<String>,
    pub stats: CycleStats,
}

impl SchedulerStatus {
    fn stopped(interval_secs: u64) -> Self {
        Self {
            state: SchedulerState::Stopped,
            interval_secs,
            started_at: None,
            last_run: None,
            last_success_at: None,
            last_error: None,
            stats: CycleStats::default(),
        }
    }
}

/// Longest accepted auto-update period (one day).
pub const MAX_INTERVAL_SECS: u64 = 86_400;

/// Accept `1..=MAX_INTERVAL_SECS`.
pub fn validate_interval(secs: i64) -> Result<u64> {
    let secs = u64::try_from(secs).map_err(|_| GeotrackError::InvalidInterval(secs))?;
    check_interval(secs)
}

fn check_interval(secs: u64) -> Result<u64> {
    match secs {
        0 => Err(GeotrackError::InvalidInterval(0)),
        s if s > MAX_INTERVAL_SECS => Err(GeotrackError::IntervalTooLong(s)),
        s => Ok(s),
    }
}

/// Where a cycle writes its artifact. Scheduled cycles always use the
/// default: the deterministic GeoJSON name.
#[derive(Debug, Clone, Default)]
pub struct CycleTarget {
    /// Resolved path inside the output directory; `None` for the deterministic name.
    path: Option<PathBuf>,
    format: ExportFormat,
}

impl CycleTarget {
    /// Resolve a caller-supplied file name against the exporter's directory.
    pub fn new(exporter: &Exporter, name: Option<&str>, format: ExportFormat) -> Result<Self> {
        let path = name
            .map(|n| exporter.named_destination(n, format))
            .transpose()?;
        Ok(Self { path, format })
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

struct Shared {
    vendor: Arc<dyn VendorClient>,
    store: Arc<SnapshotStore>,
    exporter: Exporter,
    policy: ExportFailurePolicy,
    status: Mutex<SchedulerStatus>,
    cycle_lock: tokio::sync::Mutex<()>,
    events: broadcast::Sender<RunRecord>,
}

struct CycleFailure {
    error: GeotrackError,
    snapshot_updated: bool,
}

impl CycleFailure {
    fn before_update(error: GeotrackError) -> Self {
        Self {
            error,
            snapshot_updated: false,
        }
    }

    fn after_update(error: GeotrackError) -> Self {
        Self {
            error,
            snapshot_updated: true,
        }
    }
}

pub struct Scheduler {
    shared: Arc<Shared>,
    control: Mutex<Option<CancellationToken>>,
}

impl Scheduler {
    pub fn new(
        vendor: Arc<dyn VendorClient>,
        store: Arc<SnapshotStore>,
        exporter: Exporter,
        policy: ExportFailurePolicy,
        default_interval_secs: u64,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                vendor,
                store,
                exporter,
                policy,
                status: Mutex::new(SchedulerStatus::stopped(default_interval_secs)),
                cycle_lock: tokio::sync::Mutex::new(()),
                events,
            }),
            control: Mutex::new(None),
        }
    }

    /// Transition to `Running` and spawn the periodic task. The first cycle runs
    /// immediately. A no-op when already running, even with a different
    /// interval.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, interval_secs: i64) -> Result<SchedulerStatus> {
        self.start_secs(validate_interval(interval_secs)?)
    }

    /// [`start`](Self::start) for an unsigned period, e.g. from the config file.
    pub fn start_secs(&self, secs: u64) -> Result<SchedulerStatus> {
        let secs = check_interval(secs)?;
        let mut control = lock(&self.control);
        if control.is_some() {
            debug!(requested = secs, "auto-update already running");
            return Ok(self.status());
        }

        {
            let mut status = lock(&self.shared.status);
            status.state = SchedulerState::Running;
            status.interval_secs = secs;
            status.started_at = Some(Utc::now());
        }

        let token = CancellationToken::new();
        tokio::spawn(run_loop(
            Arc::clone(&self.shared),
            Duration::from_secs(secs),
            token.clone(),
        ));
        *control = Some(token);
        info!(interval_secs = secs, "auto-update started");
        Ok(self.status())
    }

    /// Transition to `Stopped`. A cycle already in flight runs to completion;
    /// no further cycle starts.
    pub fn stop(&self) -> SchedulerStatus {
        if let Some(token) = lock(&self.control).take() {
            token.cancel();
            let mut status = lock(&self.shared.status);
            status.state = SchedulerState::Stopped;
            status.started_at = None;
            info!("auto-update stopped");
        }
        self.status()
    }

    pub fn status(&self) -> SchedulerStatus {
        lock(&self.shared.status).clone()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.control).is_some()
    }

    /// Run one cycle now, whatever the state, after any in-flight cycle.
    /// The outcome is recorded and broadcast like a scheduled one; a failure is
    /// also returned.
    pub async fn run_now(&self) -> Result<RunRecord> {
        self.run_now_to(CycleTarget::default()).await
    }

    /// [`run_now`](Self::run_now) writing to `target` instead of the default
    /// artifact.
    pub async fn run_now_to(&self, target: CycleTarget) -> Result<RunRecord> {
        self.shared.run_cycle(CycleTrigger::Manual, target).await
    }

    pub fn exporter(&self) -> &Exporter {
        &self.shared.exporter
    }

    /// Receive every completed cycle from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RunRecord> {
        self.shared.events.subscribe()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(token) = lock(&self.control).take() {
            token.cancel();
        }
    }
}

async fn run_loop(shared: Arc<Shared>, period: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let _cycle = shared.cycle_lock.lock().await;
        // stop() may have landed while this tick queued behind a manual cycle
        if token.is_cancelled() {
            debug!("queued tick dropped after stop");
            break;
        }
        // failures are recorded in the status; the loop keeps going
        let _ = Shared::run_locked(&shared, CycleTrigger::Scheduled, CycleTarget::default()).await;
    }
    debug!("auto-update loop exited");
}

impl Shared {
    async fn run_cycle(self: &Arc<Self>, trigger: CycleTrigger, target: CycleTarget) -> Result<RunRecord> {
        let _cycle = self.cycle_lock.lock().await;
        Self::run_locked(self, trigger, target).await
    }

    /// One cycle; the caller holds `cycle_lock`.
    async fn run_locked(
        self: &Arc<Self>,
        trigger: CycleTrigger,
        target: CycleTarget,
    ) -> Result<RunRecord> {
        let started_at = Utc::now();

        // own task, so a panic becomes a recorded failure instead of killing the loop
        let shared = Arc::clone(self);
        let result = match tokio::spawn(async move { shared.execute(&target).await }).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(CycleFailure::before_update(GeotrackError::Task(
                format!("cycle panicked: {}", panic_message(e.into_panic())),
            ))),
            Err(e) => Err(CycleFailure::before_update(GeotrackError::Task(format!(
                "cycle task failed: {e}"
            )))),
        };
        let finished_at = Utc::now();

        let (outcome, error) = match result {
            Ok(artifact) => (
                RunOutcome::Success {
                    devices: artifact.total_features(),
                    artifact: artifact.path,
                },
                None,
            ),
            Err(failure) => (
                RunOutcome::Failure {
                    kind: failure.error.kind(),
                    error: failure.error.to_string(),
                    snapshot_updated: failure.snapshot_updated,
                },
                Some(failure.error),
            ),
        };

        let record = RunRecord {
            trigger,
            started_at,
            finished_at,
            outcome,
        };
        self.record(&record);

        match error {
            Some(e) => Err(e),
            None => Ok(record),
        }
    }

    async fn execute(&self, target: &CycleTarget) -> std::result::Result<ExportArtifact, CycleFailure> {
        let locations = self
            .vendor
            .fetch_current_locations()
            .await
            .map_err(CycleFailure::before_update)?;

        let collection = self
            .exporter
            .build(&locations, SourceQuery::Current)
            .map_err(CycleFailure::before_update)?;
        let format = target.format;
        let destination = target.path.clone().unwrap_or_else(|| {
            self.exporter
                .destination_for(&SourceQuery::Current, collection.metadata.generated_at, format)
        });

        match self.policy {
            ExportFailurePolicy::KeepFresh => {
                self.store.replace(locations);
                self.exporter
                    .write_blocking(collection, destination, format)
                    .await
                    .map_err(CycleFailure::after_update)
            }
            ExportFailurePolicy::KeepConsistent => {
                let artifact = self
                    .exporter
                    .write_blocking(collection, destination, format)
                    .await
                    .map_err(CycleFailure::before_update)?;
                self.store.replace(locations);
                Ok(artifact)
            }
        }
    }

    fn record(&self, record: &RunRecord) {
        {
            let mut status = lock(&self.status);
            status.stats.total += 1;
            match &record.outcome {
                RunOutcome::Success { devices, artifact } => {
                    status.stats.succeeded += 1;
                    status.last_success_at = Some(record.finished_at);
                    info!(
                        trigger = ?record.trigger,
                        devices,
                        artifact = %artifact.display(),
                        "cycle completed"
                    );
                }
                RunOutcome::Failure { kind, error, .. } => {
                    status.stats.failed += 1;
                    status.last_error = Some(error.clone());
                    warn!(trigger = ?record.trigger, %kind, error = %error, "cycle failed");
                }
            }
            status.last_run = Some(record.clone());
        }
        // no subscribers is fine
        let _ = self.events.send(record.clone());
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
