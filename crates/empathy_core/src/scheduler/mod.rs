//! Job scheduling for matching passes and lifecycle scans.
//!
//! # Responsibility
//! - Fire `matching_job`, `room_warning_job` and `cleanup_job` on their
//!   calendar or interval triggers.
//! - Expose manual matching and cleanup triggers plus a status snapshot.
//!
//! # Invariants
//! - Runs of one job never overlap; a run that finds the job busy is skipped.
//! - Every run opens its own SQLite connection on a blocking thread.
//! - The scheduler holds no business state; all state lives in the store.

mod guard;
mod trigger;

pub use guard::{JobGuard, JobPermit};
pub use trigger::JobTrigger;

use crate::config::EngineConfig;
use crate::db::{open_db, DbError};
use crate::repo::{RepoError, RepoResult};
use crate::service::lifecycle_service::{CleanupReport, LifecycleService};
use crate::service::matching_service::{MatchingService, RoomSummary};
use chrono::{DateTime, Local, Utc};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::AbortHandle;

/// Scheduled job identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobId {
    Matching,
    RoomWarning,
    Cleanup,
}

impl JobId {
    pub const ALL: [JobId; 3] = [JobId::Matching, JobId::RoomWarning, JobId::Cleanup];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Matching => "matching_job",
            Self::RoomWarning => "room_warning_job",
            Self::Cleanup => "cleanup_job",
        }
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum SchedulerError {
    /// `start()` was called outside a tokio runtime.
    NoRuntime,
    Db(DbError),
    Repo(RepoError),
    /// The blocking job thread panicked or was cancelled.
    Join(String),
}

impl Display for SchedulerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRuntime => write!(f, "scheduler requires a running tokio runtime"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Join(message) => write!(f, "job thread failed: {message}"),
        }
    }
}

impl Error for SchedulerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::NoRuntime | Self::Join(_) => None,
        }
    }
}

impl From<DbError> for SchedulerError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for SchedulerError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Result of a manual matching trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManualMatchingReport {
    pub success: bool,
    /// The job was already running; nothing was done.
    pub skipped: bool,
    pub message: String,
    pub rooms_created: usize,
    pub rooms: Vec<RoomSummary>,
}

/// Result of a manual cleanup trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManualCleanupReport {
    pub success: bool,
    pub skipped: bool,
    pub message: String,
    pub details: Option<CleanupReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub id: &'static str,
    /// `None` while the scheduler is stopped.
    pub next_fire_time: Option<DateTime<Local>>,
    pub executing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub jobs: Vec<JobStatus>,
}

struct JobSlot {
    id: JobId,
    trigger: JobTrigger,
    guard: JobGuard,
    next_fire: Mutex<Option<DateTime<Local>>>,
}

impl JobSlot {
    fn new(id: JobId, trigger: JobTrigger) -> Self {
        Self {
            id,
            trigger,
            guard: JobGuard::new(),
            next_fire: Mutex::new(None),
        }
    }

    fn set_next_fire(&self, value: Option<DateTime<Local>>) {
        *lock(&self.next_fire) = value;
    }

    fn status(&self) -> JobStatus {
        JobStatus {
            id: self.id.as_str(),
            next_fire_time: *lock(&self.next_fire),
            executing: self.guard.is_busy(),
        }
    }
}

struct SchedulerInner {
    database_path: PathBuf,
    matching: MatchingService,
    lifecycle: LifecycleService,
    matching_slot: JobSlot,
    warning_slot: JobSlot,
    cleanup_slot: JobSlot,
}

impl SchedulerInner {
    fn slot(&self, id: JobId) -> &JobSlot {
        match id {
            JobId::Matching => &self.matching_slot,
            JobId::RoomWarning => &self.warning_slot,
            JobId::Cleanup => &self.cleanup_slot,
        }
    }

    /// Runs `work` on a blocking thread with a fresh connection.
    ///
    /// Returns `Ok(None)` when the job was already in flight.
    async fn run_guarded<T, F>(
        self: &Arc<Self>,
        id: JobId,
        work: F,
    ) -> Result<Option<T>, SchedulerError>
    where
        T: Send + 'static,
        F: FnOnce(&SchedulerInner, &mut Connection, i64) -> RepoResult<T> + Send + 'static,
    {
        let Some(permit) = self.slot(id).guard.try_acquire() else {
            debug!(
                "event=job_skip module=scheduler status=skipped job={} reason=in_flight",
                id
            );
            return Ok(None);
        };

        let inner = Arc::clone(self);
        let handle = tokio::task::spawn_blocking(move || -> Result<T, SchedulerError> {
            let _permit = permit;
            let mut conn = open_db(&inner.database_path)?;
            Ok(work(inner.as_ref(), &mut conn, now_ms())?)
        });

        match handle.await {
            Ok(result) => result.map(Some),
            Err(err) => Err(SchedulerError::Join(err.to_string())),
        }
    }
}

/// Drives the three jobs on a tokio runtime.
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
    enabled: bool,
    tasks: Mutex<Vec<AbortHandle>>,
}

impl Scheduler {
    /// Creates a stopped scheduler with the greedy matching strategy.
    pub fn new(config: EngineConfig) -> Self {
        let matching = MatchingService::new(config.clone());
        Self::with_matching_service(config, matching)
    }

    pub fn with_matching_service(config: EngineConfig, matching: MatchingService) -> Self {
        let scheduler = &config.scheduler;
        let inner = SchedulerInner {
            database_path: config.storage.database_path.clone(),
            lifecycle: LifecycleService::new(&config),
            matching,
            matching_slot: JobSlot::new(
                JobId::Matching,
                JobTrigger::DailyAt {
                    hours: scheduler.matching_hours.clone(),
                },
            ),
            warning_slot: JobSlot::new(
                JobId::RoomWarning,
                JobTrigger::Every {
                    minutes: scheduler.warning_interval_minutes,
                },
            ),
            cleanup_slot: JobSlot::new(
                JobId::Cleanup,
                JobTrigger::Every {
                    minutes: scheduler.cleanup_interval_minutes,
                },
            ),
        };

        Self {
            inner: Arc::new(inner),
            enabled: scheduler.enabled,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawns one trigger loop per job on the current runtime.
    ///
    /// No-op when already running or when scheduling is disabled.
    pub fn start(&self) -> Result<(), SchedulerError> {
        if !self.enabled {
            info!("event=scheduler_start module=scheduler status=disabled");
            return Ok(());
        }

        let mut tasks = lock(&self.tasks);
        if !tasks.is_empty() {
            debug!("event=scheduler_start module=scheduler status=already_running");
            return Ok(());
        }

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        for id in JobId::ALL {
            let handle = runtime.spawn(job_loop(Arc::clone(&self.inner), id));
            tasks.push(handle.abort_handle());
        }

        info!(
            "event=scheduler_start module=scheduler status=ok jobs={}",
            tasks.len()
        );
        Ok(())
    }

    /// Stops the trigger loops. Runs already in flight finish on their own.
    pub fn shutdown(&self) {
        let mut tasks = lock(&self.tasks);
        if tasks.is_empty() {
            return;
        }
        for handle in tasks.drain(..) {
            handle.abort();
        }
        for id in JobId::ALL {
            self.inner.slot(id).set_next_fire(None);
        }
        info!("event=scheduler_shutdown module=scheduler status=ok");
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: !lock(&self.tasks).is_empty(),
            jobs: JobId::ALL
                .into_iter()
                .map(|id| self.inner.slot(id).status())
                .collect(),
        }
    }

    /// Fire times the jobs would get if the schedule started at `now`.
    pub fn preview(&self, now: DateTime<Local>) -> Vec<JobStatus> {
        JobId::ALL
            .into_iter()
            .map(|id| {
                let slot = self.inner.slot(id);
                JobStatus {
                    id: id.as_str(),
                    next_fire_time: slot.trigger.next_after(&now),
                    executing: slot.guard.is_busy(),
                }
            })
            .collect()
    }

    /// Shared overlap guard of one job.
    pub fn job_guard(&self, id: JobId) -> &JobGuard {
        &self.inner.slot(id).guard
    }

    /// Runs one matching pass now, outside the schedule.
    pub async fn trigger_matching(&self) -> ManualMatchingReport {
        match run_matching(&self.inner).await {
            Ok(Some(rooms)) => ManualMatchingReport {
                success: true,
                skipped: false,
                message: format!("matching completed, {} rooms created", rooms.len()),
                rooms_created: rooms.len(),
                rooms,
            },
            Ok(None) => ManualMatchingReport {
                success: true,
                skipped: true,
                message: "matching is already running".to_string(),
                rooms_created: 0,
                rooms: Vec::new(),
            },
            Err(err) => ManualMatchingReport {
                success: false,
                skipped: false,
                message: format!("matching failed: {err}"),
                rooms_created: 0,
                rooms: Vec::new(),
            },
        }
    }

    /// Runs one cleanup pass now, outside the schedule.
    pub async fn trigger_cleanup(&self) -> ManualCleanupReport {
        match run_cleanup(&self.inner).await {
            Ok(Some(report)) => ManualCleanupReport {
                success: true,
                skipped: false,
                message: format!("cleanup completed, {} records affected", report.total()),
                details: Some(report),
            },
            Ok(None) => ManualCleanupReport {
                success: true,
                skipped: true,
                message: "cleanup is already running".to_string(),
                details: None,
            },
            Err(err) => ManualCleanupReport {
                success: false,
                skipped: false,
                message: format!("cleanup failed: {err}"),
                details: None,
            },
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for handle in lock(&self.tasks).drain(..) {
            handle.abort();
        }
    }
}

async fn run_matching(
    inner: &Arc<SchedulerInner>,
) -> Result<Option<Vec<RoomSummary>>, SchedulerError> {
    inner
        .run_guarded(JobId::Matching, |inner, conn, now| {
            inner.matching.run(conn, now).map(|outcome| outcome.rooms)
        })
        .await
}

async fn run_cleanup(inner: &Arc<SchedulerInner>) -> Result<Option<CleanupReport>, SchedulerError> {
    inner
        .run_guarded(JobId::Cleanup, |inner, conn, now| {
            inner.lifecycle.cleanup(conn, now)
        })
        .await
}

async fn job_loop(inner: Arc<SchedulerInner>, id: JobId) {
    let mut last_fired: Option<DateTime<Local>> = None;
    loop {
        let now = Local::now();
        let trigger = &inner.slot(id).trigger;
        let next = match &last_fired {
            Some(fired) => trigger.next_after_fire(fired, &now),
            None => trigger.next_after(&now),
        };
        let Some(next) = next else {
            warn!(
                "event=job_schedule module=scheduler status=disabled job={} reason=no_fire_time",
                id
            );
            inner.slot(id).set_next_fire(None);
            return;
        };
        inner.slot(id).set_next_fire(Some(next));
        debug!(
            "event=job_schedule module=scheduler status=ok job={} next_fire={}",
            id,
            next.to_rfc3339()
        );

        let wait = (next - now).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        // Fire without awaiting so the cadence holds; the guard skips overlaps.
        tokio::spawn(fire(Arc::clone(&inner), id));
        last_fired = Some(next);
    }
}

async fn fire(inner: Arc<SchedulerInner>, id: JobId) {
    let result = match id {
        JobId::Matching => run_matching(&inner)
            .await
            .map(|rooms| rooms.map(|rooms| format!("rooms_created={}", rooms.len()))),
        JobId::RoomWarning => inner
            .run_guarded(id, |inner, conn, now| inner.lifecycle.warn_expiring(conn, now))
            .await
            .map(|report| report.map(|report| format!("rooms_warned={}", report.rooms_warned))),
        JobId::Cleanup => run_cleanup(&inner)
            .await
            .map(|report| report.map(|report| format!("affected={}", report.total()))),
    };

    match result {
        Ok(Some(summary)) => info!(
            "event=job_run module=scheduler status=ok job={} {}",
            id, summary
        ),
        Ok(None) => {}
        Err(err) => error!(
            "event=job_run module=scheduler status=error job={} error={}",
            id, err
        ),
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
