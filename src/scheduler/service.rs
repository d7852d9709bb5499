//! Cleanup scheduler.
//!
//! Fires a reconciliation pass on a fixed interval in a background task.
//! The scheduler is an ordinary value owned by the server state; starting
//! and stopping it is a method call, and each run of the loop holds its own
//! cancellation token.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::reconcile::{ReconcileJob, ReconcileReport};

use super::error::{Result, SchedulerError};

/// Default interval between passes (five minutes).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

// ============================================================================
// Public API
// ============================================================================

/// Scheduler settings.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub interval: Duration,
    /// Run a pass as soon as the loop starts instead of after one interval.
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            run_on_start: true,
        }
    }
}

/// Summary of the most recent pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastRun {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub completed: usize,
    pub recovered: usize,
    pub failed: usize,
    /// Set when the pass could not run at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Snapshot returned by [`CleanupScheduler::status`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<LastRun>,
    pub total_runs: u64,
}

/// Periodic driver of the reconciliation job.
///
/// Cheap to clone; all clones control the same loop.
#[derive(Clone)]
pub struct CleanupScheduler {
    inner: Arc<Inner>,
}

impl CleanupScheduler {
    pub fn new(job: ReconcileJob, config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                job,
                config,
                run_lock: Mutex::new(()),
                loop_state: Mutex::new(None),
                history: Mutex::new(History::default()),
            }),
        }
    }

    /// Start the loop.
    pub async fn start(&self) -> Result<SchedulerStatus> {
        {
            let mut loop_state = self.inner.loop_state.lock().await;
            if loop_state.is_some() {
                return Err(SchedulerError::AlreadyRunning);
            }

            let cancel = CancellationToken::new();
            let handle = tokio::spawn(run_loop(self.inner.clone(), cancel.clone()));
            *loop_state = Some(RunningLoop {
                cancel,
                handle,
                started_at: Utc::now(),
            });
        }

        info!(
            interval_secs = self.inner.config.interval.as_secs(),
            run_on_start = self.inner.config.run_on_start,
            "Cleanup scheduler started"
        );
        Ok(self.status().await)
    }

    /// Stop the loop, waiting for an in-progress pass to finish.
    pub async fn stop(&self) -> Result<SchedulerStatus> {
        let running = self
            .inner
            .loop_state
            .lock()
            .await
            .take()
            .ok_or(SchedulerError::NotRunning)?;

        running.cancel.cancel();
        running
            .handle
            .await
            .map_err(|e| SchedulerError::TaskFailed(e.to_string()))?;

        info!("Cleanup scheduler stopped");
        Ok(self.status().await)
    }

    /// Current state of the loop.
    pub async fn status(&self) -> SchedulerStatus {
        let started_at = self
            .inner
            .loop_state
            .lock()
            .await
            .as_ref()
            .map(|running| running.started_at);
        let history = self.inner.history.lock().await;

        SchedulerStatus {
            running: started_at.is_some(),
            interval_seconds: self.inner.config.interval.as_secs(),
            started_at,
            last_run: history.last.clone(),
            total_runs: history.total_runs,
        }
    }

    /// Run a pass now, waiting for any pass already in progress.
    pub async fn run_now(&self) -> Result<ReconcileReport> {
        self.inner.run_pass().await
    }

    /// Stop the loop if it is running.
    pub async fn shutdown(&self) {
        match self.stop().await {
            Ok(_) | Err(SchedulerError::NotRunning) => {}
            Err(e) => warn!(error = %e, "Cleanup scheduler did not stop cleanly"),
        }
    }
}

// ============================================================================
// Internal Types
// ============================================================================

struct Inner {
    job: ReconcileJob,
    config: SchedulerConfig,
    /// Held for the duration of a pass.
    run_lock: Mutex<()>,
    loop_state: Mutex<Option<RunningLoop>>,
    history: Mutex<History>,
}

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    started_at: DateTime<Utc>,
}

#[derive(Default)]
struct History {
    last: Option<LastRun>,
    total_runs: u64,
}

impl Inner {
    async fn run_pass(&self) -> Result<ReconcileReport> {
        let _guard = self.run_lock.lock().await;
        let started_at = Utc::now();
        let result = self.job.run(started_at).await;

        let last = match &result {
            Ok(report) => LastRun {
                started_at,
                finished_at: report.finished_at,
                completed: report.completed.len(),
                recovered: report.recovered.len(),
                failed: report.failures.len(),
                error: None,
            },
            Err(e) => LastRun {
                started_at,
                finished_at: Utc::now(),
                completed: 0,
                recovered: 0,
                failed: 0,
                error: Some(e.to_string()),
            },
        };

        let mut history = self.history.lock().await;
        history.last = Some(last);
        history.total_runs += 1;

        result.map_err(SchedulerError::from)
    }
}

/// Main loop: tick, run, repeat until cancelled.
async fn run_loop(inner: Arc<Inner>, cancel: CancellationToken) {
    let period = inner.config.interval;
    let first = if inner.config.run_on_start {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut ticker = tokio::time::interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Cleanup loop cancelled");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = inner.run_pass().await {
                    error!(error = %e, "Scheduled cleanup failed");
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
