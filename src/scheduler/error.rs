//! Scheduler error types.

use thiserror::Error;

use crate::reconcile::ReconcileError;

/// Errors that can occur in the cleanup scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `start` called while the loop is running.
    #[error("cleanup scheduler is already running")]
    AlreadyRunning,

    /// `stop` called while the loop is stopped.
    #[error("cleanup scheduler is not running")]
    NotRunning,

    /// The pass itself failed.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// The loop task panicked or was aborted.
    #[error("scheduler task failed: {0}")]
    TaskFailed(String),
}

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;
