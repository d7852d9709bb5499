//! Reconciliation error types.

use thiserror::Error;

use crate::booking::ArchiveKind;
use crate::store::StorageError;

use super::report::FailureStage;

/// Errors from archiving a booking.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Booking not in the live store.
    #[error("booking not found: {0}")]
    NotFound(String),

    /// Booking already has a transition of another kind in flight.
    #[error("booking {id} is already being archived as {kind}")]
    PendingTransition { id: String, kind: &'static str },

    /// Listing or loading from the live store failed.
    #[error("live store error: {0}")]
    Storage(#[from] StorageError),

    /// The pending-archive marker could not be written; nothing changed.
    #[error("failed to mark booking {id} for archiving: {source}")]
    Mark {
        id: String,
        #[source]
        source: StorageError,
    },

    /// The archive write failed; the live record and its marker remain.
    #[error("failed to archive booking {id}: {source}")]
    Archive {
        id: String,
        #[source]
        source: StorageError,
    },

    /// The archive row exists but the live record could not be removed.
    #[error("failed to delete archived booking {id}: {source}")]
    Delete {
        id: String,
        #[source]
        source: StorageError,
    },
}

impl ReconcileError {
    pub(crate) fn pending(id: impl Into<String>, kind: ArchiveKind) -> Self {
        Self::PendingTransition {
            id: id.into(),
            kind: kind.as_str(),
        }
    }

    /// Stage a per-booking failure happened at.
    pub fn stage(&self) -> FailureStage {
        match self {
            Self::Mark { .. } => FailureStage::Mark,
            Self::Archive { .. } => FailureStage::Archive,
            Self::Delete { .. } => FailureStage::Delete,
            _ => FailureStage::Load,
        }
    }

    /// Whether the booking was left in the live store with its marker,
    /// to be finished by a later pass.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Archive { .. } | Self::Delete { .. })
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;
