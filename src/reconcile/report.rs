//! Results of expiry scans and reconciliation passes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::booking::{ArchiveKind, Booking, BookingStatus};

// ============================================================================
// Scan
// ============================================================================

/// A booking whose slot has ended.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiredBooking {
    pub booking_id: String,
    pub name: String,
    pub email: String,
    pub theater_name: String,
    pub date: String,
    pub time: String,
    pub status: BookingStatus,
    pub end_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Show end as wall-clock time in the business zone.
    pub end_local: String,
    /// True if an archive transition is already in flight.
    pub pending_archive: bool,
}

impl ExpiredBooking {
    pub(crate) fn new(
        booking: &Booking,
        end_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        end_local: String,
    ) -> Self {
        Self {
            booking_id: booking.id.clone(),
            name: booking.name.clone(),
            email: booking.email.clone(),
            theater_name: booking.theater_name.clone(),
            date: booking.date.clone(),
            time: booking.time.clone(),
            status: booking.status,
            end_at,
            expires_at,
            end_local,
            pending_archive: booking.pending_archive.is_some(),
        }
    }
}

/// A booking whose date or time could not be interpreted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnparseableBooking {
    pub booking_id: String,
    pub date: String,
    pub time: String,
    pub error: String,
}

/// Read-only view of which active bookings have expired.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryScan {
    pub checked_at: DateTime<Utc>,
    pub checked_at_local: String,
    pub total_active: usize,
    pub expired: Vec<ExpiredBooking>,
    pub unparseable: Vec<UnparseableBooking>,
}

// ============================================================================
// Pass
// ============================================================================

/// Step of an archive transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Load,
    Mark,
    Archive,
    Delete,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Mark => "mark",
            Self::Archive => "archive",
            Self::Delete => "delete",
        })
    }
}

/// A booking the pass could not finish.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingFailure {
    pub booking_id: String,
    pub stage: FailureStage,
    pub error: String,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Active bookings examined.
    pub checked: usize,
    /// Active bookings found expired.
    pub expired: usize,
    /// IDs archived as completed in this pass.
    pub completed: Vec<String>,
    /// IDs whose interrupted transition was finished.
    pub recovered: Vec<String>,
    pub unparseable: usize,
    pub failures: Vec<BookingFailure>,
}

impl ReconcileReport {
    pub(crate) fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            checked: 0,
            expired: 0,
            completed: Vec::new(),
            recovered: Vec::new(),
            unparseable: 0,
            failures: Vec::new(),
        }
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ============================================================================
// Single booking
// ============================================================================

/// Result of archiving one booking on demand.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveOutcome {
    pub booking_id: String,
    pub kind: ArchiveKind,
    pub archived_at: DateTime<Utc>,
}
