//! The reconciliation job.
//!
//! Moves bookings from the live store into the archive. Every transition
//! follows the same protocol:
//!
//! 1. persist a pending-archive marker on the live record,
//! 2. upsert the archive row,
//! 3. delete the live record.
//!
//! A failure at any step leaves the live record in place. If the marker was
//! written, the next pass finishes the transition before looking for new
//! expirations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::archive::{CancelledRecord, CompletedRecord};
use crate::booking::{
    ArchiveKind, Booking, BookingStatus, Cancellation, Expiry, ExpiryPolicy, PendingArchive,
};
use crate::store::{ArchiveStore, BookingStore};
use crate::sync::{BookingLocks, DEFAULT_MAX_IDLE};

use super::error::{ReconcileError, Result};
use super::report::{
    ArchiveOutcome, BookingFailure, ExpiredBooking, ExpiryScan, ReconcileReport,
    UnparseableBooking,
};

/// What must still hold once a booking is re-read under its lock.
#[derive(Debug, Clone, Copy)]
enum Precondition {
    /// The booking exists. A transition of the same kind already in flight
    /// is finished instead.
    Exists,
    /// The booking is active, unmarked and expired at the given instant.
    ExpiredAt(DateTime<Utc>),
}

/// Archives expired, completed and cancelled bookings.
#[derive(Clone)]
pub struct ReconcileJob {
    bookings: Arc<dyn BookingStore>,
    archive: Arc<dyn ArchiveStore>,
    policy: ExpiryPolicy,
    locks: BookingLocks,
}

impl ReconcileJob {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        archive: Arc<dyn ArchiveStore>,
        policy: ExpiryPolicy,
    ) -> Self {
        Self {
            bookings,
            archive,
            policy,
            locks: BookingLocks::new(),
        }
    }

    pub fn policy(&self) -> &ExpiryPolicy {
        &self.policy
    }

    /// Hold the booking's transition lock.
    ///
    /// Edits of a live booking take this so they never interleave with an
    /// archive transition of the same booking.
    pub async fn lock(&self, id: &str) -> OwnedMutexGuard<()> {
        self.locks.acquire(id).await
    }

    // ========================================================================
    // Scan
    // ========================================================================

    /// List active bookings that have expired, without changing anything.
    pub async fn scan(&self, now: DateTime<Utc>) -> Result<ExpiryScan> {
        let active = self.bookings.list_by_status(&BookingStatus::ACTIVE).await?;

        let mut expired = Vec::new();
        let mut unparseable = Vec::new();
        for booking in &active {
            match self.policy.check(booking, now) {
                Expiry::Expired { end_at, expires_at } => expired.push(ExpiredBooking::new(
                    booking,
                    end_at,
                    expires_at,
                    self.policy.local_display(end_at),
                )),
                Expiry::Active { .. } => {}
                Expiry::Unparseable(e) => unparseable.push(UnparseableBooking {
                    booking_id: booking.id.clone(),
                    date: booking.date.clone(),
                    time: booking.time.clone(),
                    error: e.to_string(),
                }),
            }
        }

        Ok(ExpiryScan {
            checked_at: now,
            checked_at_local: self.policy.local_display(now),
            total_active: active.len(),
            expired,
            unparseable,
        })
    }

    // ========================================================================
    // Pass
    // ========================================================================

    /// Run a full pass: finish interrupted transitions, then archive every
    /// expired active booking as completed.
    ///
    /// Per-booking failures are recorded in the report; only a failure to
    /// list the live store aborts the pass.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new(now);

        self.recover(&mut report).await?;

        let active = self.bookings.list_by_status(&BookingStatus::ACTIVE).await?;
        report.checked = active.len();

        for booking in active {
            if booking.pending_archive.is_some() {
                // Left over from a failed recovery above.
                continue;
            }
            match self.policy.check(&booking, now) {
                Expiry::Expired { end_at, .. } => {
                    report.expired += 1;
                    debug!(
                        booking_id = %booking.id,
                        end = %self.policy.local_display(end_at),
                        "Booking expired"
                    );
                    let marker = PendingArchive {
                        kind: ArchiveKind::Completed,
                        marked_at: now,
                        effective_at: now,
                        cancellation: None,
                    };
                    match self
                        .archive_locked(&booking.id, marker, Precondition::ExpiredAt(now))
                        .await
                    {
                        Ok(Some(_)) => report.completed.push(booking.id.clone()),
                        Ok(None) => debug!(booking_id = %booking.id, "Booking changed during pass, skipped"),
                        Err(e) => record_failure(&mut report, &booking.id, e),
                    }
                }
                Expiry::Active { .. } => {}
                Expiry::Unparseable(e) => {
                    report.unparseable += 1;
                    warn!(
                        booking_id = %booking.id,
                        date = %booking.date,
                        time = %booking.time,
                        error = %e,
                        "Could not parse booking slot"
                    );
                }
            }
        }

        self.locks.prune(DEFAULT_MAX_IDLE);
        report.finished_at = Utc::now();

        info!(
            checked = report.checked,
            expired = report.expired,
            completed = report.completed.len(),
            recovered = report.recovered.len(),
            failed = report.failures.len(),
            "Reconciliation pass finished"
        );
        Ok(report)
    }

    /// Finish transitions whose marker is still on the live record.
    async fn recover(&self, report: &mut ReconcileReport) -> Result<()> {
        let pending = self.bookings.list_pending_archive().await?;
        if pending.is_empty() {
            return Ok(());
        }
        info!(count = pending.len(), "Recovering interrupted archive transitions");

        for booking in pending {
            let Some(marker) = booking.pending_archive.clone() else {
                continue;
            };
            match self
                .archive_locked(&booking.id, marker, Precondition::Exists)
                .await
            {
                Ok(Some(_)) => report.recovered.push(booking.id.clone()),
                Ok(None) => {}
                Err(e) => record_failure(report, &booking.id, e),
            }
        }
        Ok(())
    }

    // ========================================================================
    // Single booking
    // ========================================================================

    /// Archive one booking as completed, regardless of its slot.
    pub async fn complete_booking(&self, id: &str, now: DateTime<Utc>) -> Result<ArchiveOutcome> {
        let marker = PendingArchive {
            kind: ArchiveKind::Completed,
            marked_at: now,
            effective_at: now,
            cancellation: None,
        };
        self.archive_on_demand(id, marker).await
    }

    /// Archive one booking as cancelled.
    pub async fn cancel_booking(
        &self,
        id: &str,
        cancellation: Cancellation,
        now: DateTime<Utc>,
    ) -> Result<ArchiveOutcome> {
        let marker = PendingArchive {
            kind: ArchiveKind::Cancelled,
            marked_at: now,
            effective_at: now,
            cancellation: Some(cancellation),
        };
        self.archive_on_demand(id, marker).await
    }

    async fn archive_on_demand(&self, id: &str, marker: PendingArchive) -> Result<ArchiveOutcome> {
        let kind = marker.kind;
        match self.archive_locked(id, marker, Precondition::Exists).await? {
            Some(archived_at) => {
                info!(booking_id = %id, kind = kind.as_str(), "Booking archived");
                Ok(ArchiveOutcome {
                    booking_id: id.to_string(),
                    kind,
                    archived_at,
                })
            }
            None => Err(ReconcileError::NotFound(id.to_string())),
        }
    }

    // ========================================================================
    // Transition
    // ========================================================================

    /// Re-read the booking under its lock and run the transition.
    ///
    /// Returns `Ok(None)` if the booking is gone or no longer meets
    /// `precondition`. Returns the effective time of the archive row on
    /// success.
    async fn archive_locked(
        &self,
        id: &str,
        marker: PendingArchive,
        precondition: Precondition,
    ) -> Result<Option<DateTime<Utc>>> {
        let _guard = self.locks.acquire(id).await;

        let Some(booking) = self.bookings.load(id).await? else {
            return Ok(None);
        };

        let marker = match (&booking.pending_archive, precondition) {
            (Some(_), Precondition::ExpiredAt(_)) => return Ok(None),
            (Some(existing), Precondition::Exists) if existing.kind != marker.kind => {
                return Err(ReconcileError::pending(id, existing.kind));
            }
            // Finish the transition already in flight, keeping its times.
            (Some(existing), Precondition::Exists) => existing.clone(),
            // The listing may predate an edit that moved the slot.
            (None, Precondition::ExpiredAt(now))
                if !booking.is_active() || !self.policy.check(&booking, now).is_expired() =>
            {
                return Ok(None);
            }
            (None, _) => {
                self.bookings
                    .mark_pending_archive(id, &marker)
                    .await
                    .map_err(|source| ReconcileError::Mark {
                        id: id.to_string(),
                        source,
                    })?;
                marker
            }
        };

        self.write_archive(&booking, &marker).await?;

        let removed = self
            .bookings
            .delete(id)
            .await
            .map_err(|source| ReconcileError::Delete {
                id: id.to_string(),
                source,
            })?;
        if !removed {
            warn!(booking_id = %id, "Live booking vanished before delete");
        }

        Ok(Some(marker.effective_at))
    }

    async fn write_archive(&self, booking: &Booking, marker: &PendingArchive) -> Result<()> {
        let result = match marker.kind {
            ArchiveKind::Completed => {
                let record = CompletedRecord::from_booking(booking, marker.effective_at, &self.policy);
                self.archive.upsert_completed(&record).await
            }
            ArchiveKind::Cancelled => {
                let cancellation = marker.cancellation.clone().unwrap_or_default();
                let record = CancelledRecord::from_booking(
                    booking,
                    marker.effective_at,
                    &cancellation,
                    &self.policy,
                );
                self.archive.upsert_cancelled(&record).await
            }
        };
        result.map_err(|source| ReconcileError::Archive {
            id: booking.id.clone(),
            source,
        })
    }
}

fn record_failure(report: &mut ReconcileReport, id: &str, error: ReconcileError) {
    warn!(
        booking_id = %id,
        stage = %error.stage(),
        error = %error,
        "Failed to archive booking, live record kept"
    );
    report.failures.push(BookingFailure {
        booking_id: id.to_string(),
        stage: error.stage(),
        error: error.to_string(),
    });
}
