//! Archive row types.
//!
//! Rows are denormalized for reporting: the summary columns are what the
//! export screens read, the snapshot keeps everything else.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::booking::{Booking, BookingStatus, Cancellation, ExpiryPolicy};

use super::snapshot::encode_snapshot;

// ============================================================================
// Summary columns
// ============================================================================

/// Columns shared by both archive tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveSummary {
    pub booking_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub theater_name: String,
    /// `None` when the stored date string cannot be parsed.
    pub booking_date: Option<NaiveDate>,
    pub booking_time: String,
    pub occasion: String,
    pub number_of_people: u32,
    pub total_amount: f64,
}

impl ArchiveSummary {
    pub fn from_booking(booking: &Booking, policy: &ExpiryPolicy, now: DateTime<Utc>) -> Self {
        let booking_date = policy.slot(booking, now).ok().map(|slot| slot.date);
        Self {
            booking_id: booking.id.clone(),
            name: booking.name.clone(),
            email: booking.email.clone(),
            phone: booking.phone.clone(),
            theater_name: booking.theater_name.clone(),
            booking_date,
            booking_time: booking.time.clone(),
            occasion: booking.occasion.clone(),
            number_of_people: booking.number_of_people,
            total_amount: booking.total_amount,
        }
    }
}

/// Booking JSON with the transition fields applied and the marker removed.
fn snapshot_of(booking: &Booking, overrides: &[(&str, Value)]) -> Value {
    let mut value = booking.to_json();
    if let Value::Object(map) = &mut value {
        map.remove("pendingArchive");
        for (key, v) in overrides {
            map.insert((*key).to_string(), v.clone());
        }
    }
    value
}

// ============================================================================
// Completed
// ============================================================================

/// Row of `completed_bookings`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedRecord {
    #[serde(flatten)]
    pub summary: ArchiveSummary,
    pub completed_at: DateTime<Utc>,
    pub booking_status: String,
    pub payment_status: String,
    /// Base64 JSON snapshot of the full booking.
    #[serde(skip_serializing)]
    pub snapshot: String,
}

impl CompletedRecord {
    /// Build the archive row for a booking completed at `completed_at`.
    ///
    /// Manual bookings default to `unpaid`, everything else to `paid`.
    pub fn from_booking(
        booking: &Booking,
        completed_at: DateTime<Utc>,
        policy: &ExpiryPolicy,
    ) -> Self {
        let payment_status = booking.payment_status.clone().unwrap_or_else(|| {
            if booking.status == BookingStatus::Manual {
                "unpaid".to_string()
            } else {
                "paid".to_string()
            }
        });
        let status = BookingStatus::Completed.as_str();

        let snapshot = snapshot_of(
            booking,
            &[
                ("status", Value::from(status)),
                ("completedAt", Value::from(completed_at.to_rfc3339())),
                ("paymentStatus", Value::from(payment_status.clone())),
            ],
        );

        Self {
            summary: ArchiveSummary::from_booking(booking, policy, completed_at),
            completed_at,
            booking_status: status.to_string(),
            payment_status,
            snapshot: encode_snapshot(&snapshot),
        }
    }
}

// ============================================================================
// Cancelled
// ============================================================================

/// Row of `cancelled_bookings`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancelledRecord {
    #[serde(flatten)]
    pub summary: ArchiveSummary,
    pub cancelled_at: DateTime<Utc>,
    pub cancellation_reason: Option<String>,
    pub refund_amount: Option<f64>,
    pub refund_status: Option<String>,
    #[serde(skip_serializing)]
    pub snapshot: String,
}

impl CancelledRecord {
    pub fn from_booking(
        booking: &Booking,
        cancelled_at: DateTime<Utc>,
        cancellation: &Cancellation,
        policy: &ExpiryPolicy,
    ) -> Self {
        let snapshot = snapshot_of(
            booking,
            &[
                ("status", Value::from(BookingStatus::Cancelled.as_str())),
                ("cancelledAt", Value::from(cancelled_at.to_rfc3339())),
                ("cancellationReason", Value::from(cancellation.reason.clone())),
                ("refundAmount", Value::from(cancellation.refund_amount)),
                ("refundStatus", Value::from(cancellation.refund_status.clone())),
            ],
        );

        Self {
            summary: ArchiveSummary::from_booking(booking, policy, cancelled_at),
            cancelled_at,
            cancellation_reason: cancellation.reason.clone(),
            refund_amount: cancellation.refund_amount,
            refund_status: cancellation.refund_status.clone(),
            snapshot: encode_snapshot(&snapshot),
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Row counts of one archive table over calendar windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub total: i64,
    pub today: i64,
    pub this_week: i64,
    pub this_month: i64,
    pub this_year: i64,
}

/// Statistics for both archive tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveStats {
    pub completed: TableStats,
    pub cancelled: TableStats,
}

// ============================================================================
// Tests
// ============================================================================
