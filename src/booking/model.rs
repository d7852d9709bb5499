//! Booking data structures.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::BookingError;

/// Unique identifier for a booking.
pub type BookingId = String;

/// ID prefix for bookings created by this service.
pub const BOOKING_ID_PREFIX: &str = "fmt_";

/// Document keys owned by the service. Client input never sets them
/// through the free-form fields.
pub const RESERVED_KEYS: [&str; 8] = [
    "bookingId",
    "status",
    "paymentStatus",
    "createdAt",
    "expiredAt",
    "pendingArchive",
    "compressedData",
    "_id",
];

fn default_people() -> u32 {
    2
}

// ============================================================================
// Booking
// ============================================================================

/// A live booking as held in the booking store.
///
/// Dynamic occasion fields ("Your Nickname", "Partner Name", ...) are kept
/// in `extra` and round-trip untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(rename = "bookingId")]
    pub id: BookingId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub theater_name: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub occasion: String,
    #[serde(default = "default_people")]
    pub number_of_people: u32,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub advance_payment: f64,
    #[serde(default)]
    pub venue_payment: f64,
    pub status: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Explicit expiry override; takes effect alongside the slot end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<DateTime<Utc>>,
    /// Set while an archive transition is in flight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_archive: Option<PendingArchive>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Booking {
    /// Generate a new booking ID.
    pub fn generate_id() -> BookingId {
        format!("{}{}", BOOKING_ID_PREFIX, ulid::Ulid::new().to_string().to_lowercase())
    }

    /// Whether the booking is still eligible for automatic completion.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Full JSON view of the booking, extra fields included.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

// ============================================================================
// BookingStatus
// ============================================================================

/// Booking lifecycle status.
///
/// Parsed case-insensitively; anything unrecognized becomes `Unknown` and is
/// left alone by reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BookingStatus {
    Confirmed,
    Manual,
    Completed,
    Cancelled,
    Unknown,
}

impl BookingStatus {
    /// Statuses the reconciliation job considers.
    pub const ACTIVE: [BookingStatus; 2] = [BookingStatus::Confirmed, BookingStatus::Manual];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Manual => "manual",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Manual)
    }

    pub fn is_archived(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl From<String> for BookingStatus {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirmed" => Self::Confirmed,
            "manual" => Self::Manual,
            "completed" => Self::Completed,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Unknown,
        }
    }
}

impl From<BookingStatus> for String {
    fn from(status: BookingStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PendingArchive
// ============================================================================

/// Which archive table a booking is moving into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveKind {
    Completed,
    Cancelled,
}

impl ArchiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Cancellation details carried by a pending cancelled-archive marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cancellation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_status: Option<String>,
}

/// Marker persisted on a live booking before its archive write.
///
/// A booking that still carries a marker at the start of a reconciliation
/// pass had its transition interrupted and is finished first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingArchive {
    pub kind: ArchiveKind,
    pub marked_at: DateTime<Utc>,
    /// When the transition logically happened (completion/cancellation time).
    pub effective_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation: Option<Cancellation>,
}

// ============================================================================
// Input Types
// ============================================================================

/// Fields accepted when creating a booking.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    #[serde(default)]
    pub booking_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub theater_name: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub occasion: String,
    #[serde(default)]
    pub number_of_people: Option<u32>,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub advance_payment: f64,
    #[serde(default)]
    pub venue_payment: f64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Partial update of a live booking.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub theater_name: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub occasion: Option<String>,
    pub number_of_people: Option<u32>,
    pub total_amount: Option<f64>,
    pub advance_payment: Option<f64>,
    pub venue_payment: Option<f64>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
}

/// Check that an email has a local part and a dotted domain.
pub(crate) fn validate_email(email: &str) -> Result<(), BookingError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(BookingError::invalid("email", "missing '@'"));
    };
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') {
        return Err(BookingError::invalid("email", format!("'{email}' is not an address")));
    }
    Ok(())
}

/// Parse a status supplied by a client; only live statuses are assignable.
pub(crate) fn parse_live_status(raw: &str) -> Result<BookingStatus, BookingError> {
    match BookingStatus::from(raw.to_string()) {
        s @ (BookingStatus::Confirmed | BookingStatus::Manual) => Ok(s),
        BookingStatus::Unknown => Err(BookingError::invalid("status", format!("unknown status '{raw}'"))),
        archived => Err(BookingError::ArchivedStatus(archived.to_string())),
    }
}

// ============================================================================
// Tests
// ============================================================================
