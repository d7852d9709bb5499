//! Booking validation error types.

use thiserror::Error;

/// Errors raised while parsing or validating a show slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    /// Date string matched none of the accepted shapes.
    #[error("unrecognized date '{0}'")]
    InvalidDate(String),

    /// Time range is not of the form `<start> - <end>`.
    #[error("invalid time range '{0}'")]
    InvalidRange(String),

    /// A clock time inside the range could not be parsed.
    #[error("invalid clock time '{0}'")]
    InvalidTime(String),

    /// The local end time does not exist in the business time zone.
    #[error("slot end {0} does not exist in time zone {1}")]
    NonexistentLocalTime(String, String),
}

/// Errors raised while validating booking input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    /// A required field is missing or blank.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// A field is present but malformed.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// The show slot is invalid.
    #[error(transparent)]
    Slot(#[from] SlotError),

    /// Archived statuses cannot be assigned directly.
    #[error("status '{0}' can only be reached through archival")]
    ArchivedStatus(String),
}

impl BookingError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
