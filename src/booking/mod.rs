//! Bookings: data model, show slot parsing and expiry detection.

pub mod error;
pub mod expiry;
pub mod model;
pub mod slot;
mod validate;

pub use error::{BookingError, SlotError};
pub use expiry::{DEFAULT_GRACE_MINUTES, DEFAULT_TIMEZONE, Expiry, ExpiryPolicy};
pub use model::{
    ArchiveKind, Booking, BookingId, BookingStatus, BookingUpdate, Cancellation, NewBooking,
    PendingArchive,
};
pub use slot::{ShowSlot, TimeRange, parse_clock_time, parse_show_date};
