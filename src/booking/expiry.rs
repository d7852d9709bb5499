//! Expiry detection for live bookings.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use super::error::SlotError;
use super::model::Booking;
use super::slot::ShowSlot;

/// Default grace period after a show ends before it counts as expired.
pub const DEFAULT_GRACE_MINUTES: i64 = 5;

/// Default business time zone.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Kolkata;

/// How expiry is computed: slot end in `timezone`, plus `grace`.
#[derive(Debug, Clone, Copy)]
pub struct ExpiryPolicy {
    pub grace: Duration,
    pub timezone: Tz,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            grace: Duration::minutes(DEFAULT_GRACE_MINUTES),
            timezone: DEFAULT_TIMEZONE,
        }
    }
}

/// Result of checking a single booking.
#[derive(Debug, Clone, PartialEq)]
pub enum Expiry {
    /// Not yet expired.
    Active { expires_at: DateTime<Utc> },
    /// Expired at `expires_at`; `end_at` is the show end without grace.
    Expired {
        end_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
    /// Slot could not be interpreted.
    Unparseable(SlotError),
}

impl Expiry {
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired { .. })
    }
}

impl ExpiryPolicy {
    pub fn new(grace: Duration, timezone: Tz) -> Self {
        Self { grace, timezone }
    }

    /// Parse the booking's slot in this policy's time zone.
    pub fn slot(&self, booking: &Booking, now: DateTime<Utc>) -> Result<ShowSlot, SlotError> {
        ShowSlot::parse(&booking.date, &booking.time, self.timezone, now)
    }

    /// Instant after which the slot counts as expired.
    pub fn expires_at(&self, slot: &ShowSlot) -> Result<DateTime<Utc>, SlotError> {
        Ok(slot.end_at(self.timezone)? + self.grace)
    }

    /// Check a booking against `now`.
    ///
    /// Expired iff `now` is strictly past slot end plus grace, or past an
    /// explicit `expiredAt` override.
    pub fn check(&self, booking: &Booking, now: DateTime<Utc>) -> Expiry {
        let by_slot = self.slot(booking, now).and_then(|slot| {
            let end_at = slot.end_at(self.timezone)?;
            Ok((end_at, end_at + self.grace))
        });

        match (by_slot, booking.expired_at) {
            (Ok((end_at, expires_at)), _) if now > expires_at => Expiry::Expired { end_at, expires_at },
            (_, Some(forced)) if now > forced => Expiry::Expired {
                end_at: forced,
                expires_at: forced,
            },
            (Ok((_, expires_at)), _) => Expiry::Active { expires_at },
            (Err(e), _) => Expiry::Unparseable(e),
        }
    }

    /// Format an instant as a wall-clock string in the business zone.
    pub fn local_display(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.timezone)
            .format("%d/%m/%Y, %-I:%M:%S %p")
            .to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
