//! Booking intake: turning client input into validated bookings.

use chrono::{DateTime, Utc};

use super::error::BookingError;
use super::expiry::ExpiryPolicy;
use serde_json::{Map, Value};

use super::model::{
    Booking, BookingStatus, BookingUpdate, NewBooking, RESERVED_KEYS, parse_live_status,
    validate_email,
};

fn required(value: &str, field: &'static str) -> Result<String, BookingError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BookingError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

fn non_negative(value: f64, field: &'static str) -> Result<f64, BookingError> {
    if !value.is_finite() || value < 0.0 {
        return Err(BookingError::invalid(field, "must be a non-negative amount"));
    }
    Ok(value)
}

fn free_form(mut extra: Map<String, Value>) -> Map<String, Value> {
    extra.retain(|key, _| !RESERVED_KEYS.contains(&key.as_str()));
    extra
}

fn head_count(value: u32) -> Result<u32, BookingError> {
    if value == 0 {
        return Err(BookingError::invalid("numberOfPeople", "must be at least 1"));
    }
    Ok(value)
}

impl NewBooking {
    /// Validate the input and build a live booking.
    ///
    /// The show slot is parsed once here and the date/time strings are
    /// stored in canonical form.
    pub fn validate(self, policy: &ExpiryPolicy, now: DateTime<Utc>) -> Result<Booking, BookingError> {
        let name = required(&self.name, "name")?;
        let email = required(&self.email, "email")?;
        validate_email(&email)?;
        let theater_name = required(&self.theater_name, "theaterName")?;
        required(&self.date, "date")?;
        required(&self.time, "time")?;

        let slot = super::ShowSlot::parse(&self.date, &self.time, policy.timezone, now)?;

        let status = match self.status.as_deref() {
            Some(raw) => parse_live_status(raw)?,
            None => BookingStatus::Confirmed,
        };

        let id = match self.booking_id {
            Some(id) => required(&id, "bookingId")?,
            None => Booking::generate_id(),
        };

        Ok(Booking {
            id,
            name,
            email,
            phone: self.phone.trim().to_string(),
            theater_name,
            date: slot.display_date(),
            time: slot.display_time(),
            occasion: self.occasion.trim().to_string(),
            number_of_people: head_count(self.number_of_people.unwrap_or(2))?,
            total_amount: non_negative(self.total_amount, "totalAmount")?,
            advance_payment: non_negative(self.advance_payment, "advancePayment")?,
            venue_payment: non_negative(self.venue_payment, "venuePayment")?,
            status,
            payment_status: self.payment_status,
            created_at: Some(now),
            expired_at: None,
            pending_archive: None,
            extra: free_form(self.extra),
        })
    }
}

impl BookingUpdate {
    /// Apply the update to `booking`, re-validating the slot when either
    /// half of it changes.
    pub fn apply(
        self,
        booking: &mut Booking,
        policy: &ExpiryPolicy,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        if let Some(name) = self.name {
            booking.name = required(&name, "name")?;
        }
        if let Some(email) = self.email {
            let email = required(&email, "email")?;
            validate_email(&email)?;
            booking.email = email;
        }
        if let Some(phone) = self.phone {
            booking.phone = phone.trim().to_string();
        }
        if let Some(theater) = self.theater_name {
            booking.theater_name = required(&theater, "theaterName")?;
        }
        if let Some(occasion) = self.occasion {
            booking.occasion = occasion.trim().to_string();
        }
        if let Some(count) = self.number_of_people {
            booking.number_of_people = head_count(count)?;
        }
        if let Some(amount) = self.total_amount {
            booking.total_amount = non_negative(amount, "totalAmount")?;
        }
        if let Some(amount) = self.advance_payment {
            booking.advance_payment = non_negative(amount, "advancePayment")?;
        }
        if let Some(amount) = self.venue_payment {
            booking.venue_payment = non_negative(amount, "venuePayment")?;
        }
        if let Some(status) = self.status {
            booking.status = parse_live_status(&status)?;
        }
        if let Some(payment_status) = self.payment_status {
            booking.payment_status = Some(payment_status);
        }

        if self.date.is_some() || self.time.is_some() {
            let date = self.date.unwrap_or_else(|| booking.date.clone());
            let time = self.time.unwrap_or_else(|| booking.time.clone());
            let slot = super::ShowSlot::parse(&date, &time, policy.timezone, now)?;
            booking.date = slot.display_date();
            booking.time = slot.display_time();
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
