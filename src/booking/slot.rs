//! Show slot parsing.
//!
//! Bookings carry a human-readable date ("Friday, October 31, 2025") and a
//! time range ("7:00 PM - 9:00 PM"). Every consumer goes through
//! [`ShowSlot::parse`], so creation-time validation and expiry detection
//! agree on what a slot means.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use super::error::SlotError;

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

// ============================================================================
// TimeRange
// ============================================================================

/// Start and end clock times of a show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    /// Whether the show runs past midnight.
    pub fn crosses_midnight(&self) -> bool {
        self.end <= self.start
    }
}

impl FromStr for TimeRange {
    type Err = SlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = split_range(s).ok_or_else(|| SlotError::InvalidRange(s.to_string()))?;
        Ok(Self {
            start: parse_clock_time(start)?,
            end: parse_clock_time(end)?,
        })
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.format("%-I:%M %p"),
            self.end.format("%-I:%M %p")
        )
    }
}

fn split_range(s: &str) -> Option<(&str, &str)> {
    let s = s.trim();
    for sep in [" - ", " – ", "–", "-"] {
        if let Some((start, end)) = s.split_once(sep) {
            let (start, end) = (start.trim(), end.trim());
            if !start.is_empty() && !end.is_empty() {
                return Some((start, end));
            }
        }
    }
    None
}

/// Parse a clock time such as `7:00 PM`, `9:30pm` or `21:00`.
pub fn parse_clock_time(s: &str) -> Result<NaiveTime, SlotError> {
    let invalid = || SlotError::InvalidTime(s.to_string());
    let trimmed = s.trim();

    let split_at = trimmed
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    let (clock, meridiem) = trimmed.split_at(split_at);
    let meridiem = meridiem.trim().to_ascii_uppercase();

    let (hours, minutes) = clock.trim().split_once(':').ok_or_else(invalid)?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return Err(invalid());
    }
    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;

    let hour24 = match meridiem.as_str() {
        "" if hours < 24 => hours,
        "AM" if (1..=12).contains(&hours) => hours % 12,
        "PM" if (1..=12).contains(&hours) => hours % 12 + 12,
        _ => return Err(invalid()),
    };

    NaiveTime::from_hms_opt(hour24, minutes, 0).ok_or_else(invalid)
}

// ============================================================================
// Date parsing
// ============================================================================

/// Parse a booking date.
///
/// Accepted shapes:
/// - `Friday, October 31, 2025` (weekday is not cross-checked)
/// - `October 31, 2025` / `Oct 31 2025`
/// - `October 31` (uses `default_year`)
/// - `2025-10-31`
/// - RFC 3339 timestamps, taken as a calendar date in `tz`
pub fn parse_show_date(s: &str, default_year: i32, tz: Tz) -> Result<NaiveDate, SlotError> {
    let trimmed = s.trim();
    let invalid = || SlotError::InvalidDate(s.to_string());

    if trimmed.is_empty() {
        return Err(invalid());
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&tz).date_naive());
    }

    parse_verbose_date(trimmed, default_year).ok_or_else(invalid)
}

fn parse_verbose_date(s: &str, default_year: i32) -> Option<NaiveDate> {
    let mut tokens: Vec<String> = s
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
        .collect();

    if tokens
        .first()
        .is_some_and(|t| lookup_name(&WEEKDAYS, t).is_some())
    {
        tokens.remove(0);
    }

    let (month, day, year) = match tokens.as_slice() {
        [month, day] => (month, day, None),
        [month, day, year] => (month, day, Some(year)),
        _ => return None,
    };

    let month = lookup_name(&MONTHS, month)? as u32 + 1;
    let day: u32 = day.trim_end_matches(|c: char| c.is_ascii_alphabetic()).parse().ok()?;
    let year = match year {
        Some(y) => y.parse().ok()?,
        None => default_year,
    };

    NaiveDate::from_ymd_opt(year, month, day)
}

/// Match a full or abbreviated (at least three letters) name.
fn lookup_name(names: &[&str], token: &str) -> Option<usize> {
    if token.len() < 3 {
        return None;
    }
    names.iter().position(|name| name.starts_with(token))
}

// ============================================================================
// ShowSlot
// ============================================================================

/// A validated date plus time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShowSlot {
    pub date: NaiveDate,
    pub range: TimeRange,
}

impl ShowSlot {
    /// Parse raw booking date and time strings.
    ///
    /// Year-less dates resolve against the current year in `tz` at `now`.
    pub fn parse(date: &str, time: &str, tz: Tz, now: DateTime<Utc>) -> Result<Self, SlotError> {
        let default_year = now.with_timezone(&tz).year();
        Ok(Self {
            date: parse_show_date(date, default_year, tz)?,
            range: time.parse()?,
        })
    }

    /// Local wall-clock end of the show.
    pub fn local_end(&self) -> NaiveDateTime {
        let end_date = if self.range.crosses_midnight() {
            self.date + Duration::days(1)
        } else {
            self.date
        };
        end_date.and_time(self.range.end)
    }

    /// End of the show as an absolute instant, interpreting the slot in `tz`.
    pub fn end_at(&self, tz: Tz) -> Result<DateTime<Utc>, SlotError> {
        let local = self.local_end();
        tz.from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| SlotError::NonexistentLocalTime(local.to_string(), tz.to_string()))
    }

    /// Canonical date string, e.g. `Friday, October 31, 2025`.
    pub fn display_date(&self) -> String {
        self.date.format("%A, %B %-d, %Y").to_string()
    }

    /// Canonical time range string, e.g. `7:00 PM - 9:00 PM`.
    pub fn display_time(&self) -> String {
        self.range.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
