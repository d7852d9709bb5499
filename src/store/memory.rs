//! In-memory storage implementations.
//!
//! Used for local development (`backend: memory`) and by the test suite.
//! Contents are lost on restart.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::archive::{ArchiveStats, CancelledRecord, CompletedRecord, TableStats};
use crate::booking::{Booking, BookingStatus, PendingArchive};

use super::archive::ArchiveStore;
use super::booking::BookingStore;
use super::error::{StorageError, StorageResult};

// ============================================================================
// Live bookings
// ============================================================================

/// Live booking store backed by a concurrent map.
#[derive(Debug, Clone, Default)]
pub struct MemoryBookingStore {
    bookings: Arc<DashMap<String, Booking>>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live bookings.
    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }

    fn collect(&self, keep: impl Fn(&Booking) -> bool) -> Vec<Booking> {
        let mut out: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        out
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<Booking>> {
        Ok(self.collect(|_| true))
    }

    async fn list_by_status(&self, statuses: &[BookingStatus]) -> StorageResult<Vec<Booking>> {
        Ok(self.collect(|b| statuses.contains(&b.status)))
    }

    async fn list_pending_archive(&self) -> StorageResult<Vec<Booking>> {
        Ok(self.collect(|b| b.pending_archive.is_some()))
    }

    async fn load(&self, id: &str) -> StorageResult<Option<Booking>> {
        Ok(self.bookings.get(id).map(|entry| entry.value().clone()))
    }

    async fn insert(&self, booking: &Booking) -> StorageResult<()> {
        match self.bookings.entry(booking.id.clone()) {
            Entry::Occupied(_) => Err(StorageError::conflict("booking", &booking.id)),
            Entry::Vacant(slot) => {
                slot.insert(booking.clone());
                Ok(())
            }
        }
    }

    async fn save(&self, booking: &Booking) -> StorageResult<()> {
        match self.bookings.get_mut(&booking.id) {
            Some(mut entry) => {
                *entry = booking.clone();
                Ok(())
            }
            None => Err(StorageError::not_found("booking", &booking.id)),
        }
    }

    async fn mark_pending_archive(&self, id: &str, marker: &PendingArchive) -> StorageResult<()> {
        match self.bookings.get_mut(id) {
            Some(mut entry) => {
                entry.pending_archive = Some(marker.clone());
                Ok(())
            }
            None => Err(StorageError::not_found("booking", id)),
        }
    }

    async fn delete(&self, id: &str) -> StorageResult<bool> {
        Ok(self.bookings.remove(id).is_some())
    }
}

// ============================================================================
// Archive
// ============================================================================

/// Archive store backed by two concurrent maps keyed by booking ID.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchiveStore {
    completed: Arc<DashMap<String, CompletedRecord>>,
    cancelled: Arc<DashMap<String, CancelledRecord>>,
}

impl MemoryArchiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed_len(&self) -> usize {
        self.completed.len()
    }

    pub fn cancelled_len(&self) -> usize {
        self.cancelled.len()
    }
}

/// Calendar windows of `today`, matching MySQL `YEARWEEK(d, 1)` for weeks.
fn window_counts(dates: impl Iterator<Item = NaiveDate>, today: NaiveDate) -> TableStats {
    let week = today.iso_week();
    let mut stats = TableStats::default();
    for date in dates {
        stats.total += 1;
        if date == today {
            stats.today += 1;
        }
        if date.iso_week() == week {
            stats.this_week += 1;
        }
        if date.year() == today.year() {
            stats.this_year += 1;
            if date.month() == today.month() {
                stats.this_month += 1;
            }
        }
    }
    stats
}

#[async_trait]
impl ArchiveStore for MemoryArchiveStore {
    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn ensure_schema(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn upsert_completed(&self, record: &CompletedRecord) -> StorageResult<()> {
        self.completed
            .insert(record.summary.booking_id.clone(), record.clone());
        Ok(())
    }

    async fn upsert_cancelled(&self, record: &CancelledRecord) -> StorageResult<()> {
        self.cancelled
            .insert(record.summary.booking_id.clone(), record.clone());
        Ok(())
    }

    async fn list_completed(&self) -> StorageResult<Vec<CompletedRecord>> {
        let mut rows: Vec<_> = self.completed.iter().map(|e| e.value().clone()).collect();
        rows.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(rows)
    }

    async fn list_cancelled(&self) -> StorageResult<Vec<CancelledRecord>> {
        let mut rows: Vec<_> = self.cancelled.iter().map(|e| e.value().clone()).collect();
        rows.sort_by(|a, b| b.cancelled_at.cmp(&a.cancelled_at));
        Ok(rows)
    }

    async fn stats(&self, now: DateTime<Utc>, timezone: Tz) -> StorageResult<ArchiveStats> {
        let local = |at: &DateTime<Utc>| at.with_timezone(&timezone).date_naive();
        let today = local(&now);
        Ok(ArchiveStats {
            completed: window_counts(self.completed.iter().map(|e| local(&e.completed_at)), today),
            cancelled: window_counts(self.cancelled.iter().map(|e| local(&e.cancelled_at)), today),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
