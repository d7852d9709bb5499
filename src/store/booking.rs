//! Live booking storage trait.

use async_trait::async_trait;

use crate::booking::{Booking, BookingStatus, PendingArchive};

use super::error::StorageResult;

/// Storage interface for live bookings.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Check the backend is reachable.
    async fn ping(&self) -> StorageResult<()>;

    // ========================================================================
    // Queries
    // ========================================================================

    /// List every live booking.
    async fn list(&self) -> StorageResult<Vec<Booking>>;

    /// List bookings whose status is one of `statuses`.
    async fn list_by_status(&self, statuses: &[BookingStatus]) -> StorageResult<Vec<Booking>>;

    /// List bookings carrying a pending-archive marker.
    async fn list_pending_archive(&self) -> StorageResult<Vec<Booking>>;

    /// Load a booking by ID.
    ///
    /// Returns `Ok(None)` if the booking does not exist.
    async fn load(&self, id: &str) -> StorageResult<Option<Booking>>;

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Insert a new booking. Fails with `Conflict` if the ID is taken.
    async fn insert(&self, booking: &Booking) -> StorageResult<()>;

    /// Overwrite an existing booking. Fails with `NotFound` if absent.
    async fn save(&self, booking: &Booking) -> StorageResult<()>;

    /// Persist the pending-archive marker on a booking.
    async fn mark_pending_archive(&self, id: &str, marker: &PendingArchive) -> StorageResult<()>;

    /// Delete a booking.
    ///
    /// Returns `false` if nothing was deleted.
    async fn delete(&self, id: &str) -> StorageResult<bool>;
}
