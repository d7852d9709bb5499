//! Per-booking locks for archive transitions.
//!
//! The scheduler pass and staff actions (complete, cancel) may touch the
//! same booking at the same time. Each transition holds the booking's lock
//! from re-read to delete.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::debug;

/// Idle age after which an unused lock entry is dropped.
pub const DEFAULT_MAX_IDLE: Duration = Duration::from_secs(3600);

/// Maps booking ID to (lock, last_access_time).
type LockTable = DashMap<String, (Arc<Mutex<()>>, Instant)>;

/// Async mutex per booking ID.
#[derive(Clone, Default)]
pub struct BookingLocks {
    locks: Arc<LockTable>,
}

impl BookingLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and hold the lock of `booking_id`.
    pub async fn acquire(&self, booking_id: &str) -> OwnedMutexGuard<()> {
        let now = Instant::now();
        let lock = self
            .locks
            .entry(booking_id.to_string())
            .and_modify(|(_, last_access)| *last_access = now)
            .or_insert_with(|| (Arc::new(Mutex::new(())), now))
            .0
            .clone();
        lock.lock_owned().await
    }

    /// Drop entries idle for longer than `max_idle` that nobody holds.
    ///
    /// Returns the number of entries removed.
    pub fn prune(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let before = self.locks.len();
        self.locks.retain(|_, (lock, last_access)| {
            Arc::strong_count(lock) > 1 || now.duration_since(*last_access) <= max_idle
        });
        let removed = before.saturating_sub(self.locks.len());
        if removed > 0 {
            debug!(removed, remaining = self.locks.len(), "Pruned booking locks");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_booking_is_serialized() {
        let locks = BookingLocks::new();
        let guard = locks.acquire("BK-1").await;

        let entry = locks.locks.get("BK-1").unwrap().0.clone();
        assert!(entry.try_lock().is_err());

        drop(guard);
        assert!(entry.try_lock().is_ok());
    }

    #[tokio::test]
    async fn different_bookings_lock_independently() {
        let locks = BookingLocks::new();
        let _a = locks.acquire("BK-1").await;
        let _b = locks.acquire("BK-2").await;
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn prune_removes_idle_unheld_entries() {
        let locks = BookingLocks::new();
        let old = Instant::now() - Duration::from_secs(10);
        locks
            .locks
            .insert("stale".to_string(), (Arc::new(Mutex::new(())), old));

        let held = Arc::new(Mutex::new(()));
        locks
            .locks
            .insert("held".to_string(), (Arc::clone(&held), old));

        drop(locks.acquire("fresh").await);

        assert_eq!(locks.prune(Duration::from_secs(5)), 1);
        assert!(!locks.locks.contains_key("stale"));
        assert!(locks.locks.contains_key("held"));
        assert!(locks.locks.contains_key("fresh"));
    }
}
