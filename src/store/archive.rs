//! Archive storage trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::archive::{ArchiveStats, CancelledRecord, CompletedRecord};

use super::error::StorageResult;

/// Storage interface for the completed/cancelled booking history.
///
/// Writes are upserts keyed by booking ID, so replaying a transition never
/// produces a second row.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Check the backend is reachable.
    async fn ping(&self) -> StorageResult<()>;

    /// Create the archive tables if they do not exist.
    async fn ensure_schema(&self) -> StorageResult<()>;

    /// Insert or update a completed booking row.
    async fn upsert_completed(&self, record: &CompletedRecord) -> StorageResult<()>;

    /// Insert or update a cancelled booking row.
    async fn upsert_cancelled(&self, record: &CancelledRecord) -> StorageResult<()>;

    /// All completed rows, newest first.
    async fn list_completed(&self) -> StorageResult<Vec<CompletedRecord>>;

    /// All cancelled rows, newest first.
    async fn list_cancelled(&self) -> StorageResult<Vec<CancelledRecord>>;

    /// Row counts over the calendar windows containing `now`, with days
    /// and weeks taken in `timezone`.
    async fn stats(&self, now: DateTime<Utc>, timezone: Tz) -> StorageResult<ArchiveStats>;
}
