//! Archive records for completed and cancelled bookings.

mod record;
mod snapshot;

pub use record::{ArchiveStats, ArchiveSummary, CancelledRecord, CompletedRecord, TableStats};
pub use snapshot::{decode_snapshot, encode_snapshot};
