//! Expired-booking reconciliation between the live store and the archive.
//!
//! # Usage
//!
//! ```ignore
//! let job = ReconcileJob::new(bookings, archive, ExpiryPolicy::default());
//!
//! // What would be archived right now?
//! let scan = job.scan(Utc::now()).await?;
//!
//! // Archive it.
//! let report = job.run(Utc::now()).await?;
//! ```

pub mod error;
pub mod job;
pub mod report;

pub use error::{ReconcileError, Result};
pub use job::ReconcileJob;
pub use report::{
    ArchiveOutcome, BookingFailure, ExpiredBooking, ExpiryScan, FailureStage, ReconcileReport,
    UnparseableBooking,
};
