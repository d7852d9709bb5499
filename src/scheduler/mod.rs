//! Periodic cleanup of expired bookings.
//!
//! # Usage
//!
//! ```ignore
//! let scheduler = CleanupScheduler::new(job, SchedulerConfig::default());
//! scheduler.start().await?;
//!
//! // On demand, serialized with timer-driven passes.
//! let report = scheduler.run_now().await?;
//!
//! scheduler.shutdown().await;
//! ```

pub mod error;
pub mod service;

pub use error::{Result, SchedulerError};
pub use service::{
    CleanupScheduler, DEFAULT_INTERVAL, LastRun, SchedulerConfig, SchedulerStatus,
};
