//! FeelME Town booking backend.
//!
//! Live bookings sit in a document store; expired, completed and cancelled
//! bookings move into a relational archive for reporting.

pub mod archive;
pub mod booking;
pub mod build_info;
pub mod config;
pub mod handlers;
pub mod reconcile;
pub mod scheduler;
pub mod server;
pub mod store;
pub mod sync;
