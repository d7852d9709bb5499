//! Storage abstraction layer.
//!
//! Bookings live in two places: active ones in the live store, finished
//! ones in the archive store. This module defines a trait for each, with
//! MongoDB, MySQL and in-memory implementations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              handlers / reconcile / scheduler                   │
//! └──────────────────────────┬──────────────────────────────────────┘
//!                            │ uses traits
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     store/ (traits)                             │
//! │            BookingStore               ArchiveStore              │
//! └──────────────┬──────────────────────────────┬───────────────────┘
//!                │                              │
//!                ▼                              ▼
//! ┌──────────────────────────────┐ ┌────────────────────────────────┐
//! │ MongoBookingStore            │ │ MySqlArchiveStore              │
//! │ MemoryBookingStore           │ │ MemoryArchiveStore             │
//! └──────────────────────────────┘ └────────────────────────────────┘
//! ```
//!
//! # Naming Conventions
//!
//! - `list` - enumerate entities
//! - `load` - read a single entity, returns `Option` if not found
//! - `insert` - create, failing on an existing ID
//! - `save` - overwrite an existing entity
//! - `upsert` - create or update keyed by booking ID
//! - `delete` - remove an entity

pub mod error;

mod archive;
mod booking;
mod memory;
mod mongo;
mod mysql;

pub use archive::ArchiveStore;
pub use booking::BookingStore;
pub use error::{StorageError, StorageResult};
pub use memory::{MemoryArchiveStore, MemoryBookingStore};
pub use mongo::MongoBookingStore;
pub use mysql::{DEFAULT_MAX_CONNECTIONS, MySqlArchiveStore};
