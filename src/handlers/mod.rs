//! HTTP request handlers.

mod admin;
pub mod api_auth;
mod bookings;
mod cleanup;
mod export;
mod health;
pub mod response;
mod version;

pub use admin::{archive_stats, dashboard, shutdown};
pub use bookings::{
    auto_complete_expired, cancel_booking, check_expired, complete_booking, create_booking,
    get_booking, list_bookings, update_booking,
};
pub use cleanup::{cron_cleanup, scheduler_action};
pub use export::{export_bookings, init_archive};
pub use health::{livez, readyz};
pub use version::version;
