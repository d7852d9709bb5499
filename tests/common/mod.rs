//! Common test utilities.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::connect_info::MockConnectInfo;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Map;
use tokio::sync::Mutex;

use feelme::booking::{Booking, BookingStatus, ExpiryPolicy};
use feelme::reconcile::ReconcileJob;
use feelme::scheduler::{CleanupScheduler, SchedulerConfig};
use feelme::server::{self, AppState};
use feelme::store::{ArchiveStore, BookingStore, MemoryArchiveStore, MemoryBookingStore};

/// In-memory stores kept alongside the app so tests can inspect them.
pub struct TestHarness {
    pub bookings: MemoryBookingStore,
    pub archive: MemoryArchiveStore,
    pub state: AppState,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_admin_token(None)
    }

    pub fn with_admin_token(admin_token: Option<&str>) -> Self {
        let bookings = MemoryBookingStore::new();
        let archive = MemoryArchiveStore::new();
        let state = test_app_state(
            Arc::new(bookings.clone()),
            Arc::new(archive.clone()),
            admin_token.map(str::to_string),
        );
        Self {
            bookings,
            archive,
            state,
        }
    }

    /// Router as seen from a loopback peer.
    pub fn app(&self) -> Router {
        self.app_from(SocketAddr::from(([127, 0, 0, 1], 50000)))
    }

    /// Router as seen from `peer`.
    pub fn app_from(&self, peer: SocketAddr) -> Router {
        server::build_app(self.state.clone(), 30).layer(MockConnectInfo(peer))
    }
}

/// Build an `AppState` over the given stores with default expiry rules.
pub fn test_app_state(
    bookings: Arc<dyn BookingStore>,
    archive: Arc<dyn ArchiveStore>,
    admin_token: Option<String>,
) -> AppState {
    let policy = ExpiryPolicy::default();
    let job = ReconcileJob::new(bookings.clone(), archive.clone(), policy);
    let scheduler = CleanupScheduler::new(
        job.clone(),
        SchedulerConfig {
            interval: Duration::from_secs(3600),
            run_on_start: false,
        },
    );
    let (shutdown_tx, _shutdown_rx) = server::shutdown_channel();

    AppState {
        bookings,
        archive,
        job,
        scheduler,
        policy,
        admin_token,
        max_connections: 16,
        shutdown_tx: Arc::new(Mutex::new(Some(shutdown_tx))),
    }
}

/// Create a test app with empty in-memory stores.
pub fn test_app() -> Router {
    TestHarness::new().app()
}

/// A live booking for the 7-9 PM show on Friday, October 31, 2025.
pub fn halloween_booking(id: &str, status: BookingStatus) -> Booking {
    Booking {
        id: id.to_string(),
        name: "Asha Rao".to_string(),
        email: "asha@example.com".to_string(),
        phone: "9876543210".to_string(),
        theater_name: "EROS (Couples) (FMT-Hall-1)".to_string(),
        date: "Friday, October 31, 2025".to_string(),
        time: "7:00 PM - 9:00 PM".to_string(),
        occasion: "Anniversary".to_string(),
        number_of_people: 2,
        total_amount: 1999.0,
        advance_payment: 600.0,
        venue_payment: 1399.0,
        status,
        payment_status: None,
        created_at: None,
        expired_at: None,
        pending_archive: None,
        extra: Map::new(),
    }
}

/// Wall-clock time in India on October 31, 2025.
pub fn ist(hour: u32, minute: u32) -> DateTime<Utc> {
    chrono_tz::Asia::Kolkata
        .with_ymd_and_hms(2025, 10, 31, hour, minute, 0)
        .single()
        .expect("valid IST time")
        .with_timezone(&Utc)
}
