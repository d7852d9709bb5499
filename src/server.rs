use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tokio::sync::{Mutex, oneshot};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::booking::ExpiryPolicy;
use crate::handlers;
use crate::reconcile::ReconcileJob;
use crate::scheduler::CleanupScheduler;
use crate::store::{ArchiveStore, BookingStore};

/// Default cap on requests handled at once.
pub const DEFAULT_MAX_CONNECTIONS: usize = 256;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<dyn BookingStore>,
    pub archive: Arc<dyn ArchiveStore>,
    pub job: ReconcileJob,
    pub scheduler: CleanupScheduler,
    pub policy: ExpiryPolicy,
    pub admin_token: Option<String>,
    pub max_connections: usize,
    pub shutdown_tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

// ============================================================================
// Server Setup
// ============================================================================

/// Create a shutdown channel pair.
///
/// Returns (sender for AppState, receiver for shutdown_signal).
pub fn shutdown_channel() -> (oneshot::Sender<()>, oneshot::Receiver<()>) {
    oneshot::channel()
}

pub fn build_app(state: AppState, request_timeout_seconds: u64) -> Router {
    let max_connections = state.max_connections.max(1);

    let booking_routes = Router::new()
        .route(
            "/bookings",
            get(handlers::list_bookings).post(handlers::create_booking),
        )
        .route(
            "/bookings/auto-complete-expired",
            get(handlers::check_expired).post(handlers::auto_complete_expired),
        )
        .route(
            "/bookings/{id}",
            get(handlers::get_booking).patch(handlers::update_booking),
        )
        .route("/bookings/{id}/cancel", post(handlers::cancel_booking))
        .route("/bookings/{id}/complete", post(handlers::complete_booking));

    // Cleanup control and admin routes share the admin token
    let admin_routes = Router::new()
        .route(
            "/auto-cleanup-scheduler",
            post(handlers::scheduler_action),
        )
        .route(
            "/cron/cleanup",
            get(handlers::cron_cleanup).post(handlers::cron_cleanup),
        )
        .route(
            "/admin/export-bookings",
            get(handlers::export_bookings).post(handlers::init_archive),
        )
        .route("/admin/archive-stats", get(handlers::archive_stats))
        .route("/admin/dashboard", get(handlers::dashboard))
        .route("/admin/shutdown", post(handlers::shutdown))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            handlers::api_auth::require_admin,
        ));

    let api = Router::new()
        .merge(booking_routes)
        .merge(admin_routes)
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(request_timeout_seconds),
        ))
        .layer(ConcurrencyLimitLayer::new(max_connections));

    Router::new()
        .route("/livez", get(handlers::livez))
        .route("/readyz", get(handlers::readyz))
        .route("/version", get(handlers::version))
        .with_state(state)
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
}
