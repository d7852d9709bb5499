//! Admin handlers: archive statistics, dashboard and server shutdown.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::response::ApiError;
use crate::archive::ArchiveStats;
use crate::scheduler::SchedulerStatus;
use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveStatsResponse {
    success: bool,
    timezone: String,
    stats: ArchiveStats,
}

/// GET /api/admin/archive-stats
///
/// Calendar windows (today, week, month, year) follow the business time zone.
pub async fn archive_stats(
    State(state): State<AppState>,
) -> Result<Json<ArchiveStatsResponse>, ApiError> {
    let timezone = state.policy.timezone;
    let stats = state.archive.stats(Utc::now(), timezone).await?;
    Ok(Json(ArchiveStatsResponse {
        success: true,
        timezone: timezone.name().to_string(),
        stats,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSummary {
    total: usize,
    by_status: BTreeMap<String, usize>,
    pending_archive: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    success: bool,
    generated_at: String,
    live: LiveSummary,
    scheduler: SchedulerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    archive: Option<ArchiveStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    archive_error: Option<String>,
}

/// GET /api/admin/dashboard
///
/// Live counts are required; archive statistics are best effort.
pub async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardResponse>, ApiError> {
    let now = Utc::now();
    let bookings = state.bookings.list().await?;

    let mut by_status = BTreeMap::new();
    for booking in &bookings {
        *by_status.entry(booking.status.to_string()).or_insert(0) += 1;
    }
    let live = LiveSummary {
        total: bookings.len(),
        pending_archive: bookings.iter().filter(|b| b.pending_archive.is_some()).count(),
        by_status,
    };

    let (archive, archive_error) = match state.archive.stats(now, state.policy.timezone).await {
        Ok(stats) => (Some(stats), None),
        Err(e) => {
            warn!(error = %e, "Archive stats unavailable for dashboard");
            (None, Some(e.to_string()))
        }
    };

    Ok(Json(DashboardResponse {
        success: true,
        generated_at: state.policy.local_display(now),
        live,
        scheduler: state.scheduler.status().await,
        archive,
        archive_error,
    }))
}

/// POST /api/admin/shutdown
///
/// Triggers a graceful server shutdown. Authorization is enforced by the
/// admin middleware.
pub async fn shutdown(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(tx) = state.shutdown_tx.lock().await.take() {
        let _ = tx.send(());
        info!("Shutdown requested via admin API");
        (StatusCode::OK, "Shutdown initiated").into_response()
    } else {
        (StatusCode::CONFLICT, "Shutdown already in progress").into_response()
    }
}
