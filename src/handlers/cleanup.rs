//! Cleanup scheduler control and the external cron trigger.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};

use super::bookings::{AutoCompleteResponse, auto_complete_body};
use super::response::ApiError;
use crate::reconcile::ReconcileReport;
use crate::scheduler::SchedulerStatus;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct SchedulerAction {
    #[serde(default)]
    action: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerActionResponse {
    success: bool,
    message: String,
    is_running: bool,
    status: SchedulerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<ReconcileReport>,
}

/// POST /api/auto-cleanup-scheduler
///
/// `{"action": "start" | "stop" | "status" | "run"}`
pub async fn scheduler_action(
    State(state): State<AppState>,
    payload: Result<Json<SchedulerAction>, JsonRejection>,
) -> Result<Json<SchedulerActionResponse>, ApiError> {
    let Json(request) = payload?;
    let scheduler = &state.scheduler;

    let (message, result) = match request.action.trim() {
        "start" => {
            let status = scheduler.start().await?;
            let message = format!(
                "Automatic cleanup scheduler started (runs every {} seconds)",
                status.interval_seconds
            );
            (Some(message), None)
        }
        "stop" => {
            scheduler.stop().await?;
            (Some("Automatic cleanup scheduler stopped".to_string()), None)
        }
        "status" => (None, None),
        "run" => {
            let report = scheduler.run_now().await?;
            (Some("Manual cleanup completed".to_string()), Some(report))
        }
        _ => {
            return Err(ApiError::bad_request(
                "Invalid action. Use: start, stop, status, or run",
            ));
        }
    };

    let status = scheduler.status().await;
    let message = message.unwrap_or_else(|| {
        let running = if status.running { "running" } else { "stopped" };
        format!("Automatic cleanup is {running}")
    });

    Ok(Json(SchedulerActionResponse {
        success: true,
        message,
        is_running: status.running,
        status,
        result,
    }))
}

#[derive(Serialize)]
pub struct CronResponse {
    success: bool,
    message: &'static str,
    result: AutoCompleteResponse,
}

/// GET|POST /api/cron/cleanup
///
/// For an external scheduler calling in every few minutes.
pub async fn cron_cleanup(State(state): State<AppState>) -> Result<Json<CronResponse>, ApiError> {
    let report = state.scheduler.run_now().await?;
    Ok(Json(CronResponse {
        success: true,
        message: "Cleanup cron executed",
        result: auto_complete_body(report),
    }))
}
