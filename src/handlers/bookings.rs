//! Booking endpoints under `/api/bookings`.

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::response::ApiError;
use crate::booking::{ArchiveKind, Booking, BookingStatus, BookingUpdate, Cancellation, NewBooking};
use crate::reconcile::{ArchiveOutcome, ExpiryScan, ReconcileError, ReconcileReport};
use crate::server::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    booking: Booking,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingListResponse {
    success: bool,
    count: usize,
    bookings: Vec<Booking>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveResponse {
    success: bool,
    message: String,
    booking_id: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    archived_at: Option<DateTime<Utc>>,
    /// True when the archive write will be finished by a later pass.
    pending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryScanResponse {
    success: bool,
    message: String,
    expired_count: usize,
    #[serde(flatten)]
    scan: ExpiryScan,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoCompleteResponse {
    success: bool,
    message: String,
    completed_count: usize,
    #[serde(flatten)]
    report: ReconcileReport,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Comma-separated statuses.
    status: Option<String>,
}

// ============================================================================
// CRUD
// ============================================================================

/// POST /api/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    payload: Result<Json<NewBooking>, JsonRejection>,
) -> Result<(StatusCode, Json<BookingResponse>), ApiError> {
    let Json(input) = payload?;
    let booking = input.validate(&state.policy, Utc::now())?;
    state.bookings.insert(&booking).await?;

    info!(booking_id = %booking.id, theater = %booking.theater_name, "Booking created");
    Ok((
        StatusCode::CREATED,
        Json(BookingResponse {
            success: true,
            message: Some("Booking created".to_string()),
            booking,
        }),
    ))
}

/// GET /api/bookings?status=confirmed,manual
pub async fn list_bookings(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<BookingListResponse>, ApiError> {
    let Query(query) = query?;

    let bookings = match query.status.as_deref().map(str::trim) {
        Some(filter) if !filter.is_empty() => {
            let statuses: Vec<BookingStatus> = filter
                .split(',')
                .map(|s| BookingStatus::from(s.to_string()))
                .collect();
            state.bookings.list_by_status(&statuses).await?
        }
        _ => state.bookings.list().await?,
    };

    Ok(Json(BookingListResponse {
        success: true,
        count: bookings.len(),
        bookings,
    }))
}

/// GET /api/bookings/{id}
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = state
        .bookings
        .load(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Booking '{id}' not found")))?;

    Ok(Json(BookingResponse {
        success: true,
        message: None,
        booking,
    }))
}

/// PATCH /api/bookings/{id}
pub async fn update_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<BookingUpdate>, JsonRejection>,
) -> Result<Json<BookingResponse>, ApiError> {
    let Json(update) = payload?;
    let _guard = state.job.lock(&id).await;

    let mut booking = state
        .bookings
        .load(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Booking '{id}' not found")))?;
    if let Some(marker) = &booking.pending_archive {
        return Err(ApiError::conflict(format!(
            "Booking '{id}' is being archived as {}",
            marker.kind.as_str()
        )));
    }

    update.apply(&mut booking, &state.policy, Utc::now())?;
    state.bookings.save(&booking).await?;

    info!(booking_id = %id, "Booking updated");
    Ok(Json(BookingResponse {
        success: true,
        message: Some("Booking updated".to_string()),
        booking,
    }))
}

// ============================================================================
// Archive Transitions
// ============================================================================

/// POST /api/bookings/{id}/cancel
///
/// Body (optional): `{"reason": ..., "refundAmount": ..., "refundStatus": ...}`.
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let cancellation: Cancellation = if body.iter().all(u8::is_ascii_whitespace) {
        Cancellation::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            ApiError::bad_request("Invalid cancellation details").with_details(e.to_string())
        })?
    };

    let result = state.job.cancel_booking(&id, cancellation, Utc::now()).await;
    archive_response(&id, ArchiveKind::Cancelled, result)
}

/// POST /api/bookings/{id}/complete
pub async fn complete_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let result = state.job.complete_booking(&id, Utc::now()).await;
    archive_response(&id, ArchiveKind::Completed, result)
}

/// A failure after the marker was written is reported as accepted: the
/// next reconciliation pass finishes the transition.
fn archive_response(
    id: &str,
    kind: ArchiveKind,
    result: Result<ArchiveOutcome, ReconcileError>,
) -> Result<Response, ApiError> {
    let verb = kind.as_str();

    match result {
        Ok(outcome) => Ok(Json(ArchiveResponse {
            success: true,
            message: format!("Booking {verb}"),
            booking_id: outcome.booking_id,
            status: outcome.kind.as_str(),
            archived_at: Some(outcome.archived_at),
            pending: false,
            error: None,
        })
        .into_response()),
        Err(e) if e.is_retryable() => {
            warn!(booking_id = %id, error = %e, "Archive deferred to next cleanup pass");
            Ok((
                StatusCode::ACCEPTED,
                Json(ArchiveResponse {
                    success: true,
                    message: format!("Booking marked {verb}; archive will be retried"),
                    booking_id: id.to_string(),
                    status: kind.as_str(),
                    archived_at: None,
                    pending: true,
                    error: Some(e.to_string()),
                }),
            )
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Expired Bookings
// ============================================================================

/// GET /api/bookings/auto-complete-expired
///
/// Lists expired active bookings without touching them.
pub async fn check_expired(
    State(state): State<AppState>,
) -> Result<Json<ExpiryScanResponse>, ApiError> {
    let scan = state.job.scan(Utc::now()).await?;

    Ok(Json(ExpiryScanResponse {
        success: true,
        message: format!("Found {} expired bookings", scan.expired.len()),
        expired_count: scan.expired.len(),
        scan,
    }))
}

/// POST /api/bookings/auto-complete-expired
///
/// Runs a reconciliation pass, serialized with the scheduler.
pub async fn auto_complete_expired(
    State(state): State<AppState>,
) -> Result<Json<AutoCompleteResponse>, ApiError> {
    let report = state.scheduler.run_now().await?;
    Ok(Json(auto_complete_body(report)))
}

pub(crate) fn auto_complete_body(report: ReconcileReport) -> AutoCompleteResponse {
    let completed_count = report.completed_count();
    let message = if report.expired == 0 && report.recovered.is_empty() {
        "No expired bookings found to auto-complete".to_string()
    } else {
        format!("Auto-completed {completed_count} expired bookings")
    };
    AutoCompleteResponse {
        success: true,
        message,
        completed_count,
        report,
    }
}
