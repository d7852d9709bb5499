//! Archive export under `/api/admin/export-bookings`.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::response::ApiError;
use crate::archive::{CancelledRecord, CompletedRecord, decode_snapshot};
use crate::server::AppState;

/// Which archive tables to export. Anything unrecognized exports both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportType {
    Completed,
    Cancelled,
    #[default]
    #[serde(other)]
    All,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(default, rename = "type")]
    kind: ExportType,
}

/// Archive row with its snapshot decoded.
#[derive(Serialize)]
pub struct ExportRow<R> {
    #[serde(flatten)]
    record: R,
    original_booking_data: Option<Value>,
}

impl From<CompletedRecord> for ExportRow<CompletedRecord> {
    fn from(record: CompletedRecord) -> Self {
        let original_booking_data = decode_snapshot(&record.snapshot);
        Self {
            record,
            original_booking_data,
        }
    }
}

impl From<CancelledRecord> for ExportRow<CancelledRecord> {
    fn from(record: CancelledRecord) -> Self {
        let original_booking_data = decode_snapshot(&record.snapshot);
        Self {
            record,
            original_booking_data,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    total_completed: usize,
    total_cancelled: usize,
    total: usize,
}

#[derive(Serialize)]
pub struct ExportData {
    completed: Vec<ExportRow<CompletedRecord>>,
    cancelled: Vec<ExportRow<CancelledRecord>>,
    summary: ExportSummary,
}

#[derive(Serialize)]
pub struct ExportResponse {
    success: bool,
    data: ExportData,
}

/// GET /api/admin/export-bookings?type=completed|cancelled|all
pub async fn export_bookings(
    State(state): State<AppState>,
    query: Result<Query<ExportQuery>, QueryRejection>,
) -> Result<Json<ExportResponse>, ApiError> {
    let Query(query) = query?;

    let completed: Vec<ExportRow<CompletedRecord>> = match query.kind {
        ExportType::Completed | ExportType::All => state
            .archive
            .list_completed()
            .await?
            .into_iter()
            .map(ExportRow::from)
            .collect(),
        ExportType::Cancelled => Vec::new(),
    };
    let cancelled: Vec<ExportRow<CancelledRecord>> = match query.kind {
        ExportType::Cancelled | ExportType::All => state
            .archive
            .list_cancelled()
            .await?
            .into_iter()
            .map(ExportRow::from)
            .collect(),
        ExportType::Completed => Vec::new(),
    };

    let summary = ExportSummary {
        total_completed: completed.len(),
        total_cancelled: cancelled.len(),
        total: completed.len() + cancelled.len(),
    };
    Ok(Json(ExportResponse {
        success: true,
        data: ExportData {
            completed,
            cancelled,
            summary,
        },
    }))
}

#[derive(Serialize)]
pub struct InitResponse {
    success: bool,
    message: &'static str,
}

/// POST /api/admin/export-bookings
///
/// Creates the archive tables if they do not exist.
pub async fn init_archive(State(state): State<AppState>) -> Result<Json<InitResponse>, ApiError> {
    state.archive.ensure_schema().await?;
    info!("Archive schema ready");
    Ok(Json(InitResponse {
        success: true,
        message: "Archive tables are ready",
    }))
}
