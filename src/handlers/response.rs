//! JSON error bodies.
//!
//! Every failure is rendered as `{"success": false, "error": ..., "details"?: ...}`
//! with a status code picked from the error type.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::booking::BookingError;
use crate::reconcile::ReconcileError;
use crate::scheduler::SchedulerError;
use crate::store::StorageError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// An error returned from a handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    details: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    pub fn not_found(error: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error)
    }

    pub fn conflict(error: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, error)
    }

    pub fn internal(error: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.error,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request("Invalid request body").with_details(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request("Invalid query string").with_details(rejection.body_text())
    }
}

impl From<BookingError> for ApiError {
    fn from(e: BookingError) -> Self {
        Self::bad_request("Invalid booking").with_details(e.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { entity_type, id } => {
                Self::not_found(format!("{entity_type} '{id}' not found"))
            }
            StorageError::Conflict { entity_type, id } => {
                Self::conflict(format!("{entity_type} '{id}' already exists"))
            }
            other => {
                error!(error = %other, "Store request failed");
                Self::internal("Database error").with_details(other.to_string())
            }
        }
    }
}

impl From<ReconcileError> for ApiError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::NotFound(id) => Self::not_found(format!("Booking '{id}' not found")),
            ReconcileError::PendingTransition { .. } => Self::conflict(e.to_string()),
            ReconcileError::Storage(source) => source.into(),
            other => {
                error!(error = %other, "Archive transition failed");
                Self::internal("Failed to archive booking").with_details(other.to_string())
            }
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(e: SchedulerError) -> Self {
        match e {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                Self::conflict(e.to_string())
            }
            SchedulerError::Reconcile(source) => source.into(),
            SchedulerError::TaskFailed(_) => {
                Self::internal("Cleanup scheduler failed").with_details(e.to_string())
            }
        }
    }
}
