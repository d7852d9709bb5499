use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;
use tracing::warn;

use crate::server::AppState;

pub async fn livez() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyzResponse {
    pub success: bool,
    pub live_store: &'static str,
    pub archive_store: &'static str,
}

/// Ready when both stores answer a ping.
pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<ReadyzResponse>) {
    let (live, archive) = tokio::join!(state.bookings.ping(), state.archive.ping());

    let live_store = match live {
        Ok(()) => "ok",
        Err(e) => {
            warn!(error = %e, "Live store not ready");
            "unavailable"
        }
    };
    let archive_store = match archive {
        Ok(()) => "ok",
        Err(e) => {
            warn!(error = %e, "Archive store not ready");
            "unavailable"
        }
    };

    let ready = live_store == "ok" && archive_store == "ok";
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadyzResponse {
            success: ready,
            live_store,
            archive_store,
        }),
    )
}
