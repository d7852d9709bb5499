//! Integration tests for the HTTP API.

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

mod common;

use common::{TestHarness, halloween_booking, test_app};
use feelme::booking::BookingStatus;
use feelme::store::{ArchiveStore, BookingStore};

async fn body_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// An ISO date a month from now, so created bookings are never expired.
fn future_date() -> String {
    (Utc::now() + Duration::days(30))
        .format("%Y-%m-%d")
        .to_string()
}

// ============================================================================
// Health Endpoints
// ============================================================================

#[tokio::test]
async fn test_livez() {
    let app = test_app();

    let response = app
        .oneshot(Request::get("/livez").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_readyz_pings_both_stores() {
    let app = test_app();

    let response = app
        .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["liveStore"], "ok");
    assert_eq!(json["archiveStore"], "ok");
}

#[tokio::test]
async fn test_version() {
    let app = test_app();

    let response = app
        .oneshot(Request::get("/version").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json.get("version").is_some());
    assert_eq!(json["success"], true);
    assert_eq!(json["timezone"], "Asia/Kolkata");
    assert_eq!(json["graceMinutes"], 5);
}

// ============================================================================
// Bookings API
// ============================================================================

#[tokio::test]
async fn test_create_booking_canonicalizes_slot() {
    let harness = TestHarness::new();

    let response = harness
        .app()
        .oneshot(post_json(
            "/api/bookings",
            json!({
                "name": "Asha Rao",
                "email": "asha@example.com",
                "theaterName": "EROS (Couples) (FMT-Hall-1)",
                "date": future_date(),
                "time": "7:00pm-9:00pm",
                "Partner Name": "Ravi"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["booking"]["time"], "7:00 PM - 9:00 PM");
    assert_eq!(json["booking"]["status"], "confirmed");
    assert_eq!(json["booking"]["numberOfPeople"], 2);
    assert_eq!(json["booking"]["Partner Name"], "Ravi");

    let id = json["booking"]["bookingId"].as_str().unwrap();
    assert!(id.starts_with("fmt_"));
    assert!(harness.bookings.load(id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_create_booking_rejects_bad_slot() {
    let app = test_app();

    let response = app
        .oneshot(post_json(
            "/api/bookings",
            json!({
                "name": "Asha Rao",
                "email": "asha@example.com",
                "theaterName": "EROS",
                "date": future_date(),
                "time": "sometime in the evening"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["details"].as_str().unwrap().contains("time range"));
}

#[tokio::test]
async fn test_create_booking_rejects_malformed_json() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::post("/api/bookings")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn test_create_duplicate_booking_conflicts() {
    let harness = TestHarness::new();
    harness
        .bookings
        .insert(&halloween_booking("BK-1", BookingStatus::Confirmed))
        .await
        .unwrap();

    let response = harness
        .app()
        .oneshot(post_json(
            "/api/bookings",
            json!({
                "bookingId": "BK-1",
                "name": "Asha Rao",
                "email": "asha@example.com",
                "theaterName": "EROS",
                "date": future_date(),
                "time": "7:00 PM - 9:00 PM"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_get_booking_not_found() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::get("/api/bookings/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_list_bookings_filters_by_status() {
    let harness = TestHarness::new();
    for (id, status) in [
        ("BK-1", BookingStatus::Confirmed),
        ("BK-2", BookingStatus::Manual),
        ("BK-3", BookingStatus::Confirmed),
    ] {
        harness
            .bookings
            .insert(&halloween_booking(id, status))
            .await
            .unwrap();
    }

    let response = harness
        .app()
        .oneshot(
            Request::get("/api/bookings?status=manual")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["bookings"][0]["bookingId"], "BK-2");

    let response = harness
        .app()
        .oneshot(Request::get("/api/bookings").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(response).await["count"], 3);
}

#[tokio::test]
async fn test_update_booking_revalidates_slot() {
    let harness = TestHarness::new();
    harness
        .bookings
        .insert(&halloween_booking("BK-1", BookingStatus::Confirmed))
        .await
        .unwrap();

    let response = harness
        .app()
        .oneshot(
            Request::patch("/api/bookings/BK-1")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"time": "10:00 PM - 1:00 AM", "numberOfPeople": 4}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["booking"]["time"], "10:00 PM - 1:00 AM");
    assert_eq!(json["booking"]["numberOfPeople"], 4);

    let response = harness
        .app()
        .oneshot(
            Request::patch("/api/bookings/BK-1")
                .header("content-type", "application/json")
                .body(Body::from(json!({"status": "completed"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let stored = harness.bookings.load("BK-1").await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Confirmed);
    assert_eq!(stored.number_of_people, 4);
}

// ============================================================================
// Archive Transitions
// ============================================================================

#[tokio::test]
async fn test_cancel_booking_moves_to_cancelled_archive() {
    let harness = TestHarness::new();
    harness
        .bookings
        .insert(&halloween_booking("BK-1", BookingStatus::Confirmed))
        .await
        .unwrap();

    let response = harness
        .app()
        .oneshot(post_json(
            "/api/bookings/BK-1/cancel",
            json!({"reason": "Customer request", "refundAmount": 600.0, "refundStatus": "pending"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "cancelled");
    assert_eq!(json["pending"], false);

    assert!(harness.bookings.is_empty());
    let cancelled = harness.archive.list_cancelled().await.unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(
        cancelled[0].cancellation_reason.as_deref(),
        Some("Customer request")
    );
    assert_eq!(cancelled[0].refund_amount, Some(600.0));
}

#[tokio::test]
async fn test_cancel_without_body_uses_defaults() {
    let harness = TestHarness::new();
    harness
        .bookings
        .insert(&halloween_booking("BK-1", BookingStatus::Manual))
        .await
        .unwrap();

    let response = harness
        .app()
        .oneshot(
            Request::post("/api/bookings/BK-1/cancel")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(harness.archive.cancelled_len(), 1);
}

#[tokio::test]
async fn test_complete_unknown_booking_is_not_found() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::post("/api/bookings/BK-404/complete")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_complete_booking_archives_it() {
    let harness = TestHarness::new();
    harness
        .bookings
        .insert(&halloween_booking("BK-1", BookingStatus::Manual))
        .await
        .unwrap();

    let response = harness
        .app()
        .oneshot(
            Request::post("/api/bookings/BK-1/complete")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let completed = harness.archive.list_completed().await.unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].booking_status, "completed");
    assert_eq!(completed[0].payment_status, "unpaid");
}

// ============================================================================
// Expired Bookings
// ============================================================================

#[tokio::test]
async fn test_check_expired_is_read_only() {
    let harness = TestHarness::new();
    harness
        .bookings
        .insert(&halloween_booking("BK-1", BookingStatus::Confirmed))
        .await
        .unwrap();

    let response = harness
        .app()
        .oneshot(
            Request::get("/api/bookings/auto-complete-expired")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["expiredCount"], 1);
    assert_eq!(json["totalActive"], 1);
    assert_eq!(json["expired"][0]["bookingId"], "BK-1");
    assert_eq!(harness.bookings.len(), 1);
}

#[tokio::test]
async fn test_auto_complete_expired_archives() {
    let harness = TestHarness::new();
    harness
        .bookings
        .insert(&halloween_booking("BK-1", BookingStatus::Confirmed))
        .await
        .unwrap();

    let response = harness
        .app()
        .oneshot(
            Request::post("/api/bookings/auto-complete-expired")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["completedCount"], 1);
    assert_eq!(json["completed"], json!(["BK-1"]));
    assert!(harness.bookings.is_empty());
    assert_eq!(harness.archive.completed_len(), 1);
}

// ============================================================================
// Cleanup Control
// ============================================================================

#[tokio::test]
async fn test_scheduler_start_stop_cycle() {
    let harness = TestHarness::new();

    let response = harness
        .app()
        .oneshot(post_json(
            "/api/auto-cleanup-scheduler",
            json!({"action": "start"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["isRunning"], true);

    let response = harness
        .app()
        .oneshot(post_json(
            "/api/auto-cleanup-scheduler",
            json!({"action": "start"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = harness
        .app()
        .oneshot(post_json(
            "/api/auto-cleanup-scheduler",
            json!({"action": "stop"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["isRunning"], false);

    let response = harness
        .app()
        .oneshot(post_json(
            "/api/auto-cleanup-scheduler",
            json!({"action": "stop"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_scheduler_unknown_action_is_bad_request() {
    let app = test_app();

    let response = app
        .oneshot(post_json(
            "/api/auto-cleanup-scheduler",
            json!({"action": "pause"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("Invalid action"));
}

#[tokio::test]
async fn test_scheduler_run_reports_pass() {
    let harness = TestHarness::new();
    harness
        .bookings
        .insert(&halloween_booking("BK-1", BookingStatus::Confirmed))
        .await
        .unwrap();

    let response = harness
        .app()
        .oneshot(post_json(
            "/api/auto-cleanup-scheduler",
            json!({"action": "run"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["result"]["completed"], json!(["BK-1"]));
    assert_eq!(json["status"]["totalRuns"], 1);
}

#[tokio::test]
async fn test_cron_cleanup_accepts_get() {
    let harness = TestHarness::new();

    let response = harness
        .app()
        .oneshot(Request::get("/api/cron/cleanup").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Cleanup cron executed");
    assert_eq!(json["result"]["completedCount"], 0);
}

// ============================================================================
// Admin API
// ============================================================================

#[tokio::test]
async fn test_admin_rejects_remote_peer_without_token() {
    let harness = TestHarness::new();
    let remote = SocketAddr::from(([203, 0, 113, 9], 41000));

    let response = harness
        .app_from(remote)
        .oneshot(
            Request::get("/api/admin/dashboard")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn test_admin_accepts_configured_token() {
    let harness = TestHarness::with_admin_token(Some("s3cret"));
    let remote = SocketAddr::from(([203, 0, 113, 9], 41000));

    let response = harness
        .app_from(remote)
        .oneshot(
            Request::get("/api/admin/archive-stats")
                .header("authorization", "Bearer s3cret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["timezone"], "Asia/Kolkata");
    assert_eq!(json["stats"]["completed"]["total"], 0);

    // Loopback is not enough once a token is set
    let response = harness
        .app()
        .oneshot(
            Request::get("/api/admin/archive-stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_export_bookings_by_type() {
    let harness = TestHarness::new();
    harness
        .bookings
        .insert(&halloween_booking("BK-1", BookingStatus::Confirmed))
        .await
        .unwrap();
    harness
        .bookings
        .insert(&halloween_booking("BK-2", BookingStatus::Confirmed))
        .await
        .unwrap();
    harness
        .state
        .job
        .complete_booking("BK-1", Utc::now())
        .await
        .unwrap();
    harness
        .state
        .job
        .cancel_booking("BK-2", Default::default(), Utc::now())
        .await
        .unwrap();

    let response = harness
        .app()
        .oneshot(
            Request::get("/api/admin/export-bookings?type=all")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["summary"]["totalCompleted"], 1);
    assert_eq!(json["data"]["summary"]["totalCancelled"], 1);
    assert_eq!(json["data"]["summary"]["total"], 2);
    let row = &json["data"]["completed"][0];
    assert_eq!(row["booking_id"], "BK-1");
    assert_eq!(row["booking_date"], "2025-10-31");
    assert_eq!(row["original_booking_data"]["status"], "completed");

    let response = harness
        .app()
        .oneshot(
            Request::get("/api/admin/export-bookings?type=cancelled")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["data"]["completed"], json!([]));
    assert_eq!(json["data"]["cancelled"][0]["booking_id"], "BK-2");

    let response = harness
        .app()
        .oneshot(
            Request::get("/api/admin/export-bookings?type=everything")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["summary"]["total"], 2);
}

#[tokio::test]
async fn test_init_archive_endpoint() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::post("/api/admin/export-bookings")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);
}

#[tokio::test]
async fn test_dashboard_counts_live_bookings() {
    let harness = TestHarness::new();
    for (id, status) in [
        ("BK-1", BookingStatus::Confirmed),
        ("BK-2", BookingStatus::Confirmed),
        ("BK-3", BookingStatus::Manual),
    ] {
        harness
            .bookings
            .insert(&halloween_booking(id, status))
            .await
            .unwrap();
    }

    let response = harness
        .app()
        .oneshot(
            Request::get("/api/admin/dashboard")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["live"]["total"], 3);
    assert_eq!(json["live"]["byStatus"]["confirmed"], 2);
    assert_eq!(json["live"]["byStatus"]["manual"], 1);
    assert_eq!(json["scheduler"]["running"], false);
    assert_eq!(json["archive"]["completed"]["total"], 0);
}

#[tokio::test]
async fn test_shutdown_only_once() {
    let harness = TestHarness::new();

    let response = harness
        .app()
        .oneshot(
            Request::post("/api/admin/shutdown")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = harness
        .app()
        .oneshot(
            Request::post("/api/admin/shutdown")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
