mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use gatekeeper_server::config::HttpConfig;
use gatekeeper_server::integrity::DetectionConfig;
use gatekeeper_server::models::TicketStatus;
use gatekeeper_server::routes::create_routes;
use gatekeeper_server::services::AdmissionMode;
use gatekeeper_server::state::AppState;
use gatekeeper_server::store::MemoryStore;

use common::{issued_ticket, seed, signing_config, unsigned_ticket};

fn app(store: Arc<MemoryStore>) -> Router {
    let state = AppState::new(
        store,
        &signing_config(),
        DetectionConfig::default(),
        AdmissionMode::Atomic,
    )
    .unwrap();
    let http = HttpConfig {
        allowed_origins: vec!["http://localhost:3000".to_string()],
        production: false,
    };
    create_routes(state, &http)
}

fn scan_request(body: Value, role: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/scans/validate")
        .header("content-type", "application/json")
        .header("x-user-id", Uuid::new_v4().to_string())
        .header("x-forwarded-for", "198.51.100.20, 10.0.0.1");
    if let Some(role) = role {
        builder = builder.header("x-user-role", role);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = app(Arc::new(MemoryStore::new()))
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_validate_scan_returns_bare_verdict() {
    let store = Arc::new(MemoryStore::new());
    let seeded = seed(&store);
    store.insert_ticket(issued_ticket(&seeded, "QR-HTTP"));

    let response = app(store.clone())
        .oneshot(scan_request(
            json!({
                "qrCode": "QR-HTTP",
                "eventId": seeded.event.id,
                "deviceId": "gate-1",
                "location": {"lat": 52.52, "lng": 13.405}
            }),
            Some("staff"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["result"], "valid");
    assert_eq!(body["ticket"]["qr_code"], "QR-HTTP");
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert_eq!(body["event"]["title"], "Harbour Lights Festival");
    assert_eq!(body["ticketType"]["name"], "General Admission");
    assert!(body.get("success").is_none());

    let scans = store.scans();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0].ip_address.as_deref(), Some("198.51.100.20"));
    assert_eq!(scans[0].location_lat, Some(52.52));
}

#[tokio::test]
async fn test_rejected_scan_is_still_200() {
    let response = app(Arc::new(MemoryStore::new()))
        .oneshot(scan_request(
            json!({"qrCode": "QR-UNKNOWN", "deviceId": "gate-1"}),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["valid"], false);
    assert_eq!(body["result"], "not_found");
    assert_eq!(body["error"], "Ticket not found");
}

#[tokio::test]
async fn test_scan_without_identity_is_unauthorized() {
    let store = Arc::new(MemoryStore::new());
    let request = Request::builder()
        .method("POST")
        .uri("/api/scans/validate")
        .header("content-type", "application/json")
        .body(Body::from(json!({"qrCode": "QR-1", "deviceId": "g"}).to_string()))
        .unwrap();

    let response = app(store.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(store.scans().is_empty());
}

#[tokio::test]
async fn test_missing_device_is_bad_request_and_not_logged() {
    let store = Arc::new(MemoryStore::new());

    let response = app(store.clone())
        .oneshot(scan_request(json!({"qrCode": "QR-1"}), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert!(store.scans().is_empty());
}

#[tokio::test]
async fn test_oversized_device_id_is_bad_request_and_not_logged() {
    let store = Arc::new(MemoryStore::new());
    let seeded = seed(&store);
    store.insert_ticket(issued_ticket(&seeded, "QR-LONG-DEVICE"));

    let response = app(store.clone())
        .oneshot(scan_request(
            json!({"qrCode": "QR-LONG-DEVICE", "deviceId": "d".repeat(256)}),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(store.scans().is_empty());
}

#[tokio::test]
async fn test_resign_requires_admin_role() {
    let store = Arc::new(MemoryStore::new());
    let seeded = seed(&store);
    let ticket = unsigned_ticket(&seeded, "QR-RESIGN");
    store.insert_ticket(ticket.clone());
    let uri = format!("/api/admin/tickets/{}/resign", ticket.id);

    let forbidden = app(store.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(&uri)
                .header("x-user-id", Uuid::new_v4().to_string())
                .header("x-user-role", "staff")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    assert!(store.ticket(ticket.id).unwrap().signature.is_none());

    let response = app(store.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(&uri)
                .header("x-user-id", Uuid::new_v4().to_string())
                .header("x-user-role", "Admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let stored = store.ticket(ticket.id).unwrap();
    assert_eq!(body["data"]["signature"], json!(stored.signature));
    assert_eq!(body["data"]["content_hash"], json!(stored.content_hash));
    assert_eq!(body["data"]["signature_version"], 1);
}

#[tokio::test]
async fn test_resign_unknown_ticket_is_not_found() {
    let response = app(Arc::new(MemoryStore::new()))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/admin/tickets/{}/resign", Uuid::new_v4()))
                .header("x-user-id", Uuid::new_v4().to_string())
                .header("x-user-role", "admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_backfill_signs_legacy_tickets() {
    let store = Arc::new(MemoryStore::new());
    let seeded = seed(&store);
    for i in 0..3 {
        store.insert_ticket(unsigned_ticket(&seeded, &format!("QR-BACKFILL-{i}")));
    }

    let response = app(store.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/tickets/backfill-signatures?limit=2")
                .header("x-user-id", Uuid::new_v4().to_string())
                .header("x-user-role", "admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["processed"], 2);
}

#[tokio::test]
async fn test_backfill_rejects_out_of_range_limit() {
    let response = app(Arc::new(MemoryStore::new()))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/tickets/backfill-signatures?limit=0")
                .header("x-user-id", Uuid::new_v4().to_string())
                .header("x-user-role", "admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_integrity_report_flags_tampering() {
    let store = Arc::new(MemoryStore::new());
    let seeded = seed(&store);
    let mut ticket = issued_ticket(&seeded, "QR-INTEGRITY");
    ticket.qr_code = "QR-INTEGRITY-COPY".to_string();
    ticket.status = TicketStatus::Used;
    store.insert_ticket(ticket.clone());

    let response = app(store.clone())
        .oneshot(
            Request::builder()
                .uri(format!("/api/tickets/{}/integrity", ticket.id))
                .header("x-user-id", Uuid::new_v4().to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["valid"], false);
    assert_eq!(body["data"]["signed"], true);
    assert_eq!(
        body["data"]["errors"],
        json!(["invalid_signature", "content_modified", "already_used"])
    );
    assert!(store.scans().is_empty());
}
