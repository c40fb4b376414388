use axum::response::Response;
use serde::Serialize;

use crate::utils::response::success;

pub mod scans;
pub mod tickets;

pub use scans::validate_scan;
pub use tickets::{backfill_signatures, resign_ticket, ticket_integrity};

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "gatekeeper-api",
    };

    success(payload, "Health check successful")
}
