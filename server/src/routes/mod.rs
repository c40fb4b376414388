use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, with_security_headers, HttpConfig};
use crate::handlers::{
    backfill_signatures, health_check, resign_ticket, ticket_integrity, validate_scan,
};
use crate::state::AppState;

pub fn create_routes(state: AppState, http: &HttpConfig) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/api/scans/validate", post(validate_scan))
        .route("/api/tickets/:id/integrity", get(ticket_integrity))
        .route(
            "/api/admin/tickets/backfill-signatures",
            post(backfill_signatures),
        )
        .route("/api/admin/tickets/:id/resign", post(resign_ticket))
        .with_state(state);

    with_security_headers(router, http.production)
        .layer(create_cors_layer(&http.allowed_origins))
        .layer(TraceLayer::new_for_http())
}
