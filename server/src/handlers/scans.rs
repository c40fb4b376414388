use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::services::{ScanOrigin, ScanOutcome, ServiceError, ValidateScanRequest};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::identity::ScannerIdentity;

/// `POST /api/scans/validate`
///
/// Every outcome reachable after ticket lookup is a 200 with the verdict in the
/// body. Malformed requests are 400s and never reach the scan ledger. Store
/// failures answer 500 with `result: "error"`.
pub async fn validate_scan(
    State(state): State<AppState>,
    identity: ScannerIdentity,
    Json(request): Json<ValidateScanRequest>,
) -> Response {
    let origin = ScanOrigin {
        scanned_by: identity.user_id,
        ip_address: identity.ip_address,
    };

    match state.scans.validate_scan(&origin, request).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(ServiceError::Store(e)) => {
            error!(error = %e, scanned_by = %origin.scanned_by, "Scan validation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ScanOutcome::internal_error()),
            )
                .into_response()
        }
        Err(other) => AppError::from(other).into_response(),
    }
}
