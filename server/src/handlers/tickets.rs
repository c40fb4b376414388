use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::integrity::ValidationError;
use crate::models::TicketStatus;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::identity::{AdminIdentity, ScannerIdentity};
use crate::utils::response::success;

const DEFAULT_BACKFILL_LIMIT: i64 = 100;
const MAX_BACKFILL_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct BackfillParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct BackfillPayload {
    pub processed: usize,
}

#[derive(Debug, Serialize)]
pub struct IntegrityReport {
    pub ticket_id: Uuid,
    pub status: TicketStatus,
    pub signed: bool,
    pub signature_version: i32,
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

/// `POST /api/admin/tickets/:id/resign`
pub async fn resign_ticket(
    State(state): State<AppState>,
    admin: AdminIdentity,
    Path(ticket_id): Path<Uuid>,
) -> Result<Response, AppError> {
    tracing::info!(admin = %admin.user_id, ticket_id = %ticket_id, "Re-sign requested");
    let fields = state.signer.resign_ticket(ticket_id).await?;
    Ok(success(fields, "Ticket security fields regenerated"))
}

/// `POST /api/admin/tickets/backfill-signatures?limit=N`
pub async fn backfill_signatures(
    State(state): State<AppState>,
    admin: AdminIdentity,
    Query(params): Query<BackfillParams>,
) -> Result<Response, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_BACKFILL_LIMIT);
    if !(1..=MAX_BACKFILL_LIMIT).contains(&limit) {
        return Err(AppError::ValidationError(format!(
            "limit must be between 1 and {MAX_BACKFILL_LIMIT}"
        )));
    }

    tracing::info!(admin = %admin.user_id, limit, "Signature backfill requested");
    let processed = state.signer.backfill_unsigned(limit).await?;
    Ok(success(BackfillPayload { processed }, "Signature backfill completed"))
}

/// `GET /api/tickets/:id/integrity`
pub async fn ticket_integrity(
    State(state): State<AppState>,
    _identity: ScannerIdentity,
    Path(ticket_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (ticket, outcome) = state.signer.inspect_ticket(ticket_id).await?;
    let report = IntegrityReport {
        ticket_id: ticket.id,
        status: ticket.status,
        signed: ticket.signature.is_some(),
        signature_version: ticket.signature_version,
        valid: outcome.valid,
        errors: outcome.errors,
    };
    Ok(success(report, "Ticket integrity checked"))
}
