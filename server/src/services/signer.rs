use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::integrity::{TicketValidator, ValidationOutcome};
use crate::models::{SecurityFields, Ticket, TicketUpdate};
use crate::services::ServiceError;
use crate::store::TicketStore;

/// Issues and re-issues ticket security fields.
///
/// Signing happens only here: at ticket creation through
/// [`TicketSigner::security_fields`] or through the admin re-sign and backfill
/// operations. Reads and scans never sign.
pub struct TicketSigner {
    store: Arc<dyn TicketStore>,
    validator: TicketValidator,
}

impl TicketSigner {
    pub fn new(store: Arc<dyn TicketStore>, validator: TicketValidator) -> Self {
        Self { store, validator }
    }

    pub fn security_fields(&self, ticket: &Ticket) -> SecurityFields {
        let (signature, signature_version) = self.validator.signatures().sign_ticket(ticket);
        SecurityFields {
            signature,
            content_hash: self.validator.content().hash(ticket),
            signature_version,
        }
    }

    pub async fn resign_ticket(&self, ticket_id: Uuid) -> Result<SecurityFields, ServiceError> {
        let ticket = self
            .store
            .get_ticket_by_id(ticket_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("ticket {ticket_id}")))?;

        let fields = self.security_fields(&ticket);
        self.store
            .update_ticket(ticket.id, TicketUpdate::security(fields.clone()))
            .await?;

        info!(
            ticket_id = %ticket.id,
            signature_version = fields.signature_version,
            had_signature = ticket.signature.is_some(),
            "Ticket re-signed"
        );
        Ok(fields)
    }

    /// Signs up to `limit` tickets that have no signature yet.
    pub async fn backfill_unsigned(&self, limit: i64) -> Result<usize, ServiceError> {
        if limit <= 0 {
            return Err(ServiceError::InvalidRequest(
                "limit must be positive".to_string(),
            ));
        }

        let tickets = self.store.list_unsigned_tickets(limit).await?;
        let mut processed = 0;
        for ticket in &tickets {
            let fields = self.security_fields(ticket);
            self.store
                .update_ticket(ticket.id, TicketUpdate::security(fields))
                .await?;
            processed += 1;
        }

        info!(processed, "Signature backfill completed");
        Ok(processed)
    }

    /// Validity verdict for a stored ticket. Does not touch the scan ledger.
    pub async fn inspect_ticket(
        &self,
        ticket_id: Uuid,
    ) -> Result<(Ticket, ValidationOutcome), ServiceError> {
        let ticket = self
            .store
            .get_ticket_by_id(ticket_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("ticket {ticket_id}")))?;

        let outcome = self.validator.validate(&ticket);
        if outcome.is_tampered() {
            warn!(
                ticket_id = %ticket.id,
                errors = ?outcome.errors,
                "Stored ticket failed integrity check"
            );
        }
        Ok((ticket, outcome))
    }
}
