use serde::{Deserialize, Serialize};

use crate::integrity::{ContentIntegrityChecker, SignatureEngine, SignaturePayload};
use crate::models::{Ticket, TicketStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationError {
    InvalidSignature,
    ContentModified,
    AlreadyUsed,
    Cancelled,
}

impl ValidationError {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationError::InvalidSignature => "invalid_signature",
            ValidationError::ContentModified => "content_modified",
            ValidationError::AlreadyUsed => "already_used",
            ValidationError::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationOutcome {
    pub fn has(&self, error: ValidationError) -> bool {
        self.errors.contains(&error)
    }

    /// Signature or content evidence that the ticket was forged or edited.
    pub fn is_tampered(&self) -> bool {
        self.has(ValidationError::InvalidSignature) || self.has(ValidationError::ContentModified)
    }
}

/// Accumulates every validity problem of a resolved ticket.
///
/// Checks never short-circuit: a forged ticket that was also used reports both.
#[derive(Debug, Clone)]
pub struct TicketValidator {
    signatures: SignatureEngine,
    content: ContentIntegrityChecker,
}

impl TicketValidator {
    pub fn new(signatures: SignatureEngine, content: ContentIntegrityChecker) -> Self {
        Self {
            signatures,
            content,
        }
    }

    pub fn signatures(&self) -> &SignatureEngine {
        &self.signatures
    }

    pub fn content(&self) -> &ContentIntegrityChecker {
        &self.content
    }

    pub fn validate(&self, ticket: &Ticket) -> ValidationOutcome {
        let mut errors = Vec::new();

        if let Some(signature) = &ticket.signature {
            let payload = SignaturePayload::from_ticket(ticket);
            if !self.signatures.verify(&payload, signature) {
                errors.push(ValidationError::InvalidSignature);
            }
        }

        if !self.content.verify(ticket) {
            errors.push(ValidationError::ContentModified);
        }

        match ticket.status {
            TicketStatus::Used => errors.push(ValidationError::AlreadyUsed),
            TicketStatus::Cancelled => errors.push(ValidationError::Cancelled),
            TicketStatus::Unused => {}
        }

        ValidationOutcome {
            valid: errors.is_empty(),
            errors,
        }
    }
}
