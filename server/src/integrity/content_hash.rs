//! Tamper detection for ticket fields outside the signature.
//!
//! The hash covers `[id, event_id, user_id, ticket_type_id, qr_code, price]`.
//! `price` enters as its normalized decimal string, so a value that round-trips
//! through a `NUMERIC(10,2)` column (`50` vs `50.00`) hashes the same.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::integrity::constant_time_eq;
use crate::models::Ticket;

/// Hex characters kept from the SHA-256 digest.
pub const CONTENT_HASH_LEN: usize = 32;

#[derive(Debug, Clone, Copy, Default)]
pub struct ContentIntegrityChecker;

impl ContentIntegrityChecker {
    pub fn new() -> Self {
        Self
    }

    pub fn hash(&self, ticket: &Ticket) -> String {
        #[derive(Serialize)]
        struct Canonical(String, String, String, String, String, String);

        let canonical = Canonical(
            ticket.id.hyphenated().to_string(),
            ticket.event_id.hyphenated().to_string(),
            ticket.user_id.hyphenated().to_string(),
            ticket.ticket_type_id.hyphenated().to_string(),
            ticket.qr_code.clone(),
            ticket.price.normalize().to_string(),
        );
        let bytes = serde_json::to_vec(&canonical).unwrap_or_default();

        let mut digest = hex::encode(Sha256::digest(&bytes));
        digest.truncate(CONTENT_HASH_LEN);
        digest
    }

    /// Compares the stored hash against a fresh one.
    ///
    /// Tickets without a stored hash predate content hashing and pass.
    pub fn verify(&self, ticket: &Ticket) -> bool {
        match &ticket.content_hash {
            Some(stored) => constant_time_eq(self.hash(ticket).as_bytes(), stored.as_bytes()),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TicketStatus;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn ticket() -> Ticket {
        let now = Utc::now();
        Ticket {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            ticket_type_id: Uuid::new_v4(),
            qr_code: "QR-HASH".to_string(),
            price: Decimal::new(5000, 2),
            status: TicketStatus::Unused,
            signature: None,
            signature_version: 1,
            content_hash: None,
            scan_count: 0,
            last_scanned_at: None,
            last_scan_device_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_hash_is_stable_and_truncated() {
        let checker = ContentIntegrityChecker::new();
        let t = ticket();
        let first = checker.hash(&t);
        assert_eq!(first, checker.hash(&t));
        assert_eq!(first.len(), CONTENT_HASH_LEN);
    }

    #[test]
    fn test_price_change_changes_hash() {
        let checker = ContentIntegrityChecker::new();
        let mut t = ticket();
        let before = checker.hash(&t);
        t.price = Decimal::new(100, 2);
        assert_ne!(before, checker.hash(&t));
    }

    #[test]
    fn test_price_scale_does_not_change_hash() {
        let checker = ContentIntegrityChecker::new();
        let mut t = ticket();
        t.price = Decimal::new(50, 0);
        let unscaled = checker.hash(&t);
        t.price = Decimal::new(5000, 2);
        assert_eq!(unscaled, checker.hash(&t));
    }

    #[test]
    fn test_scan_bookkeeping_is_not_hashed() {
        let checker = ContentIntegrityChecker::new();
        let mut t = ticket();
        let before = checker.hash(&t);
        t.scan_count = 9;
        t.status = TicketStatus::Used;
        t.last_scan_device_id = Some("gate".to_string());
        assert_eq!(before, checker.hash(&t));
    }

    #[test]
    fn test_verify_detects_modification() {
        let checker = ContentIntegrityChecker::new();
        let mut t = ticket();
        t.content_hash = Some(checker.hash(&t));
        assert!(checker.verify(&t));

        t.ticket_type_id = Uuid::new_v4();
        assert!(!checker.verify(&t));
    }

    #[test]
    fn test_missing_hash_passes() {
        let checker = ContentIntegrityChecker::new();
        assert!(checker.verify(&ticket()));
    }
}
