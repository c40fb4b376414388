#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use gatekeeper_server::integrity::{
    ContentIntegrityChecker, DetectionConfig, SignatureEngine, SigningConfig,
    SuspiciousScanDetector, TicketValidator,
};
use gatekeeper_server::models::{Event, Ticket, TicketStatus, TicketType, User};
use gatekeeper_server::services::{
    AdmissionMode, ScanOrigin, ScanService, TicketSigner, ValidateScanRequest,
};
use gatekeeper_server::store::{MemoryStore, TicketStore};

pub const SECRET: &[u8] = b"integration-fixture-secret-0123456789";

pub fn signing_config() -> SigningConfig {
    SigningConfig::new(1, SECRET)
}

pub fn validator() -> TicketValidator {
    TicketValidator::new(
        SignatureEngine::new(&signing_config()).expect("fixture key is valid"),
        ContentIntegrityChecker::new(),
    )
}

pub fn scan_service(store: Arc<dyn TicketStore>, admission: AdmissionMode) -> ScanService {
    ScanService::new(
        store,
        validator(),
        SuspiciousScanDetector::new(DetectionConfig::default()),
        admission,
    )
}

pub fn signer(store: Arc<dyn TicketStore>) -> TicketSigner {
    TicketSigner::new(store, validator())
}

pub fn origin() -> ScanOrigin {
    ScanOrigin {
        scanned_by: Uuid::new_v4(),
        ip_address: Some("203.0.113.7".to_string()),
    }
}

pub fn request(qr_code: &str, device_id: &str) -> ValidateScanRequest {
    ValidateScanRequest {
        qr_code: qr_code.to_string(),
        event_id: None,
        device_id: device_id.to_string(),
        device_info: None,
        location: None,
    }
}

/// An event with one ticket type and one attendee, seeded into `store`.
pub struct Seeded {
    pub event: Event,
    pub ticket_type: TicketType,
    pub user: User,
}

pub fn seed(store: &MemoryStore) -> Seeded {
    let event = Event {
        id: Uuid::new_v4(),
        title: "Harbour Lights Festival".to_string(),
        location: "Pier 4".to_string(),
        start_time: Utc::now() + Duration::hours(2),
        end_time: None,
    };
    let ticket_type = TicketType {
        id: Uuid::new_v4(),
        event_id: event.id,
        name: "General Admission".to_string(),
        description: None,
        price: Decimal::new(4500, 2),
    };
    let user = User {
        id: Uuid::new_v4(),
        name: "Ada Okafor".to_string(),
        email: "ada@example.com".to_string(),
    };
    store.insert_event(event.clone());
    store.insert_ticket_type(ticket_type.clone());
    store.insert_user(user.clone());
    Seeded {
        event,
        ticket_type,
        user,
    }
}

pub fn unsigned_ticket(seeded: &Seeded, qr_code: &str) -> Ticket {
    let created_at = Utc::now() - Duration::days(3);
    Ticket {
        id: Uuid::new_v4(),
        event_id: seeded.event.id,
        user_id: seeded.user.id,
        ticket_type_id: seeded.ticket_type.id,
        qr_code: qr_code.to_string(),
        price: seeded.ticket_type.price,
        status: TicketStatus::Unused,
        signature: None,
        signature_version: 1,
        content_hash: None,
        scan_count: 0,
        last_scanned_at: None,
        last_scan_device_id: None,
        created_at,
        updated_at: created_at,
    }
}

/// A freshly issued ticket carrying valid security fields.
pub fn issued_ticket(seeded: &Seeded, qr_code: &str) -> Ticket {
    let mut ticket = unsigned_ticket(seeded, qr_code);
    let fields = signer(Arc::new(MemoryStore::new())).security_fields(&ticket);
    ticket.signature = Some(fields.signature);
    ticket.content_hash = Some(fields.content_hash);
    ticket.signature_version = fields.signature_version;
    ticket
}
