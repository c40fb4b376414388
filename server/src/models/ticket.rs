use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle status of a ticket.
///
/// `Used` and `Cancelled` are terminal: a ticket never leaves them, although
/// scans against it keep being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Unused,
    Used,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub ticket_type_id: Uuid,
    pub qr_code: String,
    pub price: Decimal,
    pub status: TicketStatus,
    /// Absent on rows created before ticket signing was introduced.
    pub signature: Option<String>,
    pub signature_version: i32,
    pub content_hash: Option<String>,
    pub scan_count: i32,
    pub last_scanned_at: Option<DateTime<Utc>>,
    pub last_scan_device_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Last-scan bookkeeping written on every resolved scan, admitted or not.
///
/// Applying a stamp increments `scan_count` relative to the stored row, never
/// to a value read earlier, so concurrent scans cannot lose increments.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanStamp {
    pub scanned_at: DateTime<Utc>,
    pub device_id: String,
}

impl ScanStamp {
    pub fn new(device_id: &str, scanned_at: DateTime<Utc>) -> Self {
        Self {
            scanned_at,
            device_id: device_id.to_string(),
        }
    }
}

/// Security fields produced by the signer and persisted on a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityFields {
    pub signature: String,
    pub content_hash: String,
    pub signature_version: i32,
}

/// Partial update applied to a ticket row. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketUpdate {
    pub status: Option<TicketStatus>,
    pub stamp: Option<ScanStamp>,
    pub security: Option<SecurityFields>,
}

impl TicketUpdate {
    pub fn stamp(stamp: ScanStamp) -> Self {
        Self {
            stamp: Some(stamp),
            ..Self::default()
        }
    }

    pub fn admit(stamp: ScanStamp) -> Self {
        Self {
            status: Some(TicketStatus::Used),
            stamp: Some(stamp),
            ..Self::default()
        }
    }

    pub fn security(fields: SecurityFields) -> Self {
        Self {
            security: Some(fields),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, ticket: &mut Ticket, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            ticket.status = status;
        }
        if let Some(stamp) = &self.stamp {
            ticket.scan_count = ticket.scan_count.saturating_add(1);
            ticket.last_scanned_at = Some(stamp.scanned_at);
            ticket.last_scan_device_id = Some(stamp.device_id.clone());
        }
        if let Some(security) = &self.security {
            ticket.signature = Some(security.signature.clone());
            ticket.content_hash = Some(security.content_hash.clone());
            ticket.signature_version = security.signature_version;
        }
        ticket.updated_at = now;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketType {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
}
