//! Record-store contract used by the scan and signing services.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgTicketStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    NewScanAttempt, NewSecurityAlert, ScanAttempt, ScanStamp, SecurityAlert, Ticket,
    TicketContext, TicketUpdate,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record not found: {0}")]
    NotFound(String),
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Exact match on the scan token.
    async fn get_ticket_by_code(&self, qr_code: &str) -> Result<Option<Ticket>, StoreError>;

    async fn get_ticket_by_id(&self, id: Uuid) -> Result<Option<Ticket>, StoreError>;

    /// Most-recent-first.
    async fn list_recent_scans(
        &self,
        ticket_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ScanAttempt>, StoreError>;

    async fn append_scan(&self, scan: NewScanAttempt) -> Result<ScanAttempt, StoreError>;

    /// Fails with [`StoreError::NotFound`] when the ticket does not exist.
    async fn update_ticket(&self, id: Uuid, update: TicketUpdate) -> Result<Ticket, StoreError>;

    /// Moves the ticket from `unused` to `used` and applies the stamp as one
    /// conditional write. Returns `None` when the ticket was no longer unused.
    async fn admit_ticket(&self, id: Uuid, stamp: &ScanStamp)
        -> Result<Option<Ticket>, StoreError>;

    async fn append_security_alert(
        &self,
        alert: NewSecurityAlert,
    ) -> Result<SecurityAlert, StoreError>;

    /// Tickets with no stored signature, oldest first.
    async fn list_unsigned_tickets(&self, limit: i64) -> Result<Vec<Ticket>, StoreError>;

    async fn load_ticket_context(&self, ticket: &Ticket) -> Result<TicketContext, StoreError>;
}
