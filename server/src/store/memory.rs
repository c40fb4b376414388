use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{
    Event, NewScanAttempt, NewSecurityAlert, ScanAttempt, ScanStamp, SecurityAlert, Ticket,
    TicketContext, TicketStatus, TicketType, TicketUpdate, User,
};
use crate::store::{StoreError, TicketStore};

#[derive(Debug, Default)]
struct MemoryState {
    tickets: HashMap<Uuid, Ticket>,
    users: HashMap<Uuid, User>,
    events: HashMap<Uuid, Event>,
    ticket_types: HashMap<Uuid, TicketType>,
    /// Append order is chronological.
    scans: Vec<ScanAttempt>,
    alerts: Vec<SecurityAlert>,
}

/// Process-local store for tests and database-less local runs.
///
/// Each trait call takes the lock once, so `admit_ticket` keeps the same
/// compare-and-set semantics as the Postgres conditional update.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_ticket(&self, ticket: Ticket) {
        self.state().tickets.insert(ticket.id, ticket);
    }

    pub fn insert_user(&self, user: User) {
        self.state().users.insert(user.id, user);
    }

    pub fn insert_event(&self, event: Event) {
        self.state().events.insert(event.id, event);
    }

    pub fn insert_ticket_type(&self, ticket_type: TicketType) {
        self.state().ticket_types.insert(ticket_type.id, ticket_type);
    }

    pub fn ticket(&self, id: Uuid) -> Option<Ticket> {
        self.state().tickets.get(&id).cloned()
    }

    /// Every ledger entry, oldest first.
    pub fn scans(&self) -> Vec<ScanAttempt> {
        self.state().scans.clone()
    }

    pub fn alerts(&self) -> Vec<SecurityAlert> {
        self.state().alerts.clone()
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn get_ticket_by_code(&self, qr_code: &str) -> Result<Option<Ticket>, StoreError> {
        Ok(self
            .state()
            .tickets
            .values()
            .find(|t| t.qr_code == qr_code)
            .cloned())
    }

    async fn get_ticket_by_id(&self, id: Uuid) -> Result<Option<Ticket>, StoreError> {
        Ok(self.ticket(id))
    }

    async fn list_recent_scans(
        &self,
        ticket_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ScanAttempt>, StoreError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .state()
            .scans
            .iter()
            .rev()
            .filter(|s| s.ticket_id == Some(ticket_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn append_scan(&self, scan: NewScanAttempt) -> Result<ScanAttempt, StoreError> {
        let record = scan.into_record(Uuid::new_v4(), Utc::now());
        self.state().scans.push(record.clone());
        Ok(record)
    }

    async fn update_ticket(&self, id: Uuid, update: TicketUpdate) -> Result<Ticket, StoreError> {
        let mut state = self.state();
        let ticket = state
            .tickets
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("ticket {id}")))?;
        update.apply_to(ticket, Utc::now());
        Ok(ticket.clone())
    }

    async fn admit_ticket(
        &self,
        id: Uuid,
        stamp: &ScanStamp,
    ) -> Result<Option<Ticket>, StoreError> {
        let mut state = self.state();
        match state.tickets.get_mut(&id) {
            Some(ticket) if ticket.status == TicketStatus::Unused => {
                TicketUpdate::admit(stamp.clone()).apply_to(ticket, Utc::now());
                Ok(Some(ticket.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn append_security_alert(
        &self,
        alert: NewSecurityAlert,
    ) -> Result<SecurityAlert, StoreError> {
        let record = alert.into_record(Uuid::new_v4(), Utc::now());
        self.state().alerts.push(record.clone());
        Ok(record)
    }

    async fn list_unsigned_tickets(&self, limit: i64) -> Result<Vec<Ticket>, StoreError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let mut unsigned: Vec<Ticket> = self
            .state()
            .tickets
            .values()
            .filter(|t| t.signature.is_none())
            .cloned()
            .collect();
        unsigned.sort_by_key(|t| t.created_at);
        unsigned.truncate(limit);
        Ok(unsigned)
    }

    async fn load_ticket_context(&self, ticket: &Ticket) -> Result<TicketContext, StoreError> {
        let state = self.state();
        Ok(TicketContext {
            user: state.users.get(&ticket.user_id).cloned(),
            event: state.events.get(&ticket.event_id).cloned(),
            ticket_type: state.ticket_types.get(&ticket.ticket_type_id).cloned(),
        })
    }
}
