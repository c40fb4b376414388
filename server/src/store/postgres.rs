use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    Event, NewScanAttempt, NewSecurityAlert, ScanAttempt, ScanStamp, SecurityAlert, Ticket,
    TicketContext, TicketType, TicketUpdate, User,
};
use crate::store::{StoreError, TicketStore};

const TICKET_COLUMNS: &str = "id, event_id, user_id, ticket_type_id, qr_code, price, status, \
     signature, signature_version, content_hash, scan_count, last_scanned_at, \
     last_scan_device_id, created_at, updated_at";

const SCAN_COLUMNS: &str = "id, ticket_id, event_id, scanned_by, scan_result, device_id, \
     device_info, ip_address, location_lat, location_lng, is_suspicious, suspicious_reason, \
     created_at";

const ALERT_COLUMNS: &str =
    "id, ticket_id, event_id, alert_type, severity, description, metadata, status, created_at";

#[derive(Clone)]
pub struct PgTicketStore {
    pool: PgPool,
}

impl PgTicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TicketStore for PgTicketStore {
    async fn get_ticket_by_code(&self, qr_code: &str) -> Result<Option<Ticket>, StoreError> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE qr_code = $1");
        let ticket = sqlx::query_as::<_, Ticket>(&sql)
            .bind(qr_code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    async fn get_ticket_by_id(&self, id: Uuid) -> Result<Option<Ticket>, StoreError> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1");
        let ticket = sqlx::query_as::<_, Ticket>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    async fn list_recent_scans(
        &self,
        ticket_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ScanAttempt>, StoreError> {
        let sql = format!(
            "SELECT {SCAN_COLUMNS} FROM scan_attempts WHERE ticket_id = $1 \
             ORDER BY created_at DESC LIMIT $2"
        );
        let scans = sqlx::query_as::<_, ScanAttempt>(&sql)
            .bind(ticket_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(scans)
    }

    async fn append_scan(&self, scan: NewScanAttempt) -> Result<ScanAttempt, StoreError> {
        let sql = format!(
            "INSERT INTO scan_attempts (ticket_id, event_id, scanned_by, scan_result, \
             device_id, device_info, ip_address, location_lat, location_lng, is_suspicious, \
             suspicious_reason) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {SCAN_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ScanAttempt>(&sql)
            .bind(scan.ticket_id)
            .bind(scan.event_id)
            .bind(scan.scanned_by)
            .bind(scan.scan_result)
            .bind(scan.device_id)
            .bind(scan.device_info)
            .bind(scan.ip_address)
            .bind(scan.location.map(|p| p.lat))
            .bind(scan.location.map(|p| p.lng))
            .bind(scan.is_suspicious)
            .bind(scan.suspicious_reason)
            .fetch_one(&self.pool)
            .await?;
        Ok(record)
    }

    async fn update_ticket(&self, id: Uuid, update: TicketUpdate) -> Result<Ticket, StoreError> {
        let sql = format!(
            "UPDATE tickets SET \
                status = COALESCE($2, status), \
                scan_count = scan_count + CASE WHEN $3 THEN 1 ELSE 0 END, \
                last_scanned_at = COALESCE($4, last_scanned_at), \
                last_scan_device_id = COALESCE($5, last_scan_device_id), \
                signature = COALESCE($6, signature), \
                content_hash = COALESCE($7, content_hash), \
                signature_version = COALESCE($8, signature_version), \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {TICKET_COLUMNS}"
        );
        let stamp = update.stamp;
        let security = update.security;
        let ticket = sqlx::query_as::<_, Ticket>(&sql)
            .bind(id)
            .bind(update.status)
            .bind(stamp.is_some())
            .bind(stamp.as_ref().map(|s| s.scanned_at))
            .bind(stamp.map(|s| s.device_id))
            .bind(security.as_ref().map(|s| s.signature.clone()))
            .bind(security.as_ref().map(|s| s.content_hash.clone()))
            .bind(security.map(|s| s.signature_version))
            .fetch_optional(&self.pool)
            .await?;

        ticket.ok_or_else(|| StoreError::NotFound(format!("ticket {id}")))
    }

    async fn admit_ticket(
        &self,
        id: Uuid,
        stamp: &ScanStamp,
    ) -> Result<Option<Ticket>, StoreError> {
        let sql = format!(
            "UPDATE tickets SET \
                status = 'used', \
                scan_count = scan_count + 1, \
                last_scanned_at = $2, \
                last_scan_device_id = $3, \
                updated_at = NOW() \
             WHERE id = $1 AND status = 'unused' \
             RETURNING {TICKET_COLUMNS}"
        );
        let ticket = sqlx::query_as::<_, Ticket>(&sql)
            .bind(id)
            .bind(stamp.scanned_at)
            .bind(&stamp.device_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    async fn append_security_alert(
        &self,
        alert: NewSecurityAlert,
    ) -> Result<SecurityAlert, StoreError> {
        let sql = format!(
            "INSERT INTO security_alerts \
                (ticket_id, event_id, alert_type, severity, description, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {ALERT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, SecurityAlert>(&sql)
            .bind(alert.ticket_id)
            .bind(alert.event_id)
            .bind(alert.alert_type)
            .bind(alert.severity)
            .bind(alert.description)
            .bind(alert.metadata)
            .fetch_one(&self.pool)
            .await?;
        Ok(record)
    }

    async fn list_unsigned_tickets(&self, limit: i64) -> Result<Vec<Ticket>, StoreError> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE signature IS NULL \
             ORDER BY created_at ASC LIMIT $1"
        );
        let tickets = sqlx::query_as::<_, Ticket>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(tickets)
    }

    async fn load_ticket_context(&self, ticket: &Ticket) -> Result<TicketContext, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT id, name, email FROM users WHERE id = $1")
            .bind(ticket.user_id)
            .fetch_optional(&self.pool)
            .await?;

        let event = sqlx::query_as::<_, Event>(
            "SELECT id, title, location, start_time, end_time FROM events WHERE id = $1",
        )
        .bind(ticket.event_id)
        .fetch_optional(&self.pool)
        .await?;

        let ticket_type = sqlx::query_as::<_, TicketType>(
            "SELECT id, event_id, name, description, price FROM ticket_types WHERE id = $1",
        )
        .bind(ticket.ticket_type_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(TicketContext {
            user,
            event,
            ticket_type,
        })
    }
}
