use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "alert_severity", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "alert_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    New,
    Acknowledged,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SecurityAlert {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub event_id: Uuid,
    pub alert_type: String,
    pub severity: Severity,
    pub description: String,
    pub metadata: Value,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSecurityAlert {
    pub ticket_id: Uuid,
    pub event_id: Uuid,
    pub alert_type: String,
    pub severity: Severity,
    pub description: String,
    pub metadata: Value,
}

impl NewSecurityAlert {
    pub fn into_record(self, id: Uuid, created_at: DateTime<Utc>) -> SecurityAlert {
        SecurityAlert {
            id,
            ticket_id: self.ticket_id,
            event_id: self.event_id,
            alert_type: self.alert_type,
            severity: self.severity,
            description: self.description,
            metadata: self.metadata,
            status: AlertStatus::New,
            created_at,
        }
    }
}
