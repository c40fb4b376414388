use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Outcome tag recorded on every scan and returned to the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "scan_result", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScanResult {
    Valid,
    NotFound,
    InvalidEvent,
    InvalidSignature,
    AlreadyUsed,
    Cancelled,
    Suspicious,
    Error,
}

impl ScanResult {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanResult::Valid => "valid",
            ScanResult::NotFound => "not_found",
            ScanResult::InvalidEvent => "invalid_event",
            ScanResult::InvalidSignature => "invalid_signature",
            ScanResult::AlreadyUsed => "already_used",
            ScanResult::Cancelled => "cancelled",
            ScanResult::Suspicious => "suspicious",
            ScanResult::Error => "error",
        }
    }
}

impl std::fmt::Display for ScanResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// One row of the append-only scan ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ScanAttempt {
    pub id: Uuid,
    pub ticket_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub scanned_by: Uuid,
    pub scan_result: ScanResult,
    pub device_id: Option<String>,
    pub device_info: Option<Value>,
    pub ip_address: Option<String>,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub is_suspicious: bool,
    pub suspicious_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ScanAttempt {
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.location_lat, self.location_lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        }
    }
}

/// Ledger entry as submitted by the scan service; the store assigns id and time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScanAttempt {
    pub ticket_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub scanned_by: Uuid,
    pub scan_result: ScanResult,
    pub device_id: Option<String>,
    pub device_info: Option<Value>,
    pub ip_address: Option<String>,
    pub location: Option<GeoPoint>,
    pub is_suspicious: bool,
    pub suspicious_reason: Option<String>,
}

impl NewScanAttempt {
    pub fn into_record(self, id: Uuid, created_at: DateTime<Utc>) -> ScanAttempt {
        ScanAttempt {
            id,
            ticket_id: self.ticket_id,
            event_id: self.event_id,
            scanned_by: self.scanned_by,
            scan_result: self.scan_result,
            device_id: self.device_id,
            device_info: self.device_info,
            ip_address: self.ip_address,
            location_lat: self.location.map(|p| p.lat),
            location_lng: self.location.map(|p| p.lng),
            is_suspicious: self.is_suspicious,
            suspicious_reason: self.suspicious_reason,
            created_at,
        }
    }
}
