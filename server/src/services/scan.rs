//! The validate-scan use case.
//!
//! Resolves the scanned code, runs the validity and suspicion checks, writes the
//! ticket's new state, appends to the scan ledger and raises alerts.
//!
//! Lookup failures (`not_found`, `invalid_event`) stop early. Once a ticket is
//! resolved every check runs and every outcome is written to the ledger.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::integrity::{
    ScanContext, SuspicionVerdict, SuspiciousScanDetector, TicketValidator, ValidationError,
    ValidationOutcome,
};
use crate::models::{
    GeoPoint, NewScanAttempt, NewSecurityAlert, ScanAttempt, ScanResult, ScanStamp,
    SecurityAlert, Ticket, TicketContext, TicketUpdate,
};
use crate::services::ServiceError;
use crate::store::TicketStore;

/// How the `unused → used` transition is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdmissionMode {
    /// Conditional update in the store; of two racing scans only one admits.
    #[default]
    Atomic,
    /// Read status, decide, then write. Two racing scans of an unused ticket can
    /// both be admitted.
    ReadThenWrite,
}

impl FromStr for AdmissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "atomic" => Ok(AdmissionMode::Atomic),
            "read_then_write" => Ok(AdmissionMode::ReadThenWrite),
            other => Err(format!("unknown admission mode '{other}'")),
        }
    }
}

/// Column widths of `tickets.qr_code` and `scan_attempts.device_id`.
const MAX_QR_CODE_LEN: usize = 255;
const MAX_DEVICE_ID_LEN: usize = 255;
const MAX_DEVICE_INFO_LEN: usize = 4096;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateScanRequest {
    #[serde(default)]
    pub qr_code: String,
    pub event_id: Option<Uuid>,
    #[serde(default)]
    pub device_id: String,
    pub device_info: Option<Value>,
    pub location: Option<GeoPoint>,
}

impl ValidateScanRequest {
    /// `qr_code` is looked up exactly as sent; only `device_id` is trimmed.
    fn normalized(mut self) -> Result<Self, ServiceError> {
        self.device_id = self.device_id.trim().to_string();

        if self.qr_code.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("qrCode is required".to_string()));
        }
        if self.qr_code.len() > MAX_QR_CODE_LEN {
            return Err(ServiceError::InvalidRequest(format!(
                "qrCode must be at most {MAX_QR_CODE_LEN} bytes"
            )));
        }
        if self.device_id.is_empty() {
            return Err(ServiceError::InvalidRequest("deviceId is required".to_string()));
        }
        if self.device_id.len() > MAX_DEVICE_ID_LEN {
            return Err(ServiceError::InvalidRequest(format!(
                "deviceId must be at most {MAX_DEVICE_ID_LEN} bytes"
            )));
        }
        if let Some(info) = &self.device_info {
            if info.to_string().len() > MAX_DEVICE_INFO_LEN {
                return Err(ServiceError::InvalidRequest(format!(
                    "deviceInfo must be at most {MAX_DEVICE_INFO_LEN} bytes of JSON"
                )));
            }
        }
        if let Some(location) = self.location {
            let in_range = location.lat.is_finite()
                && location.lng.is_finite()
                && (-90.0..=90.0).contains(&location.lat)
                && (-180.0..=180.0).contains(&location.lng);
            if !in_range {
                return Err(ServiceError::InvalidRequest(
                    "location is out of range".to_string(),
                ));
            }
        }
        Ok(self)
    }
}

/// Who scanned, as established by the authentication layer.
#[derive(Debug, Clone)]
pub struct ScanOrigin {
    pub scanned_by: Uuid,
    pub ip_address: Option<String>,
}

/// Result of one validate-scan call, serialized as the scanner wire contract.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    pub valid: bool,
    pub result: ScanResult,
    pub ticket: Option<Ticket>,
    #[serde(flatten)]
    pub context: TicketContext,
    pub errors: Vec<ValidationError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspicion: Option<SuspicionVerdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip)]
    pub scan: Option<ScanAttempt>,
    #[serde(skip)]
    pub alert: Option<SecurityAlert>,
}

impl ScanOutcome {
    fn rejected(result: ScanResult, message: &str) -> Self {
        Self {
            valid: false,
            result,
            ticket: None,
            context: TicketContext::default(),
            errors: Vec::new(),
            suspicion: None,
            error: Some(message.to_string()),
            warning: None,
            scan: None,
            alert: None,
        }
    }

    /// Body returned when the store fails mid-scan.
    pub fn internal_error() -> Self {
        Self::rejected(ScanResult::Error, "Internal error while validating ticket")
    }
}

/// Single outcome tag for a resolved ticket, highest priority first.
pub fn classify(validation: &ValidationOutcome, suspicion: &SuspicionVerdict) -> ScanResult {
    if validation.is_tampered() {
        ScanResult::InvalidSignature
    } else if validation.has(ValidationError::AlreadyUsed) {
        ScanResult::AlreadyUsed
    } else if validation.has(ValidationError::Cancelled) {
        ScanResult::Cancelled
    } else if suspicion.is_high() {
        ScanResult::Suspicious
    } else {
        ScanResult::Valid
    }
}

fn rejection_message(result: ScanResult, validation: &ValidationOutcome) -> Option<&'static str> {
    match result {
        ScanResult::Valid => None,
        ScanResult::InvalidSignature if validation.has(ValidationError::InvalidSignature) => {
            Some("Invalid ticket signature - possible forgery")
        }
        ScanResult::InvalidSignature => Some("Ticket data has been modified"),
        ScanResult::AlreadyUsed => Some("Ticket has already been used"),
        ScanResult::Cancelled => Some("Ticket has been cancelled"),
        ScanResult::Suspicious => Some("Suspicious scan activity - ticket held for review"),
        ScanResult::NotFound => Some("Ticket not found"),
        ScanResult::InvalidEvent => Some("Ticket is not valid for this event"),
        ScanResult::Error => Some("Internal error while validating ticket"),
    }
}

pub struct ScanService {
    store: Arc<dyn TicketStore>,
    validator: TicketValidator,
    detector: SuspiciousScanDetector,
    admission: AdmissionMode,
}

impl ScanService {
    pub fn new(
        store: Arc<dyn TicketStore>,
        validator: TicketValidator,
        detector: SuspiciousScanDetector,
        admission: AdmissionMode,
    ) -> Self {
        Self {
            store,
            validator,
            detector,
            admission,
        }
    }

    pub async fn validate_scan(
        &self,
        origin: &ScanOrigin,
        request: ValidateScanRequest,
    ) -> Result<ScanOutcome, ServiceError> {
        let request = request.normalized()?;

        let Some(ticket) = self.store.get_ticket_by_code(&request.qr_code).await? else {
            let scan = self
                .append_scan(origin, &request, None, request.event_id, ScanResult::NotFound, None)
                .await?;
            info!(scanned_by = %origin.scanned_by, "Scan rejected: unknown code");
            let mut outcome = ScanOutcome::rejected(ScanResult::NotFound, "Ticket not found");
            outcome.scan = Some(scan);
            return Ok(outcome);
        };

        if let Some(expected_event) = request.event_id {
            if expected_event != ticket.event_id {
                let scan = self
                    .append_scan(
                        origin,
                        &request,
                        Some(ticket.id),
                        Some(expected_event),
                        ScanResult::InvalidEvent,
                        None,
                    )
                    .await?;
                info!(
                    ticket_id = %ticket.id,
                    expected_event = %expected_event,
                    actual_event = %ticket.event_id,
                    "Scan rejected: ticket belongs to another event"
                );
                let mut outcome = ScanOutcome::rejected(
                    ScanResult::InvalidEvent,
                    "Ticket is not valid for this event",
                );
                outcome.ticket = Some(ticket);
                outcome.scan = Some(scan);
                return Ok(outcome);
            }
        }

        let history = self
            .store
            .list_recent_scans(ticket.id, self.detector.config().history_limit)
            .await?;

        let scanned_at = Utc::now();
        let mut validation = self.validator.validate(&ticket);
        let suspicion = self.detector.assess(
            &ticket,
            ScanContext {
                device_id: &request.device_id,
                scanned_at,
            },
            &history,
        );
        let mut result = classify(&validation, &suspicion);

        if validation.is_tampered() {
            warn!(
                ticket_id = %ticket.id,
                errors = ?validation.errors,
                scanned_by = %origin.scanned_by,
                "Ticket failed integrity verification"
            );
        }

        let stamp = ScanStamp::new(&request.device_id, scanned_at);
        let updated = if result == ScanResult::Valid {
            match self.admission {
                AdmissionMode::Atomic => {
                    let admitted = self.store.admit_ticket(ticket.id, &stamp).await?;
                    match admitted {
                        Some(admitted) => admitted,
                        None => {
                            warn!(
                                ticket_id = %ticket.id,
                                "Concurrent scan admitted this ticket first"
                            );
                            validation.errors.push(ValidationError::AlreadyUsed);
                            validation.valid = false;
                            result = ScanResult::AlreadyUsed;
                            self.store
                                .update_ticket(ticket.id, TicketUpdate::stamp(stamp))
                                .await?
                        }
                    }
                }
                AdmissionMode::ReadThenWrite => {
                    self.store
                        .update_ticket(ticket.id, TicketUpdate::admit(stamp))
                        .await?
                }
            }
        } else {
            self.store
                .update_ticket(ticket.id, TicketUpdate::stamp(stamp))
                .await?
        };

        let scan = self
            .append_scan(
                origin,
                &request,
                Some(ticket.id),
                Some(ticket.event_id),
                result,
                Some(&suspicion),
            )
            .await?;

        let alert = if suspicion.is_high() {
            Some(self.raise_alert(origin, &request, &updated, &suspicion, &scan).await?)
        } else {
            None
        };

        info!(
            ticket_id = %ticket.id,
            result = %result,
            scan_count = updated.scan_count,
            suspicious = suspicion.suspicious,
            "Scan processed"
        );

        let context = self.store.load_ticket_context(&updated).await?;
        // Rejected scans already carry `error`; the warning is for admitted ones.
        let warning = suspicion
            .reason_list()
            .filter(|_| result == ScanResult::Valid)
            .map(|reasons| format!("Suspicious activity detected: {reasons}"));

        Ok(ScanOutcome {
            valid: result == ScanResult::Valid,
            result,
            ticket: Some(updated),
            context,
            errors: validation.errors.clone(),
            error: rejection_message(result, &validation).map(str::to_string),
            warning,
            suspicion: Some(suspicion),
            scan: Some(scan),
            alert,
        })
    }

    async fn append_scan(
        &self,
        origin: &ScanOrigin,
        request: &ValidateScanRequest,
        ticket_id: Option<Uuid>,
        event_id: Option<Uuid>,
        result: ScanResult,
        suspicion: Option<&SuspicionVerdict>,
    ) -> Result<ScanAttempt, ServiceError> {
        let scan = NewScanAttempt {
            ticket_id,
            event_id,
            scanned_by: origin.scanned_by,
            scan_result: result,
            device_id: Some(request.device_id.clone()),
            device_info: request.device_info.clone(),
            ip_address: origin.ip_address.clone(),
            location: request.location,
            is_suspicious: suspicion.is_some_and(|s| s.suspicious),
            suspicious_reason: suspicion.and_then(SuspicionVerdict::reason_list),
        };
        Ok(self.store.append_scan(scan).await?)
    }

    async fn raise_alert(
        &self,
        origin: &ScanOrigin,
        request: &ValidateScanRequest,
        ticket: &Ticket,
        suspicion: &SuspicionVerdict,
        scan: &ScanAttempt,
    ) -> Result<SecurityAlert, ServiceError> {
        let alert_type = suspicion
            .reasons
            .first()
            .map(|r| r.as_str().to_string())
            .unwrap_or_default();
        let reasons = suspicion.reason_list().unwrap_or_default();

        let alert = NewSecurityAlert {
            ticket_id: ticket.id,
            event_id: ticket.event_id,
            alert_type,
            severity: suspicion.severity,
            description: format!("Suspicious scan detected: {reasons}"),
            metadata: json!({
                "reasons": suspicion.reasons,
                "scan_id": scan.id,
                "scan_result": scan.scan_result,
                "scan_count": ticket.scan_count,
                "device_id": request.device_id,
                "scanned_by": origin.scanned_by,
                "ip_address": origin.ip_address,
                "location": request.location,
            }),
        };
        let record = self.store.append_security_alert(alert).await?;

        warn!(
            alert_id = %record.id,
            ticket_id = %ticket.id,
            alert_type = %record.alert_type,
            reasons = %reasons,
            "Security alert raised"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::SuspicionReason;
    use crate::models::Severity;

    fn validation(errors: Vec<ValidationError>) -> ValidationOutcome {
        ValidationOutcome {
            valid: errors.is_empty(),
            errors,
        }
    }

    fn suspicion(reasons: Vec<SuspicionReason>) -> SuspicionVerdict {
        let severity = match reasons.len() {
            0 => Severity::Low,
            1 => Severity::Medium,
            _ => Severity::High,
        };
        SuspicionVerdict {
            suspicious: !reasons.is_empty(),
            reasons,
            severity,
        }
    }

    fn request(qr_code: &str, device_id: &str) -> ValidateScanRequest {
        ValidateScanRequest {
            qr_code: qr_code.to_string(),
            event_id: None,
            device_id: device_id.to_string(),
            device_info: None,
            location: None,
        }
    }

    #[test]
    fn test_signature_outranks_terminal_status() {
        let v = validation(vec![ValidationError::InvalidSignature, ValidationError::AlreadyUsed]);
        assert_eq!(classify(&v, &suspicion(vec![])), ScanResult::InvalidSignature);
    }

    #[test]
    fn test_content_modified_maps_to_invalid_signature() {
        let v = validation(vec![ValidationError::ContentModified]);
        assert_eq!(classify(&v, &suspicion(vec![])), ScanResult::InvalidSignature);
        assert_eq!(
            rejection_message(ScanResult::InvalidSignature, &v),
            Some("Ticket data has been modified")
        );
    }

    #[test]
    fn test_terminal_status_outranks_suspicion() {
        let high = suspicion(vec![SuspicionReason::RapidScan, SuspicionReason::ExcessiveScans]);
        let v = validation(vec![ValidationError::Cancelled]);
        assert_eq!(classify(&v, &high), ScanResult::Cancelled);
    }

    #[test]
    fn test_high_suspicion_on_valid_ticket() {
        let high = suspicion(vec![SuspicionReason::RapidScan, SuspicionReason::DifferentDevice]);
        assert_eq!(classify(&validation(vec![]), &high), ScanResult::Suspicious);

        let medium = suspicion(vec![SuspicionReason::RapidScan]);
        assert_eq!(classify(&validation(vec![]), &medium), ScanResult::Valid);
    }

    #[test]
    fn test_request_requires_code_and_device() {
        assert!(matches!(
            request("   ", "gate").normalized(),
            Err(ServiceError::InvalidRequest(_))
        ));
        assert!(matches!(
            request("QR-1", "").normalized(),
            Err(ServiceError::InvalidRequest(_))
        ));

        let ok = request("QR-1", " gate ").normalized().unwrap();
        assert_eq!(ok.qr_code, "QR-1");
        assert_eq!(ok.device_id, "gate");
    }

    #[test]
    fn test_request_keeps_code_exactly_as_scanned() {
        let ok = request(" QR-1 ", "gate").normalized().unwrap();
        assert_eq!(ok.qr_code, " QR-1 ");
    }

    #[test]
    fn test_request_bounds_device_fields() {
        let long_device = "g".repeat(MAX_DEVICE_ID_LEN + 1);
        assert!(matches!(
            request("QR-1", &long_device).normalized(),
            Err(ServiceError::InvalidRequest(_))
        ));
        assert!(request("QR-1", &"g".repeat(MAX_DEVICE_ID_LEN)).normalized().is_ok());

        let mut r = request("QR-1", "gate");
        r.device_info = Some(json!({ "blob": "x".repeat(MAX_DEVICE_INFO_LEN) }));
        assert!(matches!(r.normalized(), Err(ServiceError::InvalidRequest(_))));

        let long_code = "Q".repeat(MAX_QR_CODE_LEN + 1);
        assert!(request(&long_code, "gate").normalized().is_err());
    }

    #[test]
    fn test_request_rejects_impossible_location() {
        let mut r = request("QR-1", "gate");
        r.location = Some(GeoPoint { lat: 91.0, lng: 0.0 });
        assert!(r.normalized().is_err());
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let r: ValidateScanRequest = serde_json::from_value(json!({
            "qrCode": "QR-9",
            "deviceId": "gate-3",
            "deviceInfo": {"model": "Zebra TC52"},
            "location": {"lat": 51.5, "lng": -0.12}
        }))
        .unwrap();
        assert_eq!(r.qr_code, "QR-9");
        assert_eq!(r.device_id, "gate-3");
        assert!(r.event_id.is_none());
        assert_eq!(r.location, Some(GeoPoint { lat: 51.5, lng: -0.12 }));
    }

    #[test]
    fn test_admission_mode_parsing() {
        assert_eq!("atomic".parse::<AdmissionMode>(), Ok(AdmissionMode::Atomic));
        assert_eq!(
            " READ_THEN_WRITE ".parse::<AdmissionMode>(),
            Ok(AdmissionMode::ReadThenWrite)
        );
        assert!("optimistic".parse::<AdmissionMode>().is_err());
    }

    #[test]
    fn test_rejected_outcome_wire_shape() {
        let body = serde_json::to_value(ScanOutcome::rejected(
            ScanResult::NotFound,
            "Ticket not found",
        ))
        .unwrap();
        assert_eq!(body["valid"], json!(false));
        assert_eq!(body["result"], json!("not_found"));
        assert_eq!(body["ticket"], Value::Null);
        assert_eq!(body["ticketType"], Value::Null);
        assert_eq!(body["error"], json!("Ticket not found"));
        assert!(body.get("warning").is_none());
    }
}
