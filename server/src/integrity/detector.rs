//! Heuristics that flag scans typical of cloned or shared QR codes.
//!
//! Every rule is evaluated on its own and the number of rules that fire sets the
//! severity. Only `High` scans raise a security alert.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{GeoPoint, ScanAttempt, Severity, Ticket};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspicionReason {
    RapidScan,
    DifferentDevice,
    ExcessiveScans,
    LocationMismatch,
}

impl SuspicionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SuspicionReason::RapidScan => "rapid_scan",
            SuspicionReason::DifferentDevice => "different_device",
            SuspicionReason::ExcessiveScans => "excessive_scans",
            SuspicionReason::LocationMismatch => "location_mismatch",
        }
    }
}

impl std::fmt::Display for SuspicionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspicionVerdict {
    pub suspicious: bool,
    pub reasons: Vec<SuspicionReason>,
    pub severity: Severity,
}

impl SuspicionVerdict {
    fn from_reasons(reasons: Vec<SuspicionReason>) -> Self {
        let severity = match reasons.len() {
            0 => Severity::Low,
            1 => Severity::Medium,
            _ => Severity::High,
        };
        Self {
            suspicious: !reasons.is_empty(),
            reasons,
            severity,
        }
    }

    pub fn is_high(&self) -> bool {
        self.severity == Severity::High
    }

    /// Comma-separated reason tags, as stored on the scan ledger.
    pub fn reason_list(&self) -> Option<String> {
        if self.reasons.is_empty() {
            return None;
        }
        let tags: Vec<&str> = self.reasons.iter().map(|r| r.as_str()).collect();
        Some(tags.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionConfig {
    /// Rescans closer together than this are `rapid_scan`.
    pub rapid_scan_window: Duration,
    /// `scan_count` at or above this is `excessive_scans`.
    pub excessive_scan_threshold: i32,
    /// Per-axis jump in degrees between consecutive scans. 0.01° is roughly 1 km
    /// of latitude; the check is a flat-plane proxy, not a great-circle distance.
    pub location_delta_degrees: f64,
    /// Ledger entries fetched for the location rule.
    pub history_limit: i64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            rapid_scan_window: Duration::seconds(5),
            excessive_scan_threshold: 3,
            location_delta_degrees: 0.01,
            history_limit: 10,
        }
    }
}

/// The scan currently being evaluated.
#[derive(Debug, Clone, Copy)]
pub struct ScanContext<'a> {
    pub device_id: &'a str,
    pub scanned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SuspiciousScanDetector {
    config: DetectionConfig,
}

impl SuspiciousScanDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// `history` is most-recent-first and holds this ticket's prior scans.
    pub fn assess(
        &self,
        ticket: &Ticket,
        scan: ScanContext<'_>,
        history: &[ScanAttempt],
    ) -> SuspicionVerdict {
        let mut reasons = Vec::new();

        if let Some(last) = ticket.last_scanned_at {
            // A last scan stamped in the future also counts as rapid.
            if scan.scanned_at.signed_duration_since(last) < self.config.rapid_scan_window {
                reasons.push(SuspicionReason::RapidScan);
            }
        }

        if let Some(last_device) = &ticket.last_scan_device_id {
            if last_device != scan.device_id && ticket.scan_count > 0 {
                reasons.push(SuspicionReason::DifferentDevice);
            }
        }

        if ticket.scan_count >= self.config.excessive_scan_threshold {
            reasons.push(SuspicionReason::ExcessiveScans);
        }

        if self.has_location_jump(history) {
            reasons.push(SuspicionReason::LocationMismatch);
        }

        SuspicionVerdict::from_reasons(reasons)
    }

    fn has_location_jump(&self, history: &[ScanAttempt]) -> bool {
        let limit = usize::try_from(self.config.history_limit).unwrap_or(usize::MAX);
        let points: Vec<GeoPoint> = history
            .iter()
            .take(limit)
            .filter_map(ScanAttempt::location)
            .collect();

        points.windows(2).any(|pair| {
            (pair[0].lat - pair[1].lat).abs() > self.config.location_delta_degrees
                || (pair[0].lng - pair[1].lng).abs() > self.config.location_delta_degrees
        })
    }
}
