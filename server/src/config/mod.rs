use std::env;
use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;

use crate::integrity::{DetectionConfig, SigningConfig};
use crate::services::AdmissionMode;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::with_security_headers;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub allowed_origins: Vec<String>,
    /// Production deployments sit behind HTTPS and get HSTS.
    pub production: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub signing: SigningConfig,
    pub detection: DetectionConfig,
    pub admission: AdmissionMode,
    pub http: HttpConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key/value source; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let database_max_connections = parse_or(
            "DATABASE_MAX_CONNECTIONS",
            var("DATABASE_MAX_CONNECTIONS"),
            DEFAULT_MAX_CONNECTIONS,
        )?;
        let bind_addr = parse_or(
            "BIND_ADDR",
            var("BIND_ADDR"),
            SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        )?;

        let secret =
            var("TICKET_SIGNING_SECRET").ok_or(ConfigError::Missing("TICKET_SIGNING_SECRET"))?;
        let version = parse_or("TICKET_SIGNATURE_VERSION", var("TICKET_SIGNATURE_VERSION"), 1)?;
        let mut signing = SigningConfig::new(version, secret.into_bytes());
        if let Some(retired) = var("TICKET_SIGNING_RETIRED_KEYS") {
            for (retired_version, retired_secret) in parse_retired_keys(&retired)? {
                signing = signing.with_retired(retired_version, retired_secret.into_bytes());
            }
        }

        let defaults = DetectionConfig::default();
        let rapid_secs: i64 = parse_or(
            "SCAN_RAPID_WINDOW_SECS",
            var("SCAN_RAPID_WINDOW_SECS"),
            defaults.rapid_scan_window.num_seconds(),
        )?;
        let rapid_scan_window = Duration::try_seconds(rapid_secs)
            .filter(|_| rapid_secs > 0)
            .ok_or_else(|| {
                invalid("SCAN_RAPID_WINDOW_SECS", "must be a positive number of seconds")
            })?;

        let excessive_scan_threshold: i32 = parse_or(
            "SCAN_EXCESSIVE_THRESHOLD",
            var("SCAN_EXCESSIVE_THRESHOLD"),
            defaults.excessive_scan_threshold,
        )?;
        if excessive_scan_threshold < 0 {
            return Err(invalid("SCAN_EXCESSIVE_THRESHOLD", "must not be negative"));
        }

        let location_delta_degrees: f64 = parse_or(
            "SCAN_LOCATION_DELTA_DEGREES",
            var("SCAN_LOCATION_DELTA_DEGREES"),
            defaults.location_delta_degrees,
        )?;
        if !location_delta_degrees.is_finite() || location_delta_degrees < 0.0 {
            return Err(invalid(
                "SCAN_LOCATION_DELTA_DEGREES",
                "must be a finite, non-negative number of degrees",
            ));
        }

        let history_limit: i64 =
            parse_or("SCAN_HISTORY_LIMIT", var("SCAN_HISTORY_LIMIT"), defaults.history_limit)?;
        if history_limit <= 0 {
            return Err(invalid("SCAN_HISTORY_LIMIT", "must be positive"));
        }

        let detection = DetectionConfig {
            rapid_scan_window,
            excessive_scan_threshold,
            location_delta_degrees,
            history_limit,
        };

        let admission = match var("SCAN_ADMISSION_MODE") {
            Some(raw) => raw.parse::<AdmissionMode>().map_err(|reason| ConfigError::Invalid {
                var: "SCAN_ADMISSION_MODE",
                reason,
            })?,
            None => AdmissionMode::default(),
        };

        let allowed_origins = var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
        let production = var("RUST_ENV")
            .map(|v| v.to_lowercase() == "production")
            .unwrap_or(false);

        Ok(Self {
            database_url,
            database_max_connections,
            bind_addr,
            signing,
            detection,
            admission,
            http: HttpConfig {
                allowed_origins,
                production,
            },
        })
    }
}

fn invalid(var: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.to_string(),
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parses `version:secret,version:secret`.
fn parse_retired_keys(raw: &str) -> Result<Vec<(i32, String)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (version, secret) = entry.split_once(':').ok_or_else(|| ConfigError::Invalid {
                var: "TICKET_SIGNING_RETIRED_KEYS",
                reason: "expected version:secret".to_string(),
            })?;
            let version = version.trim().parse::<i32>().map_err(|e| ConfigError::Invalid {
                var: "TICKET_SIGNING_RETIRED_KEYS",
                reason: e.to_string(),
            })?;
            Ok((version, secret.to_string()))
        })
        .collect()
}
