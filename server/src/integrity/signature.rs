//! Keyed ticket signatures.
//!
//! A signature is HMAC-SHA256 over the canonical payload
//! `[ticketId, eventId, userId, qrCode, createdAt, signatureVersion]`,
//! encoded as a compact JSON array. Array position fixes the field order, so the
//! bytes are identical for every implementation that follows the same layout.
//! `createdAt` is RFC 3339 UTC with millisecond precision and a `Z` suffix.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use crate::integrity::constant_time_eq;
use crate::models::Ticket;

type HmacSha256 = Hmac<Sha256>;

/// Shortest secret accepted for a signing key.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SigningError {
    #[error("signing secret for version {version} is {len} bytes; at least 32 required")]
    WeakSecret { version: i32, len: usize },

    #[error("signing key version {0} is configured more than once")]
    DuplicateVersion(i32),

    #[error("signing key version must be positive, got {0}")]
    InvalidVersion(i32),
}

/// Secret bytes for one key version. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey(<{} bytes redacted>)", self.0.len())
    }
}

/// Key material handed to [`SignatureEngine::new`].
///
/// `current_version`/`current_key` sign new tickets. Retired keys only verify
/// tickets that were stamped with their version.
#[derive(Debug, Clone)]
pub struct SigningConfig {
    pub current_version: i32,
    pub current_key: SigningKey,
    pub retired: Vec<(i32, SigningKey)>,
}

impl SigningConfig {
    pub fn new(current_version: i32, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            current_version,
            current_key: SigningKey::new(secret),
            retired: Vec::new(),
        }
    }

    pub fn with_retired(mut self, version: i32, secret: impl Into<Vec<u8>>) -> Self {
        self.retired.push((version, SigningKey::new(secret)));
        self
    }
}

/// Fields covered by a ticket signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePayload {
    pub ticket_id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub qr_code: String,
    pub created_at: DateTime<Utc>,
    pub signature_version: i32,
}

impl SignaturePayload {
    /// Payload for verifying a stored ticket under the version it was stamped with.
    pub fn from_ticket(ticket: &Ticket) -> Self {
        Self::with_version(ticket, ticket.signature_version)
    }

    pub fn with_version(ticket: &Ticket, signature_version: i32) -> Self {
        Self {
            ticket_id: ticket.id,
            event_id: ticket.event_id,
            user_id: ticket.user_id,
            qr_code: ticket.qr_code.clone(),
            created_at: ticket.created_at,
            signature_version,
        }
    }

    /// Canonical bytes fed to the MAC.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        #[derive(Serialize)]
        struct Canonical<'a>(String, String, String, &'a str, String, i32);

        let canonical = Canonical(
            self.ticket_id.hyphenated().to_string(),
            self.event_id.hyphenated().to_string(),
            self.user_id.hyphenated().to_string(),
            &self.qr_code,
            self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.signature_version,
        );

        // A tuple struct of strings and an integer cannot fail to serialize.
        serde_json::to_vec(&canonical).unwrap_or_default()
    }
}

/// Signs and verifies ticket payloads with versioned HMAC keys.
#[derive(Clone)]
pub struct SignatureEngine {
    current_version: i32,
    keys: BTreeMap<i32, HmacSha256>,
}

impl fmt::Debug for SignatureEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureEngine")
            .field("current_version", &self.current_version)
            .field("versions", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SignatureEngine {
    pub fn new(config: &SigningConfig) -> Result<Self, SigningError> {
        let mut keys = BTreeMap::new();
        let all = std::iter::once((config.current_version, &config.current_key))
            .chain(config.retired.iter().map(|(v, k)| (*v, k)));

        for (version, key) in all {
            if version <= 0 {
                return Err(SigningError::InvalidVersion(version));
            }
            if key.as_bytes().len() < MIN_SECRET_LEN {
                return Err(SigningError::WeakSecret {
                    version,
                    len: key.as_bytes().len(),
                });
            }
            // HMAC accepts keys of any length, so this only fails on misuse of the API.
            let mac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes()).map_err(|_| {
                SigningError::WeakSecret {
                    version,
                    len: key.as_bytes().len(),
                }
            })?;
            if keys.insert(version, mac).is_some() {
                return Err(SigningError::DuplicateVersion(version));
            }
        }

        Ok(Self {
            current_version: config.current_version,
            keys,
        })
    }

    pub fn current_version(&self) -> i32 {
        self.current_version
    }

    /// Hex HMAC of the payload under the key for `payload.signature_version`.
    ///
    /// Returns `None` when no key is configured for that version.
    pub fn sign(&self, payload: &SignaturePayload) -> Option<String> {
        let mut mac = self.keys.get(&payload.signature_version)?.clone();
        mac.update(&payload.canonical_bytes());
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    /// Signs a ticket under the current key version.
    pub fn sign_ticket(&self, ticket: &Ticket) -> (String, i32) {
        let payload = SignaturePayload::with_version(ticket, self.current_version);
        // The current version is always present in the key map.
        let signature = self.sign(&payload).unwrap_or_default();
        (signature, self.current_version)
    }

    pub fn verify(&self, payload: &SignaturePayload, signature: &str) -> bool {
        match self.sign(payload) {
            Some(expected) => constant_time_eq(expected.as_bytes(), signature.as_bytes()),
            None => false,
        }
    }
}
