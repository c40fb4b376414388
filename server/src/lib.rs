//! Ticket integrity and scan-time fraud detection for the event ticketing API.
//!
//! Tickets carry an HMAC signature and a content hash. Gate scans are checked
//! against both, scored for cloned-code patterns, and recorded on an
//! append-only scan ledger with security alerts for high-severity scans.

pub mod config;
pub mod handlers;
pub mod integrity;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;
