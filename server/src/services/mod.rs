pub mod scan;
pub mod signer;

pub use scan::{AdmissionMode, ScanOrigin, ScanOutcome, ScanService, ValidateScanRequest};
pub use signer::TicketSigner;

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
