//! Ticket integrity: keyed signatures, content hashes, validity verdicts and
//! scan-time fraud heuristics.

pub mod content_hash;
pub mod detector;
pub mod signature;
pub mod validator;

pub use content_hash::ContentIntegrityChecker;
pub use detector::{
    DetectionConfig, ScanContext, SuspicionReason, SuspicionVerdict, SuspiciousScanDetector,
};
pub use signature::{SignatureEngine, SignaturePayload, SigningConfig, SigningError, SigningKey};
pub use validator::{TicketValidator, ValidationError, ValidationOutcome};

use subtle::ConstantTimeEq;

/// Byte comparison whose running time does not depend on where the inputs differ.
///
/// Inputs of different lengths are padded with distinct fill bytes and compared
/// in full, so a length mismatch costs the same as a content mismatch.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let max_len = a.len().max(b.len());

    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a);
    b_padded[..b.len()].copy_from_slice(b);

    let lengths_equal = (a.len() as u64).ct_eq(&(b.len() as u64));
    let contents_equal = a_padded.ct_eq(&b_padded);

    (lengths_equal & contents_equal).into()
}
