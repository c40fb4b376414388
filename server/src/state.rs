use std::sync::Arc;

use crate::integrity::{
    ContentIntegrityChecker, DetectionConfig, SignatureEngine, SigningConfig, SigningError,
    SuspiciousScanDetector, TicketValidator,
};
use crate::services::{AdmissionMode, ScanService, TicketSigner};
use crate::store::TicketStore;

/// Shared handles for the HTTP handlers. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub scans: Arc<ScanService>,
    pub signer: Arc<TicketSigner>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn TicketStore>,
        signing: &SigningConfig,
        detection: DetectionConfig,
        admission: AdmissionMode,
    ) -> Result<Self, SigningError> {
        let validator = TicketValidator::new(
            SignatureEngine::new(signing)?,
            ContentIntegrityChecker::new(),
        );

        let scans = ScanService::new(
            store.clone(),
            validator.clone(),
            SuspiciousScanDetector::new(detection),
            admission,
        );
        let signer = TicketSigner::new(store, validator);

        Ok(Self {
            scans: Arc::new(scans),
            signer: Arc::new(signer),
        })
    }
}
