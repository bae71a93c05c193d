//! Content fingerprinting and the duplicate-file gate

use crate::error::StoreResult;
use crate::models::{FileStatus, FlowFileDescriptor};
use crate::store::MeterStore;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Lowercase hex SHA-256 of the full file contents
pub fn compute_checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Whether a file may be imported
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Proceed { checksum: String },
    /// An earlier import of identical bytes failed; its descriptor is reused
    Retry(Box<FlowFileDescriptor>),
    /// Identical bytes were already imported or are being imported
    SkipDuplicate(Box<FlowFileDescriptor>),
}

/// Rejects byte-identical files before any parsing happens
pub struct ChecksumGate<'s> {
    store: &'s dyn MeterStore,
}

impl<'s> ChecksumGate<'s> {
    pub fn new(store: &'s dyn MeterStore) -> Self {
        Self { store }
    }

    pub fn check(&self, bytes: &[u8]) -> StoreResult<GateDecision> {
        let checksum = compute_checksum(bytes);
        match self.store.find_flow_file_by_checksum(&checksum)? {
            Some(existing) if existing.status == FileStatus::Error => {
                debug!(
                    "Checksum {} belongs to failed flow file {} ({}), retrying",
                    checksum, existing.id, existing.filename
                );
                Ok(GateDecision::Retry(Box::new(existing)))
            }
            Some(existing) => {
                debug!(
                    "Checksum {} already recorded for flow file {} ({})",
                    checksum, existing.id, existing.filename
                );
                Ok(GateDecision::SkipDuplicate(Box::new(existing)))
            }
            None => Ok(GateDecision::Proceed { checksum }),
        }
    }
}
