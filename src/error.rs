//! Error handling for meter reading imports.
//!
//! File-level failures (missing UFF header, unreadable containers, broken
//! documents, storage faults) are `ImportError`s. Row-level problems never
//! surface here; parsers report them as warnings and carry on.

use crate::models::FileFormat;
use bigdecimal::BigDecimal;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Missing UFF header in {filename}: expected {expected} as first record, found '{found}'")]
    MissingHeader {
        filename: String,
        expected: &'static str,
        found: String,
    },

    #[error("No readable text could be extracted from container: {filename}")]
    UnreadableContainer { filename: String },

    #[error("Invalid {format} document {filename}: {reason}")]
    InvalidDocument {
        filename: String,
        format: FileFormat,
        reason: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Import cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    /// Create a missing-header error for a UFF flow
    pub fn missing_header(
        filename: impl Into<String>,
        expected: &'static str,
        found: impl Into<String>,
    ) -> Self {
        Self::MissingHeader {
            filename: filename.into(),
            expected,
            found: found.into(),
        }
    }

    /// Create an unreadable container error
    pub fn unreadable_container(filename: impl Into<String>) -> Self {
        Self::UnreadableContainer {
            filename: filename.into(),
        }
    }

    /// Create an invalid document error for JSON/XML inputs
    pub fn invalid_document(
        filename: impl Into<String>,
        format: FileFormat,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidDocument {
            filename: filename.into(),
            format,
            reason: reason.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }
}

/// Failures raised by a storage collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Unique constraint '{constraint}' violated for key {key}")]
    UniqueViolation {
        constraint: &'static str,
        key: String,
    },

    #[error("Flow file {id} not found")]
    FlowFileNotFound { id: u64 },

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Write rejected: {reason}")]
    WriteRejected { reason: String },

    #[error("Snapshot error for {path}: {reason}")]
    Snapshot { path: PathBuf, reason: String },
}

impl StoreError {
    pub fn unique_violation(constraint: &'static str, key: impl Into<String>) -> Self {
        Self::UniqueViolation {
            constraint,
            key: key.into(),
        }
    }

    pub fn write_rejected(reason: impl Into<String>) -> Self {
        Self::WriteRejected {
            reason: reason.into(),
        }
    }

    pub fn snapshot(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Snapshot {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True when the error is a uniqueness race rather than a real fault
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }
}

/// Reasons a candidate reading cannot become a `ParsedRecord`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("MPAN is empty")]
    EmptyMpan,

    #[error("Meter serial is empty")]
    EmptySerial,

    #[error("Reading value {0} is negative")]
    NegativeValue(BigDecimal),
}

pub type Result<T> = std::result::Result<T, ImportError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
