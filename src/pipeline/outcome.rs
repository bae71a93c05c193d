//! Per-file outcomes and batch summaries

use crate::error::ImportError;
use crate::models::{FileFormat, FileStatus, FlowFileDescriptor};
use crate::parsers::{ParseWarning, ParserKind};
use serde::Serialize;
use std::fmt;

/// What happened to one input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Imported,
    SkippedDuplicate,
    Error,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Imported => "imported",
            Outcome::SkippedDuplicate => "skipped (duplicate)",
            Outcome::Error => "error",
        };
        f.write_str(label)
    }
}

/// Result row for one file; every input yields exactly one
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    pub filename: String,
    pub outcome: Outcome,
    /// Descriptor created for this import, or the earlier one for duplicates
    pub flow_file_id: Option<u64>,
    pub detected_format: Option<FileFormat>,
    pub parser: Option<ParserKind>,
    pub records_processed: usize,
    pub meters_created: usize,
    pub readings_created: usize,
    /// Readings repeating an earlier reading key in the same file
    pub duplicates_in_file: usize,
    /// Readings whose key was already stored by an earlier file
    pub readings_already_present: usize,
    pub error_message: Option<String>,
    pub warnings: Vec<ParseWarning>,
}

impl FileOutcome {
    fn empty(filename: &str, outcome: Outcome) -> Self {
        Self {
            filename: filename.to_string(),
            outcome,
            flow_file_id: None,
            detected_format: None,
            parser: None,
            records_processed: 0,
            meters_created: 0,
            readings_created: 0,
            duplicates_in_file: 0,
            readings_already_present: 0,
            error_message: None,
            warnings: Vec::new(),
        }
    }

    /// Outcome for a file whose bytes were imported before
    pub fn skipped(filename: &str, existing: Option<&FlowFileDescriptor>) -> Self {
        let mut outcome = Self::empty(filename, Outcome::SkippedDuplicate);
        if let Some(existing) = existing {
            outcome.flow_file_id = Some(existing.id);
            outcome.detected_format = existing.detected_format;
        }
        outcome
    }

    /// Outcome for a file that failed before or during import
    pub fn failed(filename: &str, message: impl Into<String>) -> Self {
        let mut outcome = Self::empty(filename, Outcome::Error);
        outcome.error_message = Some(message.into());
        outcome
    }

    /// Outcome for a file left unread after the batch was cancelled
    pub fn cancelled(filename: &str) -> Self {
        Self::failed(filename, ImportError::cancelled("batch cancelled").to_string())
    }

    /// Outcome mirroring a descriptor's final state
    pub fn from_descriptor(descriptor: &FlowFileDescriptor) -> Self {
        let outcome = match descriptor.status {
            FileStatus::Imported => Outcome::Imported,
            FileStatus::Processing | FileStatus::Error => Outcome::Error,
        };
        let mut result = Self::empty(&descriptor.filename, outcome);
        result.flow_file_id = Some(descriptor.id);
        result.detected_format = descriptor.detected_format;
        result.records_processed = descriptor.record_count;
        result.error_message = descriptor.error_message.clone();
        result
    }

    pub fn is_error(&self) -> bool {
        self.outcome == Outcome::Error
    }
}

/// Counts across a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: &FileOutcome) {
        self.total += 1;
        match outcome.outcome {
            Outcome::Imported => self.successful += 1,
            Outcome::SkippedDuplicate => self.skipped += 1,
            Outcome::Error => self.errors += 1,
        }
    }

    /// Percentage of files imported, skipped duplicates excluded
    pub fn success_rate(&self) -> f64 {
        let attempted = self.total - self.skipped;
        if attempted == 0 {
            0.0
        } else {
            (self.successful as f64 / attempted as f64) * 100.0
        }
    }
}

/// Outcomes of a batch, in input order, with their summary
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
    pub summary: BatchSummary,
}

impl BatchReport {
    pub fn push(&mut self, outcome: FileOutcome) {
        self.summary.record(&outcome);
        self.outcomes.push(outcome);
    }

    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }
}
