//! Configuration for import runs.
//!
//! Holds the parsing defaults (sniff window, default register, processing
//! date) and run-level settings used by the binary. Library callers can use
//! `ImportConfig::default()` and refine with the builder methods.

use crate::constants::{DEFAULT_REGISTER_ID, DEFAULT_SNIFF_BYTES, STATE_DIR_NAME, STATE_FILE_NAME};
use crate::parsers::ParseContext;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Global configuration for an import run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Number of leading bytes handed to the format detector
    pub sniff_bytes: usize,

    /// Register id given to readings whose source has none
    pub default_register_id: String,

    /// Date used for readings without one (defaults to today)
    pub processing_date: Option<NaiveDate>,

    /// Location of the store snapshot (None = in-memory only)
    pub state_path: Option<PathBuf>,

    /// Show a progress bar while importing a batch
    pub show_progress: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            sniff_bytes: DEFAULT_SNIFF_BYTES,
            default_register_id: DEFAULT_REGISTER_ID.to_string(),
            processing_date: None,
            state_path: None,
            show_progress: true,
        }
    }
}

impl ImportConfig {
    pub fn with_sniff_bytes(mut self, sniff_bytes: usize) -> Self {
        self.sniff_bytes = sniff_bytes.max(1);
        self
    }

    pub fn with_default_register_id(mut self, register_id: impl Into<String>) -> Self {
        self.default_register_id = register_id.into();
        self
    }

    pub fn with_processing_date(mut self, date: NaiveDate) -> Self {
        self.processing_date = Some(date);
        self
    }

    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Date applied to readings that carry none
    pub fn effective_processing_date(&self) -> NaiveDate {
        self.processing_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    /// Default snapshot location: `<data_dir>/meter-import/state.json`
    pub fn default_state_path() -> Option<PathBuf> {
        let path = dirs::data_dir().map(|dir| dir.join(STATE_DIR_NAME).join(STATE_FILE_NAME));
        debug!("Default state path: {:?}", path);
        path
    }

    /// Build the per-file context handed to parsers
    pub fn parse_context<'a>(&'a self, filename: &'a str) -> ParseContext<'a> {
        ParseContext {
            filename,
            processing_date: self.effective_processing_date(),
            default_register_id: &self.default_register_id,
        }
    }
}
