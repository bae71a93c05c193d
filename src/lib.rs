//! Meter Import Library
//!
//! Imports UK electricity and gas meter readings into a persistent store.
//!
//! This library provides tools for:
//! - Detecting the format of an incoming file from its name and first bytes
//! - Parsing D0010/UFF flows (strict `ZHD` and lenient `ZHV` layouts)
//! - Parsing CSV, JSON, XML and plain-text reading exports
//! - Extracting embedded flows or reading lines from PDF containers
//! - Skipping byte-identical files with a SHA-256 checksum gate
//! - Persisting each file's meters and readings in a single unit of work

pub mod config;
pub mod constants;
pub mod detect;
pub mod error;
pub mod models;
pub mod parsers;
pub mod pipeline;
pub mod store;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
    pub mod input;
}

// Re-export commonly used types
pub use config::ImportConfig;
pub use detect::detect_format;
pub use error::{ImportError, Result, StoreError};
pub use models::{FileFormat, FlowFileDescriptor, ParsedRecord, ReadingType};
pub use parsers::{ParseOutput, ParseWarning, ParserKind, WarningKind};
pub use pipeline::{BatchReport, FileOutcome, ImportPipeline, Outcome};
pub use store::{InMemoryStore, MeterStore};
