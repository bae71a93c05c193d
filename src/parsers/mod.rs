//! Parsers turning raw file bytes into `ParsedRecord`s.
//!
//! ## Architecture
//!
//! - [`d0010`] - strict (ZHD/029) and lenient (ZHV/030) UFF state machines
//! - [`csv`], [`json`], [`xml`], [`text`] - tabular parsers sharing [`tabular`]
//! - [`pdf`] - container text extraction with re-dispatch into the above
//! - [`fields`] - field-level parsing helpers
//!
//! Every parser follows the same policy: problems with a single line, row or
//! element become [`ParseWarning`]s and the line is skipped; only problems
//! with the file as a whole are returned as errors.

pub mod csv;
pub mod d0010;
pub mod fields;
pub mod json;
pub mod pdf;
pub mod tabular;
pub mod text;
pub mod xml;

#[cfg(test)]
pub mod tests;

use crate::constants::{UFF_SIGNATURES, UTF8_BOM, uff_fallback};
use crate::error::Result;
use crate::models::{FileFormat, FileHeader, ParsedRecord};
use chrono::NaiveDate;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use tracing::warn;

pub use self::csv::CsvParser;
pub use self::d0010::{D0010FallbackParser, D0010StandardParser};
pub use self::json::JsonParser;
pub use self::pdf::ContainerExtractor;
pub use self::text::TextParser;
pub use self::xml::XmlParser;

/// Per-file settings handed to every parser
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub filename: &'a str,
    /// Date applied to readings without one
    pub processing_date: NaiveDate,
    /// Register id applied to readings without one
    pub default_register_id: &'a str,
}

/// Category of a non-fatal parsing problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WarningKind {
    UnknownRecord,
    OrphanRecord,
    MissingField,
    InvalidField,
    InvalidHeader,
    RecordCountMismatch,
    MissingTrailer,
    TrailingContent,
    /// Filename imported before with different content
    ReusedFilename,
}

/// A skipped line, row or element, or a structural oddity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    /// 1-based line/row/element, 0 for file-level warnings
    pub line: usize,
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{:?}: {}", self.kind, self.message)
        } else {
            write!(f, "line {}: {:?}: {}", self.line, self.kind, self.message)
        }
    }
}

/// Accumulates warnings for one file and logs each as it is raised
#[derive(Debug)]
pub struct WarningLog<'a> {
    filename: &'a str,
    warnings: Vec<ParseWarning>,
}

impl<'a> WarningLog<'a> {
    pub fn new(filename: &'a str) -> Self {
        Self {
            filename,
            warnings: Vec::new(),
        }
    }

    pub fn push(&mut self, line: usize, kind: WarningKind, message: impl Into<String>) {
        let message = message.into();
        warn!("{}:{}: {}", self.filename, line, message);
        self.warnings.push(ParseWarning {
            line,
            kind,
            message,
        });
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_inner(self) -> Vec<ParseWarning> {
        self.warnings
    }
}

/// Concrete parser that produced a `ParseOutput`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ParserKind {
    UffStrict,
    UffFallback,
    Csv,
    Json,
    Xml,
    Txt,
    Pdf,
}

impl ParserKind {
    /// Select the parser for a detected format.
    ///
    /// UFF flows are routed by their header token: `ZHV` selects the lenient
    /// parser, anything else the strict one (which rejects a missing `ZHD`).
    pub fn select(format: FileFormat, head: &[u8]) -> Self {
        match format {
            FileFormat::Uff => match uff_header_token(head) {
                Some(uff_fallback::HEADER) => ParserKind::UffFallback,
                _ => ParserKind::UffStrict,
            },
            FileFormat::Pdf => ParserKind::Pdf,
            FileFormat::Csv => ParserKind::Csv,
            FileFormat::Json => ParserKind::Json,
            FileFormat::Xml => ParserKind::Xml,
            FileFormat::Txt => ParserKind::Txt,
        }
    }

    /// Run the selected parser over the whole input
    pub fn parse(self, input: &[u8], ctx: &ParseContext<'_>) -> Result<ParseOutput> {
        match self {
            ParserKind::UffStrict => D0010StandardParser.parse(input, ctx),
            ParserKind::UffFallback => D0010FallbackParser.parse(input, ctx),
            ParserKind::Csv => CsvParser.parse(input, ctx),
            ParserKind::Json => JsonParser.parse(input, ctx),
            ParserKind::Xml => XmlParser.parse(input, ctx),
            ParserKind::Txt => TextParser.parse(input, ctx),
            ParserKind::Pdf => ContainerExtractor.parse(input, ctx),
        }
    }
}

/// Records, warnings and header data extracted from one file
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub records: Vec<ParsedRecord>,
    pub warnings: Vec<ParseWarning>,
    /// Present for UFF flows (including those found inside containers)
    pub header: Option<FileHeader>,
    pub parser: ParserKind,
}

impl ParseOutput {
    pub fn new(parser: ParserKind, records: Vec<ParsedRecord>, warnings: Vec<ParseWarning>) -> Self {
        Self {
            records,
            warnings,
            header: None,
            parser,
        }
    }

    pub fn with_header(mut self, header: FileHeader) -> Self {
        self.header = Some(header);
        self
    }
}

/// Common interface of every format parser
pub trait RecordParser {
    fn kind(&self) -> ParserKind;

    fn parse(&self, input: &[u8], ctx: &ParseContext<'_>) -> Result<ParseOutput>;
}

/// Iterate over `(line_number, line)` pairs without buffering the file as text.
///
/// Lines are decoded lossily one at a time; a leading BOM and trailing `\r`
/// are removed.
pub fn numbered_lines(input: &[u8]) -> impl Iterator<Item = (usize, Cow<'_, str>)> {
    let input = input.strip_prefix(UTF8_BOM).unwrap_or(input);
    input
        .split(|byte| *byte == b'\n')
        .enumerate()
        .map(|(index, raw)| {
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            (index + 1, String::from_utf8_lossy(raw))
        })
}

/// Token of the first non-blank line when it is a UFF header signature
pub fn uff_header_token(input: &[u8]) -> Option<&'static str> {
    let (_, line) = numbered_lines(input).find(|(_, line)| !line.trim().is_empty())?;
    let line = line.trim_start();
    UFF_SIGNATURES
        .iter()
        .copied()
        .find(|sig| line.starts_with(sig))
        .map(|sig| sig.trim_end_matches('|'))
}
