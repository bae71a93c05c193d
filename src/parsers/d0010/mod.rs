//! D0010 / UFF flow parsers
//!
//! Two state machines share the record shape of the industry flow:
//! - [`standard`] - the canonical `ZHD`/`026`/`028`/`029`/`ZTR` layout
//! - [`fallback`] - the commonly seen `ZHV`/`026`/`028`/`030`/`ZPT` variant
//!
//! Both scan the input line by line, keep the open meter point and register
//! in parser-local state, and emit one `ParsedRecord` per reading line that
//! has a valid parent.

pub mod fallback;
pub mod standard;

pub use fallback::D0010FallbackParser;
pub use standard::D0010StandardParser;

use super::fields::{field, parse_uff_datetime};
use super::{WarningKind, WarningLog, numbered_lines};
use crate::error::{ImportError, Result};
use crate::models::{FileHeader, MeasurementClass};
use tracing::{debug, info};

/// Meter point opened by a `026` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterPointContext {
    pub mpan: String,
    pub measurement_class: MeasurementClass,
}

/// Parse the shared ZHD/ZHV header layout:
/// `token|flow_ref|version|sender|receiver|CCYYMMDD|HHMMSS|app_ref`
pub(crate) fn parse_header(fields: &[&str], line: usize, warnings: &mut WarningLog<'_>) -> FileHeader {
    let owned = |index: usize| field(fields, index).map(str::to_string);

    let creation_timestamp = match field(fields, 5) {
        Some(date) => match parse_uff_datetime(date, field(fields, 6)) {
            Ok(timestamp) => Some(timestamp),
            Err(reason) => {
                warnings.push(
                    line,
                    WarningKind::InvalidHeader,
                    format!("Unparseable creation timestamp: {}", reason),
                );
                None
            }
        },
        None => None,
    };

    let header = FileHeader {
        flow_reference: owned(1),
        version: owned(2),
        sender: owned(3),
        receiver: owned(4),
        creation_timestamp,
        application_ref: owned(7),
    };

    info!(
        "{}: flow={:?} version={:?} from={:?} to={:?}",
        fields.first().copied().unwrap_or_default(),
        header.flow_reference,
        header.version,
        header.sender,
        header.receiver
    );
    header
}

/// Locate the first non-blank line and require it to start with `expected`.
///
/// Returns its line number. Anything else means the flow has no header,
/// which is fatal for the whole file.
pub(crate) fn require_header(
    input: &[u8],
    expected: &'static str,
    filename: &str,
) -> Result<usize> {
    let first = numbered_lines(input).find(|(_, line)| !line.trim().is_empty());

    match first {
        Some((line_number, line)) => {
            let token = line.trim().split('|').next().unwrap_or_default().trim();
            if token == expected {
                debug!("{}: header {} at line {}", filename, expected, line_number);
                Ok(line_number)
            } else {
                Err(ImportError::missing_header(filename, expected, token))
            }
        }
        None => Err(ImportError::missing_header(filename, expected, "")),
    }
}

/// Compare a trailer's declared count with the records actually emitted
pub(crate) fn check_record_count(
    token: &str,
    declared: Option<&str>,
    emitted: usize,
    line: usize,
    warnings: &mut WarningLog<'_>,
) {
    match declared.map(|raw| raw.parse::<usize>()) {
        Some(Ok(count)) if count == emitted => {
            debug!("{} record count {} matches", token, count);
        }
        Some(Ok(count)) => warnings.push(
            line,
            WarningKind::RecordCountMismatch,
            format!(
                "{} declares {} records but {} were parsed",
                token, count, emitted
            ),
        ),
        Some(Err(_)) => warnings.push(
            line,
            WarningKind::InvalidField,
            format!(
                "{} record count '{}' is not a number",
                token,
                declared.unwrap_or_default()
            ),
        ),
        None => warnings.push(
            line,
            WarningKind::MissingField,
            format!("{} record has no record count", token),
        ),
    }
}
