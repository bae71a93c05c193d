//! Field parsing utilities shared by the parsers
//!
//! Helpers for splitting pipe-delimited records and converting raw text
//! into dates and decimal reading values with descriptive error messages.

use crate::constants::{TABULAR_DATE_FORMATS, TABULAR_DATETIME_FORMATS, d0010::MPAN_LENGTH};
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

static MPAN_CORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^\d{{{}}}$", MPAN_LENGTH)).expect("valid MPAN regex"));

/// Split a pipe-delimited record into trimmed fields.
///
/// UFF records conventionally end with a terminating `|`; the empty field
/// it produces is dropped so field counts match the record layout.
pub fn split_record(line: &str) -> Vec<&str> {
    let line = line.trim();
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').map(str::trim).collect()
}

/// Get a non-empty field by index
pub fn field<'a>(fields: &[&'a str], index: usize) -> Option<&'a str> {
    fields.get(index).copied().filter(|value| !value.is_empty())
}

/// Get a field by index, falling back to a default when missing or empty
pub fn field_or<'a>(fields: &[&'a str], index: usize, default: &'a str) -> &'a str {
    field(fields, index).unwrap_or(default)
}

/// True for a 13-digit MPAN core
pub fn is_valid_mpan(mpan: &str) -> bool {
    MPAN_CORE.is_match(mpan)
}

/// Parse a reading value as a non-negative decimal
pub fn parse_reading_value(raw: &str) -> Result<BigDecimal, String> {
    let trimmed = raw.trim();
    let value = BigDecimal::from_str(trimmed)
        .map_err(|_| format!("Invalid reading value '{}' (expected a decimal number)", trimmed))?;

    if value < BigDecimal::from(0) {
        return Err(format!("Negative reading value '{}'", trimmed));
    }
    Ok(value)
}

/// Parse a UFF `CCYYMMDD` date
pub fn parse_uff_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y%m%d")
        .map_err(|e| format!("Invalid date '{}' (expected CCYYMMDD): {}", raw.trim(), e))
}

/// Parse a UFF `CCYYMMDD` date with an optional `HHMMSS` time
pub fn parse_uff_datetime(date: &str, time: Option<&str>) -> Result<NaiveDateTime, String> {
    let day = parse_uff_date(date)?;
    let time = match time.map(str::trim).filter(|t| !t.is_empty()) {
        Some(raw) => NaiveTime::parse_from_str(raw, "%H%M%S")
            .map_err(|e| format!("Invalid time '{}' (expected HHMMSS): {}", raw, e))?,
        None => NaiveTime::MIN,
    };
    Ok(day.and_time(time))
}

/// Parse a lenient UFF date: `CCYYMMDD` or `CCYYMMDDHHMMSS`
pub fn parse_uff_compact_date(raw: &str) -> Result<NaiveDate, String> {
    let trimmed = raw.trim();
    if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, "%Y%m%d%H%M%S") {
        return Ok(datetime.date());
    }
    parse_uff_date(trimmed)
        .map_err(|_| format!("Invalid date '{}' (expected CCYYMMDD[HHMMSS])", trimmed))
}

/// Parse a date in any of the formats accepted for tabular inputs
pub fn parse_flexible_date(raw: &str) -> Result<NaiveDate, String> {
    let trimmed = raw.trim();

    for format in TABULAR_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }
    for format in TABULAR_DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(datetime.date());
        }
    }
    if let Ok(datetime) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Ok(datetime.date_naive());
    }

    Err(format!("Invalid date '{}'", trimmed))
}
