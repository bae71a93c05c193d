//! Shared normalization for the tabular parsers
//!
//! CSV rows, JSON objects, XML elements and TXT lines are all reduced to a
//! `RawReading` of optional string fields, which is then validated and
//! defaulted into a `ParsedRecord` the same way for every format.

use crate::constants::columns;
use crate::models::{ParsedRecord, ReadingType};
use crate::parsers::fields::{parse_flexible_date, parse_reading_value};
use crate::parsers::{ParseContext, WarningKind, WarningLog};
use tracing::debug;

/// Logical field of a tabular reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Mpan,
    Serial,
    Reading,
    Date,
    Register,
    ReadingType,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::Mpan,
        Column::Serial,
        Column::Reading,
        Column::Date,
        Column::Register,
        Column::ReadingType,
    ];

    /// Columns a source must provide for a row to be usable
    pub const REQUIRED: [Column; 3] = [Column::Mpan, Column::Serial, Column::Reading];

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::Mpan => columns::MPAN,
            Column::Serial => columns::SERIAL,
            Column::Reading => columns::READING,
            Column::Date => columns::DATE,
            Column::Register => columns::REGISTER,
            Column::ReadingType => columns::READING_TYPE,
        }
    }

    /// Canonical name used in warnings
    pub fn name(self) -> &'static str {
        self.aliases()[0]
    }

    /// Resolve a column/key/attribute name, case-insensitively
    pub fn from_name(name: &str) -> Option<Column> {
        let name = name.trim();
        Column::ALL.into_iter().find(|column| {
            column
                .aliases()
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(name))
        })
    }
}

/// Column positions resolved from a header row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    positions: [Option<usize>; Column::ALL.len()],
}

impl ColumnMapping {
    /// Map header names to logical columns; the first matching header wins
    pub fn analyze<'h>(headers: impl IntoIterator<Item = &'h str>) -> Self {
        let mut mapping = Self::default();
        for (index, header) in headers.into_iter().enumerate() {
            if let Some(column) = Column::from_name(header) {
                let slot = &mut mapping.positions[column as usize];
                if slot.is_none() {
                    *slot = Some(index);
                }
            }
        }
        debug!("Column mapping: {:?}", mapping.positions);
        mapping
    }

    pub fn get(&self, column: Column) -> Option<usize> {
        self.positions[column as usize]
    }

    /// Names of required columns the header does not provide
    pub fn missing_required(&self) -> Vec<&'static str> {
        Column::REQUIRED
            .into_iter()
            .filter(|column| self.get(*column).is_none())
            .map(Column::name)
            .collect()
    }

    /// Read a row into a `RawReading` using the resolved positions
    pub fn extract<'r>(&self, row: impl Fn(usize) -> Option<&'r str>) -> RawReading {
        let mut raw = RawReading::default();
        for column in Column::ALL {
            if let Some(value) = self.get(column).and_then(&row) {
                raw.set(column, value);
            }
        }
        raw
    }
}

/// Unvalidated reading fields as found in the source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawReading {
    pub mpan: Option<String>,
    pub serial: Option<String>,
    pub reading: Option<String>,
    pub date: Option<String>,
    pub register: Option<String>,
    pub reading_type: Option<String>,
}

impl RawReading {
    /// Store a field value; blank values count as absent
    pub fn set(&mut self, column: Column, value: impl AsRef<str>) {
        let value = value.as_ref().trim();
        if value.is_empty() {
            return;
        }
        let slot = match column {
            Column::Mpan => &mut self.mpan,
            Column::Serial => &mut self.serial,
            Column::Reading => &mut self.reading,
            Column::Date => &mut self.date,
            Column::Register => &mut self.register,
            Column::ReadingType => &mut self.reading_type,
        };
        *slot = Some(value.to_string());
    }

    /// Validate and default into a record.
    ///
    /// Missing mandatory fields and unparseable values are reported as
    /// `(kind, message)` so the caller can turn them into warnings.
    pub fn into_record(
        self,
        ctx: &ParseContext<'_>,
        line: usize,
    ) -> Result<ParsedRecord, (WarningKind, String)> {
        let missing = |column: Column| {
            (
                WarningKind::MissingField,
                format!("Missing required field '{}'", column.name()),
            )
        };

        let mpan = self.mpan.ok_or_else(|| missing(Column::Mpan))?;
        let serial = self.serial.ok_or_else(|| missing(Column::Serial))?;
        let raw_value = self.reading.ok_or_else(|| missing(Column::Reading))?;

        let reading_value =
            parse_reading_value(&raw_value).map_err(|reason| (WarningKind::InvalidField, reason))?;
        let reading_date = match self.date {
            Some(raw) => {
                parse_flexible_date(&raw).map_err(|reason| (WarningKind::InvalidField, reason))?
            }
            None => ctx.processing_date,
        };
        let reading_type = match self.reading_type {
            Some(raw) => parse_reading_type(&raw).ok_or_else(|| {
                (
                    WarningKind::InvalidField,
                    format!("Unknown reading type '{}'", raw),
                )
            })?,
            None => ReadingType::Actual,
        };
        let register = self
            .register
            .unwrap_or_else(|| ctx.default_register_id.to_string());

        let record = ParsedRecord::new(&mpan, &serial, reading_date, reading_value)
            .map_err(|e| (WarningKind::InvalidField, e.to_string()))?;

        Ok(record
            .with_register(register)
            .with_reading_type(reading_type)
            .at_line(line))
    }
}

/// Accept a reading type as a D0010 code or its spelled-out name
pub fn parse_reading_type(raw: &str) -> Option<ReadingType> {
    ReadingType::from_code(raw).or_else(|| match raw.trim().to_ascii_lowercase().as_str() {
        "actual" => Some(ReadingType::Actual),
        "estimate" | "estimated" => Some(ReadingType::Estimate),
        "customer" => Some(ReadingType::Customer),
        "withdrawn" => Some(ReadingType::Withdrawn),
        "zero" | "zero_consumption" => Some(ReadingType::ZeroConsumption),
        _ => None,
    })
}

/// Convert a raw reading and file it as a record or a warning
pub fn collect(
    raw: RawReading,
    line: usize,
    ctx: &ParseContext<'_>,
    records: &mut Vec<ParsedRecord>,
    warnings: &mut WarningLog<'_>,
) {
    match raw.into_record(ctx, line) {
        Ok(record) => records.push(record),
        Err((kind, message)) => warnings.push(line, kind, message),
    }
}
