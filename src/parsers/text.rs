//! Plain-text reading lines: `mpan, serial, reading[, date]`
//!
//! Each line is split on the first delimiter that yields enough fields,
//! trying `|`, tab and `,` in turn, then runs of whitespace.

use super::tabular::{Column, RawReading, collect};
use super::{
    ParseContext, ParseOutput, ParserKind, RecordParser, WarningKind, WarningLog, numbered_lines,
};
use crate::constants::{TXT_DELIMITERS, TXT_MIN_FIELDS};
use crate::error::Result;
use crate::parsers::fields::parse_reading_value;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct TextParser;

impl RecordParser for TextParser {
    fn kind(&self) -> ParserKind {
        ParserKind::Txt
    }

    fn parse(&self, input: &[u8], ctx: &ParseContext<'_>) -> Result<ParseOutput> {
        let mut warnings = WarningLog::new(ctx.filename);
        let mut records = Vec::new();
        let mut first_content_line = true;

        for (line_number, line) in numbered_lines(input) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let fields = split_line(line);
            if std::mem::take(&mut first_content_line) && is_header_line(&fields) {
                debug!("{}: skipping header line {}", ctx.filename, line_number);
                continue;
            }
            if fields.len() < TXT_MIN_FIELDS {
                warnings.push(
                    line_number,
                    WarningKind::MissingField,
                    format!(
                        "Expected at least {} fields (mpan, serial, reading), found {}",
                        TXT_MIN_FIELDS,
                        fields.len()
                    ),
                );
                continue;
            }

            let mut raw = RawReading::default();
            raw.set(Column::Mpan, fields[0]);
            raw.set(Column::Serial, fields[1]);
            raw.set(Column::Reading, fields[2]);
            if let Some(date) = fields.get(3) {
                raw.set(Column::Date, date);
            }
            collect(raw, line_number, ctx, &mut records, &mut warnings);
        }

        info!(
            "{}: parsed {} readings from text ({} warnings)",
            ctx.filename,
            records.len(),
            warnings.len()
        );
        Ok(ParseOutput::new(self.kind(), records, warnings.into_inner()))
    }
}

/// Split on the first delimiter producing at least the minimum field count
pub fn split_line(line: &str) -> Vec<&str> {
    TXT_DELIMITERS
        .iter()
        .map(|delimiter| line.split(*delimiter).map(str::trim).collect::<Vec<_>>())
        .find(|fields| fields.len() >= TXT_MIN_FIELDS)
        .unwrap_or_else(|| line.split_whitespace().collect())
}

/// A leading `mpan,serial,reading` style line naming its columns
fn is_header_line(fields: &[&str]) -> bool {
    let names_mpan = fields
        .first()
        .is_some_and(|name| Column::from_name(name) == Some(Column::Mpan));
    let numeric_reading = fields
        .get(2)
        .is_some_and(|value| parse_reading_value(value).is_ok());
    names_mpan && !numeric_reading
}
