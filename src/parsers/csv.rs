//! CSV reading files with a header row
//!
//! The delimiter is sniffed from the header line; columns are matched by
//! alias so `mpan,serial,reading,date` and `Meter_Point;Serial_Number;Value`
//! both work.

use super::tabular::{ColumnMapping, collect};
use super::{ParseContext, ParseOutput, ParserKind, RecordParser, WarningKind, WarningLog};
use crate::constants::{CSV_DELIMITERS, UTF8_BOM};
use crate::error::Result;
use csv::{ReaderBuilder, Trim};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvParser;

impl RecordParser for CsvParser {
    fn kind(&self) -> ParserKind {
        ParserKind::Csv
    }

    fn parse(&self, input: &[u8], ctx: &ParseContext<'_>) -> Result<ParseOutput> {
        let input = input.strip_prefix(UTF8_BOM).unwrap_or(input);
        let mut warnings = WarningLog::new(ctx.filename);
        let mut records = Vec::new();

        let delimiter = sniff_delimiter(input);
        debug!("{}: CSV delimiter {:?}", ctx.filename, delimiter as char);

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(input);

        let mapping = match reader.headers() {
            Ok(headers) => ColumnMapping::analyze(headers.iter()),
            Err(e) => {
                warnings.push(1, WarningKind::InvalidHeader, format!("Unreadable header row: {}", e));
                return Ok(ParseOutput::new(self.kind(), records, warnings.into_inner()));
            }
        };

        let missing = mapping.missing_required();
        if !missing.is_empty() {
            warnings.push(
                1,
                WarningKind::InvalidHeader,
                format!("Header row lacks required columns: {}", missing.join(", ")),
            );
            return Ok(ParseOutput::new(self.kind(), records, warnings.into_inner()));
        }

        for (index, row) in reader.records().enumerate() {
            // Header is line 1; fall back to the row index when csv has no position
            let fallback_line = index + 2;
            match row {
                Ok(row) => {
                    let line = row
                        .position()
                        .map(|pos| pos.line() as usize)
                        .unwrap_or(fallback_line);
                    let raw = mapping.extract(|i| row.get(i));
                    collect(raw, line, ctx, &mut records, &mut warnings);
                }
                Err(e) => warnings.push(
                    fallback_line,
                    WarningKind::InvalidField,
                    format!("Unreadable row: {}", e),
                ),
            }
        }

        info!(
            "{}: parsed {} readings from CSV ({} warnings)",
            ctx.filename,
            records.len(),
            warnings.len()
        );
        Ok(ParseOutput::new(self.kind(), records, warnings.into_inner()))
    }
}

/// Pick the candidate delimiter occurring most often in the header line
fn sniff_delimiter(input: &[u8]) -> u8 {
    let header = input
        .split(|byte| *byte == b'\n')
        .next()
        .unwrap_or_default();

    CSV_DELIMITERS
        .iter()
        .copied()
        .map(|delimiter| {
            let count = header.iter().filter(|byte| **byte == delimiter).count();
            (delimiter, count)
        })
        .filter(|(_, count)| *count > 0)
        // max_by_key keeps the last maximum; reverse so earlier candidates win ties
        .rev()
        .max_by_key(|(_, count)| *count)
        .map(|(delimiter, _)| delimiter)
        .unwrap_or(b',')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter(b"mpan,serial,reading\n1;2;3"), b',');
        assert_eq!(sniff_delimiter(b"mpan;serial;reading,x"), b';');
        assert_eq!(sniff_delimiter(b"mpan\tserial\treading"), b'\t');
        assert_eq!(sniff_delimiter(b"mpan"), b',');
        assert_eq!(sniff_delimiter(b""), b',');
    }
}
