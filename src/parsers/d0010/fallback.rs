//! Lenient UFF parser (`ZHV`/`026`/`028`/`030`/`ZPT`)
//!
//! Many suppliers send a simplified flow where `028` names the meter and each
//! `030` carries a complete reading. This parser accepts it with relaxed
//! field requirements: short records are padded with defaults and MPANs that
//! are not 13 digits are kept with a warning.

use super::{MeterPointContext, check_record_count, parse_header, require_header};
use crate::constants::uff_fallback::{HEADER, METER, MPAN_CORE, READING, TRAILER};
use crate::error::Result;
use crate::models::{FileHeader, MeasurementClass, ParsedRecord, ReadingType};
use crate::parsers::fields::{
    field, field_or, is_valid_mpan, parse_reading_value, parse_uff_compact_date, split_record,
};
use crate::parsers::{
    ParseContext, ParseOutput, ParserKind, RecordParser, WarningKind, WarningLog, numbered_lines,
};
use tracing::{debug, info};

/// Parser for the simplified ZHV flow variant
#[derive(Debug, Clone, Copy, Default)]
pub struct D0010FallbackParser;

/// Meter opened by a fallback `028` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterContext {
    pub meter_serial: String,
    pub register_id: String,
}

impl RecordParser for D0010FallbackParser {
    fn kind(&self) -> ParserKind {
        ParserKind::UffFallback
    }

    fn parse(&self, input: &[u8], ctx: &ParseContext<'_>) -> Result<ParseOutput> {
        let header_line = require_header(input, HEADER, ctx.filename)?;

        let mut warnings = WarningLog::new(ctx.filename);
        let mut header = FileHeader::default();
        let mut meter_point: Option<MeterPointContext> = None;
        let mut meter: Option<MeterContext> = None;
        let mut records = Vec::new();
        let mut trailer_seen = false;

        for (line_number, line) in numbered_lines(input) {
            if line.trim().is_empty() {
                continue;
            }
            if trailer_seen {
                warnings.push(
                    line_number,
                    WarningKind::TrailingContent,
                    format!("Content after {} trailer ignored", TRAILER),
                );
                continue;
            }

            let fields = split_record(&line);
            match fields.first().copied().unwrap_or_default() {
                HEADER if line_number == header_line => {
                    header = parse_header(&fields, line_number, &mut warnings);
                }
                HEADER => warnings.push(
                    line_number,
                    WarningKind::InvalidHeader,
                    format!("Repeated {} record ignored", HEADER),
                ),
                MPAN_CORE => {
                    meter = None;
                    meter_point = match field(&fields, 1) {
                        Some(mpan) => {
                            if !is_valid_mpan(mpan) {
                                warnings.push(
                                    line_number,
                                    WarningKind::InvalidField,
                                    format!("MPAN '{}' is not 13 digits, keeping it", mpan),
                                );
                            }
                            Some(MeterPointContext {
                                mpan: mpan.to_string(),
                                measurement_class: field(&fields, 2)
                                    .map(MeasurementClass::from_code)
                                    .unwrap_or(MeasurementClass::Electricity),
                            })
                        }
                        None => {
                            warnings.push(line_number, WarningKind::MissingField, "Empty MPAN");
                            None
                        }
                    };
                }
                METER => {
                    meter = None;
                    if meter_point.is_none() {
                        warnings.push(
                            line_number,
                            WarningKind::OrphanRecord,
                            format!("{} meter without an open meter point", METER),
                        );
                        continue;
                    }
                    match field(&fields, 1) {
                        Some(serial) => {
                            meter = Some(MeterContext {
                                meter_serial: serial.to_string(),
                                register_id: field_or(&fields, 2, ctx.default_register_id)
                                    .to_string(),
                            });
                        }
                        None => warnings.push(
                            line_number,
                            WarningKind::MissingField,
                            "Meter record has no serial",
                        ),
                    }
                }
                READING => {
                    let (Some(point), Some(open_meter)) = (&meter_point, &meter) else {
                        warnings.push(
                            line_number,
                            WarningKind::OrphanRecord,
                            format!("{} reading without an open meter", READING),
                        );
                        continue;
                    };
                    match reading_record(point, open_meter, &fields) {
                        Ok(record) => {
                            debug!(
                                "Reading {} {} {} = {}",
                                record.mpan, record.meter_serial, record.reading_date, record.reading_value
                            );
                            records.push(record.at_line(line_number));
                        }
                        Err((kind, message)) => warnings.push(line_number, kind, message),
                    }
                }
                TRAILER => {
                    check_record_count(
                        TRAILER,
                        field(&fields, 1),
                        records.len(),
                        line_number,
                        &mut warnings,
                    );
                    trailer_seen = true;
                }
                other => warnings.push(
                    line_number,
                    WarningKind::UnknownRecord,
                    format!("Unknown record type '{}'", other),
                ),
            }
        }

        if !trailer_seen {
            warnings.push(
                0,
                WarningKind::MissingTrailer,
                format!("No {} trailer before end of file", TRAILER),
            );
        }

        info!(
            "{}: parsed {} readings from fallback UFF flow ({} warnings)",
            ctx.filename,
            records.len(),
            warnings.len()
        );

        Ok(ParseOutput::new(self.kind(), records, warnings.into_inner()).with_header(header))
    }
}

/// `030|reading_type|date|value|...|...|method|flag`
fn reading_record(
    point: &MeterPointContext,
    meter: &MeterContext,
    fields: &[&str],
) -> std::result::Result<ParsedRecord, (WarningKind, String)> {
    let reading_type = match field(fields, 1) {
        Some(code) => ReadingType::from_code(code).unwrap_or_else(|| {
            debug!("Unknown reading type '{}', using actual", code);
            ReadingType::Actual
        }),
        None => ReadingType::Actual,
    };

    let raw_date = field(fields, 2)
        .ok_or_else(|| (WarningKind::MissingField, "Reading has no date".to_string()))?;
    let reading_date =
        parse_uff_compact_date(raw_date).map_err(|reason| (WarningKind::InvalidField, reason))?;

    let raw_value = field(fields, 3)
        .ok_or_else(|| (WarningKind::MissingField, "Reading has no value".to_string()))?;
    let reading_value =
        parse_reading_value(raw_value).map_err(|reason| (WarningKind::InvalidField, reason))?;

    let record = ParsedRecord::new(&point.mpan, &meter.meter_serial, reading_date, reading_value)
        .map_err(|e| (WarningKind::InvalidField, e.to_string()))?;

    Ok(record
        .with_class(point.measurement_class)
        .with_register(meter.register_id.clone())
        .with_reading_type(reading_type)
        .with_method(field_or(fields, 6, "")))
}
