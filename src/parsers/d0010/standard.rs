//! Strict D0010 parser (`ZHD`/`026`/`028`/`029`/`ZTR`)
//!
//! `028` register records carry a previous/current reading window and emit
//! nothing on their own; each `029` reading detail under an open register
//! refines one half of that window and emits exactly one record.

use super::{MeterPointContext, check_record_count, parse_header, require_header};
use crate::constants::d0010::{
    DEFAULT_MD_RESET, DEFAULT_READING_METHOD, DEFAULT_READING_REASON,
    DEFAULT_REGISTER_READING_TYPE, DEFAULT_UNIT, HEADER, HEADER_FIELDS, MPAN_CORE,
    MPAN_CORE_FIELDS, READING, READING_FIELDS, REGISTER, REGISTER_FIELDS, SEQUENCE_CURRENT,
    SEQUENCE_PREVIOUS, TRAILER, TRAILER_FIELDS,
};
use crate::error::Result;
use crate::models::{FileHeader, MeasurementClass, ParsedRecord, ReadingType};
use crate::parsers::fields::{
    field, field_or, is_valid_mpan, parse_reading_value, parse_uff_date, split_record,
};
use crate::parsers::{
    ParseContext, ParseOutput, ParserKind, RecordParser, WarningKind, WarningLog, numbered_lines,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use tracing::{debug, info};

/// Parser for the canonical D0010 layout
#[derive(Debug, Clone, Copy, Default)]
pub struct D0010StandardParser;

/// Register opened by a `028` record
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterContext {
    pub register_id: String,
    pub tpr_code: Option<String>,
    pub meter_serial: String,
    /// Reading type code declared on the register, used when a 029 reason is unknown
    pub reading_type_code: String,
    pub previous_date: Option<NaiveDate>,
    pub current_date: Option<NaiveDate>,
    pub current_value: Option<BigDecimal>,
}

/// Half of the 028 reading window a 029 record refines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sequence {
    Previous,
    Current,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitHeader,
    Body,
    Done,
}

struct FlowState<'w, 'a> {
    phase: Phase,
    header: FileHeader,
    meter_point: Option<MeterPointContext>,
    register: Option<RegisterContext>,
    records: Vec<ParsedRecord>,
    warnings: &'w mut WarningLog<'a>,
}

impl RecordParser for D0010StandardParser {
    fn kind(&self) -> ParserKind {
        ParserKind::UffStrict
    }

    fn parse(&self, input: &[u8], ctx: &ParseContext<'_>) -> Result<ParseOutput> {
        require_header(input, HEADER, ctx.filename)?;

        let mut warnings = WarningLog::new(ctx.filename);
        let mut state = FlowState {
            phase: Phase::AwaitHeader,
            header: FileHeader::default(),
            meter_point: None,
            register: None,
            records: Vec::new(),
            warnings: &mut warnings,
        };

        for (line_number, line) in numbered_lines(input) {
            if line.trim().is_empty() {
                continue;
            }
            state.process_line(line_number, &line);
        }

        if state.phase != Phase::Done {
            state.warnings.push(
                0,
                WarningKind::MissingTrailer,
                format!("No {} trailer before end of file", TRAILER),
            );
        }

        let FlowState {
            header, records, ..
        } = state;

        info!(
            "{}: parsed {} readings from D0010 flow ({} warnings)",
            ctx.filename,
            records.len(),
            warnings.len()
        );

        Ok(ParseOutput::new(self.kind(), records, warnings.into_inner()).with_header(header))
    }
}

impl FlowState<'_, '_> {
    fn process_line(&mut self, line_number: usize, line: &str) {
        if self.phase == Phase::Done {
            self.warnings.push(
                line_number,
                WarningKind::TrailingContent,
                format!("Content after {} trailer ignored", TRAILER),
            );
            return;
        }

        let fields = split_record(line);
        let token = fields.first().copied().unwrap_or_default();

        match token {
            HEADER if self.phase == Phase::AwaitHeader => {
                if fields.len() < HEADER_FIELDS {
                    self.warnings.push(
                        line_number,
                        WarningKind::InvalidHeader,
                        format!(
                            "{} has {} fields, expected {}",
                            HEADER,
                            fields.len(),
                            HEADER_FIELDS
                        ),
                    );
                }
                self.header = parse_header(&fields, line_number, self.warnings);
                self.phase = Phase::Body;
            }
            HEADER => self.warnings.push(
                line_number,
                WarningKind::InvalidHeader,
                format!("Repeated {} record ignored", HEADER),
            ),
            MPAN_CORE => self.open_meter_point(line_number, &fields),
            REGISTER => self.open_register(line_number, &fields),
            READING => self.emit_reading(line_number, &fields),
            TRAILER => {
                if fields.len() < TRAILER_FIELDS {
                    debug!("{} at line {} is short", TRAILER, line_number);
                }
                check_record_count(
                    TRAILER,
                    field(&fields, 1),
                    self.records.len(),
                    line_number,
                    self.warnings,
                );
                self.meter_point = None;
                self.register = None;
                self.phase = Phase::Done;
            }
            other => self.warnings.push(
                line_number,
                WarningKind::UnknownRecord,
                format!("Unknown record type '{}'", other),
            ),
        }
    }

    /// `026|mpan_core|measurement_class`
    fn open_meter_point(&mut self, line_number: usize, fields: &[&str]) {
        self.register = None;

        let mpan = field(fields, 1).unwrap_or_default();
        if !is_valid_mpan(mpan) {
            self.meter_point = None;
            self.warnings.push(
                line_number,
                WarningKind::InvalidField,
                format!("Invalid MPAN core '{}' (expected 13 digits)", mpan),
            );
            return;
        }
        if fields.len() < MPAN_CORE_FIELDS {
            debug!("{} at line {} has no measurement class", MPAN_CORE, line_number);
        }

        let measurement_class = MeasurementClass::from_code(field_or(fields, 2, ""));
        if self
            .meter_point
            .as_ref()
            .is_some_and(|open| open.mpan == mpan)
        {
            debug!("MPAN {} re-declared at line {}", mpan, line_number);
        }

        self.meter_point = Some(MeterPointContext {
            mpan: mpan.to_string(),
            measurement_class,
        });
    }

    /// `028|register|tpr|unit|serial|type|prev_date|prev_time|curr_date|curr_time|curr_value|md_reset`
    fn open_register(&mut self, line_number: usize, fields: &[&str]) {
        self.register = None;

        if self.meter_point.is_none() {
            self.warnings.push(
                line_number,
                WarningKind::OrphanRecord,
                format!("{} register without an open meter point", REGISTER),
            );
            return;
        }

        let Some(register_id) = field(fields, 1) else {
            self.warnings.push(
                line_number,
                WarningKind::MissingField,
                "Register record has no register id",
            );
            return;
        };
        let Some(meter_serial) = field(fields, 4) else {
            self.warnings.push(
                line_number,
                WarningKind::MissingField,
                format!("Register {} has no meter serial", register_id),
            );
            return;
        };

        if fields.len() < REGISTER_FIELDS {
            debug!(
                "{} at line {} has {} fields, defaulting the rest",
                REGISTER,
                line_number,
                fields.len()
            );
        }

        let previous_date = self.optional_date(line_number, fields, 6, "previous read date");
        let current_date = self.optional_date(line_number, fields, 8, "current read date");
        let current_value = match field(fields, 10).map(parse_reading_value) {
            Some(Ok(value)) => Some(value),
            Some(Err(reason)) => {
                self.warnings
                    .push(line_number, WarningKind::InvalidField, reason);
                None
            }
            None => None,
        };

        debug!(
            "Register {} (serial {}, unit {}, md reset {})",
            register_id,
            meter_serial,
            field_or(fields, 3, DEFAULT_UNIT),
            field_or(fields, 11, DEFAULT_MD_RESET)
        );

        self.register = Some(RegisterContext {
            register_id: register_id.to_string(),
            tpr_code: field(fields, 2).map(str::to_string),
            meter_serial: meter_serial.to_string(),
            reading_type_code: field_or(fields, 5, DEFAULT_REGISTER_READING_TYPE).to_string(),
            previous_date,
            current_date,
            current_value,
        });
    }

    /// `029|sequence|date|time|value|reason|method|received`
    fn emit_reading(&mut self, line_number: usize, fields: &[&str]) {
        let (Some(meter_point), Some(register)) = (&self.meter_point, &self.register) else {
            self.warnings.push(
                line_number,
                WarningKind::OrphanRecord,
                format!("{} reading without an open register", READING),
            );
            return;
        };

        if fields.len() < READING_FIELDS {
            debug!("{} at line {} is short", READING, line_number);
        }

        let sequence = match field(fields, 1) {
            Some(SEQUENCE_PREVIOUS) => Sequence::Previous,
            Some(SEQUENCE_CURRENT) => Sequence::Current,
            other => {
                self.warnings.push(
                    line_number,
                    WarningKind::InvalidField,
                    format!(
                        "Reading sequence '{}' is not 1 or 2, treating as current",
                        other.unwrap_or_default()
                    ),
                );
                Sequence::Current
            }
        };

        let window_date = match sequence {
            Sequence::Previous => register.previous_date,
            Sequence::Current => register.current_date,
        };
        let reading_date = match field(fields, 2).map(parse_uff_date) {
            Some(Ok(date)) => date,
            Some(Err(reason)) => {
                self.warnings
                    .push(line_number, WarningKind::InvalidField, reason);
                return;
            }
            None => match window_date {
                Some(date) => date,
                None => {
                    self.warnings.push(
                        line_number,
                        WarningKind::MissingField,
                        "Reading has no date and the register window has none",
                    );
                    return;
                }
            },
        };

        let reading_value = match field(fields, 4).map(parse_reading_value) {
            Some(Ok(value)) => value,
            Some(Err(reason)) => {
                self.warnings
                    .push(line_number, WarningKind::InvalidField, reason);
                return;
            }
            None => match (sequence, &register.current_value) {
                (Sequence::Current, Some(value)) => value.clone(),
                _ => {
                    self.warnings.push(
                        line_number,
                        WarningKind::MissingField,
                        "Reading has no value",
                    );
                    return;
                }
            },
        };

        let reason = field_or(fields, 5, DEFAULT_READING_REASON);
        let reading_type = ReadingType::from_code(reason)
            .or_else(|| ReadingType::from_code(&register.reading_type_code))
            .unwrap_or(ReadingType::Actual);
        let method = field_or(fields, 6, DEFAULT_READING_METHOD);

        let record = ParsedRecord::new(
            &meter_point.mpan,
            &register.meter_serial,
            reading_date,
            reading_value,
        )
        .map(|record| {
            record
                .with_class(meter_point.measurement_class)
                .with_register(register.register_id.clone())
                .with_tpr(register.tpr_code.clone())
                .with_reading_type(reading_type)
                .with_method(method)
                .at_line(line_number)
        });

        match record {
            Ok(record) => {
                debug!(
                    "Reading {} {} {} = {}",
                    record.mpan, record.register_id, record.reading_date, record.reading_value
                );
                self.records.push(record);
            }
            Err(e) => self
                .warnings
                .push(line_number, WarningKind::InvalidField, e.to_string()),
        }
    }

    fn optional_date(
        &mut self,
        line_number: usize,
        fields: &[&str],
        index: usize,
        label: &str,
    ) -> Option<NaiveDate> {
        match field(fields, index).map(parse_uff_date) {
            Some(Ok(date)) => Some(date),
            Some(Err(reason)) => {
                self.warnings.push(
                    line_number,
                    WarningKind::InvalidField,
                    format!("{}: {}", label, reason),
                );
                None
            }
            None => None,
        }
    }
}
