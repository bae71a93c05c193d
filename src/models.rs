//! Core data structures for meter reading imports.
//!
//! Defines the normalized `ParsedRecord` every parser produces, the
//! `FlowFileDescriptor` tracking one imported file, and the persistent
//! meter and reading rows owned by the storage collaborator.

use crate::error::RecordError;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// File formats recognised by the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileFormat {
    Uff,
    Pdf,
    Csv,
    Json,
    Xml,
    Txt,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Uff => "UFF",
            FileFormat::Pdf => "PDF",
            FileFormat::Csv => "CSV",
            FileFormat::Json => "JSON",
            FileFormat::Xml => "XML",
            FileFormat::Txt => "TXT",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of energy a meter measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementClass {
    Electricity,
    Gas,
    Water,
    Heat,
    Unknown,
}

impl MeasurementClass {
    /// Map a single-letter measurement class code
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "E" => MeasurementClass::Electricity,
            "G" => MeasurementClass::Gas,
            "W" => MeasurementClass::Water,
            "H" => MeasurementClass::Heat,
            _ => MeasurementClass::Unknown,
        }
    }
}

/// D0010 reading type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReadingType {
    Actual,
    Estimate,
    Customer,
    Withdrawn,
    ZeroConsumption,
}

impl ReadingType {
    /// Map a reading type code; `None` for codes outside the A/E/C/W/Z set
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "A" => Some(ReadingType::Actual),
            "E" => Some(ReadingType::Estimate),
            "C" => Some(ReadingType::Customer),
            "W" => Some(ReadingType::Withdrawn),
            "Z" => Some(ReadingType::ZeroConsumption),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ReadingType::Actual => "A",
            ReadingType::Estimate => "E",
            ReadingType::Customer => "C",
            ReadingType::Withdrawn => "W",
            ReadingType::ZeroConsumption => "Z",
        }
    }
}

/// One normalized meter reading, as produced by every parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRecord {
    pub mpan: String,
    pub meter_serial: String,
    pub measurement_class: MeasurementClass,
    pub register_id: String,
    pub reading_date: NaiveDate,
    pub reading_value: BigDecimal,
    pub reading_type: ReadingType,
    pub measurement_method: String,
    /// Time pattern regime, only known for D0010 register records
    pub tpr_code: Option<String>,
    /// 1-based line, row or element the record came from
    pub source_line: usize,
}

impl ParsedRecord {
    /// Create a record, enforcing non-empty identity and a non-negative value.
    ///
    /// Optional attributes start at their defaults (electricity, actual read,
    /// empty method, register "01") and are refined with the `with_*` methods.
    pub fn new(
        mpan: &str,
        meter_serial: &str,
        reading_date: NaiveDate,
        reading_value: BigDecimal,
    ) -> Result<Self, RecordError> {
        let mpan = mpan.trim();
        let meter_serial = meter_serial.trim();

        if mpan.is_empty() {
            return Err(RecordError::EmptyMpan);
        }
        if meter_serial.is_empty() {
            return Err(RecordError::EmptySerial);
        }
        if reading_value < BigDecimal::from(0) {
            return Err(RecordError::NegativeValue(reading_value));
        }

        Ok(Self {
            mpan: mpan.to_string(),
            meter_serial: meter_serial.to_string(),
            measurement_class: MeasurementClass::Electricity,
            register_id: crate::constants::DEFAULT_REGISTER_ID.to_string(),
            reading_date,
            reading_value,
            reading_type: ReadingType::Actual,
            measurement_method: String::new(),
            tpr_code: None,
            source_line: 0,
        })
    }

    pub fn with_register(mut self, register_id: impl Into<String>) -> Self {
        self.register_id = register_id.into();
        self
    }

    pub fn with_class(mut self, class: MeasurementClass) -> Self {
        self.measurement_class = class;
        self
    }

    pub fn with_reading_type(mut self, reading_type: ReadingType) -> Self {
        self.reading_type = reading_type;
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.measurement_method = method.into();
        self
    }

    pub fn with_tpr(mut self, tpr_code: Option<String>) -> Self {
        self.tpr_code = tpr_code;
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.source_line = line;
        self
    }

    pub fn identity(&self) -> MeterIdentity {
        MeterIdentity::new(&self.mpan, &self.meter_serial)
    }
}

/// Header fields carried by a UFF flow (ZHD/ZHV record)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    pub flow_reference: Option<String>,
    pub version: Option<String>,
    pub sender: Option<String>,
    pub receiver: Option<String>,
    pub creation_timestamp: Option<NaiveDateTime>,
    pub application_ref: Option<String>,
}

/// Lifecycle of an imported file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    Processing,
    Imported,
    Error,
}

/// One imported file; the root of a file-scoped unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowFileDescriptor {
    /// Assigned by the store on insert, zero before
    pub id: u64,
    pub filename: String,
    /// Lowercase hex SHA-256 of the file bytes
    pub checksum: String,
    pub detected_format: Option<FileFormat>,
    pub status: FileStatus,
    pub record_count: usize,
    pub header: FileHeader,
    pub imported_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl FlowFileDescriptor {
    /// A fresh descriptor in the `Processing` state
    pub fn processing(filename: impl Into<String>, checksum: impl Into<String>) -> Self {
        Self {
            id: 0,
            filename: filename.into(),
            checksum: checksum.into(),
            detected_format: None,
            status: FileStatus::Processing,
            record_count: 0,
            header: FileHeader::default(),
            imported_at: Utc::now(),
            error_message: None,
        }
    }

    pub fn mark_imported(&mut self, record_count: usize) {
        self.status = FileStatus::Imported;
        self.record_count = record_count;
        self.error_message = None;
    }

    /// Put a failed descriptor back into `Processing` for another attempt
    pub fn reopen(&mut self, filename: impl Into<String>) {
        self.filename = filename.into();
        self.detected_format = None;
        self.status = FileStatus::Processing;
        self.record_count = 0;
        self.header = FileHeader::default();
        self.imported_at = Utc::now();
        self.error_message = None;
    }

    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.status = FileStatus::Error;
        self.record_count = 0;
        self.error_message = Some(message.into());
    }
}

/// Natural identity of a physical meter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeterIdentity {
    pub mpan: String,
    pub meter_serial: String,
}

impl MeterIdentity {
    pub fn new(mpan: &str, meter_serial: &str) -> Self {
        Self {
            mpan: mpan.to_string(),
            meter_serial: meter_serial.to_string(),
        }
    }
}

impl fmt::Display for MeterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.meter_serial, self.mpan)
    }
}

/// Stored meter row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterRecord {
    pub id: u64,
    pub identity: MeterIdentity,
    pub measurement_class: MeasurementClass,
    /// Flow file in which the meter was first seen
    pub first_flow_file: u64,
    pub created_at: DateTime<Utc>,
}

/// Uniqueness key of a stored reading
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReadingKey {
    pub meter_id: u64,
    pub register_id: String,
    pub reading_date: NaiveDate,
    pub reading_type: ReadingType,
}

/// Stored reading row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingRecord {
    pub id: u64,
    pub key: ReadingKey,
    pub reading_value: BigDecimal,
    pub measurement_method: String,
    pub tpr_code: Option<String>,
    pub flow_file: u64,
}
