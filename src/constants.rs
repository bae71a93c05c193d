//! Application constants for the meter reading importer
//!
//! Record tokens for the D0010/UFF flows, parsing defaults and
//! filesystem names used throughout the crate.

// =============================================================================
// D0010 / UFF Record Tokens
// =============================================================================

/// Record type tokens for the standard D0010 flow layout
pub mod d0010 {
    /// File header (standard variant)
    pub const HEADER: &str = "ZHD";
    /// MPAN core
    pub const MPAN_CORE: &str = "026";
    /// Meter register details
    pub const REGISTER: &str = "028";
    /// Register reading detail
    pub const READING: &str = "029";
    /// File trailer (standard variant)
    pub const TRAILER: &str = "ZTR";

    /// Minimum field counts including the record token itself
    /// (the header's trailing application reference is optional)
    pub const HEADER_FIELDS: usize = 7;
    pub const MPAN_CORE_FIELDS: usize = 3;
    pub const REGISTER_FIELDS: usize = 12;
    pub const READING_FIELDS: usize = 8;
    pub const TRAILER_FIELDS: usize = 2;

    /// Reading sequence values in a 029 record
    pub const SEQUENCE_PREVIOUS: &str = "1";
    pub const SEQUENCE_CURRENT: &str = "2";

    /// Defaults applied to missing optional fields
    pub const DEFAULT_UNIT: &str = "kWh";
    pub const DEFAULT_REGISTER_READING_TYPE: &str = "A";
    pub const DEFAULT_MD_RESET: &str = "N";
    /// Empty reading reason means a scheduled read
    pub const DEFAULT_READING_REASON: &str = "S";
    pub const DEFAULT_READING_METHOD: &str = "A";

    /// Length of a valid MPAN core
    pub const MPAN_LENGTH: usize = 13;
}

/// Record type tokens for the lenient, commonly seen non-standard layout
pub mod uff_fallback {
    pub const HEADER: &str = "ZHV";
    pub const MPAN_CORE: &str = "026";
    pub const METER: &str = "028";
    pub const READING: &str = "030";
    pub const TRAILER: &str = "ZPT";
}

/// Byte signatures that identify a UFF flow inside arbitrary content
pub const UFF_SIGNATURES: &[&str] = &["ZHD|", "ZHV|"];

/// Leading bytes of a PDF container
pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// UTF-8 byte order mark
pub const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

// =============================================================================
// Parsing Defaults
// =============================================================================

/// Number of leading bytes inspected by the format detector
pub const DEFAULT_SNIFF_BYTES: usize = 4096;

/// Register id assigned when a source format carries none
pub const DEFAULT_REGISTER_ID: &str = "01";

/// Minimum field count for a delimited TXT line (mpan, serial, reading)
pub const TXT_MIN_FIELDS: usize = 3;

/// Delimiters tried, in order, for TXT lines
pub const TXT_DELIMITERS: &[char] = &['|', '\t', ','];

/// Delimiters considered when sniffing a CSV header row
pub const CSV_DELIMITERS: &[u8] = &[b',', b';', b'\t'];

/// Date formats accepted by the tabular parsers, tried in order
pub const TABULAR_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%d/%m/%Y", "%m/%d/%Y"];

/// Datetime formats accepted by the tabular parsers (date part is kept)
pub const TABULAR_DATETIME_FORMATS: &[&str] = &[
    "%Y%m%d%H%M%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Minimum ratio of printable characters for a decoding to count as text
pub const READABLE_TEXT_RATIO: f64 = 0.85;

/// Minimum length of a printable byte run kept by binary extraction
pub const MIN_PRINTABLE_RUN: usize = 4;

// =============================================================================
// Tabular Column Aliases
// =============================================================================

/// Accepted column/key names per logical field, compared case-insensitively
pub mod columns {
    pub const MPAN: &[&str] = &["mpan", "meter_point", "mpan_core"];
    pub const SERIAL: &[&str] = &["serial", "meter_serial", "serial_number"];
    pub const READING: &[&str] = &["reading", "value", "reading_value"];
    pub const DATE: &[&str] = &["date", "reading_date"];
    pub const REGISTER: &[&str] = &["register", "register_id"];
    pub const READING_TYPE: &[&str] = &["reading_type", "type"];
}

/// Element name carrying one reading in XML documents
pub const XML_READING_ELEMENT: &str = "reading";

/// Top-level JSON keys that hold an array of readings
pub const JSON_COLLECTION_KEYS: &[&str] = &["readings", "meters"];

// =============================================================================
// Storage Constraints and State Files
// =============================================================================

/// Constraint names reported by storage collaborators
pub mod constraints {
    pub const FLOW_FILE_CHECKSUM: &str = "flow_file_checksum";
    pub const METER_IDENTITY: &str = "meter_mpan_serial";
    pub const READING_NATURAL_KEY: &str = "reading_meter_register_date_type";
}

/// Directory under the user data dir holding importer state
pub const STATE_DIR_NAME: &str = "meter-import";

/// Snapshot file name for the bundled in-memory store
pub const STATE_FILE_NAME: &str = "state.json";
