//! Test fixtures shared by the parser test modules
//!
//! Provides a fixed parse context and sample flows in each supported layout.

use chrono::NaiveDate;

use super::ParseContext;

mod tabular_tests;

/// Processing date used by every fixture context
pub fn processing_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
}

/// Parse context with the default register and a fixed processing date
pub fn test_context(filename: &'static str) -> ParseContext<'static> {
    ParseContext {
        filename,
        processing_date: processing_date(),
        default_register_id: "01",
    }
}

/// The canonical single-reading D0010 flow
pub fn strict_uff_single() -> &'static str {
    "ZHD|D0010|001|A|B|20241007|120000|\n\
     026|1234567890123|E|\n\
     028|01|210|kWh|MTR1|A|20240901|000000|20241001|000000|100.00|N|\n\
     029|2|20241001|000000|105.50|C|A|20241007 120000|\n\
     ZTR|1|"
}

/// D0010 flow with two meter points and both window halves read
pub fn strict_uff_multi() -> &'static str {
    "ZHD|D0010002|002|SUPP|DC01|20241007|093000|APP7|\n\
     026|1200023305967|E|\n\
     028|01|00210|kWh|E10BG50326|A|20240901|000000|20241001|000000|4321.0|N|\n\
     029|1|20240901|000000|4200.5|S|R|20241007 093000|\n\
     029|2|20241001|000000|4321.0|E|E|20241007 093000|\n\
     028|02|00043|kWh|E10BG50326|A|20240901|000000|20241001|000000|123.4|N|\n\
     029|2||||||\n\
     026|2000056789012|G|\n\
     028|01||m3|G4AB1234|E|20240901|000000|20241001|000000|88.0|N|\n\
     029|2|20241001|000000|88.0|X|M|20241007 093000|\n\
     ZTR|4|"
}

/// Lenient ZHV flow
pub fn fallback_uff() -> &'static str {
    "ZHV|D0010001|001|SUPPLIER|RECIPIENT|20251007|120000|\n\
     026|1200023305967|E|\n\
     028|MTR001|\n\
     030|A|20251007|1234.56|||M|\n\
     030|E|20251008120000|1240.00|\n\
     026|987654|E|\n\
     028|MTR002|S|\n\
     030|C|20251007|42|\n\
     ZPT|3|"
}
