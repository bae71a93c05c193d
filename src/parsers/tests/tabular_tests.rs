//! Tests for the CSV, JSON, XML and plain-text parsers

use super::{processing_date, test_context};
use crate::error::ImportError;
use crate::models::{FileFormat, ReadingType};
use crate::parsers::{
    CsvParser, JsonParser, ParseOutput, RecordParser, TextParser, WarningKind, XmlParser,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::str::FromStr;

fn kinds(output: &ParseOutput) -> Vec<WarningKind> {
    output.warnings.iter().map(|w| w.kind).collect()
}

fn october_7() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 7).unwrap()
}

#[test]
fn test_csv_round_trip() {
    let ctx = test_context("readings.csv");
    let input = "mpan,serial,reading,date\n1200023305967,MTR001,1234.56,2025-10-07\n";
    let output = CsvParser.parse(input.as_bytes(), &ctx).unwrap();

    assert!(output.warnings.is_empty(), "{:?}", output.warnings);
    assert_eq!(output.records.len(), 1);
    let record = &output.records[0];
    assert_eq!(record.mpan, "1200023305967");
    assert_eq!(record.meter_serial, "MTR001");
    assert_eq!(record.reading_value, BigDecimal::from_str("1234.56").unwrap());
    assert_eq!(record.reading_date, october_7());
    assert_eq!(record.register_id, "01");
    assert_eq!(record.reading_type, ReadingType::Actual);
    assert_eq!(record.measurement_method, "");
    assert_eq!(record.source_line, 2);
    assert!(output.header.is_none());
}

#[test]
fn test_csv_aliases_delimiter_and_optional_columns() {
    let ctx = test_context("export.csv");
    let input = "Meter_Point;Serial_Number;Value;Reading_Date;Register;Type\n\
                 1200023305967;MTR001;10.5;07/10/2025;02;E\n\
                 1200023305967;MTR001;11;;;\n";
    let output = CsvParser.parse(input.as_bytes(), &ctx).unwrap();

    assert!(output.warnings.is_empty(), "{:?}", output.warnings);
    assert_eq!(output.records.len(), 2);
    assert_eq!(output.records[0].register_id, "02");
    assert_eq!(output.records[0].reading_type, ReadingType::Estimate);
    assert_eq!(output.records[0].reading_date, october_7());
    assert_eq!(output.records[1].register_id, "01");
    assert_eq!(output.records[1].reading_date, processing_date());
}

#[test]
fn test_csv_bad_rows_become_warnings() {
    let ctx = test_context("bad.csv");
    let input = "mpan,serial,reading,date\n\
                 1200023305967,MTR001,abc,2025-10-07\n\
                 1200023305967,,5,2025-10-07\n\
                 1200023305967,MTR001,-5,2025-10-07\n\
                 1200023305967,MTR001,5,2025-13-07\n\
                 1200023305967,MTR001,5\n";
    let output = CsvParser.parse(input.as_bytes(), &ctx).unwrap();

    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].source_line, 6);
    assert_eq!(
        kinds(&output),
        vec![
            WarningKind::InvalidField,
            WarningKind::MissingField,
            WarningKind::InvalidField,
            WarningKind::InvalidField,
        ]
    );
    assert_eq!(output.warnings[1].line, 3);
}

#[test]
fn test_csv_without_usable_header_yields_nothing() {
    let ctx = test_context("noheader.csv");
    let input = "1200023305967,MTR001,1234.56,2025-10-07\n";
    let output = CsvParser.parse(input.as_bytes(), &ctx).unwrap();

    assert!(output.records.is_empty());
    assert_eq!(kinds(&output), vec![WarningKind::InvalidHeader]);

    let output = CsvParser.parse(b"", &ctx).unwrap();
    assert!(output.records.is_empty());
    assert_eq!(output.warnings.len(), 1);
}

#[test]
fn test_json_shapes() {
    let ctx = test_context("readings.json");

    let array = r#"[{"mpan": "1200023305967", "serial": "MTR001", "reading": 1234.56, "date": "2025-10-07"}]"#;
    let output = JsonParser.parse(array.as_bytes(), &ctx).unwrap();
    assert_eq!(output.records.len(), 1);
    assert_eq!(
        output.records[0].reading_value,
        BigDecimal::from_str("1234.56").unwrap()
    );

    let wrapped = r#"{"source": "x", "readings": [
        {"MPAN": 1200023305967, "meter_serial": "MTR001", "value": "7"},
        {"mpan": "1200023305967", "serial": "MTR001"},
        "not an object"
    ]}"#;
    let output = JsonParser.parse(wrapped.as_bytes(), &ctx).unwrap();
    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].mpan, "1200023305967");
    assert_eq!(output.records[0].reading_date, processing_date());
    assert_eq!(
        kinds(&output),
        vec![WarningKind::MissingField, WarningKind::InvalidField]
    );
    assert_eq!(output.warnings[0].line, 2);

    let meters = r#"{"meters": [{"mpan": "1", "serial": "S", "reading": "2", "type": "C"}]}"#;
    let output = JsonParser.parse(meters.as_bytes(), &ctx).unwrap();
    assert_eq!(output.records[0].reading_type, ReadingType::Customer);

    let single = r#"{"mpan": "1200023305967", "serial": "MTR001", "reading": 3}"#;
    let output = JsonParser.parse(single.as_bytes(), &ctx).unwrap();
    assert_eq!(output.records.len(), 1);
}

#[test]
fn test_json_structure_errors_are_fatal() {
    let ctx = test_context("broken.json");
    for input in [r#"[{"mpan": "1""#, "42", r#"{"readings": {"mpan": "1"}}"#] {
        let err = JsonParser.parse(input.as_bytes(), &ctx).unwrap_err();
        assert!(
            matches!(
                err,
                ImportError::InvalidDocument {
                    format: FileFormat::Json,
                    ..
                }
            ),
            "input {} gave {:?}",
            input,
            err
        );
    }
}

#[test]
fn test_xml_attributes_and_children() {
    let ctx = test_context("readings.xml");
    let input = r#"<?xml version="1.0" encoding="UTF-8"?>
<export>
  <meters>
    <reading mpan="1200023305967" serial="MTR001" value="1234.56" date="2025-10-07"/>
    <Reading mpan="1200023305967">
      <serial>MTR002</serial>
      <value>99.9</value>
      <register>02</register>
    </Reading>
    <reading mpan="1200023305967" serial="MTR003"></reading>
  </meters>
</export>"#;
    let output = XmlParser.parse(input.as_bytes(), &ctx).unwrap();

    assert_eq!(output.records.len(), 2);
    assert_eq!(output.records[0].reading_date, october_7());
    assert_eq!(output.records[1].meter_serial, "MTR002");
    assert_eq!(output.records[1].register_id, "02");
    assert_eq!(output.records[1].reading_date, processing_date());
    assert_eq!(output.records[1].source_line, 2);
    assert_eq!(kinds(&output), vec![WarningKind::MissingField]);
    assert_eq!(output.warnings[0].line, 3);
}

#[test]
fn test_malformed_xml_is_fatal() {
    let ctx = test_context("broken.xml");
    for input in [
        "<readings><reading mpan=\"1\"></readings>",
        "<readings><reading mpan=\"1\"/>",
        "",
    ] {
        let err = XmlParser.parse(input.as_bytes(), &ctx).unwrap_err();
        assert!(
            matches!(
                err,
                ImportError::InvalidDocument {
                    format: FileFormat::Xml,
                    ..
                }
            ),
            "input {:?} gave {:?}",
            input,
            err
        );
    }
}

#[test]
fn test_text_lines() {
    let ctx = test_context("readings.txt");
    let input = "mpan|serial|reading|date\n\
                 1200023305967|MTR001|1234.56|2025-10-07\n\
                 \n\
                 1200023305967\tMTR002\t10\n\
                 1200023305967,MTR003,11,20251007\n\
                 1200023305967 MTR004 12\n\
                 just two\n\
                 1200023305967|MTR005|lots\n";
    let output = TextParser.parse(input.as_bytes(), &ctx).unwrap();

    let serials: Vec<&str> = output
        .records
        .iter()
        .map(|r| r.meter_serial.as_str())
        .collect();
    assert_eq!(serials, vec!["MTR001", "MTR002", "MTR003", "MTR004"]);
    assert_eq!(output.records[0].reading_date, october_7());
    assert_eq!(output.records[1].reading_date, processing_date());
    assert_eq!(output.records[2].reading_date, october_7());
    assert_eq!(
        kinds(&output),
        vec![WarningKind::MissingField, WarningKind::InvalidField]
    );
    assert_eq!(output.warnings[0].line, 7);
}
