//! End-to-end behaviour of single-file and batch imports

use super::{single_reading_flow, test_config, three_reading_flow};
use crate::models::{FileFormat, FileStatus, ReadingType};
use crate::parsers::{ParserKind, WarningKind};
use crate::pipeline::{ImportPipeline, Outcome, compute_checksum};
use crate::store::{InMemoryStore, MeterStore};
use bigdecimal::BigDecimal;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

#[test]
fn test_strict_flow_import() {
    let store = InMemoryStore::new();
    let pipeline = ImportPipeline::new(&store, test_config());

    let outcome = pipeline.import_file("flow.uff", single_reading_flow().as_bytes());

    assert_eq!(outcome.outcome, Outcome::Imported, "{:?}", outcome.error_message);
    assert_eq!(outcome.detected_format, Some(FileFormat::Uff));
    assert_eq!(outcome.parser, Some(ParserKind::UffStrict));
    assert_eq!(outcome.records_processed, 1);
    assert_eq!(outcome.meters_created, 1);
    assert_eq!(outcome.readings_created, 1);
    assert!(outcome.warnings.is_empty());

    let files = store.flow_files().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].status, FileStatus::Imported);
    assert_eq!(files[0].record_count, 1);
    assert_eq!(files[0].checksum, compute_checksum(single_reading_flow().as_bytes()));
    assert_eq!(files[0].header.flow_reference.as_deref(), Some("D0010"));
    assert_eq!(outcome.flow_file_id, Some(files[0].id));

    let meters = store.meters().unwrap();
    assert_eq!(meters[0].identity.mpan, "1234567890123");
    assert_eq!(meters[0].identity.meter_serial, "MTR1");
    assert_eq!(meters[0].first_flow_file, files[0].id);

    let readings = store.readings().unwrap();
    assert_eq!(readings[0].key.meter_id, meters[0].id);
    assert_eq!(readings[0].key.reading_type, ReadingType::Customer);
    assert_eq!(readings[0].reading_value, BigDecimal::from_str("105.50").unwrap());
    assert_eq!(readings[0].measurement_method, "A");
    assert_eq!(readings[0].tpr_code.as_deref(), Some("210"));
    assert_eq!(readings[0].flow_file, files[0].id);
}

#[test]
fn test_identical_bytes_import_once() {
    let store = InMemoryStore::new();
    let pipeline = ImportPipeline::new(&store, test_config());
    let bytes = three_reading_flow().as_bytes();

    let first = pipeline.import_file("flow.uff", bytes);
    assert_eq!(first.outcome, Outcome::Imported);
    let meters_before = store.meters().unwrap();
    let readings_before = store.readings().unwrap();

    for name in ["flow.uff", "renamed.dat"] {
        let again = pipeline.import_file(name, bytes);
        assert_eq!(again.outcome, Outcome::SkippedDuplicate);
        assert_eq!(again.flow_file_id, first.flow_file_id);
        assert_eq!(again.records_processed, 0);
    }

    assert_eq!(store.meters().unwrap(), meters_before);
    assert_eq!(store.readings().unwrap(), readings_before);
    assert_eq!(store.flow_files().unwrap().len(), 1);
}

#[test]
fn test_record_count_mismatch_still_imports() {
    let store = InMemoryStore::new();
    let pipeline = ImportPipeline::new(&store, test_config());
    let bytes = single_reading_flow().replace("ZTR|1|", "ZTR|9|");

    let outcome = pipeline.import_file("mismatch.uff", bytes.as_bytes());

    assert_eq!(outcome.outcome, Outcome::Imported);
    assert_eq!(outcome.readings_created, 1);
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].kind, WarningKind::RecordCountMismatch);
}

#[test]
fn test_fatal_parse_error_records_failure() {
    let store = InMemoryStore::new();
    let pipeline = ImportPipeline::new(&store, test_config());
    let bytes = b"026|1234567890123|E|\n029|2|20241001|000000|1|A|A||\n";

    let outcome = pipeline.import_file("headless.uff", bytes);

    assert_eq!(outcome.outcome, Outcome::Error);
    assert!(outcome.error_message.as_deref().unwrap().contains("ZHD"));
    assert!(store.meters().unwrap().is_empty());
    assert!(store.readings().unwrap().is_empty());

    let files = store.flow_files().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].status, FileStatus::Error);
    assert_eq!(files[0].detected_format, Some(FileFormat::Uff));
    assert!(files[0].error_message.is_some());

    // Failed content is retried on the same descriptor, not gated
    let again = pipeline.import_file("headless.uff", bytes);
    assert_eq!(again.outcome, Outcome::Error);
    assert_eq!(again.flow_file_id, Some(files[0].id));
    assert_eq!(store.flow_files().unwrap().len(), 1);
}

#[test]
fn test_headerless_comma_lines_import_as_text() {
    let store = InMemoryStore::new();
    let pipeline = ImportPipeline::new(&store, test_config());
    let bytes = b"1200023305967,MTR001,1234.56,2025-10-07\n\
                  1200023305967,MTR001,1240.00,2025-10-08\n";

    let outcome = pipeline.import_file("upload", bytes);

    assert_eq!(outcome.outcome, Outcome::Imported);
    assert_eq!(outcome.detected_format, Some(FileFormat::Txt));
    assert_eq!(outcome.parser, Some(ParserKind::Txt));
    assert_eq!(outcome.readings_created, 2);
    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);

    let single = pipeline.import_file("one", b"1300000000001,MTR9,10.5,2025-10-07");
    assert_eq!(single.readings_created, 1);
}

#[test]
fn test_txt_name_does_not_hide_content() {
    let store = InMemoryStore::new();
    let pipeline = ImportPipeline::new(&store, test_config());

    let flow = pipeline.import_file("flow.txt", three_reading_flow().as_bytes());
    assert_eq!(flow.outcome, Outcome::Imported);
    assert_eq!(flow.detected_format, Some(FileFormat::Uff));
    assert_eq!(flow.parser, Some(ParserKind::UffStrict));
    assert_eq!(flow.readings_created, 3);

    let json = br#"{"readings": [{"mpan": "1400000000001", "serial": "J1", "reading": 5}]}"#;
    let export = pipeline.import_file("export.txt", json);
    assert_eq!(export.outcome, Outcome::Imported);
    assert_eq!(export.parser, Some(ParserKind::Json));
    assert_eq!(export.readings_created, 1);
}

#[test]
fn test_csv_import_and_reading_reuse() {
    let store = InMemoryStore::new();
    let pipeline = ImportPipeline::new(&store, test_config());

    let csv = "mpan,serial,reading,date\n\
               1200023305967,MTR001,1234.56,2025-10-07\n\
               1200023305967,MTR001,1234.56,2025-10-07\n\
               1200023305967,MTR001,1240.00,2025-10-08\n";
    let outcome = pipeline.import_file("readings.csv", csv.as_bytes());
    assert_eq!(outcome.outcome, Outcome::Imported);
    assert_eq!(outcome.records_processed, 3);
    assert_eq!(outcome.meters_created, 1);
    assert_eq!(outcome.readings_created, 2);
    assert_eq!(outcome.duplicates_in_file, 1);

    // Different bytes, one reading already stored, one new
    let json = r#"[
        {"mpan": "1200023305967", "serial": "MTR001", "reading": 1240.00, "date": "2025-10-08"},
        {"mpan": "1200023305967", "serial": "MTR001", "reading": 1250.00, "date": "2025-10-09"}
    ]"#;
    let outcome = pipeline.import_file("later.json", json.as_bytes());
    assert_eq!(outcome.outcome, Outcome::Imported);
    assert_eq!(outcome.detected_format, Some(FileFormat::Json));
    assert_eq!(outcome.meters_created, 0);
    assert_eq!(outcome.readings_created, 1);
    assert_eq!(outcome.readings_already_present, 1);

    assert_eq!(store.meters().unwrap().len(), 1);
    assert_eq!(store.readings().unwrap().len(), 3);
}

#[test]
fn test_reused_filename_warns() {
    let store = InMemoryStore::new();
    let pipeline = ImportPipeline::new(&store, test_config());

    let first = pipeline.import_file("daily.csv", b"mpan,serial,reading\n1,S1,1\n");
    assert!(first.warnings.is_empty());

    let second = pipeline.import_file("daily.csv", b"mpan,serial,reading\n1,S1,2\n");
    assert_eq!(second.outcome, Outcome::Imported);
    assert_eq!(second.warnings.len(), 1);
    assert_eq!(second.warnings[0].kind, WarningKind::ReusedFilename);
    assert_eq!(second.warnings[0].line, 0);
}

#[test]
fn test_pdf_container_falls_back_to_text() {
    let store = InMemoryStore::new();
    let pipeline = ImportPipeline::new(&store, test_config());
    let pdf = b"%PDF-1.4\n1200023305967|MTR001|1234.56|2025-10-07\n%%EOF\n";

    let outcome = pipeline.import_file("statement.pdf", pdf);

    assert_eq!(outcome.outcome, Outcome::Imported);
    assert_eq!(outcome.detected_format, Some(FileFormat::Pdf));
    assert_eq!(outcome.parser, Some(ParserKind::Txt));
    assert_eq!(outcome.readings_created, 1);
    assert_eq!(outcome.warnings.len(), 2);
}

#[test]
fn test_batch_summary() {
    let store = InMemoryStore::new();
    let pipeline = ImportPipeline::new(&store, test_config());

    let files = vec![
        ("a.uff", single_reading_flow().as_bytes().to_vec()),
        ("b.uff", single_reading_flow().as_bytes().to_vec()),
        ("c.json", b"{broken".to_vec()),
        ("d.uff", three_reading_flow().as_bytes().to_vec()),
    ];
    let report = pipeline.import_batch(files);

    assert_eq!(report.outcomes.len(), 4);
    assert_eq!(report.summary.total, 4);
    assert_eq!(report.summary.successful, 2);
    assert_eq!(report.summary.skipped, 1);
    assert_eq!(report.summary.errors, 1);
    assert!(report.has_errors());
    assert_eq!(report.outcomes[2].outcome, Outcome::Error);
    assert_eq!(report.outcomes[3].readings_created, 3);
}

#[test]
fn test_cancelled_batch_reports_every_file() {
    let store = InMemoryStore::new();
    let token = CancellationToken::new();
    let pipeline = ImportPipeline::new(&store, test_config()).with_cancellation(token.clone());
    token.cancel();

    let report = pipeline.import_batch([
        ("a.uff", single_reading_flow()),
        ("b.uff", three_reading_flow()),
    ]);

    assert_eq!(report.summary.errors, 2);
    assert!(
        report
            .outcomes
            .iter()
            .all(|o| o.error_message.as_deref().unwrap().contains("cancelled"))
    );
    assert!(store.flow_files().unwrap().is_empty());
}
