//! Format detection from filename and leading content.
//!
//! Detection is total: every input maps to exactly one `FileFormat`, with
//! TXT as the universal fallback.

use crate::constants::{PDF_MAGIC, UFF_SIGNATURES, UTF8_BOM};
use crate::models::FileFormat;
use crate::parsers::tabular::Column;
use std::path::Path;
use tracing::debug;

/// Detect the format of a file from its name and its first bytes.
///
/// Extension wins over content; content sniffing runs for every other
/// extension, `.txt` included. `head` may be the whole file or any prefix of it.
pub fn detect_format(filename: &str, head: &[u8]) -> FileFormat {
    if let Some(format) = format_from_extension(filename) {
        debug!("Detected {} from extension of {}", format, filename);
        return format;
    }

    let format = sniff_content(head);
    debug!("Detected {} from content of {}", format, filename);
    format
}

fn format_from_extension(filename: &str) -> Option<FileFormat> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())?
        .to_ascii_lowercase();

    match extension.as_str() {
        "uff" => Some(FileFormat::Uff),
        "pdf" => Some(FileFormat::Pdf),
        "csv" => Some(FileFormat::Csv),
        "json" => Some(FileFormat::Json),
        "xml" => Some(FileFormat::Xml),
        _ => None,
    }
}

/// Classify content by its leading bytes
pub fn sniff_content(head: &[u8]) -> FileFormat {
    if head.starts_with(PDF_MAGIC) {
        return FileFormat::Pdf;
    }

    let head = head.strip_prefix(UTF8_BOM).unwrap_or(head);
    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim_start();

    if UFF_SIGNATURES.iter().any(|sig| trimmed.starts_with(sig)) {
        return FileFormat::Uff;
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return FileFormat::Json;
    }
    if trimmed.starts_with('<') {
        return FileFormat::Xml;
    }

    let first_line = trimmed.lines().next().unwrap_or("");
    if looks_like_csv_header(first_line) {
        return FileFormat::Csv;
    }

    FileFormat::Txt
}

/// A comma-separated first line with no pipe or tab delimiters that names
/// every required column. Headerless comma data falls through to TXT.
fn looks_like_csv_header(line: &str) -> bool {
    if !line.contains(',') || line.contains('|') || line.contains('\t') {
        return false;
    }

    let named: Vec<Column> = line
        .split(',')
        .filter_map(|field| Column::from_name(field.trim().trim_matches('"')))
        .collect();
    Column::REQUIRED.iter().all(|column| named.contains(column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_wins() {
        assert_eq!(detect_format("flow.UFF", b"anything"), FileFormat::Uff);
        assert_eq!(detect_format("scan.pdf", b"ZHD|x"), FileFormat::Pdf);
        assert_eq!(detect_format("data.csv", b"{}"), FileFormat::Csv);
        assert_eq!(detect_format("data.json", b"a,b"), FileFormat::Json);
        assert_eq!(detect_format("data.xml", b""), FileFormat::Xml);
    }

    #[test]
    fn test_txt_extension_is_sniffed() {
        assert_eq!(detect_format("flow.txt", b"ZHD|D0010|001|"), FileFormat::Uff);
        assert_eq!(detect_format("notes.TXT", b"ZHV|x"), FileFormat::Uff);
        assert_eq!(
            detect_format("export.txt", b"{\"readings\": []}"),
            FileFormat::Json
        );
        assert_eq!(detect_format("export.txt", b"<readings/>"), FileFormat::Xml);
        assert_eq!(
            detect_format("export.txt", b"mpan,serial,reading\n1,2,3"),
            FileFormat::Csv
        );
        assert_eq!(
            detect_format("notes.txt", b"1200023305967|MTR001|1.0"),
            FileFormat::Txt
        );
    }

    #[test]
    fn test_csv_needs_header_row() {
        assert_eq!(
            detect_format("upload", b"1200023305967,MTR001,1234.56,2025-10-07"),
            FileFormat::Txt
        );
        assert_eq!(
            detect_format("upload", b"Meter_Point, Serial_Number, Value\n1,2,3"),
            FileFormat::Csv
        );
        assert_eq!(
            detect_format("upload", b"\"mpan\",\"serial\",\"reading\"\n"),
            FileFormat::Csv
        );
        // A header missing the serial column is not enough
        assert_eq!(detect_format("upload", b"mpan,reading,date\n1,2,3"), FileFormat::Txt);
    }

    #[test]
    fn test_content_sniffing() {
        assert_eq!(detect_format("flow", b"ZHD|D0010|001|"), FileFormat::Uff);
        assert_eq!(detect_format("flow.dat", b"\n  ZHV|1|2"), FileFormat::Uff);
        assert_eq!(detect_format("upload", b"  [{\"mpan\": 1}]"), FileFormat::Json);
        assert_eq!(detect_format("upload", b"{\"readings\": []}"), FileFormat::Json);
        assert_eq!(detect_format("upload", b"<?xml version=\"1.0\"?>"), FileFormat::Xml);
        assert_eq!(detect_format("upload", b"<readings/>"), FileFormat::Xml);
        assert_eq!(
            detect_format("upload", b"mpan,serial,reading,date\n1,2,3,4"),
            FileFormat::Csv
        );
        assert_eq!(detect_format("upload", b"%PDF-1.4\n..."), FileFormat::Pdf);
    }

    #[test]
    fn test_bom_is_ignored() {
        let mut content = UTF8_BOM.to_vec();
        content.extend_from_slice(b"ZHD|D0010|");
        assert_eq!(detect_format("upload", &content), FileFormat::Uff);
    }

    #[test]
    fn test_pipe_and_tab_lines_are_not_csv() {
        assert_eq!(detect_format("upload", b"a|b,c|d"), FileFormat::Txt);
        assert_eq!(detect_format("upload", b"a\tb,c\td"), FileFormat::Txt);
        assert_eq!(detect_format("upload", b"1200023305967 MTR1 12.5"), FileFormat::Txt);
    }

    #[test]
    fn test_detection_is_total() {
        let samples: Vec<Vec<u8>> = vec![
            vec![],
            vec![0x00],
            vec![0xFF, 0xFE, 0xFD],
            b"   ".to_vec(),
            b"\r\n\r\n".to_vec(),
            (0u8..=255).collect(),
            UTF8_BOM.to_vec(),
            b"ZHD".to_vec(),
        ];

        for sample in samples {
            for name in ["", "x", "x.bin", ".hidden", "dir/file.", "file.tar.gz"] {
                // Must return a tag for every input without panicking
                let _ = detect_format(name, &sample);
            }
        }

        assert_eq!(detect_format("", b""), FileFormat::Txt);
        assert_eq!(detect_format("file.bin", &[0xFF, 0x00]), FileFormat::Txt);
    }
}
