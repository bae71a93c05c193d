//! XML reading documents
//!
//! Any element named `reading` (case-insensitive, at any depth) is one
//! reading. Fields come from its attributes or from child elements with the
//! same names; attributes are read first and child elements override them.

use super::tabular::{Column, RawReading, collect};
use super::{ParseContext, ParseOutput, ParserKind, RecordParser, WarningLog};
use crate::constants::{UTF8_BOM, XML_READING_ELEMENT};
use crate::error::{ImportError, Result};
use crate::models::FileFormat;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct XmlParser;

/// Reading element currently being assembled
struct OpenReading {
    raw: RawReading,
    index: usize,
    /// Depth of nested child elements below the reading element
    depth: usize,
    field: Option<Column>,
}

impl RecordParser for XmlParser {
    fn kind(&self) -> ParserKind {
        ParserKind::Xml
    }

    fn parse(&self, input: &[u8], ctx: &ParseContext<'_>) -> Result<ParseOutput> {
        let input = input.strip_prefix(UTF8_BOM).unwrap_or(input);
        let invalid =
            |reason: String| ImportError::invalid_document(ctx.filename, FileFormat::Xml, reason);

        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);

        let mut warnings = WarningLog::new(ctx.filename);
        let mut records = Vec::new();
        let mut buf = Vec::new();
        let mut open: Option<OpenReading> = None;
        let mut element_depth = 0usize;
        let mut seen_root = false;
        let mut element_count = 0usize;

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| {
                invalid(format!("at byte {}: {}", reader.buffer_position(), e))
            })?;

            match event {
                Event::Start(element) => {
                    element_depth += 1;
                    seen_root = true;
                    match open.as_mut() {
                        Some(reading) => {
                            reading.depth += 1;
                            reading.field = Column::from_name(&local_name(&element));
                        }
                        None if is_reading(&element) => {
                            element_count += 1;
                            open = Some(OpenReading {
                                raw: attribute_reading(&element).map_err(invalid)?,
                                index: element_count,
                                depth: 0,
                                field: None,
                            });
                        }
                        None => {}
                    }
                }
                Event::Empty(element) => {
                    seen_root = true;
                    if open.is_none() && is_reading(&element) {
                        element_count += 1;
                        let raw = attribute_reading(&element).map_err(invalid)?;
                        collect(raw, element_count, ctx, &mut records, &mut warnings);
                    }
                }
                Event::Text(text) => {
                    if let Some(reading) = open.as_mut() {
                        if let Some(column) = reading.field {
                            let value = text.unescape().map_err(|e| invalid(e.to_string()))?;
                            reading.raw.set(column, value);
                        }
                    }
                }
                Event::CData(data) => {
                    if let Some(reading) = open.as_mut() {
                        if let Some(column) = reading.field {
                            reading
                                .raw
                                .set(column, String::from_utf8_lossy(&data.into_inner()));
                        }
                    }
                }
                Event::End(_) => {
                    element_depth = element_depth.saturating_sub(1);
                    match open.as_mut() {
                        Some(reading) if reading.depth > 0 => {
                            reading.depth -= 1;
                            reading.field = None;
                        }
                        Some(_) => {
                            if let Some(reading) = open.take() {
                                collect(reading.raw, reading.index, ctx, &mut records, &mut warnings);
                            }
                        }
                        None => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !seen_root {
            return Err(invalid("document has no root element".to_string()));
        }
        if element_depth != 0 || open.is_some() {
            return Err(invalid("unexpected end of document".to_string()));
        }

        debug!("{}: {} reading elements", ctx.filename, element_count);
        info!(
            "{}: parsed {} readings from XML ({} warnings)",
            ctx.filename,
            records.len(),
            warnings.len()
        );
        Ok(ParseOutput::new(self.kind(), records, warnings.into_inner()))
    }
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

fn is_reading(element: &BytesStart<'_>) -> bool {
    element
        .local_name()
        .as_ref()
        .eq_ignore_ascii_case(XML_READING_ELEMENT.as_bytes())
}

/// Collect reading fields carried as attributes
fn attribute_reading(element: &BytesStart<'_>) -> std::result::Result<RawReading, String> {
    let mut raw = RawReading::default();
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| e.to_string())?;
        let name = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        if let Some(column) = Column::from_name(&name) {
            let value = attribute.unescape_value().map_err(|e| e.to_string())?;
            raw.set(column, value);
        }
    }
    Ok(raw)
}
