//! JSON reading documents
//!
//! Accepted shapes: a top-level array of reading objects, an object holding
//! such an array under `readings` or `meters`, or a single reading object.

use super::tabular::{Column, RawReading, collect};
use super::{ParseContext, ParseOutput, ParserKind, RecordParser, WarningKind, WarningLog};
use crate::constants::{JSON_COLLECTION_KEYS, UTF8_BOM};
use crate::error::{ImportError, Result};
use crate::models::FileFormat;
use serde_json::{Map, Value};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl RecordParser for JsonParser {
    fn kind(&self) -> ParserKind {
        ParserKind::Json
    }

    fn parse(&self, input: &[u8], ctx: &ParseContext<'_>) -> Result<ParseOutput> {
        let input = input.strip_prefix(UTF8_BOM).unwrap_or(input);
        let document: Value = serde_json::from_slice(input).map_err(|e| {
            ImportError::invalid_document(ctx.filename, FileFormat::Json, e.to_string())
        })?;

        let elements = reading_elements(&document)
            .map_err(|reason| ImportError::invalid_document(ctx.filename, FileFormat::Json, reason))?;
        debug!("{}: {} JSON reading elements", ctx.filename, elements.len());

        let mut warnings = WarningLog::new(ctx.filename);
        let mut records = Vec::new();

        for (index, element) in elements.into_iter().enumerate() {
            let line = index + 1;
            match element.as_object() {
                Some(object) => collect(raw_reading(object), line, ctx, &mut records, &mut warnings),
                None => warnings.push(
                    line,
                    WarningKind::InvalidField,
                    format!("Reading element is not an object: {}", element),
                ),
            }
        }

        info!(
            "{}: parsed {} readings from JSON ({} warnings)",
            ctx.filename,
            records.len(),
            warnings.len()
        );
        Ok(ParseOutput::new(self.kind(), records, warnings.into_inner()))
    }
}

/// Locate the reading elements in a parsed document
fn reading_elements(document: &Value) -> std::result::Result<Vec<&Value>, String> {
    match document {
        Value::Array(items) => Ok(items.iter().collect()),
        Value::Object(object) => {
            let collection = object.iter().find(|(key, _)| {
                JSON_COLLECTION_KEYS
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(key))
            });
            match collection {
                Some((_, Value::Array(items))) => Ok(items.iter().collect()),
                Some((key, _)) => Err(format!("'{}' must be an array of readings", key)),
                None => Ok(vec![document]),
            }
        }
        other => Err(format!(
            "expected an array or object at top level, found {}",
            type_name(other)
        )),
    }
}

fn raw_reading(object: &Map<String, Value>) -> RawReading {
    let mut raw = RawReading::default();
    for (key, value) in object {
        let Some(column) = Column::from_name(key) else {
            continue;
        };
        match value {
            Value::String(text) => raw.set(column, text),
            Value::Number(number) => raw.set(column, number.to_string()),
            Value::Bool(flag) => raw.set(column, flag.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => {}
        }
    }
    raw
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
