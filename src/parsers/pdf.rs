//! Best-effort text extraction from PDF containers
//!
//! Suppliers sometimes wrap a UFF flow (or a plain reading list) in a PDF.
//! Rather than interpret the PDF object model, the container bytes are
//! decoded in a fixed order of attempts:
//!
//! 1. strict UTF-8
//! 2. Windows-1252 (a Latin-1 superset; never fails)
//! 3. runs of printable ASCII bytes, one per line
//!
//! The first attempt containing a UFF header signature is cut at that
//! signature and handed to the matching D0010 parser. Otherwise the first
//! readable decoding goes to the plain-text parser.

use super::{
    D0010FallbackParser, D0010StandardParser, ParseContext, ParseOutput, ParserKind,
    RecordParser, TextParser,
};
use crate::constants::{
    MIN_PRINTABLE_RUN, READABLE_TEXT_RATIO, UFF_SIGNATURES, uff_fallback,
};
use crate::error::{ImportError, Result};
use encoding_rs::WINDOWS_1252;
use regex::bytes::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;
use tracing::{debug, info};

static PRINTABLE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?-u)[\x20-\x7E\t]{{{},}}", MIN_PRINTABLE_RUN))
        .expect("valid printable run regex")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerExtractor;

/// Decoding strategy, in the order attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeAttempt {
    Utf8,
    Latin1,
    PrintableRuns,
}

impl DecodeAttempt {
    pub const ORDER: [DecodeAttempt; 3] = [
        DecodeAttempt::Utf8,
        DecodeAttempt::Latin1,
        DecodeAttempt::PrintableRuns,
    ];

    /// Decode the container, or `None` when this strategy does not apply
    pub fn decode(self, input: &[u8]) -> Option<Cow<'_, str>> {
        match self {
            DecodeAttempt::Utf8 => std::str::from_utf8(input).ok().map(Cow::Borrowed),
            DecodeAttempt::Latin1 => Some(WINDOWS_1252.decode_without_bom_handling(input).0),
            DecodeAttempt::PrintableRuns => {
                let runs: Vec<Cow<'_, str>> = PRINTABLE_RUN
                    .find_iter(input)
                    .map(|run| String::from_utf8_lossy(run.as_bytes()))
                    .collect();
                Some(Cow::Owned(runs.join("\n")))
            }
        }
    }
}

impl RecordParser for ContainerExtractor {
    fn kind(&self) -> ParserKind {
        ParserKind::Pdf
    }

    fn parse(&self, input: &[u8], ctx: &ParseContext<'_>) -> Result<ParseOutput> {
        let decodings: Vec<(DecodeAttempt, Cow<'_, str>)> = DecodeAttempt::ORDER
            .into_iter()
            .filter_map(|attempt| attempt.decode(input).map(|text| (attempt, text)))
            .collect();

        if !decodings
            .iter()
            .any(|(_, text)| text.chars().any(char::is_alphanumeric))
        {
            return Err(ImportError::unreadable_container(ctx.filename));
        }

        for (attempt, text) in &decodings {
            let text: &str = text;
            if let Some((offset, signature)) = find_uff_signature(text) {
                info!(
                    "{}: found embedded {} flow via {:?} decoding",
                    ctx.filename, signature, attempt
                );
                let flow = text[offset..].as_bytes();
                return if signature == uff_fallback::HEADER {
                    D0010FallbackParser.parse(flow, ctx)
                } else {
                    D0010StandardParser.parse(flow, ctx)
                };
            }
        }

        let (attempt, text) = best_decoding(&decodings);
        info!(
            "{}: no UFF flow in container, reading {:?} text as plain lines",
            ctx.filename, attempt
        );
        let cleaned = strip_control_chars(text);
        TextParser.parse(cleaned.as_bytes(), ctx)
    }
}

/// Earliest UFF header signature in the text, with its record token
fn find_uff_signature(text: &str) -> Option<(usize, &'static str)> {
    UFF_SIGNATURES
        .iter()
        .copied()
        .filter_map(|signature| {
            text.find(signature)
                .map(|offset| (offset, signature.trim_end_matches('|')))
        })
        .min_by_key(|(offset, _)| *offset)
}

/// Share of characters that are printable or line structure
pub fn printable_ratio(text: &str) -> f64 {
    let (total, printable) = text.chars().fold((0usize, 0usize), |(total, printable), c| {
        let ok = !c.is_control() || matches!(c, '\n' | '\r' | '\t');
        (total + 1, printable + usize::from(ok))
    });
    if total == 0 {
        0.0
    } else {
        printable as f64 / total as f64
    }
}

/// First readable decoding, else the one with the highest printable ratio
fn best_decoding<'d, 'a>(decodings: &'d [(DecodeAttempt, Cow<'a, str>)]) -> (DecodeAttempt, &'d str) {
    let scored = decodings
        .iter()
        .map(|(attempt, text)| (*attempt, &**text, printable_ratio(text)));

    let mut best: Option<(DecodeAttempt, &str, f64)> = None;
    for (attempt, text, ratio) in scored {
        debug!("{:?} decoding printable ratio {:.3}", attempt, ratio);
        if ratio >= READABLE_TEXT_RATIO {
            return (attempt, text);
        }
        if best.is_none_or(|(_, _, best_ratio)| ratio > best_ratio) {
            best = Some((attempt, text, ratio));
        }
    }

    best.map(|(attempt, text, _)| (attempt, text))
        .unwrap_or((DecodeAttempt::PrintableRuns, ""))
}

fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect()
}
