//! Citation block decoder.
//!
//! The model is instructed to end its answer with
//! [`CITATION_SEPARATOR`] followed by a JSON array of
//! `{"fileName", "quote"}` objects. Decoding is a pure function of the final
//! buffer and the cancelled flag:
//!
//! 1. No separator: the whole trimmed buffer is the answer.
//! 2. Split on the first separator only. In the right segment, slice from
//!    the first `[` to the last `]` and parse it as a JSON array.
//! 3. Elements missing a string `fileName` or `quote` are dropped. Anything
//!    else unusable (no brackets, invalid JSON, not an array) appends
//!    [`CITATION_PARSE_FAILURE_SUFFIX`].
//! 4. A cancelled send appends [`GENERATION_STOPPED_SUFFIX`] last.
//!
//! The bracket scan is flat: a `]` inside a quoted string after the real
//! array end would widen the slice and fail the parse, which lands in the
//! diagnostic path rather than crashing.

use serde_json::Value;
use slm_core::constants::{
    CITATION_PARSE_FAILURE_SUFFIX, CITATION_SEPARATOR, GENERATION_STOPPED_SUFFIX, SUFFIX_GAP,
};
use slm_core::messages::{Citation, Message, Part};

/// How the citation block fared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CitationOutcome {
    /// No separator in the buffer.
    Absent,
    /// Separator present and the array parsed.
    Parsed,
    /// Separator present but the block was unusable.
    Malformed,
}

impl CitationOutcome {
    /// Label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Parsed => "parsed",
            Self::Malformed => "malformed",
        }
    }
}

/// Result of decoding a final buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedResponse {
    /// Answer text with any suffixes applied.
    pub answer: String,
    /// Citations in the order the model listed them.
    pub citations: Vec<Citation>,
    /// Citation block outcome.
    pub outcome: CitationOutcome,
}

/// Decode the accumulated buffer of one send.
pub fn decode(buffer: &str, cancelled: bool) -> DecodedResponse {
    let (mut answer, citations, outcome) = match buffer.split_once(CITATION_SEPARATOR) {
        None => (buffer.trim().to_owned(), Vec::new(), CitationOutcome::Absent),
        Some((left, right)) => {
            let answer = left.trim().to_owned();
            match parse_citation_block(right) {
                Some(citations) => (answer, citations, CitationOutcome::Parsed),
                None => (
                    with_suffix(&answer, CITATION_PARSE_FAILURE_SUFFIX),
                    Vec::new(),
                    CitationOutcome::Malformed,
                ),
            }
        }
    };

    if cancelled {
        answer = with_suffix(&answer, GENERATION_STOPPED_SUFFIX);
    }

    DecodedResponse {
        answer,
        citations,
        outcome,
    }
}

/// Turn `message` into its settled form: a single text part holding the
/// answer, the citations, and the generation time.
pub fn finalize(message: &mut Message, decoded: DecodedResponse, generation_time_ms: u64) {
    message.parts = vec![Part::text(decoded.answer)];
    message.citations = Some(decoded.citations);
    message.generation_time_ms = Some(generation_time_ms);
}

fn with_suffix(answer: &str, suffix: &str) -> String {
    format!("{answer}{SUFFIX_GAP}{suffix}").trim().to_owned()
}

fn parse_citation_block(block: &str) -> Option<Vec<Citation>> {
    let start = block.find('[')?;
    let end = block.rfind(']')?;
    if end <= start {
        return None;
    }
    let Value::Array(items) = serde_json::from_str::<Value>(&block[start..=end]).ok()? else {
        return None;
    };
    Some(items.into_iter().filter_map(citation_from_value).collect())
}

fn citation_from_value(value: Value) -> Option<Citation> {
    let Value::Object(obj) = value else {
        return None;
    };
    let file_name = obj.get("fileName")?.as_str()?;
    let quote = obj.get("quote")?.as_str()?;
    Some(Citation {
        file_name: file_name.to_owned(),
        quote: quote.to_owned(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
