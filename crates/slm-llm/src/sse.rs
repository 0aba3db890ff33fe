//! # SSE Parser
//!
//! Turns a chunked HTTP body into the payloads of its `data:` lines.
//!
//! - Line buffering across chunk boundaries (`\n` or `\r\n`)
//! - Comments, blank lines, non-data fields, and `[DONE]` are skipped
//! - A trailing unterminated `data:` line is still delivered at end of body
//! - A transport read error is yielded once as [`ProviderError::SseParse`]
//!   and ends the stream, so callers can tell truncation from completion

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio_stream::StreamExt;
use tracing::warn;

use crate::provider::{ProviderError, ProviderResult};

/// Parse SSE lines from a byte stream, yielding raw `data:` payloads.
pub fn parse_sse_lines<S, E>(byte_stream: S) -> impl Stream<Item = ProviderResult<String>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::fmt::Display + Send + 'static,
{
    futures::stream::unfold(
        (byte_stream, BytesMut::with_capacity(8192), false),
        |(mut stream, mut buffer, done)| async move {
            if done {
                return None;
            }

            loop {
                if let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let mut line_bytes = buffer.split_to(newline_pos + 1);
                    line_bytes.truncate(line_bytes.len() - 1);
                    if line_bytes.last() == Some(&b'\r') {
                        line_bytes.truncate(line_bytes.len() - 1);
                    }

                    let Ok(line) = std::str::from_utf8(&line_bytes) else {
                        warn!("skipping SSE line with invalid UTF-8");
                        continue;
                    };

                    if let Some(data) = extract_sse_data(line) {
                        return Some((Ok(data), (stream, buffer, false)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        warn!(error = %e, "SSE stream read error");
                        let err = ProviderError::SseParse {
                            message: e.to_string(),
                        };
                        return Some((Err(err), (stream, buffer, true)));
                    }
                    None => {
                        if buffer.is_empty() {
                            return None;
                        }
                        let data = std::str::from_utf8(&buffer)
                            .ok()
                            .and_then(|s| extract_sse_data(s.trim()));
                        buffer.clear();
                        return data.map(|d| (Ok(d), (stream, buffer, true)));
                    }
                }
            }
        },
    )
}

/// Extract the payload of an SSE `data:` line.
fn extract_sse_data(line: &str) -> Option<String> {
    let trimmed = line.trim();

    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }

    let data = trimmed
        .strip_prefix("data: ")
        .or_else(|| trimmed.strip_prefix("data:"))?
        .trim();

    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    Some(data.to_string())
}

/// Parse JSON from an SSE payload, logging a truncated preview on failure.
pub fn parse_sse_data<T: serde::de::DeserializeOwned>(data: &str, provider: &str) -> Option<T> {
    match serde_json::from_str(data) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(
                provider = provider,
                error = %e,
                data_preview = slm_core::text::truncate_str(data, 100),
                "failed to parse SSE data"
            );
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
