//! Terminal rendering of messages and streamed answers.

use std::fmt::Write as _;

use slm_core::constants::CITATION_SEPARATOR;
use slm_core::messages::{Message, Part, Role};

/// Tracks how much of the in-flight answer has been printed.
///
/// Each `MessageUpdated` carries the whole message, so the printer emits
/// only the new tail. Text from the citation separator onward is held back;
/// the settled message supplies the real ending.
#[derive(Debug, Default)]
pub struct StreamPrinter {
    printed: String,
}

impl StreamPrinter {
    /// Fresh printer for one send.
    pub fn new() -> Self {
        Self::default()
    }

    /// Text to print for a new snapshot of the streaming message.
    pub fn delta(&mut self, snapshot: &str) -> Option<String> {
        let visible = visible_prefix(snapshot);
        let tail = visible.strip_prefix(self.printed.as_str())?;
        if tail.is_empty() {
            return None;
        }
        let tail = tail.to_owned();
        self.printed.push_str(&tail);
        Some(tail)
    }

    /// Text to print once the message settled, so that the screen ends up
    /// showing the settled answer.
    pub fn finish(&self, settled: &str) -> String {
        let shown = self.printed.trim_end();
        match settled.strip_prefix(shown) {
            Some(rest) if !shown.is_empty() => rest.to_owned(),
            _ if shown.is_empty() => settled.to_owned(),
            _ => format!("\n{settled}"),
        }
    }
}

/// Longest prefix that cannot be part of the citation block. A trailing
/// partial separator is held back too.
fn visible_prefix(text: &str) -> &str {
    if let Some(at) = text.find(CITATION_SEPARATOR) {
        return &text[..at];
    }
    let sep = CITATION_SEPARATOR.as_bytes();
    for keep in (1..sep.len()).rev() {
        if text.len() >= keep
            && text.is_char_boundary(text.len() - keep)
            && text.as_bytes().ends_with(&sep[..keep])
        {
            return &text[..text.len() - keep];
        }
    }
    text
}

/// Citations as a numbered list, or `None` when there are none.
pub fn citations(message: &Message) -> Option<String> {
    let list = message.citations.as_deref().filter(|c| !c.is_empty())?;
    let mut out = String::from("Sources:");
    for (i, c) in list.iter().enumerate() {
        let _ = write!(out, "\n  [{}] {}: \"{}\"", i + 1, c.file_name, c.quote);
    }
    Some(out)
}

/// One history entry with its id, role, text, and attachment count.
#[allow(clippy::cast_precision_loss)]
pub fn history_entry(message: &Message) -> String {
    let who = match message.role {
        Role::User => "you",
        Role::Model => "slm",
    };
    let attachments = message
        .parts
        .iter()
        .filter(|p| matches!(p, Part::InlineData { .. }))
        .count();
    let mut out = format!("[{}] {who}: {}", message.id, message.text_content());
    if attachments > 0 {
        let _ = write!(out, " (+{attachments} attachment(s))");
    }
    if let Some(ms) = message.generation_time_ms {
        let _ = write!(out, " ({:.1}s)", ms as f64 / 1000.0);
    }
    out
}
