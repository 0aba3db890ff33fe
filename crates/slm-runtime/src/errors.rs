//! Runtime error types.

use slm_core::rules::LogicFileError;

use crate::distillation::DistillationError;

/// Errors returned by [`Session`](crate::Session) operations.
///
/// Generation failures never appear here: a failing source is replaced by a
/// fallback fragment and the send still settles.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Another send or distillation is still outstanding.
    #[error("Session busy: {0}")]
    SessionBusy(String),

    /// Distillation failed (rate limited, empty history, or generic).
    #[error(transparent)]
    Distillation(#[from] DistillationError),

    /// Uploaded logic file was rejected. Current rules are unchanged.
    #[error(transparent)]
    LogicFile(#[from] LogicFileError),

    /// A message must carry at least one part.
    #[error("Message has no content")]
    EmptyMessage,

    /// Rule text was empty after trimming.
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// No rule at the given position.
    #[error("Rule index {0} out of range")]
    RuleNotFound(usize),

    /// No message with the given id.
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// Snapshot or logic serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RuntimeError {
    /// Whether the user can simply try again later.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::SessionBusy(_) => true,
            Self::Distillation(e) => e.is_rate_limited(),
            Self::LogicFile(_)
            | Self::EmptyMessage
            | Self::InvalidRule(_)
            | Self::RuleNotFound(_)
            | Self::MessageNotFound(_)
            | Self::Serialization(_) => false,
        }
    }

    /// Error category string for logs and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::SessionBusy(_) => "session_busy",
            Self::Distillation(e) => e.category(),
            Self::LogicFile(_) => "logic_file",
            Self::EmptyMessage => "empty_message",
            Self::InvalidRule(_) => "invalid_rule",
            Self::RuleNotFound(_) => "rule_not_found",
            Self::MessageNotFound(_) => "message_not_found",
            Self::Serialization(_) => "serialization",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_is_recoverable() {
        let err = RuntimeError::SessionBusy("send in flight".into());
        assert!(err.is_recoverable());
        assert_eq!(err.category(), "session_busy");
        assert_eq!(err.to_string(), "Session busy: send in flight");
    }

    #[test]
    fn distillation_category_passes_through() {
        let err = RuntimeError::from(DistillationError::RateLimited {
            message: "429".into(),
        });
        assert!(err.is_recoverable());
        assert_eq!(err.category(), "rate_limited");

        let err = RuntimeError::from(DistillationError::EmptyHistory);
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), "empty_history");
    }

    #[test]
    fn logic_file_error_keeps_message() {
        let err = RuntimeError::from(LogicFileError::Format("logic[0] is not a string".into()));
        assert_eq!(err.category(), "logic_file");
        assert!(err.to_string().contains("logic[0] is not a string"));
    }
}
