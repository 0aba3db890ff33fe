//! Fixed wire tokens and user-visible strings.
//!
//! These strings are part of the observable contract: the model is told to
//! emit [`CITATION_SEPARATOR`], and callers match on the suffixes to tell a
//! diagnostic answer from a normal one.

/// Rule-set format version written by this build.
pub const APP_VERSION: &str = "2.0.0";

/// Literal token separating the answer from the trailing citation block.
pub const CITATION_SEPARATOR: &str = "---CITATIONS---";

/// Appended to the answer when a citation block is present but unusable.
pub const CITATION_PARSE_FAILURE_SUFFIX: &str = "(Could not parse citations)";

/// Appended to the answer when the user stopped the generation.
pub const GENERATION_STOPPED_SUFFIX: &str = "(Generation stopped by user)";

/// Separator placed between an answer and an appended suffix.
pub const SUFFIX_GAP: &str = "\n\n";

/// Single fragment substituted for a failed generation stream.
pub const GENERATION_FALLBACK_FRAGMENT: &str =
    "Sorry, I encountered an error while processing your request. Please check the logs for details.";

/// Notice shown when a distillation request was rejected for volume.
pub const RATE_LIMITED_NOTICE: &str =
    "You're doing that too fast! Please wait a moment before trying to save another logic point.";

/// Notice shown for any other distillation failure.
pub const DISTILLATION_FAILED_NOTICE: &str = "Failed to generate a new logic point.";

/// Prefix of downloaded rule-set file names.
pub const LOGIC_FILE_PREFIX: &str = "social-listening-logic";

/// Notice shown when distillation is requested on an empty conversation.
pub const EMPTY_HISTORY_NOTICE: &str = "Cannot create logic from an empty chat.";
