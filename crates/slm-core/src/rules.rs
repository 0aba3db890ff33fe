//! Rule sets and the persisted logic-file format.
//!
//! Rules are natural-language instructions fed back into later generation
//! context. Order is insertion order and is meaningful: rules are rendered
//! into the system instruction in sequence.
//!
//! On disk a rule set is a [`LogicFile`]:
//!
//! ```json
//! { "version": "2.0.0", "logic": ["rule one", "rule two"] }
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{APP_VERSION, LOGIC_FILE_PREFIX};

/// Errors from parsing an uploaded logic file.
#[derive(Debug, thiserror::Error)]
pub enum LogicFileError {
    /// Content is not JSON at all.
    #[error("logic file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON, but not `{ "logic": [string, ..] }`.
    #[error("invalid logic file format: {0}")]
    Format(String),
}

/// Persisted shape of a rule set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicFile {
    /// Format version.
    pub version: String,
    /// Rules in order.
    pub logic: Vec<String>,
}

/// Ordered rule sequence with its format version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleSet {
    version: String,
    rules: Vec<String>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleSet {
    /// Empty rule set at the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rules(APP_VERSION, Vec::new())
    }

    /// Rule set with explicit contents.
    pub fn with_rules(version: impl Into<String>, rules: Vec<String>) -> Self {
        Self {
            version: version.into(),
            rules,
        }
    }

    /// Format version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Rules in order.
    #[must_use]
    pub fn rules(&self) -> &[String] {
        &self.rules
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Append a rule at the end.
    pub fn push(&mut self, rule: impl Into<String>) {
        self.rules.push(rule.into());
    }

    /// Insert at `index`. Returns `false` if `index > len`.
    pub fn insert(&mut self, index: usize, rule: impl Into<String>) -> bool {
        if index > self.rules.len() {
            return false;
        }
        self.rules.insert(index, rule.into());
        true
    }

    /// Replace the rule at `index`, returning the previous text.
    pub fn replace(&mut self, index: usize, rule: impl Into<String>) -> Option<String> {
        self.rules
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, rule.into()))
    }

    /// Remove the rule at `index`.
    pub fn remove(&mut self, index: usize) -> Option<String> {
        (index < self.rules.len()).then(|| self.rules.remove(index))
    }

    /// Persisted form.
    #[must_use]
    pub fn to_logic_file(&self) -> LogicFile {
        LogicFile {
            version: self.version.clone(),
            logic: self.rules.clone(),
        }
    }

    /// Serialize as pretty JSON with 2-space indentation.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_logic_file())
    }

    /// Validate and parse an uploaded logic file.
    ///
    /// Accepts only an object whose `logic` field is an array of strings. A
    /// missing `version` defaults to the current format version.
    pub fn parse(content: &str) -> Result<Self, LogicFileError> {
        let value: Value = serde_json::from_str(content)?;
        let Value::Object(obj) = value else {
            return Err(LogicFileError::Format(
                "expected an object with a `logic` array".into(),
            ));
        };
        let Some(Value::Array(items)) = obj.get("logic") else {
            return Err(LogicFileError::Format(
                "expected '{ \"logic\": [...] }'".into(),
            ));
        };
        let rules = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_str().map(str::to_owned).ok_or_else(|| {
                    LogicFileError::Format(format!("logic[{i}] is not a string"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let version = obj
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or(APP_VERSION);
        Ok(Self::with_rules(version, rules))
    }
}

impl From<LogicFile> for RuleSet {
    fn from(file: LogicFile) -> Self {
        Self::with_rules(file.version, file.logic)
    }
}

/// Download file name for a rule set exported on `date`.
#[must_use]
pub fn logic_file_name(date: NaiveDate) -> String {
    format!("{LOGIC_FILE_PREFIX}-{}.json", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn upload_then_download_round_trips() {
        let set = RuleSet::parse(r#"{"version":"2.0.0","logic":["a","b"]}"#).unwrap();
        let back: LogicFile = serde_json::from_str(&set.to_pretty_json().unwrap()).unwrap();
        assert_eq!(back.version, "2.0.0");
        assert_eq!(back.logic, ["a", "b"]);
    }

    #[test]
    fn pretty_json_uses_two_space_indent() {
        let set = RuleSet::with_rules("2.0.0", vec!["a".into()]);
        let json = set.to_pretty_json().unwrap();
        assert_eq!(json, "{\n  \"version\": \"2.0.0\",\n  \"logic\": [\n    \"a\"\n  ]\n}");
    }

    #[test]
    fn missing_version_defaults() {
        let set = RuleSet::parse(r#"{"logic":[]}"#).unwrap();
        assert_eq!(set.version(), APP_VERSION);
        assert!(set.is_empty());
    }

    #[test]
    fn rejects_bad_shapes() {
        assert_matches!(RuleSet::parse("not json"), Err(LogicFileError::Json(_)));
        assert_matches!(RuleSet::parse("[]"), Err(LogicFileError::Format(_)));
        assert_matches!(RuleSet::parse(r#"{"rules":[]}"#), Err(LogicFileError::Format(_)));
        assert_matches!(RuleSet::parse(r#"{"logic":"a"}"#), Err(LogicFileError::Format(_)));
        assert_matches!(
            RuleSet::parse(r#"{"logic":["a", 2]}"#),
            Err(LogicFileError::Format(msg)) if msg.contains("logic[1]")
        );
    }

    #[test]
    fn editing_keeps_order() {
        let mut set = RuleSet::new();
        set.push("one");
        set.push("three");
        assert!(set.insert(1, "two"));
        assert!(!set.insert(9, "nope"));
        assert_eq!(set.replace(0, "uno").as_deref(), Some("one"));
        assert_eq!(set.remove(2).as_deref(), Some("three"));
        assert_eq!(set.remove(2), None);
        assert_eq!(set.rules(), ["uno", "two"]);
    }

    #[test]
    fn file_name_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(logic_file_name(date), "social-listening-logic-2024-03-09.json");
    }
}
