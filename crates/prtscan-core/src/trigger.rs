use crate::error::{Result, ScanError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The event that runs with the base repository's permissions while being
/// triggerable from forks.
pub const TARGET_EVENT: &str = "pull_request_target";

/// Top-level key holding a workflow's trigger declaration.
const TRIGGER_KEY: &str = "on";

/// How the `on:` declaration is matched against the target event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMatch {
    /// Containment check over the serialized `on:` field. Matches every shape
    /// of the declaration, and also event names that merely embed the target.
    #[default]
    Substring,
    /// Interpret the declaration by shape and require an exact event name.
    Exact,
}

/// Decides whether a workflow file declares the target trigger.
#[derive(Debug, Clone)]
pub struct TriggerExtractor {
    event: String,
    mode: TriggerMatch,
}

impl Default for TriggerExtractor {
    fn default() -> Self {
        Self::new(TARGET_EVENT, TriggerMatch::default())
    }
}

impl TriggerExtractor {
    pub fn new(event: impl Into<String>, mode: TriggerMatch) -> Self {
        Self {
            event: event.into(),
            mode,
        }
    }

    /// Parse the first YAML document of `content` and check its trigger
    /// declaration.
    ///
    /// Later documents in a multi-document file are ignored. A missing `on:`
    /// key is not an error. Content that is not valid YAML (or that has no
    /// JSON-compatible shape) yields [`ScanError::MalformedDocument`].
    pub fn has_target_trigger(&self, content: &[u8]) -> Result<bool> {
        let doc = match serde_yaml::Deserializer::from_slice(content).next() {
            Some(document) => Value::deserialize(document).map_err(ScanError::MalformedDocument)?,
            None => return Ok(false),
        };

        let on = match doc.get(TRIGGER_KEY) {
            Some(v) => v,
            None => return Ok(false),
        };

        Ok(match self.mode {
            TriggerMatch::Substring => on.to_string().contains(self.event.as_str()),
            TriggerMatch::Exact => declared_events(on).iter().any(|e| e == &self.event),
        })
    }
}

/// Event names of an `on:` declaration in any of its three shapes:
/// a bare event name, a list of names, or a mapping keyed by event name.
pub fn declared_events(on: &Value) -> Vec<String> {
    match on {
        Value::String(event) => vec![event.clone()],
        Value::Array(events) => events
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        Value::Object(map) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn substring() -> TriggerExtractor {
        TriggerExtractor::default()
    }

    fn exact() -> TriggerExtractor {
        TriggerExtractor::new(TARGET_EVENT, TriggerMatch::Exact)
    }

    #[test]
    fn test_bare_string_trigger() {
        let yaml = b"on: pull_request_target\njobs: {}\n";
        assert!(substring().has_target_trigger(yaml).unwrap());
        assert!(exact().has_target_trigger(yaml).unwrap());
    }

    #[test]
    fn test_sequence_trigger() {
        let yaml = b"on: [push, pull_request_target]\n";
        assert!(substring().has_target_trigger(yaml).unwrap());
        assert!(exact().has_target_trigger(yaml).unwrap());
    }

    #[test]
    fn test_mapping_trigger() {
        let yaml = br#"
name: Label PR
on:
  pull_request_target:
    types: [opened, synchronize]
    branches: [main]
jobs:
  label:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/labeler@v5
"#;
        assert!(substring().has_target_trigger(yaml).unwrap());
        assert!(exact().has_target_trigger(yaml).unwrap());
    }

    #[test]
    fn test_push_only_does_not_match() {
        let yaml = b"on: push\njobs: {}\n";
        assert!(!substring().has_target_trigger(yaml).unwrap());
        assert!(!exact().has_target_trigger(yaml).unwrap());
    }

    #[test]
    fn test_missing_on_key() {
        let yaml = b"name: no triggers\njobs: {}\n";
        assert!(!substring().has_target_trigger(yaml).unwrap());
    }

    #[test]
    fn test_target_outside_on_is_ignored() {
        let yaml = br#"
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - run: echo pull_request_target
"#;
        assert!(!substring().has_target_trigger(yaml).unwrap());
    }

    #[test]
    fn test_embedded_name_matches_only_in_substring_mode() {
        let yaml = b"on:\n  my_pull_request_target_hook: {}\n";
        assert!(substring().has_target_trigger(yaml).unwrap());
        assert!(!exact().has_target_trigger(yaml).unwrap());
    }

    #[test]
    fn test_malformed_yaml() {
        let yaml = b"on: [push\njobs: {\n";
        let err = substring().has_target_trigger(yaml).unwrap_err();
        assert!(matches!(err, ScanError::MalformedDocument(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_only_the_first_document_counts() {
        let yaml = b"on: pull_request_target\n---\nname: second\non: push\n";
        assert!(substring().has_target_trigger(yaml).unwrap());

        let yaml = b"on: push\n---\non: pull_request_target\n";
        assert!(!substring().has_target_trigger(yaml).unwrap());
    }

    #[test]
    fn test_non_mapping_document() {
        assert!(!substring().has_target_trigger(b"- just\n- a list\n").unwrap());
        assert!(!substring().has_target_trigger(b"plain scalar").unwrap());
    }

    #[test]
    fn test_repeated_checks_agree() {
        let yaml = b"on:\n  pull_request_target: {}\n";
        let extractor = substring();
        let first = extractor.has_target_trigger(yaml).unwrap();
        let second = extractor.has_target_trigger(yaml).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_declared_events_shapes() {
        let on: Value = serde_json::json!({"push": null, "pull_request_target": {"types": ["opened"]}});
        let mut events = declared_events(&on);
        events.sort();
        assert_eq!(events, vec!["pull_request_target", "push"]);
        assert_eq!(declared_events(&Value::Bool(true)), Vec::<String>::new());
    }
}
