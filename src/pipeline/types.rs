//! Core data types shared by the simulation pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a submitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(Uuid);

impl BatchId {
    /// Creates a new random batch id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BatchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// The set of decisions a persona may choose from.
///
/// Built from a comma-separated string. Entries are trimmed and blank
/// entries dropped; the original string is kept for the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSpace {
    raw: String,
    options: Vec<String>,
}

impl ActionSpace {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let options = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self { raw, options }
    }

    /// The string this action space was parsed from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Trimmed options, in the order given.
    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Case-insensitive membership test; surrounding whitespace is ignored.
    pub fn contains(&self, value: &str) -> bool {
        let value = value.trim().to_lowercase();
        !value.is_empty() && self.options.iter().any(|o| o.to_lowercase() == value)
    }

    /// Quoted options joined with `or`, e.g. `"Evacuate" or "Stay"`.
    pub fn disjunction(&self) -> String {
        self.options
            .iter()
            .map(|o| format!("\"{}\"", o))
            .collect::<Vec<_>>()
            .join(" or ")
    }
}

impl fmt::Display for ActionSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Batch submission payload.
///
/// Field names follow the camelCase wire format used by the web client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(default)]
    pub scenario: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub demographic_group: String,
    #[serde(default)]
    pub attributes_list: Vec<String>,
    #[serde(default)]
    pub action_space: String,
}

/// One (attribute, replica) unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub attribute: String,
    /// 1-based replica number within the attribute.
    pub replica_index: usize,
    pub scenario: String,
    pub context: String,
    pub demographic_group: String,
    pub action_space: ActionSpace,
}

/// A generated persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub description: String,
}

/// The decision a persona made, with its stated rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub decision: String,
    pub rationale: String,
}

/// Output of one successful task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResult {
    pub attribute: String,
    pub persona: Persona,
    pub result: DecisionResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_id_display_and_parse() {
        let id = BatchId::new();
        let parsed: BatchId = id.to_string().parse().expect("should parse");
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<BatchId>().is_err());
    }

    #[test]
    fn test_batch_ids_are_unique() {
        assert_ne!(BatchId::new(), BatchId::new());
    }

    #[test]
    fn test_action_space_parse() {
        let space = ActionSpace::parse(" Evacuate , Stay,, ");
        assert_eq!(space.options(), &["Evacuate".to_string(), "Stay".to_string()]);
        assert_eq!(space.raw(), " Evacuate , Stay,, ");
        assert!(!space.is_empty());
    }

    #[test]
    fn test_action_space_contains() {
        let space = ActionSpace::parse("Evacuate, Stay");
        assert!(space.contains("evacuate"));
        assert!(space.contains("  STAY "));
        assert!(!space.contains("Panic"));
        assert!(!space.contains(""));
    }

    #[test]
    fn test_action_space_disjunction() {
        let space = ActionSpace::parse("Evacuate, Stay, Shelter in place");
        assert_eq!(
            space.disjunction(),
            "\"Evacuate\" or \"Stay\" or \"Shelter in place\""
        );
    }

    #[test]
    fn test_empty_action_space() {
        let space = ActionSpace::parse(" , ,");
        assert!(space.is_empty());
        assert_eq!(space.disjunction(), "");
        assert!(!space.contains("anything"));
    }

    #[test]
    fn test_batch_request_camel_case() {
        let json = r#"{
            "scenario": "A hurricane is approaching",
            "context": "their home",
            "demographicGroup": "Coastal residents",
            "attributesList": ["renter", "homeowner"],
            "actionSpace": "Evacuate, Stay"
        }"#;
        let request: BatchRequest = serde_json::from_str(json).expect("should deserialize");
        assert_eq!(request.demographic_group, "Coastal residents");
        assert_eq!(request.attributes_list.len(), 2);
        assert_eq!(request.action_space, "Evacuate, Stay");
    }

    #[test]
    fn test_batch_request_missing_fields_default() {
        let request: BatchRequest = serde_json::from_str("{}").expect("should deserialize");
        assert!(request.scenario.is_empty());
        assert!(request.attributes_list.is_empty());
    }
}
