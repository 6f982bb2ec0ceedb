//! Record types written to the audit logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::types::{DecisionResult, Persona, TaskSpec};

/// One line of the simulation log, written when a task succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub scenario: String,
    pub context: String,
    #[serde(rename = "demographicGroup")]
    pub demographic_group: String,
    pub attribute: String,
    #[serde(rename = "replicaIndex")]
    pub replica_index: usize,
    /// The action space exactly as submitted.
    #[serde(rename = "actionSpace")]
    pub action_space: String,
    pub persona: Persona,
    pub result: DecisionResult,
    /// The accepted decision record, serialized as JSON.
    pub raw_response: String,
}

impl LogEntry {
    /// Builds an entry for `task`, timestamped now.
    pub fn for_task(
        task: &TaskSpec,
        persona: Persona,
        result: DecisionResult,
        raw_response: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            scenario: task.scenario.clone(),
            context: task.context.clone(),
            demographic_group: task.demographic_group.clone(),
            attribute: task.attribute.clone(),
            replica_index: task.replica_index,
            action_space: task.action_space.raw().to_string(),
            persona,
            result,
            raw_response: raw_response.into(),
        }
    }
}

/// One line of the persona edit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaEdit {
    pub id: String,
    pub updated_name: String,
    pub updated_description: String,
    pub timestamp: DateTime<Utc>,
}

impl PersonaEdit {
    pub fn new(
        id: impl Into<String>,
        updated_name: impl Into<String>,
        updated_description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            updated_name: updated_name.into(),
            updated_description: updated_description.into(),
            timestamp: Utc::now(),
        }
    }
}
