//! Pipeline runner for a single simulation task.
//!
//! A task runs two retried stages against the completion client:
//!
//! 1. **Persona**: invent a person with the task's attribute.
//! 2. **Decision**: have that person pick one option of the action space and
//!    explain why.
//!
//! A successful task is appended to the simulation log before it is reported
//! as finished. A failed task becomes a [`TaskFailure`] value; nothing
//! escapes as a panic or an unhandled error.

use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use super::config::SimulationConfig;
use super::retry::{with_retries, AttemptError, Stage, StageError};
use super::types::{AgentResult, DecisionResult, Persona, TaskSpec};
use crate::error::TemplateError;
use crate::llm::CompletionClient;
use crate::metrics::MetricsCollector;
use crate::storage::{AuditSink, LogEntry};
use crate::template::{PromptParams, PromptSet};
use crate::utils::json_extraction::{
    extract_as, extract_record, is_string, non_empty_string, RecordSchema,
};

/// Why a task produced no result.
#[derive(Debug, Error)]
pub enum TaskFailureReason {
    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("prompt rendering failed: {0}")]
    Template(#[from] TemplateError),
}

/// A task that ended without a result.
#[derive(Debug, Error)]
#[error("task '{attribute}' #{replica_index} failed: {reason}")]
pub struct TaskFailure {
    pub attribute: String,
    pub replica_index: usize,
    #[source]
    pub reason: TaskFailureReason,
}

impl TaskFailure {
    fn new(task: &TaskSpec, reason: impl Into<TaskFailureReason>) -> Self {
        Self {
            attribute: task.attribute.clone(),
            replica_index: task.replica_index,
            reason: reason.into(),
        }
    }
}

/// Runs persona and decision stages for one task.
#[derive(Clone)]
pub struct PipelineRunner {
    client: CompletionClient,
    prompts: Arc<PromptSet>,
    log: Arc<dyn AuditSink<LogEntry>>,
    max_attempts: usize,
    persona_temperature: f64,
    decision_temperature: f64,
    metrics: MetricsCollector,
}

impl std::fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("client", &self.client)
            .field("max_attempts", &self.max_attempts)
            .field("persona_temperature", &self.persona_temperature)
            .field("decision_temperature", &self.decision_temperature)
            .finish_non_exhaustive()
    }
}

impl PipelineRunner {
    /// Creates a runner using the built-in prompts.
    pub fn new(
        client: CompletionClient,
        log: Arc<dyn AuditSink<LogEntry>>,
        config: &SimulationConfig,
    ) -> Self {
        Self {
            client,
            prompts: Arc::new(PromptSet::default()),
            log,
            max_attempts: config.max_attempts,
            persona_temperature: config.persona_temperature,
            decision_temperature: config.decision_temperature,
            metrics: MetricsCollector::new(),
        }
    }

    /// Replaces the prompt set.
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = Arc::new(prompts);
        self
    }

    /// Overrides the per-stage attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Runs one task to completion.
    ///
    /// # Errors
    ///
    /// Returns `TaskFailure` if a prompt cannot be rendered or either stage
    /// exhausts its attempts.
    pub async fn run_task(&self, task: &TaskSpec) -> Result<AgentResult, TaskFailure> {
        let outcome = self.run_stages(task).await;
        self.metrics.record_task(outcome.is_ok());

        match outcome {
            Ok(result) => {
                tracing::debug!(
                    attribute = %task.attribute,
                    replica = task.replica_index,
                    decision = %result.result.decision,
                    "Task completed"
                );
                Ok(result)
            }
            Err(reason) => {
                let failure = TaskFailure::new(task, reason);
                tracing::warn!(
                    attribute = %failure.attribute,
                    replica = failure.replica_index,
                    error = %failure.reason,
                    "Task failed"
                );
                Err(failure)
            }
        }
    }

    async fn run_stages(&self, task: &TaskSpec) -> Result<AgentResult, TaskFailureReason> {
        let persona = self.generate_persona(task).await?;
        let (result, raw_response) = self.generate_decision(task, &persona).await?;

        let entry = LogEntry::for_task(task, persona.clone(), result.clone(), raw_response);
        if let Err(e) = self.log.append(&entry).await {
            tracing::warn!(
                attribute = %task.attribute,
                replica = task.replica_index,
                error = %e,
                "Failed to append simulation log entry"
            );
        }

        Ok(AgentResult {
            attribute: task.attribute.clone(),
            persona,
            result,
        })
    }

    async fn generate_persona(&self, task: &TaskSpec) -> Result<Persona, TaskFailureReason> {
        let prompt = self.prompts.persona.render(
            &PromptParams::new()
                .set("attribute", task.attribute.as_str())
                .set("context", task.context.as_str())
                .set("demographicGroup", task.demographic_group.as_str()),
        )?;
        tracing::debug!(attribute = %task.attribute, prompt = %prompt, "Persona prompt");

        let schema = RecordSchema::new()
            .field("name", non_empty_string)
            .field("description", non_empty_string);

        let client = &self.client;
        let prompt = prompt.as_str();
        let schema = &schema;
        let temperature = self.persona_temperature;

        let persona = with_retries(Stage::Persona, self.max_attempts, move |_| async move {
            let raw = client.complete(prompt, temperature).await?;
            Ok::<_, AttemptError>(extract_as::<Persona>(&raw, schema)?)
        })
        .await?;

        Ok(Persona {
            name: persona.name.trim().to_string(),
            description: persona.description.trim().to_string(),
        })
    }

    /// Returns the decision and the accepted record serialized as JSON.
    async fn generate_decision(
        &self,
        task: &TaskSpec,
        persona: &Persona,
    ) -> Result<(DecisionResult, String), TaskFailureReason> {
        let prompt = self.prompts.decision.render(
            &PromptParams::new()
                .set("scenario", task.scenario.as_str())
                .set("context", task.context.as_str())
                .set("name", persona.name.as_str())
                .set("description", persona.description.as_str())
                .set("demographicGroup", task.demographic_group.as_str())
                .set("attribute", task.attribute.as_str())
                .set("actionSpace", task.action_space.disjunction()),
        )?;
        tracing::debug!(attribute = %task.attribute, prompt = %prompt, "Decision prompt");

        let action_space = task.action_space.clone();
        let schema = RecordSchema::new()
            .field("decision", move |v: &Value| {
                v.as_str().is_some_and(|s| action_space.contains(s))
            })
            .field("rationale", is_string);

        let client = &self.client;
        let prompt = prompt.as_str();
        let schema = &schema;
        let temperature = self.decision_temperature;

        let record = with_retries(Stage::Decision, self.max_attempts, move |_| async move {
            let raw = client.complete(prompt, temperature).await?;
            Ok::<_, AttemptError>(extract_record(&raw, schema)?)
        })
        .await?;

        let result = DecisionResult {
            decision: string_field(&record, "decision").trim().to_string(),
            rationale: string_field(&record, "rationale"),
        };
        let raw_response = Value::Object(record).to_string();

        Ok((result, raw_response))
    }
}

fn string_field(record: &Map<String, Value>, key: &str) -> String {
    record
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
