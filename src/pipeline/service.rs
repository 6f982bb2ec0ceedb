//! The operations persona-forge exposes to callers.
//!
//! [`SimulationService`] ties the orchestrator, the progress store and the
//! persona edit log together behind four operations: submit a batch, query
//! its progress, fetch its results and record a persona edit.

use std::sync::Arc;

use thiserror::Error;

use super::config::{ConfigError, SimulationConfig};
use super::orchestrator::{BatchOrchestrator, BatchOutcome, WaitError};
use super::progress::{ProgressStore, ProgressView, ResultsQuery};
use super::runner::PipelineRunner;
use super::types::{BatchId, BatchRequest};
use crate::error::{PersonaEditError, SubmissionError, TemplateError};
use crate::llm::{CompletionClient, LlmProvider};
use crate::storage::{AuditSink, PersonaEdit, PersonaEditLog, SimulationLog, StorageError};
use crate::template::PromptSet;

/// Errors that can occur while assembling a service from configuration.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Prompt error: {0}")]
    Template(#[from] TemplateError),
}

/// Facade over batch submission, progress queries and persona edits.
pub struct SimulationService {
    orchestrator: BatchOrchestrator,
    edit_log: Arc<dyn AuditSink<PersonaEdit>>,
}

impl std::fmt::Debug for SimulationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationService")
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl SimulationService {
    pub fn new(orchestrator: BatchOrchestrator, edit_log: Arc<dyn AuditSink<PersonaEdit>>) -> Self {
        Self {
            orchestrator,
            edit_log,
        }
    }

    /// Builds a service backed by JSONL logs at the configured paths.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` if the configuration is invalid, a log cannot
    /// be opened, or the prompt file cannot be loaded.
    pub async fn from_config(
        config: &SimulationConfig,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;

        let prompts = match &config.prompts_path {
            Some(path) => PromptSet::load_file(path)?,
            None => PromptSet::default(),
        };

        let simulation_log = Arc::new(SimulationLog::open(&config.simulation_log_path).await?);
        let edit_log = Arc::new(PersonaEditLog::open(&config.persona_edit_log_path).await?);

        let client = CompletionClient::new(provider, config.model.clone())
            .with_request_timeout(config.request_timeout)
            .with_max_concurrent_requests(config.max_concurrent_requests);
        let runner = PipelineRunner::new(client, simulation_log, config).with_prompts(prompts);
        let orchestrator = BatchOrchestrator::new(
            runner,
            Arc::new(ProgressStore::new()),
            config.replicas_per_attribute,
        );

        tracing::info!(
            model = %config.model,
            simulation_log = %config.simulation_log_path.display(),
            persona_edit_log = %config.persona_edit_log_path.display(),
            "Simulation service ready"
        );

        Ok(Self::new(orchestrator, edit_log))
    }

    /// Accepts a batch and starts it in the background.
    pub async fn submit_batch(&self, request: BatchRequest) -> Result<BatchId, SubmissionError> {
        self.orchestrator.submit_batch(request).await
    }

    /// Current progress of a batch, or `None` for an unknown id.
    pub async fn progress(&self, batch_id: &BatchId) -> Option<ProgressView> {
        self.orchestrator.progress().get(batch_id).await
    }

    pub async fn results(&self, batch_id: &BatchId) -> ResultsQuery {
        self.orchestrator.progress().results(batch_id).await
    }

    /// Blocks until a batch submitted through this service finishes.
    pub async fn wait(&self, batch_id: &BatchId) -> Result<BatchOutcome, WaitError> {
        self.orchestrator.wait(batch_id).await
    }

    /// Appends a persona edit to the edit log and returns the stored record.
    ///
    /// Identical edits are all recorded.
    ///
    /// # Errors
    ///
    /// Returns `PersonaEditError::MissingField` for a blank id and
    /// `PersonaEditError::Storage` if the record cannot be written.
    pub async fn record_persona_edit(
        &self,
        id: &str,
        name: &str,
        description: &str,
    ) -> Result<PersonaEdit, PersonaEditError> {
        if id.trim().is_empty() {
            return Err(PersonaEditError::MissingField("id"));
        }

        let edit = PersonaEdit::new(id, name, description);
        self.edit_log.append(&edit).await?;

        tracing::info!(persona_id = %edit.id, "Persona edit recorded");
        Ok(edit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{GenerationRequest, GenerationResponse};
    use crate::pipeline::progress::BatchStatus;
    use crate::storage::{JsonlLog, LogEntry, MemorySink};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct ValidProvider;

    #[async_trait]
    impl LlmProvider for ValidProvider {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            let reply = if request.temperature == Some(0.2) {
                r#"{"decision": "Evacuate", "rationale": "Safety"}"#
            } else {
                r#"{"name": "Maya", "description": "A nurse"}"#
            };
            Ok(GenerationResponse::from_text("mock-model", reply))
        }
    }

    fn request() -> BatchRequest {
        BatchRequest {
            scenario: "A hurricane is approaching".to_string(),
            context: "their home".to_string(),
            demographic_group: "Coastal residents".to_string(),
            attributes_list: vec!["renter".to_string()],
            action_space: "Evacuate, Stay".to_string(),
        }
    }

    fn config(dir: &TempDir) -> SimulationConfig {
        SimulationConfig::default()
            .with_replicas_per_attribute(4)
            .with_simulation_log_path(dir.path().join("simulation_log.jsonl"))
            .with_persona_edit_log_path(dir.path().join("updated_personas.jsonl"))
    }

    #[tokio::test]
    async fn test_end_to_end_with_jsonl_logs() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = config(&dir);
        let service = SimulationService::from_config(&config, Arc::new(ValidProvider))
            .await
            .expect("service builds");

        let batch_id = service.submit_batch(request()).await.expect("accepted");
        let outcome = service.wait(&batch_id).await.expect("finishes");
        assert_eq!(outcome.succeeded, 4);

        let view = service.progress(&batch_id).await.expect("known batch");
        assert_eq!(view.status, BatchStatus::Completed);
        assert_eq!(view.completed, 4);

        let ResultsQuery::Ready(results) = service.results(&batch_id).await else {
            panic!("results should be ready");
        };
        assert_eq!(results.len(), 4);

        let entries: Vec<LogEntry> = JsonlLog::<LogEntry>::open(&config.simulation_log_path)
            .await
            .expect("open log")
            .read_all()
            .await
            .expect("read log");
        assert_eq!(entries.len(), 4);
        let mut replicas: Vec<usize> = entries.iter().map(|e| e.replica_index).collect();
        replicas.sort_unstable();
        assert_eq!(replicas, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_unknown_batch_queries() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let service = SimulationService::from_config(&config(&dir), Arc::new(ValidProvider))
            .await
            .expect("service builds");

        let unknown = BatchId::new();
        assert!(service.progress(&unknown).await.is_none());
        assert_eq!(service.results(&unknown).await, ResultsQuery::NotFound);
    }

    #[tokio::test]
    async fn test_persona_edits_are_appended() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = config(&dir);
        let service = SimulationService::from_config(&config, Arc::new(ValidProvider))
            .await
            .expect("service builds");

        let first = service
            .record_persona_edit("agent-1", "Maya", "A nurse")
            .await
            .expect("edit recorded");
        service
            .record_persona_edit("agent-1", "Maya", "A nurse")
            .await
            .expect("edit recorded");
        assert_eq!(first.updated_name, "Maya");

        let content =
            std::fs::read_to_string(&config.persona_edit_log_path).expect("read edit log");
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_persona_edit_requires_id() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let service = SimulationService::from_config(&config(&dir), Arc::new(ValidProvider))
            .await
            .expect("service builds");

        let err = service
            .record_persona_edit("  ", "Maya", "A nurse")
            .await
            .unwrap_err();
        assert!(matches!(err, PersonaEditError::MissingField("id")));
    }

    #[tokio::test]
    async fn test_in_memory_edit_sink() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let base = SimulationService::from_config(&config(&dir), Arc::new(ValidProvider))
            .await
            .expect("service builds");
        let sink = Arc::new(MemorySink::<PersonaEdit>::new());
        let service = SimulationService::new(base.orchestrator, sink.clone());

        service
            .record_persona_edit("agent-9", "Ana", "An engineer")
            .await
            .expect("edit recorded");
        assert_eq!(sink.records()[0].id, "agent-9");
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let err = SimulationService::from_config(
            &config(&dir).with_max_attempts(0),
            Arc::new(ValidProvider),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
    }

    #[tokio::test]
    async fn test_missing_prompt_file_rejected() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let err = SimulationService::from_config(
            &config(&dir).with_prompts_path(dir.path().join("missing.yaml")),
            Arc::new(ValidProvider),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Template(_)));
    }
}
