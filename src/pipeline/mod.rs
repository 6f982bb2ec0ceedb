//! Batch simulation pipeline.
//!
//! This module fans a submission out into independent persona/decision tasks,
//! retries each stage on malformed output, and tracks progress per batch.
//!
//! # Architecture
//!
//! - **Service**: the facade callers use ([`SimulationService`])
//! - **Orchestrator**: validates submissions and runs batches in the background
//! - **Runner**: executes the two stages of a single task
//! - **Retry**: bounded attempts for one stage
//! - **Progress**: shared, poll-able batch state
//! - **Summary**: decision distribution of a finished batch
//! - **Config**: settings for all of the above
//!
//! # Task Flow
//!
//! 1. **Submission**: the request is validated and a [`BatchId`] is issued
//! 2. **Fan-out**: every attribute gets `replicas_per_attribute` tasks
//! 3. **Persona stage**: the model invents a person with the attribute
//! 4. **Decision stage**: that person picks an option of the action space
//! 5. **Logging**: the successful task is appended to the simulation log
//! 6. **Completion**: each resolved task bumps `completed`; when all have
//!    resolved the successful results are frozen in submission order
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use persona_forge::llm::OpenAiClient;
//! use persona_forge::pipeline::{BatchRequest, ResultsQuery, SimulationConfig, SimulationService};
//!
//! let config = SimulationConfig::from_env()?;
//! let service = SimulationService::from_config(&config, Arc::new(OpenAiClient::from_env()?)).await?;
//!
//! let batch_id = service.submit_batch(BatchRequest {
//!     scenario: "A hurricane is approaching".into(),
//!     context: "where they live".into(),
//!     demographic_group: "Coastal residents".into(),
//!     attributes_list: vec!["renter".into(), "homeowner".into()],
//!     action_space: "Evacuate, Stay".into(),
//! }).await?;
//!
//! service.wait(&batch_id).await?;
//! if let ResultsQuery::Ready(results) = service.results(&batch_id).await {
//!     println!("{} personas decided", results.len());
//! }
//! ```

pub mod config;
pub mod orchestrator;
pub mod progress;
pub mod retry;
pub mod runner;
pub mod service;
pub mod summary;
pub mod types;

// Re-export main types for convenience
pub use config::{ConfigError, SimulationConfig};
pub use orchestrator::{
    build_tasks, run_batch, validate_request, BatchOrchestrator, BatchOutcome, WaitError,
};
pub use progress::{BatchProgress, BatchStatus, ProgressStore, ProgressView, ResultsQuery};
pub use retry::{with_retries, AttemptError, AttemptFailure, Stage, StageError};
pub use runner::{PipelineRunner, TaskFailure, TaskFailureReason};
pub use service::{ServiceError, SimulationService};
pub use summary::{AttributeSummary, DecisionSummary};
pub use types::{
    ActionSpace, AgentResult, BatchId, BatchRequest, DecisionResult, Persona, TaskSpec,
};
