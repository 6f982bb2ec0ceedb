//! Batch orchestration.
//!
//! A submission is validated, expanded into `attributes × replicas` tasks and
//! handed to a background Tokio task. The submitter gets a [`BatchId`] back
//! immediately and follows the batch through the shared [`ProgressStore`].

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};

use super::progress::ProgressStore;
use super::runner::PipelineRunner;
use super::types::{ActionSpace, AgentResult, BatchId, BatchRequest, TaskSpec};
use crate::error::SubmissionError;

/// Errors returned when waiting for a batch.
#[derive(Debug, Error)]
pub enum WaitError {
    /// The batch was never submitted here, or was already awaited.
    #[error("No pending batch with id {0}")]
    NotFound(BatchId),

    /// The background task panicked or was cancelled.
    #[error("Batch task did not complete: {0}")]
    Join(#[from] JoinError),
}

/// Counts for a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub batch_id: BatchId,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Submits batches and runs them in the background.
pub struct BatchOrchestrator {
    runner: PipelineRunner,
    progress: Arc<ProgressStore>,
    replicas_per_attribute: usize,
    handles: Mutex<HashMap<BatchId, JoinHandle<BatchOutcome>>>,
}

impl std::fmt::Debug for BatchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("runner", &self.runner)
            .field("replicas_per_attribute", &self.replicas_per_attribute)
            .finish_non_exhaustive()
    }
}

impl BatchOrchestrator {
    /// Creates an orchestrator writing progress into `progress`.
    pub fn new(
        runner: PipelineRunner,
        progress: Arc<ProgressStore>,
        replicas_per_attribute: usize,
    ) -> Self {
        Self {
            runner,
            progress,
            replicas_per_attribute,
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn progress(&self) -> &Arc<ProgressStore> {
        &self.progress
    }

    pub fn replicas_per_attribute(&self) -> usize {
        self.replicas_per_attribute
    }

    /// Validates `request`, registers the batch and starts it in the
    /// background. Returns as soon as the batch is registered.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError` if a required field is blank or no
    /// non-blank attribute was given. Nothing is scheduled in that case.
    pub async fn submit_batch(&self, request: BatchRequest) -> Result<BatchId, SubmissionError> {
        validate_request(&request)?;

        let batch_id = BatchId::new();
        let tasks = build_tasks(&request, self.replicas_per_attribute);
        let total = tasks.len();

        self.progress.insert(batch_id, total).await;

        tracing::info!(
            batch_id = %batch_id,
            attributes = total / self.replicas_per_attribute.max(1),
            replicas = self.replicas_per_attribute,
            total,
            "Batch submitted"
        );

        let runner = self.runner.clone();
        let progress = Arc::clone(&self.progress);
        let handle =
            tokio::spawn(async move { run_batch(&runner, &progress, batch_id, tasks).await });

        self.handles.lock().await.insert(batch_id, handle);

        Ok(batch_id)
    }

    /// Waits for a batch submitted through this orchestrator to finish.
    ///
    /// Each batch can be awaited once.
    pub async fn wait(&self, batch_id: &BatchId) -> Result<BatchOutcome, WaitError> {
        let handle = self
            .handles
            .lock()
            .await
            .remove(batch_id)
            .ok_or(WaitError::NotFound(*batch_id))?;

        Ok(handle.await?)
    }
}

/// Runs every task of a batch concurrently and freezes the results.
///
/// Each task counts toward `completed` when it resolves, whether it
/// succeeded, failed or panicked. Successful results keep submission order.
pub async fn run_batch(
    runner: &PipelineRunner,
    progress: &ProgressStore,
    batch_id: BatchId,
    tasks: Vec<TaskSpec>,
) -> BatchOutcome {
    let started = Instant::now();
    let total = tasks.len();

    let futures = tasks.iter().map(move |task| async move {
        let outcome = match AssertUnwindSafe(runner.run_task(task)).catch_unwind().await {
            Ok(outcome) => outcome.ok(),
            Err(panic) => {
                tracing::error!(
                    batch_id = %batch_id,
                    attribute = %task.attribute,
                    replica = task.replica_index,
                    panic = %panic_message(panic.as_ref()),
                    "Task panicked"
                );
                None
            }
        };
        if let Some(view) = progress.record_completion(&batch_id).await {
            tracing::debug!(
                batch_id = %batch_id,
                completed = view.completed,
                total = view.total,
                "Task resolved"
            );
        }
        outcome
    });

    let outcomes = futures::future::join_all(futures).await;

    let results: Vec<AgentResult> = outcomes.into_iter().flatten().collect();
    let succeeded = results.len();
    let failed = total - succeeded;

    progress.finish(&batch_id, results).await;

    tracing::info!(
        batch_id = %batch_id,
        total,
        succeeded,
        failed,
        duration_secs = started.elapsed().as_secs_f64(),
        "Batch completed"
    );

    BatchOutcome {
        batch_id,
        total,
        succeeded,
        failed,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Checks that every required field of a submission is present.
pub fn validate_request(request: &BatchRequest) -> Result<(), SubmissionError> {
    if request.scenario.trim().is_empty() {
        return Err(SubmissionError::MissingField("scenario"));
    }
    if request.context.trim().is_empty() {
        return Err(SubmissionError::MissingField("context"));
    }
    if request.demographic_group.trim().is_empty() {
        return Err(SubmissionError::MissingField("demographicGroup"));
    }
    if request.action_space.trim().is_empty() {
        return Err(SubmissionError::MissingField("actionSpace"));
    }
    if request.attributes_list.iter().all(|a| a.trim().is_empty()) {
        return Err(SubmissionError::NoAttributes);
    }
    Ok(())
}

/// Expands a request into one task per (attribute, replica), attribute-major.
///
/// Blank attributes are skipped; the rest are trimmed.
pub fn build_tasks(request: &BatchRequest, replicas_per_attribute: usize) -> Vec<TaskSpec> {
    let action_space = ActionSpace::parse(request.action_space.as_str());

    request
        .attributes_list
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .flat_map(|attribute| {
            let action_space = action_space.clone();
            (1..=replicas_per_attribute).map(move |replica_index| TaskSpec {
                attribute: attribute.to_string(),
                replica_index,
                scenario: request.scenario.clone(),
                context: request.context.clone(),
                demographic_group: request.demographic_group.clone(),
                action_space: action_space.clone(),
            })
        })
        .collect()
}
