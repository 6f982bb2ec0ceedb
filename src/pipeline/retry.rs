//! Bounded retry of a single pipeline stage.
//!
//! A stage is "call the model, extract a record, validate it". Any failure of
//! one attempt is recoverable: it is logged, remembered, and the next attempt
//! is made immediately. The stage fails only once the attempt budget is spent.

use std::fmt;
use std::future::Future;

use thiserror::Error;

use crate::error::LlmError;
use crate::metrics::MetricsCollector;
use crate::utils::json_extraction::ExtractionError;

/// The two stages of a simulation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Persona,
    Decision,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Persona => "persona",
            Stage::Decision => "decision",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why one attempt was rejected.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("completion failed: {0}")]
    Llm(#[from] LlmError),

    #[error("{0}")]
    Extraction(#[from] ExtractionError),
}

impl AttemptError {
    /// Short classification used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptError::Llm(_) => "llm",
            AttemptError::Extraction(e) => e.kind(),
        }
    }
}

/// A rejected attempt and its 1-based number.
#[derive(Debug)]
pub struct AttemptFailure {
    pub attempt: usize,
    pub error: AttemptError,
}

/// Terminal failure of a stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(
        "{stage} stage failed after {attempts} attempt(s){}",
        describe_last(.failures)
    )]
    RetriesExhausted {
        stage: Stage,
        attempts: usize,
        failures: Vec<AttemptFailure>,
    },
}

impl StageError {
    pub fn stage(&self) -> Stage {
        match self {
            StageError::RetriesExhausted { stage, .. } => *stage,
        }
    }

    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> usize {
        match self {
            StageError::RetriesExhausted { attempts, .. } => *attempts,
        }
    }

    /// Every rejected attempt, in order.
    pub fn failures(&self) -> &[AttemptFailure] {
        match self {
            StageError::RetriesExhausted { failures, .. } => failures,
        }
    }

    pub fn last_error(&self) -> Option<&AttemptError> {
        self.failures().last().map(|f| &f.error)
    }
}

fn describe_last(failures: &[AttemptFailure]) -> String {
    failures
        .last()
        .map(|f| format!("; last error: {}", f.error))
        .unwrap_or_default()
}

/// Runs `attempt_fn` up to `max_attempts` times and returns the first success.
///
/// `attempt_fn` receives the 1-based attempt number. There is no backoff
/// between attempts. With `max_attempts == 0` no attempt is made.
///
/// # Errors
///
/// Returns `StageError::RetriesExhausted` carrying every attempt failure when
/// no attempt succeeds.
pub async fn with_retries<T, F, Fut>(
    stage: Stage,
    max_attempts: usize,
    mut attempt_fn: F,
) -> Result<T, StageError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let metrics = MetricsCollector::new();
    let mut failures = Vec::new();

    for attempt in 1..=max_attempts {
        match attempt_fn(attempt).await {
            Ok(value) => {
                metrics.record_stage_attempt(stage.as_str(), true);
                return Ok(value);
            }
            Err(e) => {
                metrics.record_stage_attempt(stage.as_str(), false);
                tracing::warn!(
                    stage = %stage,
                    attempt,
                    max_attempts,
                    kind = e.kind(),
                    error = %e,
                    "Stage attempt rejected"
                );
                failures.push(AttemptFailure { attempt, error: e });
            }
        }
    }

    Err(StageError::RetriesExhausted {
        stage,
        attempts: failures.len(),
        failures,
    })
}
