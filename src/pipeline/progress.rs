//! Shared progress state for submitted batches.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::types::{AgentResult, BatchId};

/// Lifecycle state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Running,
    Completed,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStatus::Running => write!(f, "running"),
            BatchStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Full progress record of a batch.
///
/// `results` is `Some` exactly when `status` is `Completed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub status: BatchStatus,
    pub results: Option<Vec<AgentResult>>,
}

impl BatchProgress {
    /// A freshly submitted batch with nothing resolved yet.
    pub fn running(total: usize) -> Self {
        Self {
            completed: 0,
            total,
            status: BatchStatus::Running,
            results: None,
        }
    }

    pub fn view(&self) -> ProgressView {
        ProgressView {
            completed: self.completed,
            total: self.total,
            status: self.status,
        }
    }
}

/// Snapshot returned by progress queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressView {
    pub completed: usize,
    pub total: usize,
    pub status: BatchStatus,
}

impl ProgressView {
    /// Fraction of tasks resolved, in `0.0..=1.0`. An empty batch is done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Answer to a results query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultsQuery {
    /// The batch finished; successful results in submission order.
    Ready(Vec<AgentResult>),
    StillRunning,
    NotFound,
}

/// Concurrency-safe map from batch id to progress.
///
/// Entries are kept for the life of the store.
#[derive(Debug, Default)]
pub struct ProgressStore {
    batches: RwLock<HashMap<BatchId, BatchProgress>>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new running batch of `total` tasks.
    pub async fn insert(&self, batch_id: BatchId, total: usize) {
        self.batches
            .write()
            .await
            .insert(batch_id, BatchProgress::running(total));
    }

    pub async fn get(&self, batch_id: &BatchId) -> Option<ProgressView> {
        self.batches.read().await.get(batch_id).map(BatchProgress::view)
    }

    pub async fn results(&self, batch_id: &BatchId) -> ResultsQuery {
        match self.batches.read().await.get(batch_id) {
            None => ResultsQuery::NotFound,
            Some(BatchProgress {
                status: BatchStatus::Completed,
                results: Some(results),
                ..
            }) => ResultsQuery::Ready(results.clone()),
            Some(_) => ResultsQuery::StillRunning,
        }
    }

    /// Counts one resolved task. Never exceeds `total`; unknown ids and
    /// finished batches are ignored.
    pub async fn record_completion(&self, batch_id: &BatchId) -> Option<ProgressView> {
        let mut batches = self.batches.write().await;
        let progress = batches.get_mut(batch_id)?;
        if progress.status == BatchStatus::Running && progress.completed < progress.total {
            progress.completed += 1;
        }
        Some(progress.view())
    }

    /// Marks the batch completed and freezes its results.
    ///
    /// Returns `false` if the batch is unknown or already completed.
    pub async fn finish(&self, batch_id: &BatchId, results: Vec<AgentResult>) -> bool {
        let mut batches = self.batches.write().await;
        match batches.get_mut(batch_id) {
            Some(progress) if progress.status == BatchStatus::Running => {
                progress.completed = progress.total;
                progress.status = BatchStatus::Completed;
                progress.results = Some(results);
                true
            }
            _ => false,
        }
    }

    /// Number of batches tracked.
    pub async fn len(&self) -> usize {
        self.batches.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{DecisionResult, Persona};
    use std::sync::Arc;

    fn result(attribute: &str) -> AgentResult {
        AgentResult {
            attribute: attribute.to_string(),
            persona: Persona {
                name: "Maya".to_string(),
                description: "A nurse".to_string(),
            },
            result: DecisionResult {
                decision: "Stay".to_string(),
                rationale: "Home".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_unknown_batch() {
        let store = ProgressStore::new();
        let id = BatchId::new();
        assert!(store.get(&id).await.is_none());
        assert_eq!(store.results(&id).await, ResultsQuery::NotFound);
        assert!(store.record_completion(&id).await.is_none());
        assert!(!store.finish(&id, Vec::new()).await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_running_batch() {
        let store = ProgressStore::new();
        let id = BatchId::new();
        store.insert(id, 100).await;

        let view = store.get(&id).await.expect("batch exists");
        assert_eq!(view.completed, 0);
        assert_eq!(view.total, 100);
        assert_eq!(view.status, BatchStatus::Running);
        assert_eq!(store.results(&id).await, ResultsQuery::StillRunning);
    }

    #[tokio::test]
    async fn test_completion_saturates_at_total() {
        let store = ProgressStore::new();
        let id = BatchId::new();
        store.insert(id, 2).await;

        for _ in 0..5 {
            store.record_completion(&id).await;
        }
        let view = store.get(&id).await.expect("batch exists");
        assert_eq!(view.completed, 2);
        assert_eq!(view.status, BatchStatus::Running);
    }

    #[tokio::test]
    async fn test_finish_freezes_results() {
        let store = ProgressStore::new();
        let id = BatchId::new();
        store.insert(id, 3).await;
        store.record_completion(&id).await;

        assert!(store.finish(&id, vec![result("a"), result("b")]).await);

        let progress = store.get(&id).await.expect("batch exists");
        assert_eq!(progress.completed, 3);
        assert_eq!(progress.status, BatchStatus::Completed);
        assert_eq!(store.results(&id).await, ResultsQuery::Ready(vec![result("a"), result("b")]));

        // One-way: a second finish and late completions change nothing.
        assert!(!store.finish(&id, Vec::new()).await);
        store.record_completion(&id).await;
        assert_eq!(
            store.results(&id).await,
            ResultsQuery::Ready(vec![result("a"), result("b")])
        );
        assert_eq!(store.get(&id).await.map(|v| v.completed), Some(3));
    }

    #[tokio::test]
    async fn test_concurrent_completions_are_not_lost() {
        let store = Arc::new(ProgressStore::new());
        let id = BatchId::new();
        store.insert(id, 200).await;

        let handles: Vec<_> = (0..200)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.record_completion(&id).await;
                })
            })
            .collect();
        for handle in handles {
            handle.await.expect("join");
        }

        assert_eq!(store.get(&id).await.map(|v| v.completed), Some(200));
    }

    #[test]
    fn test_progress_view_serialization() {
        let view = ProgressView {
            completed: 10,
            total: 100,
            status: BatchStatus::Running,
        };
        let json = serde_json::to_value(view).expect("serialize");
        assert_eq!(json["status"], "running");
        assert_eq!(json["completed"], 10);
        assert!((view.fraction() - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_batch_fraction() {
        let view = BatchProgress::running(0).view();
        assert!((view.fraction() - 1.0).abs() < f64::EPSILON);
    }
}
