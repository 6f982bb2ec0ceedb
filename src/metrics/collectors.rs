//! Recording helpers for persona-forge metrics.
//!
//! `MetricsCollector` wraps the raw Prometheus metrics with consistent labels.
//! Every method is a no-op when [`super::init_metrics`] was never called, so
//! library users and tests do not have to initialize metrics.

use std::time::Duration;

use super::prometheus::{
    COMPLETION_LATENCY, COMPLETION_REQUESTS_TOTAL, STAGE_ATTEMPTS_TOTAL, TASKS_TOTAL,
};

/// Metrics collector for simulation runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record a resolved task.
    pub fn record_task(&self, succeeded: bool) {
        let status = if succeeded { "succeeded" } else { "failed" };
        if let Some(tasks_total) = TASKS_TOTAL.get() {
            tasks_total.with_label_values(&[status]).inc();
        }
    }

    /// Record one attempt of a retry stage.
    ///
    /// # Arguments
    ///
    /// * `stage` - Stage name (e.g., "persona", "decision")
    /// * `accepted` - Whether the attempt produced a valid record
    pub fn record_stage_attempt(&self, stage: &str, accepted: bool) {
        let outcome = if accepted { "accepted" } else { "rejected" };
        if let Some(attempts) = STAGE_ATTEMPTS_TOTAL.get() {
            attempts.with_label_values(&[stage, outcome]).inc();
        }
    }

    /// Record a completion client call and its latency.
    pub fn record_completion(&self, status: &str, latency: Duration) {
        if let Some(requests) = COMPLETION_REQUESTS_TOTAL.get() {
            requests.with_label_values(&[status]).inc();
        }
        if let Some(histogram) = COMPLETION_LATENCY.get() {
            histogram.observe(latency.as_secs_f64());
        }
        tracing::trace!(
            status = status,
            latency_ms = latency.as_millis() as u64,
            "Recorded completion metric"
        );
    }
}
