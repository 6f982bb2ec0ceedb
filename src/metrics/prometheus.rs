//! Prometheus metrics registration and export.
//!
//! Defines the metrics recorded by persona-forge and provides functions for
//! initializing, registering, and exporting them.

use prometheus::{CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all persona-forge metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Resolved simulation tasks, labeled by status ("succeeded" / "failed").
pub static TASKS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Individual stage attempts, labeled by stage and outcome.
pub static STAGE_ATTEMPTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Completion client calls, labeled by status.
pub static COMPLETION_REQUESTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Completion client call latency in seconds.
pub static COMPLETION_LATENCY: OnceLock<Histogram> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Calling this more than once is harmless: the first registry wins and later
/// calls return `Ok(())` without re-registering.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric construction or registration fails.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let tasks_total = CounterVec::new(
        Opts::new("persona_forge_tasks_total", "Total number of resolved simulation tasks"),
        &["status"],
    )?;

    let stage_attempts_total = CounterVec::new(
        Opts::new(
            "persona_forge_stage_attempts_total",
            "Total number of persona/decision stage attempts",
        ),
        &["stage", "outcome"],
    )?;

    let completion_requests_total = CounterVec::new(
        Opts::new(
            "persona_forge_completion_requests_total",
            "Total completion requests sent to the LLM provider",
        ),
        &["status"],
    )?;

    let completion_latency = Histogram::with_opts(
        HistogramOpts::new(
            "persona_forge_completion_latency_seconds",
            "Completion request latency in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
    )?;

    registry.register(Box::new(tasks_total.clone()))?;
    registry.register(Box::new(stage_attempts_total.clone()))?;
    registry.register(Box::new(completion_requests_total.clone()))?;
    registry.register(Box::new(completion_latency.clone()))?;

    // Another thread may have raced us here; the loser's metrics are dropped.
    let _ = REGISTRY.set(registry);
    let _ = TASKS_TOTAL.set(tasks_total);
    let _ = STAGE_ATTEMPTS_TOTAL.set(stage_attempts_total);
    let _ = COMPLETION_REQUESTS_TOTAL.set(completion_requests_total);
    let _ = COMPLETION_LATENCY.set(completion_latency);

    tracing::debug!("Prometheus metrics initialized");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// Returns a comment line instead of failing when the registry has not been
/// initialized or encoding fails.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
