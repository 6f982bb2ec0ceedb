//! Prometheus metrics for simulation runs.
//!
//! # Example
//!
//! ```ignore
//! use persona_forge::metrics::{init_metrics, export_metrics, MetricsCollector};
//!
//! init_metrics()?;
//! MetricsCollector::new().record_task(true);
//! println!("{}", export_metrics());
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::MetricsCollector;
pub use self::prometheus::{
    export_metrics, init_metrics, COMPLETION_LATENCY, COMPLETION_REQUESTS_TOTAL, REGISTRY,
    STAGE_ATTEMPTS_TOTAL, TASKS_TOTAL,
};
