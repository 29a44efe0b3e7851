//! Prometheus-based metrics for benchmark runs.
//!
//! # Example
//!
//! ```ignore
//! use agi_bench::metrics::{init_metrics, export_metrics, MetricsCollector, TaskOutcome};
//!
//! init_metrics().expect("Failed to initialize metrics");
//!
//! let collector = MetricsCollector::new();
//! collector.record_task("Episodic Memory", TaskOutcome::Answered, "medium", 3.4, 0.8);
//!
//! let metrics_text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::{MetricsCollector, TaskOutcome};
pub use prometheus::{export_metrics, init_metrics};

pub use prometheus::{
    BENCHMARKS_IN_PROGRESS, BENCHMARK_RUNS_TOTAL, LLM_LATENCY, LLM_REQUESTS_TOTAL,
    LLM_TOKENS_TOTAL, REGISTRY, TASKS_TOTAL, TASK_DURATION, TASK_SCORE,
};
