//! Prometheus metrics registration and export.
//!
//! This module defines all Prometheus metrics used by agi-bench and provides
//! functions for initializing, registering, and exporting metrics.

use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all agi-bench metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Total number of evaluated tasks, labeled by benchmark, outcome, and difficulty.
pub static TASKS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Wall-clock time of the scored agent call, labeled by benchmark.
pub static TASK_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Distribution of task scores, labeled by benchmark.
pub static TASK_SCORE: OnceLock<HistogramVec> = OnceLock::new();

/// Benchmark runs, labeled by benchmark and status (completed/failed).
pub static BENCHMARK_RUNS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Number of benchmarks currently running.
pub static BENCHMARKS_IN_PROGRESS: OnceLock<Gauge> = OnceLock::new();

/// Total LLM API requests, labeled by model and status.
pub static LLM_REQUESTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// LLM API request latency in seconds, labeled by model.
pub static LLM_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Total tokens used, labeled by model and type (input/output).
pub static LLM_TOKENS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Call once at startup. Recording before initialization is a no-op.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails, typically due to
/// duplicate metric names or invalid metric configurations.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let registry = Registry::new();

    let tasks_total = CounterVec::new(
        Opts::new("agi_bench_tasks_total", "Total number of evaluated tasks"),
        &["benchmark", "outcome", "difficulty"],
    )?;

    let task_duration = HistogramVec::new(
        HistogramOpts::new(
            "agi_bench_task_duration_seconds",
            "Duration of the scored agent call in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["benchmark"],
    )?;

    let task_score = HistogramVec::new(
        HistogramOpts::new("agi_bench_task_score", "Distribution of task scores")
            .buckets(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0]),
        &["benchmark"],
    )?;

    let benchmark_runs_total = CounterVec::new(
        Opts::new("agi_bench_benchmark_runs_total", "Total benchmark runs"),
        &["benchmark", "status"],
    )?;

    let benchmarks_in_progress = Gauge::new(
        "agi_bench_benchmarks_in_progress",
        "Number of benchmarks currently running",
    )?;

    let llm_requests_total = CounterVec::new(
        Opts::new("agi_bench_llm_requests_total", "Total LLM API requests"),
        &["model", "status"],
    )?;

    let llm_latency = HistogramVec::new(
        HistogramOpts::new(
            "agi_bench_llm_latency_seconds",
            "LLM API request latency in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["model"],
    )?;

    let llm_tokens_total = CounterVec::new(
        Opts::new("agi_bench_llm_tokens_total", "Total tokens used"),
        &["model", "type"],
    )?;

    registry.register(Box::new(tasks_total.clone()))?;
    registry.register(Box::new(task_duration.clone()))?;
    registry.register(Box::new(task_score.clone()))?;
    registry.register(Box::new(benchmark_runs_total.clone()))?;
    registry.register(Box::new(benchmarks_in_progress.clone()))?;
    registry.register(Box::new(llm_requests_total.clone()))?;
    registry.register(Box::new(llm_latency.clone()))?;
    registry.register(Box::new(llm_tokens_total.clone()))?;

    // Already-set cells mean a previous call won; keep its metrics.
    let _ = REGISTRY.set(registry);
    let _ = TASKS_TOTAL.set(tasks_total);
    let _ = TASK_DURATION.set(task_duration);
    let _ = TASK_SCORE.set(task_score);
    let _ = BENCHMARK_RUNS_TOTAL.set(benchmark_runs_total);
    let _ = BENCHMARKS_IN_PROGRESS.set(benchmarks_in_progress);
    let _ = LLM_REQUESTS_TOTAL.set(llm_requests_total);
    let _ = LLM_LATENCY.set(llm_latency);
    let _ = LLM_TOKENS_TOTAL.set(llm_tokens_total);

    tracing::debug!("Prometheus metrics initialized");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// Returns a comment line instead when the registry was never initialized or
/// encoding fails.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics() {
        let result = init_metrics();
        assert!(result.is_ok() || REGISTRY.get().is_some());
    }

    #[test]
    fn test_export_metrics_never_empty() {
        assert!(!export_metrics().is_empty());
    }

    #[test]
    fn test_metrics_after_init() {
        let _ = init_metrics();

        let metrics = export_metrics();
        assert!(!metrics.is_empty());
        if REGISTRY.get().is_some() {
            assert!(!metrics.starts_with("# Error"));
        }
    }
}
