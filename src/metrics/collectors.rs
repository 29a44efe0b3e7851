//! High-level recording interface over the raw Prometheus metrics.

use super::prometheus::{
    BENCHMARKS_IN_PROGRESS, BENCHMARK_RUNS_TOTAL, LLM_LATENCY, LLM_REQUESTS_TOTAL,
    LLM_TOKENS_TOTAL, TASKS_TOTAL, TASK_DURATION, TASK_SCORE,
};

/// How a task evaluation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The agent replied within the time limit.
    Answered,
    /// The transport failed; the task scored 0.0.
    CommunicationFailed,
    /// The time limit elapsed; the task scored 0.0.
    TimedOut,
}

impl TaskOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOutcome::Answered => "answered",
            TaskOutcome::CommunicationFailed => "communication_failed",
            TaskOutcome::TimedOut => "timed_out",
        }
    }
}

/// Records agi-bench operational metrics.
///
/// Metrics must be initialized with `init_metrics()` first; until then every
/// method is a no-op.
///
/// # Example
///
/// ```ignore
/// use agi_bench::metrics::{init_metrics, MetricsCollector, TaskOutcome};
///
/// init_metrics().expect("Failed to init metrics");
/// let collector = MetricsCollector::new();
/// collector.record_task("Transfer Learning", TaskOutcome::Answered, "easy", 1.2, 1.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record one evaluated task.
    pub fn record_task(
        &self,
        benchmark: &str,
        outcome: TaskOutcome,
        difficulty: &str,
        duration_secs: f64,
        score: f64,
    ) {
        if let Some(tasks_total) = TASKS_TOTAL.get() {
            tasks_total
                .with_label_values(&[benchmark, outcome.as_str(), difficulty])
                .inc();
        }

        if let Some(task_duration) = TASK_DURATION.get() {
            task_duration
                .with_label_values(&[benchmark])
                .observe(duration_secs);
        }

        if let Some(task_score) = TASK_SCORE.get() {
            task_score.with_label_values(&[benchmark]).observe(score);
        }

        tracing::trace!(
            benchmark = benchmark,
            outcome = outcome.as_str(),
            difficulty = difficulty,
            duration_secs = duration_secs,
            score = score,
            "Recorded task metric"
        );
    }

    /// Mark a benchmark as started.
    pub fn benchmark_started(&self) {
        if let Some(in_progress) = BENCHMARKS_IN_PROGRESS.get() {
            in_progress.inc();
        }
    }

    /// Mark a benchmark as finished, successfully or not.
    pub fn benchmark_finished(&self, benchmark: &str, success: bool) {
        let status = if success { "completed" } else { "failed" };

        if let Some(in_progress) = BENCHMARKS_IN_PROGRESS.get() {
            in_progress.dec();
        }

        if let Some(runs) = BENCHMARK_RUNS_TOTAL.get() {
            runs.with_label_values(&[benchmark, status]).inc();
        }

        tracing::trace!(benchmark = benchmark, status = status, "Recorded benchmark run");
    }

    /// Record one LLM API request.
    pub fn record_llm_request(
        &self,
        model: &str,
        success: bool,
        latency_secs: f64,
        input_tokens: u64,
        output_tokens: u64,
    ) {
        let status = if success { "success" } else { "failure" };

        if let Some(llm_requests) = LLM_REQUESTS_TOTAL.get() {
            llm_requests.with_label_values(&[model, status]).inc();
        }

        if let Some(llm_latency) = LLM_LATENCY.get() {
            llm_latency
                .with_label_values(&[model])
                .observe(latency_secs);
        }

        if let Some(llm_tokens) = LLM_TOKENS_TOTAL.get() {
            llm_tokens
                .with_label_values(&[model, "input"])
                .inc_by(input_tokens as f64);
            llm_tokens
                .with_label_values(&[model, "output"])
                .inc_by(output_tokens as f64);
        }

        tracing::trace!(
            model = model,
            status = status,
            latency_secs = latency_secs,
            input_tokens = input_tokens,
            output_tokens = output_tokens,
            "Recorded LLM request metric"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{export_metrics, init_metrics};

    fn ensure_metrics_init() {
        let _ = init_metrics();
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(TaskOutcome::Answered.as_str(), "answered");
        assert_eq!(TaskOutcome::TimedOut.as_str(), "timed_out");
        assert_eq!(
            TaskOutcome::CommunicationFailed.as_str(),
            "communication_failed"
        );
    }

    #[test]
    fn test_record_task() {
        ensure_metrics_init();
        let collector = MetricsCollector::new();

        collector.record_task("Collector Test", TaskOutcome::Answered, "easy", 0.7, 1.0);
        collector.record_task("Collector Test", TaskOutcome::TimedOut, "hard", 300.0, 0.0);

        let exported = export_metrics();
        assert!(exported.contains("agi_bench_tasks_total"));
        assert!(exported.contains("Collector Test"));
    }

    #[test]
    fn test_benchmark_lifecycle_metrics() {
        ensure_metrics_init();
        let collector = MetricsCollector::new();

        collector.benchmark_started();
        collector.benchmark_finished("Lifecycle Test", true);

        assert!(export_metrics().contains("agi_bench_benchmark_runs_total"));
    }

    #[test]
    fn test_record_llm_request() {
        ensure_metrics_init();
        let collector = MetricsCollector::new();

        collector.record_llm_request("test-model", true, 1.5, 120, 30);
        collector.record_llm_request("test-model", false, 0.1, 0, 0);
    }
}
