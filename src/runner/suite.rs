//! Runs a selection of benchmarks and merges their results.

use std::time::Instant;

use futures::future::join_all;
use tracing::{info, warn};

use super::config::SuiteConfig;
use crate::agent::{AgentClient, AgentFactory};
use crate::benchmark::BenchmarkKind;
use crate::error::{BenchmarkError, ConfigError};
use crate::results::{BenchmarkResult, SuiteResult};

/// Drives benchmarks built from one [`SuiteConfig`].
///
/// A benchmark that fails to build or run is left out of the suite result
/// and recorded under `errors`; the remaining benchmarks still run.
#[derive(Debug, Clone, Default)]
pub struct SuiteRunner {
    config: SuiteConfig,
}

impl SuiteRunner {
    pub fn new(config: SuiteConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Runs the selected benchmarks one after another with a single agent.
    ///
    /// Fails only when a name does not match any benchmark.
    pub async fn run_suite<S: AsRef<str>>(
        &self,
        selected: &[S],
        agent: &mut dyn AgentClient,
    ) -> Result<SuiteResult, ConfigError> {
        let kinds = BenchmarkKind::select(selected)?;
        let started = Instant::now();
        info!(
            model = agent.model(),
            benchmarks = ?kinds,
            "Starting benchmark suite"
        );

        let mut suite = SuiteResult::new(agent.model());
        for kind in kinds {
            let outcome = self.run_one(kind, agent).await;
            merge(&mut suite, kind, outcome);
        }

        finish(&suite, started);
        Ok(suite)
    }

    /// Runs the selected benchmarks concurrently, each with its own agent.
    ///
    /// Tasks inside one benchmark remain sequential.
    pub async fn run_suite_parallel<S: AsRef<str>>(
        &self,
        selected: &[S],
        factory: &dyn AgentFactory,
    ) -> Result<SuiteResult, ConfigError> {
        let kinds = BenchmarkKind::select(selected)?;
        let started = Instant::now();

        let mut agents: Vec<Box<dyn AgentClient>> = kinds.iter().map(|_| factory.create()).collect();
        let model = match agents.first() {
            Some(agent) => agent.model().to_string(),
            None => factory.create().model().to_string(),
        };
        info!(
            model = %model,
            benchmarks = ?kinds,
            "Starting benchmark suite in parallel"
        );

        let runs = kinds.iter().zip(agents.iter_mut()).map(|(&kind, agent)| async move {
            let outcome = self.run_one(kind, agent.as_mut()).await;
            (kind, outcome)
        });
        let outcomes = join_all(runs).await;

        let mut suite = SuiteResult::new(model);
        for (kind, outcome) in outcomes {
            merge(&mut suite, kind, outcome);
        }

        finish(&suite, started);
        Ok(suite)
    }

    async fn run_one(
        &self,
        kind: BenchmarkKind,
        agent: &mut dyn AgentClient,
    ) -> Result<BenchmarkResult, BenchmarkError> {
        let benchmark = kind.build(&self.config.options_for(kind))?;
        info!(
            benchmark = benchmark.name(),
            tasks = benchmark.task_count(),
            "Running benchmark"
        );
        agent.reset();
        benchmark.run(agent).await
    }
}

/// Runs the selected benchmarks with default options.
pub async fn run_suite<S: AsRef<str>>(
    selected: &[S],
    agent: &mut dyn AgentClient,
) -> Result<SuiteResult, ConfigError> {
    SuiteRunner::default().run_suite(selected, agent).await
}

fn merge(
    suite: &mut SuiteResult,
    kind: BenchmarkKind,
    outcome: Result<BenchmarkResult, BenchmarkError>,
) {
    match outcome {
        Ok(result) => suite.insert(result),
        Err(e) => {
            warn!(
                benchmark = kind.display_name(),
                error = %e,
                "Benchmark failed, continuing with the rest of the suite"
            );
            suite.record_error(kind.display_name(), e.to_string());
        }
    }
}

fn finish(suite: &SuiteResult, started: Instant) {
    info!(
        run_id = %suite.run_id,
        completed = suite.benchmarks.len(),
        failed = suite.errors.len(),
        overall_score = suite.overall_score,
        elapsed = ?started.elapsed(),
        "Benchmark suite finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::testing::{OfflineAgent, ScriptedAgent};
    use crate::benchmark::Options;
    use serde_json::json;

    fn options(value: serde_json::Value) -> Options {
        value.as_object().cloned().unwrap()
    }

    fn small_config() -> SuiteConfig {
        SuiteConfig::new()
            .with_options(BenchmarkKind::Transfer, options(json!({"num_tasks": 1})))
            .with_options(
                BenchmarkKind::Memory,
                options(json!({"memory_span": 2, "delay_intervals": [1]})),
            )
            .with_options(
                BenchmarkKind::Abstraction,
                options(json!({"concept_types": ["smell"]})),
            )
    }

    #[tokio::test]
    async fn test_selection_is_deduplicated() {
        let runner = SuiteRunner::new(small_config());
        let mut agent = ScriptedAgent::constant("OK");

        let suite = runner
            .run_suite(&["memory", "transfer", "memory"], &mut agent)
            .await
            .unwrap();

        let names: Vec<&str> = suite.benchmarks.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Episodic Memory", "Transfer Learning"]);
        assert_eq!(suite.model, "scripted");
        assert!(suite.errors.is_empty());
    }

    #[tokio::test]
    async fn test_bad_benchmark_does_not_stop_the_suite() {
        let runner = SuiteRunner::new(small_config());
        let mut agent = ScriptedAgent::constant("OK");

        let suite = runner
            .run_suite(&["transfer", "abstraction"], &mut agent)
            .await
            .unwrap();

        assert!(suite.benchmarks.contains_key("Transfer Learning"));
        assert!(!suite.benchmarks.contains_key("Concept Formation"));
        assert!(suite.errors["Concept Formation"].contains("concept_types"));
        assert!(suite.to_json().unwrap().contains("\"errors\""));
    }

    #[tokio::test]
    async fn test_unknown_name_is_an_error() {
        let err = run_suite(&["memory", "telepathy"], &mut ScriptedAgent::constant("OK"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBenchmark(_)));
    }

    #[tokio::test]
    async fn test_all_with_offline_agent() {
        let suite = run_suite(&["all"], &mut OfflineAgent).await.unwrap();

        assert_eq!(suite.benchmarks.len(), 6);
        assert_eq!(suite.overall_score, 0.0);
        assert!(suite
            .benchmarks
            .values()
            .flat_map(|b| b.task_results())
            .all(|t| t.communication_failed && t.score == 0.0));
    }

    #[tokio::test]
    async fn test_parallel_matches_sequential_selection() {
        let runner = SuiteRunner::new(small_config());
        let factory = || -> Box<dyn AgentClient> { Box::new(ScriptedAgent::constant("OK")) };

        let suite = runner
            .run_suite_parallel(&["transfer", "memory", "abstraction"], &factory)
            .await
            .unwrap();

        assert_eq!(suite.benchmarks.len(), 2);
        assert_eq!(suite.errors.len(), 1);
        assert_eq!(suite.model, "scripted");
    }
}
