//! Episodic memory: recall a studied list after a number of distractor turns.
//!
//! One episode per configured delay. The agent first sees `memory_span`
//! items, then answers `delay` unrelated arithmetic questions, then is asked
//! to recall the items. Only the recall is scored, with token overlap, so
//! partially remembered lists earn partial credit.

use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::Utc;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::config::{self, BenchmarkConfig, Options, DEFAULT_SEED, DEFAULT_TIME_LIMIT};
use super::lexicon::{pick, sample_distinct, COLORS, OBJECTS};
use super::{
    time_limit, Benchmark, BenchmarkKind, BenchmarkState, Difficulty, Lifecycle, Task,
    TaskEvaluator,
};
use crate::agent::AgentClient;
use crate::error::{BenchmarkError, ConfigError};
use crate::results::{self, BenchmarkResult, DerivedMetrics};
use crate::scoring::{ExpectedSolution, Scorer};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    /// Items presented per episode.
    pub memory_span: u32,
    /// Distractor turns between presentation and recall, one episode each.
    pub delay_intervals: Vec<u32>,
    pub time_limit: f64,
    pub seed: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            memory_span: 10,
            delay_intervals: vec![1, 5, 10],
            time_limit: DEFAULT_TIME_LIMIT,
            seed: DEFAULT_SEED,
        }
    }
}

impl BenchmarkConfig for MemoryConfig {
    const BENCHMARK: &'static str = "memory";

    fn validate(&self) -> Result<(), ConfigError> {
        config::require_positive("memory_span", u64::from(self.memory_span))?;
        config::require_non_empty("delay_intervals", &self.delay_intervals)?;
        config::require_all_positive("delay_intervals", &self.delay_intervals)?;
        config::require_distinct("delay_intervals", &self.delay_intervals)?;
        config::require_positive_seconds("time_limit", self.time_limit)
    }
}

fn difficulty_for_delay(delay: u32) -> Difficulty {
    match delay {
        0..=1 => Difficulty::Easy,
        2..=5 => Difficulty::Medium,
        _ => Difficulty::Hard,
    }
}

struct Item {
    locker: u32,
    color: &'static str,
    object: &'static str,
}

fn episode(rng: &mut ChaCha8Rng, index: usize, span: u32, delay: u32) -> Task {
    let locker_pool: Vec<u32> = (1..=span.saturating_mul(3).max(99)).collect();
    let mut lockers = sample_distinct(rng, &locker_pool, span as usize);
    lockers.sort_unstable();

    let items: Vec<Item> = lockers
        .into_iter()
        .map(|locker| Item {
            locker,
            color: pick(rng, COLORS),
            object: pick(rng, OBJECTS),
        })
        .collect();

    let listing = items
        .iter()
        .map(|item| format!("Locker {} holds a {} {}.", item.locker, item.color, item.object))
        .collect::<Vec<_>>()
        .join("\n");
    let mut context = vec![format!(
        "Memorize the following items. You will be asked to recall them later.\n{}\n\
         Reply with OK once you have memorized them.",
        listing
    )];
    for _ in 0..delay {
        let a: u32 = rng.random_range(10..=99);
        let b: u32 = rng.random_range(10..=99);
        context.push(format!(
            "Unrelated question: what is {} + {}? Respond with only the number.",
            a, b
        ));
    }

    let expected = items
        .iter()
        .map(|item| format!("{} {}", item.color, item.object))
        .collect::<Vec<_>>()
        .join(" ");

    Task::new(
        format!("memory-{:03}-delay-{}", index, delay),
        "Now recall the items you memorized earlier. For every locker, state the color and \
         object it held, one locker per line.",
        ExpectedSolution::tokens(expected),
        difficulty_for_delay(delay),
    )
    .with_context(context)
    .with_metadata("delay", delay)
    .with_metadata("memory_span", span)
}

/// One episode per configured delay, in configuration order.
pub fn generate_tasks(config: &MemoryConfig) -> Vec<Task> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    config
        .delay_intervals
        .iter()
        .enumerate()
        .map(|(i, &delay)| episode(&mut rng, i, config.memory_span, delay))
        .collect()
}

/// Measures recall as a function of delay.
pub struct EpisodicMemoryBenchmark {
    config: MemoryConfig,
    scorer: Scorer,
    tasks: OnceLock<Vec<Task>>,
    lifecycle: Lifecycle,
}

impl EpisodicMemoryBenchmark {
    pub fn new(options: &Options) -> Result<Self, ConfigError> {
        Ok(Self::from_config(config::configure(options)?))
    }

    pub fn from_config(config: MemoryConfig) -> Self {
        Self {
            config,
            scorer: Scorer::text_only(),
            tasks: OnceLock::new(),
            lifecycle: Lifecycle::configured(),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn tasks(&self) -> &[Task] {
        self.tasks.get_or_init(|| {
            let tasks = generate_tasks(&self.config);
            self.lifecycle.mark_generated();
            tasks
        })
    }
}

#[async_trait]
impl Benchmark for EpisodicMemoryBenchmark {
    fn kind(&self) -> BenchmarkKind {
        BenchmarkKind::Memory
    }

    fn options(&self) -> Options {
        config::to_options(&self.config)
    }

    fn state(&self) -> BenchmarkState {
        self.lifecycle.state()
    }

    fn task_count(&self) -> usize {
        self.tasks().len()
    }

    async fn run(&self, agent: &mut dyn AgentClient) -> Result<BenchmarkResult, BenchmarkError> {
        let tasks = self.tasks();
        let guard = self.lifecycle.begin(self.name())?;
        let started_at = Utc::now();
        let evaluator =
            TaskEvaluator::new(self.name(), &self.scorer, time_limit(self.config.time_limit));

        // Each episode starts from a fresh conversation.
        let task_results = evaluator.evaluate_each(agent, tasks).await?;

        let points: Vec<(f64, f64)> = task_results
            .iter()
            .filter_map(|r| {
                let delay = r.metadata.get("delay")?.as_f64()?;
                Some((delay, r.score))
            })
            .collect();
        let delays: Vec<String> = self
            .config
            .delay_intervals
            .iter()
            .map(u32::to_string)
            .collect();
        let derived = DerivedMetrics {
            decay_rate: Some(results::decay_rate(&points)),
            delay_scores: Some(results::category_scores(
                &task_results,
                &delays,
                |r| r.metadata_key("delay"),
            )),
            ..DerivedMetrics::default()
        };

        let levels: Vec<Difficulty> = config::dedup(
            &self
                .config
                .delay_intervals
                .iter()
                .map(|&d| difficulty_for_delay(d))
                .collect::<Vec<_>>(),
        );
        let result = BenchmarkResult::from_tasks(self.name(), task_results, &levels, started_at)
            .with_derived(derived);
        guard.succeed(&result);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::testing::{OracleAgent, ScriptedAgent};
    use serde_json::json;

    fn options(value: serde_json::Value) -> Options {
        value.as_object().cloned().unwrap()
    }

    fn expected_text(task: &Task) -> String {
        match &task.expected {
            ExpectedSolution::Text { value, .. } => value.clone(),
            ExpectedSolution::Execution(_) => unreachable!(),
        }
    }

    #[test]
    fn test_defaults_and_overrides() {
        let config: MemoryConfig = config::configure(&options(json!({"memory_span": 4}))).unwrap();
        assert_eq!(config.memory_span, 4);
        assert_eq!(config.delay_intervals, vec![1, 5, 10]);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn test_memory_span_must_be_positive() {
        let err = EpisodicMemoryBenchmark::new(&options(json!({"memory_span": 0}))).err();
        assert!(matches!(err, Some(ConfigError::InvalidOption { .. })));

        let err = EpisodicMemoryBenchmark::new(&options(json!({"memory_span": -1}))).err();
        assert!(matches!(err, Some(ConfigError::Malformed { .. })));

        let err = EpisodicMemoryBenchmark::new(&options(json!({"memory_span": "ten"}))).err();
        assert!(err.is_some());
    }

    #[test]
    fn test_episode_shape() {
        let config = MemoryConfig {
            memory_span: 4,
            delay_intervals: vec![1, 3],
            ..MemoryConfig::default()
        };
        let tasks = generate_tasks(&config);

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].context.len(), 2);
        assert_eq!(tasks[1].context.len(), 4);
        assert_eq!(expected_text(&tasks[0]).split_whitespace().count(), 8);
        assert_eq!(tasks[1].metadata["delay"], 3);
        assert_eq!(tasks[1].difficulty, Difficulty::Medium);
        assert_eq!(generate_tasks(&config), tasks);
    }

    #[tokio::test]
    async fn test_perfect_recall_has_no_decay() {
        let bench = EpisodicMemoryBenchmark::new(&options(json!({"memory_span": 3}))).unwrap();
        let mut agent = OracleAgent::for_tasks(bench.tasks());

        let result = bench.run(&mut agent).await.unwrap();
        assert_eq!(result.overall_score, 1.0);
        assert_eq!(result.derived.decay_rate, Some(0.0));
        assert_eq!(result.derived.delay_scores.as_ref().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_forgetting_shows_up_as_decay() {
        let bench = EpisodicMemoryBenchmark::new(&options(json!({"memory_span": 3}))).unwrap();

        // Remember everything after one distractor, nothing after more.
        let mut agent = ScriptedAgent::constant("OK");
        for task in bench.tasks() {
            agent.replies.extend(task.context.iter().map(|_| "OK".to_string()));
            let delay = task.metadata["delay"].as_u64().unwrap();
            agent.replies.push_back(if delay <= 1 {
                expected_text(task)
            } else {
                "I forgot".to_string()
            });
        }

        let result = bench.run(&mut agent).await.unwrap();
        let delay_scores = result.derived.delay_scores.clone().unwrap();
        assert_eq!(delay_scores["1"], 1.0);
        assert_eq!(delay_scores["5"], 0.0);
        assert_eq!(delay_scores["10"], 0.0);
        assert!(result.derived.decay_rate.unwrap() > 0.0);
        assert_eq!(agent.resets, 3);
    }

    #[tokio::test]
    async fn test_single_delay_has_zero_decay() {
        let bench =
            EpisodicMemoryBenchmark::new(&options(json!({"memory_span": 2, "delay_intervals": [2]})))
                .unwrap();
        let result = bench.run(&mut ScriptedAgent::constant("nothing")).await.unwrap();
        assert_eq!(result.derived.decay_rate, Some(0.0));
    }
}
