//! Sequential decision making in a bounded counter environment.
//!
//! A counter starts at some value and a small set of actions changes it. The
//! agent must work out the length of the shortest plan that reaches a target
//! value. Targets are produced by a random walk of `horizon` actions, so a
//! plan of at most `horizon` steps always exists; the reference answer is the
//! breadth-first shortest plan. In stochastic environments each attempt
//! succeeds with probability `p`, and the answer is the expected number of
//! attempts for a shortest plan.

use std::collections::VecDeque;
use std::fmt;
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::Utc;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::config::{self, BenchmarkConfig, Options, DEFAULT_SEED, DEFAULT_TIME_LIMIT};
use super::lexicon::pick;
use super::{
    time_limit, Benchmark, BenchmarkKind, BenchmarkState, Difficulty, Lifecycle, Task,
    TaskEvaluator,
};
use crate::agent::AgentClient;
use crate::error::{BenchmarkError, ConfigError};
use crate::results::{self, BenchmarkResult, DerivedMetrics};
use crate::scoring::{ExpectedSolution, Scorer};

pub const ENVIRONMENT_TYPES: [&str; 2] = ["deterministic", "stochastic"];
pub const COMPLEXITY_LEVELS: [&str; 2] = ["simple", "complex"];

/// Inclusive upper bound of the counter.
pub const COUNTER_MAX: i64 = 4000;

/// Random walks stay below this so doubling has headroom.
const WALK_MAX: i64 = COUNTER_MAX / 2;

const SUCCESS_PROBABILITIES: [f64; 2] = [0.5, 0.75];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlanningConfig {
    pub environment_types: Vec<String>,
    pub horizon_lengths: Vec<u32>,
    pub complexity_levels: Vec<String>,
    pub time_limit: f64,
    pub seed: u64,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            environment_types: ENVIRONMENT_TYPES.iter().map(|s| s.to_string()).collect(),
            horizon_lengths: vec![5, 10, 20],
            complexity_levels: COMPLEXITY_LEVELS.iter().map(|s| s.to_string()).collect(),
            time_limit: DEFAULT_TIME_LIMIT,
            seed: DEFAULT_SEED,
        }
    }
}

impl BenchmarkConfig for PlanningConfig {
    const BENCHMARK: &'static str = "planning";

    fn validate(&self) -> Result<(), ConfigError> {
        config::require_known(
            "environment_types",
            &self.environment_types,
            &ENVIRONMENT_TYPES,
        )?;
        config::require_known(
            "complexity_levels",
            &self.complexity_levels,
            &COMPLEXITY_LEVELS,
        )?;
        config::require_non_empty("horizon_lengths", &self.horizon_lengths)?;
        config::require_all_positive("horizon_lengths", &self.horizon_lengths)?;
        config::require_distinct("horizon_lengths", &self.horizon_lengths)?;
        config::require_positive_seconds("time_limit", self.time_limit)
    }
}

/// One way of changing the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Add(i64),
    Subtract(i64),
    Double,
}

impl Action {
    pub fn apply(&self, value: i64) -> i64 {
        match self {
            Action::Add(n) => value + n,
            Action::Subtract(n) => value - n,
            Action::Double => value * 2,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Add(n) => write!(f, "add {}", n),
            Action::Subtract(n) => write!(f, "subtract {}", n),
            Action::Double => f.write_str("double"),
        }
    }
}

/// Fewest actions from `start` to `target` keeping the counter in
/// `0..=COUNTER_MAX`, or `None` if the target is unreachable.
pub fn shortest_plan(start: i64, target: i64, actions: &[Action]) -> Option<u32> {
    let in_bounds = |v: i64| (0..=COUNTER_MAX).contains(&v);
    if !in_bounds(start) || !in_bounds(target) {
        return None;
    }

    let mut distance: Vec<Option<u32>> = vec![None; (COUNTER_MAX + 1) as usize];
    let mut queue = VecDeque::from([start]);
    distance[start as usize] = Some(0);

    while let Some(value) = queue.pop_front() {
        let steps = distance[value as usize]?;
        if value == target {
            return Some(steps);
        }
        for action in actions {
            let next = action.apply(value);
            if in_bounds(next) && distance[next as usize].is_none() {
                distance[next as usize] = Some(steps + 1);
                queue.push_back(next);
            }
        }
    }
    None
}

fn action_set(rng: &mut ChaCha8Rng, complexity: &str) -> Vec<Action> {
    if complexity == "complex" {
        vec![
            Action::Add(rng.random_range(2..=9)),
            Action::Subtract(rng.random_range(1..=5)),
            Action::Double,
        ]
    } else {
        vec![
            Action::Add(rng.random_range(2..=4)),
            Action::Add(rng.random_range(5..=9)),
        ]
    }
}

/// Applies `horizon` random in-bounds actions and returns the end value.
fn random_walk(rng: &mut ChaCha8Rng, start: i64, horizon: u32, actions: &[Action]) -> i64 {
    let mut value = start;
    for _ in 0..horizon {
        let valid: Vec<i64> = actions
            .iter()
            .map(|a| a.apply(value))
            .filter(|v| (0..=WALK_MAX).contains(v))
            .collect();
        if valid.is_empty() {
            break;
        }
        value = pick(rng, &valid);
    }
    value
}

fn difficulty_for_horizon(horizon: u32) -> Difficulty {
    match horizon {
        0..=5 => Difficulty::Easy,
        6..=10 => Difficulty::Medium,
        _ => Difficulty::Hard,
    }
}

fn planning_task(
    rng: &mut ChaCha8Rng,
    index: usize,
    environment: &str,
    horizon: u32,
    complexity: &str,
) -> Task {
    let actions = action_set(rng, complexity);
    let start: i64 = rng.random_range(1..=10);
    let mut target = random_walk(rng, start, horizon, &actions);
    for _ in 0..8 {
        if target != start {
            break;
        }
        target = random_walk(rng, start, horizon, &actions);
    }
    let steps = shortest_plan(start, target, &actions).unwrap_or(horizon);

    let action_list = actions
        .iter()
        .map(Action::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let setup = format!(
        "A counter starts at {}. The available actions are: {}. \
         The counter must always stay between 0 and {}.",
        start, action_list, COUNTER_MAX
    );

    let task = if environment == "stochastic" {
        let probability = pick(rng, &SUCCESS_PROBABILITIES);
        let expected_attempts = f64::from(steps) / probability;
        Task::new(
            format!("planning-{:03}", index),
            format!(
                "{}\nEach action succeeds with probability {}; a failed action leaves the counter \
                 unchanged and must be retried.\nFollowing a shortest plan, what is the expected \
                 total number of action attempts needed to make the counter exactly {}? \
                 Respond with only the number, rounded to one decimal place.",
                setup, probability, target
            ),
            ExpectedSolution::exact(format!("{:.1}", expected_attempts)),
            difficulty_for_horizon(horizon),
        )
        .with_metadata("success_probability", probability)
    } else {
        Task::new(
            format!("planning-{:03}", index),
            format!(
                "{}\nWhat is the minimum number of actions needed to make the counter exactly {}? \
                 Respond with only the number.",
                setup, target
            ),
            ExpectedSolution::exact(steps.to_string()),
            difficulty_for_horizon(horizon),
        )
    };

    task.with_category(environment)
        .with_metadata("environment", environment)
        .with_metadata("horizon", horizon)
        .with_metadata("complexity", complexity)
        .with_metadata("start", start)
        .with_metadata("target", target)
        .with_metadata("shortest_plan", steps)
}

/// One task per environment, horizon and complexity combination.
pub fn generate_tasks(config: &PlanningConfig) -> Vec<Task> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut tasks = Vec::new();
    for environment in &config.environment_types {
        for &horizon in &config.horizon_lengths {
            for complexity in &config.complexity_levels {
                let index = tasks.len();
                tasks.push(planning_task(
                    &mut rng,
                    index,
                    environment,
                    horizon,
                    complexity,
                ));
            }
        }
    }
    tasks
}

/// Measures multi-step planning across environments and horizons.
pub struct SequentialDecisionBenchmark {
    config: PlanningConfig,
    scorer: Scorer,
    tasks: OnceLock<Vec<Task>>,
    lifecycle: Lifecycle,
}

impl SequentialDecisionBenchmark {
    pub fn new(options: &Options) -> Result<Self, ConfigError> {
        Ok(Self::from_config(config::configure(options)?))
    }

    pub fn from_config(config: PlanningConfig) -> Self {
        Self {
            config,
            scorer: Scorer::text_only(),
            tasks: OnceLock::new(),
            lifecycle: Lifecycle::configured(),
        }
    }

    pub fn config(&self) -> &PlanningConfig {
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
impl Benchmark for SequentialDecisionBenchmark {
    fn kind(&self) -> BenchmarkKind {
        BenchmarkKind::Planning
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

        let task_results = evaluator.evaluate_each(agent, tasks).await?;

        let horizons: Vec<String> = self
            .config
            .horizon_lengths
            .iter()
            .map(u32::to_string)
            .collect();
        let derived = DerivedMetrics {
            environment_scores: Some(results::category_scores(
                &task_results,
                &self.config.environment_types,
                |r| r.metadata_key("environment"),
            )),
            horizon_scores: Some(results::category_scores(
                &task_results,
                &horizons,
                |r| r.metadata_key("horizon"),
            )),
            complexity_scores: Some(results::category_scores(
                &task_results,
                &self.config.complexity_levels,
                |r| r.metadata_key("complexity"),
            )),
            ..DerivedMetrics::default()
        };

        let levels: Vec<Difficulty> = config::dedup(
            &self
                .config
                .horizon_lengths
                .iter()
                .map(|&h| difficulty_for_horizon(h))
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
    use crate::benchmark::testing::OracleAgent;
    use serde_json::json;

    fn options(value: serde_json::Value) -> Options {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_shortest_plan() {
        let adds = [Action::Add(2), Action::Add(5)];
        assert_eq!(shortest_plan(1, 10, &adds), Some(3));
        assert_eq!(shortest_plan(4, 4, &adds), Some(0));
        // Parity makes 10 unreachable with +2 alone.
        assert_eq!(shortest_plan(1, 10, &[Action::Add(2)]), None);
        assert_eq!(shortest_plan(3, 12, &[Action::Double, Action::Add(3)]), Some(2));
        assert_eq!(shortest_plan(1, COUNTER_MAX + 1, &adds), None);
    }

    #[test]
    fn test_bounds_apply_to_intermediate_states() {
        // Doubling 2500 overshoots the bound, so the two-step route is closed.
        assert_eq!(
            shortest_plan(2500, 4000, &[Action::Double, Action::Subtract(1000)]),
            Some(4)
        );
    }

    #[test]
    fn test_invalid_options() {
        for bad in [
            json!({"environment_types": ["chaotic"]}),
            json!({"complexity_levels": []}),
            json!({"horizon_lengths": [5, 0]}),
        ] {
            assert!(SequentialDecisionBenchmark::new(&options(bad)).is_err());
        }
    }

    #[test]
    fn test_generated_answers_match_planner() {
        let tasks = generate_tasks(&PlanningConfig::default());
        assert_eq!(tasks.len(), 12);

        for task in &tasks {
            let steps = task.metadata["shortest_plan"].as_u64().unwrap();
            let horizon = task.metadata["horizon"].as_u64().unwrap();
            assert!(steps <= horizon, "{} needs {} > {} steps", task.id, steps, horizon);

            if let ExpectedSolution::Text { value, .. } = &task.expected {
                match task.metadata.get("success_probability") {
                    Some(p) => {
                        let expected = steps as f64 / p.as_f64().unwrap();
                        assert_eq!(value, &format!("{:.1}", expected));
                    }
                    None => assert_eq!(value, &steps.to_string()),
                }
            }
        }
    }

    #[tokio::test]
    async fn test_breakdowns() {
        let bench = SequentialDecisionBenchmark::new(&options(json!({
            "environment_types": ["deterministic"],
            "horizon_lengths": [3, 8],
            "complexity_levels": ["simple"]
        })))
        .unwrap();
        let mut agent = OracleAgent::for_tasks(bench.tasks());

        let result = bench.run(&mut agent).await.unwrap();
        assert_eq!(result.overall_score, 1.0);
        assert_eq!(result.derived.horizon_scores.as_ref().unwrap()["8"], 1.0);
        assert_eq!(
            result.derived.environment_scores.as_ref().unwrap()["deterministic"],
            1.0
        );
        assert!(result.difficulty_scores.contains_key("easy"));
        assert!(result.difficulty_scores.contains_key("medium"));
    }
}
