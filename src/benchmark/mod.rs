//! Benchmark protocol and the six domain variants.
//!
//! Every variant follows the same contract: it is configured once from an
//! [`Options`] map, generates its tasks lazily and deterministically from the
//! configured seed, and runs them one by one against an [`AgentClient`].
//!
//! A run never fails because of a single task. Timeouts, transport failures
//! and broken generated code all degrade to a 0.0 score on that task; only
//! configuration or scoring errors, or a second concurrent `run` on the same
//! instance, abort it.

pub mod abstraction;
pub mod code;
pub mod config;
pub mod grid;
pub mod lexicon;
pub mod memory;
pub mod planning;
pub mod task;
pub mod transfer;
pub mod vision;

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::agent::{AgentClient, Solution};
use crate::error::{BenchmarkError, ConfigError};
use crate::metrics::{MetricsCollector, TaskOutcome};
use crate::results::{BenchmarkResult, TaskResult};
use crate::scoring::Scorer;

pub use abstraction::{AbstractionConfig, ConceptFormationBenchmark};
pub use code::{CodeConfig, CodeGenerationBenchmark};
pub use config::{configure, BenchmarkConfig, Options, DEFAULT_SEED, DEFAULT_TIME_LIMIT};
pub use memory::{EpisodicMemoryBenchmark, MemoryConfig};
pub use planning::{PlanningConfig, SequentialDecisionBenchmark};
pub use task::{Difficulty, Task, TaskPair};
pub use transfer::{TaskAdaptationBenchmark, TransferConfig};
pub use vision::{VisionConfig, VisualReasoningBenchmark};

/// The six benchmark domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkKind {
    Transfer,
    Memory,
    Abstraction,
    Planning,
    Code,
    Vision,
}

impl BenchmarkKind {
    /// Canonical run order.
    pub const ALL: [BenchmarkKind; 6] = [
        BenchmarkKind::Transfer,
        BenchmarkKind::Memory,
        BenchmarkKind::Abstraction,
        BenchmarkKind::Planning,
        BenchmarkKind::Code,
        BenchmarkKind::Vision,
    ];

    /// Short name used on the command line and in suite files.
    pub fn key(&self) -> &'static str {
        match self {
            BenchmarkKind::Transfer => "transfer",
            BenchmarkKind::Memory => "memory",
            BenchmarkKind::Abstraction => "abstraction",
            BenchmarkKind::Planning => "planning",
            BenchmarkKind::Code => "code",
            BenchmarkKind::Vision => "vision",
        }
    }

    /// Name used in results and reports.
    pub fn display_name(&self) -> &'static str {
        match self {
            BenchmarkKind::Transfer => "Transfer Learning",
            BenchmarkKind::Memory => "Episodic Memory",
            BenchmarkKind::Abstraction => "Concept Formation",
            BenchmarkKind::Planning => "Sequential Decision",
            BenchmarkKind::Code => "Code Generation",
            BenchmarkKind::Vision => "Visual Reasoning",
        }
    }

    /// Resolves names (including the `all` wildcard) to kinds in canonical
    /// order, without duplicates.
    pub fn select<S: AsRef<str>>(names: &[S]) -> Result<Vec<BenchmarkKind>, ConfigError> {
        let mut selected = Vec::new();
        for name in names {
            let name = name.as_ref();
            if name.eq_ignore_ascii_case("all") {
                selected.extend(BenchmarkKind::ALL);
            } else {
                selected.push(name.parse()?);
            }
        }
        Ok(BenchmarkKind::ALL
            .into_iter()
            .filter(|kind| selected.contains(kind))
            .collect())
    }

    /// Constructs the benchmark for this kind from raw options.
    pub fn build(&self, options: &Options) -> Result<Box<dyn Benchmark>, ConfigError> {
        Ok(match self {
            BenchmarkKind::Transfer => Box::new(TaskAdaptationBenchmark::new(options)?),
            BenchmarkKind::Memory => Box::new(EpisodicMemoryBenchmark::new(options)?),
            BenchmarkKind::Abstraction => Box::new(ConceptFormationBenchmark::new(options)?),
            BenchmarkKind::Planning => Box::new(SequentialDecisionBenchmark::new(options)?),
            BenchmarkKind::Code => Box::new(CodeGenerationBenchmark::new(options)?),
            BenchmarkKind::Vision => Box::new(VisualReasoningBenchmark::new(options)?),
        })
    }
}

impl fmt::Display for BenchmarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for BenchmarkKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BenchmarkKind::ALL
            .into_iter()
            .find(|kind| kind.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownBenchmark(s.to_string()))
    }
}

/// A configured benchmark that can drive an agent through its tasks.
#[async_trait]
pub trait Benchmark: Send + Sync {
    fn kind(&self) -> BenchmarkKind;

    fn name(&self) -> &'static str {
        self.kind().display_name()
    }

    /// The resolved configuration, defaults included.
    fn options(&self) -> Options;

    fn state(&self) -> BenchmarkState;

    /// Number of scored prompts; generates the tasks if needed.
    fn task_count(&self) -> usize;

    /// Runs every task in order and aggregates the results.
    ///
    /// Fails with [`BenchmarkError::ConcurrentRun`] if this instance is
    /// already running.
    async fn run(&self, agent: &mut dyn AgentClient) -> Result<BenchmarkResult, BenchmarkError>;
}

/// Where a benchmark instance is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkState {
    Uninitialized,
    Configured,
    TasksGenerated,
    Running,
    Completed,
}

/// Single-flight guard around a benchmark's state.
#[derive(Debug)]
pub struct Lifecycle {
    state: Mutex<BenchmarkState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: Mutex::new(BenchmarkState::Uninitialized),
        }
    }
}

impl Lifecycle {
    pub fn configured() -> Self {
        Self {
            state: Mutex::new(BenchmarkState::Configured),
        }
    }

    pub fn state(&self) -> BenchmarkState {
        *self.lock()
    }

    /// Records that tasks now exist. Only moves forward from `Configured`.
    pub fn mark_generated(&self) {
        let mut state = self.lock();
        if *state == BenchmarkState::Configured {
            *state = BenchmarkState::TasksGenerated;
        }
    }

    /// Enters `Running`, or fails if a run is already in flight.
    ///
    /// The returned guard moves the state to `Completed` when dropped.
    pub fn begin(&self, benchmark: &str) -> Result<RunGuard<'_>, BenchmarkError> {
        let mut state = self.lock();
        if *state == BenchmarkState::Running {
            return Err(BenchmarkError::ConcurrentRun {
                benchmark: benchmark.to_string(),
            });
        }
        *state = BenchmarkState::Running;
        drop(state);

        info!(benchmark, "Benchmark started");
        MetricsCollector::new().benchmark_started();
        Ok(RunGuard {
            lifecycle: self,
            benchmark: benchmark.to_string(),
            succeeded: false,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BenchmarkState> {
        // The state is a plain enum; a poisoned lock still holds a valid value.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Held for the duration of a run.
pub struct RunGuard<'a> {
    lifecycle: &'a Lifecycle,
    benchmark: String,
    succeeded: bool,
}

impl RunGuard<'_> {
    /// Marks the run as successful before the guard is dropped.
    pub fn succeed(mut self, result: &BenchmarkResult) {
        self.succeeded = true;
        info!(
            benchmark = %self.benchmark,
            tasks = result.task_count(),
            overall_score = result.overall_score,
            duration_secs = result.duration_secs,
            "Benchmark completed"
        );
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.lifecycle.lock() = BenchmarkState::Completed;
        MetricsCollector::new().benchmark_finished(&self.benchmark, self.succeeded);
        if !self.succeeded {
            warn!(benchmark = %self.benchmark, "Benchmark run aborted");
        }
    }
}

/// Converts a configured time limit into a timeout duration.
pub(crate) fn time_limit(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}

/// Sends prompts to an agent and scores the replies.
pub struct TaskEvaluator<'a> {
    benchmark: &'a str,
    scorer: &'a Scorer,
    time_limit: Duration,
    metrics: MetricsCollector,
}

impl<'a> TaskEvaluator<'a> {
    pub fn new(benchmark: &'a str, scorer: &'a Scorer, time_limit: Duration) -> Self {
        Self {
            benchmark,
            scorer,
            time_limit,
            metrics: MetricsCollector::new(),
        }
    }

    /// Calls the agent, bounded by the time limit. `None` on timeout.
    async fn timed_solve(&self, agent: &mut dyn AgentClient, prompt: &str) -> Option<Solution> {
        tokio::time::timeout(self.time_limit, agent.solve(prompt))
            .await
            .ok()
    }

    /// Evaluates one task: context prompts first (unscored), then the
    /// scored prompt.
    pub async fn evaluate(
        &self,
        agent: &mut dyn AgentClient,
        task: &Task,
    ) -> Result<TaskResult, BenchmarkError> {
        for (step, prompt) in task.context.iter().enumerate() {
            if self.timed_solve(agent, prompt).await.is_none() {
                warn!(
                    benchmark = self.benchmark,
                    task_id = %task.id,
                    step,
                    "Context prompt timed out"
                );
            }
        }

        let started = Instant::now();
        let solution = self.timed_solve(agent, &task.prompt).await;
        let time = started.elapsed().as_secs_f64();

        let (solution, outcome) = match solution {
            Some(solution) if solution.communication_failed => {
                (solution, TaskOutcome::CommunicationFailed)
            }
            Some(solution) => (solution, TaskOutcome::Answered),
            None => {
                warn!(
                    benchmark = self.benchmark,
                    task_id = %task.id,
                    time_limit_secs = self.time_limit.as_secs_f64(),
                    "Task timed out"
                );
                (Solution::default(), TaskOutcome::TimedOut)
            }
        };

        let score = match outcome {
            TaskOutcome::Answered => {
                self.scorer
                    .score(solution.text.trim(), &task.expected)
                    .await?
            }
            _ => 0.0,
        };

        debug!(
            benchmark = self.benchmark,
            task_id = %task.id,
            score,
            time,
            outcome = outcome.as_str(),
            "Task evaluated"
        );
        self.metrics.record_task(
            self.benchmark,
            outcome,
            task.difficulty.as_str(),
            time,
            score,
        );

        Ok(TaskResult {
            task_id: task.id.clone(),
            score,
            time,
            solution: solution.text,
            communication_failed: outcome == TaskOutcome::CommunicationFailed,
            timed_out: outcome == TaskOutcome::TimedOut,
            difficulty: task.difficulty,
            category: task.category.clone(),
            metadata: task.metadata.clone(),
        })
    }

    /// Evaluates tasks in order, resetting the agent before each one.
    pub async fn evaluate_each(
        &self,
        agent: &mut dyn AgentClient,
        tasks: &[Task],
    ) -> Result<Vec<TaskResult>, BenchmarkError> {
        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            agent.reset();
            results.push(self.evaluate(agent, task).await?);
        }
        Ok(results)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted agents shared by the variant tests.

    use std::collections::VecDeque;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::agent::{AgentClient, Solution};
    use crate::benchmark::Task;
    use crate::scoring::ExpectedSolution;

    /// Replies from a queue, then with `fallback`. Records every prompt.
    pub struct ScriptedAgent {
        pub replies: VecDeque<String>,
        pub fallback: String,
        pub prompts: Vec<String>,
        pub resets: usize,
        pub delay: Option<Duration>,
    }

    impl ScriptedAgent {
        pub fn constant(reply: &str) -> Self {
            Self {
                replies: VecDeque::new(),
                fallback: reply.to_string(),
                prompts: Vec::new(),
                resets: 0,
                delay: None,
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl AgentClient for ScriptedAgent {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn solve(&mut self, prompt: &str) -> Solution {
            self.prompts.push(prompt.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let reply = self
                .replies
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());
            Solution::answered(reply)
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    /// Answers scored prompts, in task order, with their expected solution.
    /// Any other prompt gets "OK".
    pub struct OracleAgent {
        pub answers: VecDeque<(String, String)>,
    }

    impl OracleAgent {
        pub fn for_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
            let answers = tasks
                .into_iter()
                .filter_map(|task| match &task.expected {
                    ExpectedSolution::Text { value, .. } => {
                        Some((task.prompt.clone(), value.clone()))
                    }
                    ExpectedSolution::Execution(_) => None,
                })
                .collect();
            Self { answers }
        }
    }

    #[async_trait]
    impl AgentClient for OracleAgent {
        fn model(&self) -> &str {
            "oracle"
        }

        async fn solve(&mut self, prompt: &str) -> Solution {
            match self.answers.front() {
                Some((expected_prompt, _)) if expected_prompt == prompt => {
                    let (_, answer) = self.answers.pop_front().unwrap_or_default();
                    Solution::answered(answer)
                }
                _ => Solution::answered("OK"),
            }
        }

        fn reset(&mut self) {}
    }

    /// Transport always fails.
    pub struct OfflineAgent;

    #[async_trait]
    impl AgentClient for OfflineAgent {
        fn model(&self) -> &str {
            "offline"
        }

        async fn solve(&mut self, _prompt: &str) -> Solution {
            Solution::failed()
        }

        fn reset(&mut self) {}
    }
}
