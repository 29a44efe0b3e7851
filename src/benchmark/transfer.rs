//! Transfer learning: does solving one problem speed up a related one?
//!
//! Each pair is a rule-learning problem. The base task teaches the rule only
//! through worked examples; the transfer task asks for the same rule on new
//! input without restating it, so it only gets easier if the agent actually
//! carried the rule over. Pairs share one conversation.

use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::Utc;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::{self, BenchmarkConfig, Options, DEFAULT_SEED, DEFAULT_TIME_LIMIT};
use super::lexicon::{pick, sample_distinct, WORDS};
use super::{
    time_limit, Benchmark, BenchmarkKind, BenchmarkState, Difficulty, Lifecycle, Task,
    TaskEvaluator, TaskPair,
};
use crate::agent::AgentClient;
use crate::error::{BenchmarkError, ConfigError};
use crate::results::{BenchmarkResult, TransferPairResult};
use crate::scoring::{ExpectedSolution, Scorer};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferConfig {
    pub difficulty_levels: Vec<Difficulty>,
    /// Number of task pairs.
    pub num_tasks: usize,
    pub time_limit: f64,
    pub seed: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            difficulty_levels: config::default_difficulties(),
            num_tasks: 5,
            time_limit: DEFAULT_TIME_LIMIT,
            seed: DEFAULT_SEED,
        }
    }
}

impl BenchmarkConfig for TransferConfig {
    const BENCHMARK: &'static str = "transfer";

    fn validate(&self) -> Result<(), ConfigError> {
        config::require_non_empty("difficulty_levels", &self.difficulty_levels)?;
        config::require_distinct("difficulty_levels", &self.difficulty_levels)?;
        config::require_positive("num_tasks", self.num_tasks as u64)?;
        config::require_positive_seconds("time_limit", self.time_limit)
    }
}

/// Kind of rule a pair is built around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Sequence,
    Cipher,
    WordRule,
}

impl Family {
    const ALL: [Family; 3] = [Family::Sequence, Family::Cipher, Family::WordRule];

    fn name(&self) -> &'static str {
        match self {
            Family::Sequence => "sequence",
            Family::Cipher => "cipher",
            Family::WordRule => "word_rule",
        }
    }
}

struct PairSpec {
    base_prompt: String,
    base_expected: ExpectedSolution,
    transfer_prompt: String,
    transfer_expected: ExpectedSolution,
}

#[derive(Debug, Clone, Copy)]
enum SequenceRule {
    Add(i64),
    Multiply(i64),
}

impl SequenceRule {
    fn next(&self, value: i64) -> i64 {
        match self {
            SequenceRule::Add(step) => value + step,
            SequenceRule::Multiply(ratio) => value * ratio,
        }
    }

    fn terms(&self, start: i64, count: usize) -> Vec<i64> {
        std::iter::successors(Some(start), |&v| Some(self.next(v)))
            .take(count)
            .collect()
    }
}

fn join_numbers(values: &[i64], separator: &str) -> String {
    values
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

fn sequence_pair(rng: &mut ChaCha8Rng, difficulty: Difficulty) -> PairSpec {
    let (rule, start) = match difficulty {
        Difficulty::Easy => (
            SequenceRule::Add(rng.random_range(2..=5)),
            rng.random_range(1..=20),
        ),
        Difficulty::Medium => {
            let step: i64 = rng.random_range(6..=15);
            let step = if rng.random_bool(0.5) { -step } else { step };
            (SequenceRule::Add(step), rng.random_range(50..=100))
        }
        Difficulty::Hard => (
            SequenceRule::Multiply(rng.random_range(2..=3)),
            rng.random_range(1..=5),
        ),
    };
    let transfer_start = match rule {
        SequenceRule::Add(_) => start + rng.random_range(10..=40),
        SequenceRule::Multiply(_) => start + rng.random_range(1..=4),
    };

    let shown = rule.terms(start, 5);
    let continued = rule.terms(transfer_start, 4);

    PairSpec {
        base_prompt: format!(
            "Here are the first terms of a number sequence: {}.\n\
             What is the next term? Respond with only the number.",
            join_numbers(&shown[..4], ", ")
        ),
        base_expected: ExpectedSolution::exact(shown[4].to_string()),
        transfer_prompt: format!(
            "A new sequence follows the same rule and starts at {}.\n\
             What are its next three terms? Respond with the three numbers separated by spaces.",
            transfer_start
        ),
        transfer_expected: ExpectedSolution::tokens(join_numbers(&continued[1..], " ")),
    }
}

/// Shifts lowercase ASCII letters forward by `shift`, wrapping at `z`.
pub fn caesar(text: &str, shift: u8) -> String {
    let shift = shift % 26;
    text.chars()
        .map(|c| {
            if c.is_ascii_lowercase() {
                (((c as u8 - b'a' + shift) % 26) + b'a') as char
            } else {
                c
            }
        })
        .collect()
}

fn cipher_pair(rng: &mut ChaCha8Rng, difficulty: Difficulty) -> PairSpec {
    let shift: u8 = match difficulty {
        Difficulty::Easy => rng.random_range(1..=3),
        Difficulty::Medium => rng.random_range(4..=9),
        Difficulty::Hard => rng.random_range(10..=25),
    };
    let words = sample_distinct(rng, WORDS, 5);
    let phrase = format!("{} {}", words[3], words[4]);

    PairSpec {
        base_prompt: format!(
            "In a secret code, \"{}\" is written \"{}\" and \"{}\" is written \"{}\".\n\
             How is \"{}\" written in this code? Respond with only the coded word.",
            words[0],
            caesar(words[0], shift),
            words[1],
            caesar(words[1], shift),
            words[2]
        ),
        base_expected: ExpectedSolution::exact(caesar(words[2], shift)),
        transfer_prompt: format!(
            "Using the same code, write the phrase \"{}\". Respond with only the coded phrase.",
            phrase
        ),
        transfer_expected: ExpectedSolution::tokens(caesar(&phrase, shift)),
    }
}

/// Letter-level word transformations, one per difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordRule {
    Reverse,
    /// Move the first letter to the end.
    RotateLeft,
    /// Letters in alphabetical order.
    SortLetters,
}

impl WordRule {
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        difficulty.pick(WordRule::Reverse, WordRule::RotateLeft, WordRule::SortLetters)
    }

    pub fn apply(&self, word: &str) -> String {
        match self {
            WordRule::Reverse => word.chars().rev().collect(),
            WordRule::RotateLeft => {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => chars.chain(std::iter::once(first)).collect(),
                    None => String::new(),
                }
            }
            WordRule::SortLetters => {
                let mut chars: Vec<char> = word.chars().collect();
                chars.sort_unstable();
                chars.into_iter().collect()
            }
        }
    }
}

fn word_rule_pair(rng: &mut ChaCha8Rng, difficulty: Difficulty) -> PairSpec {
    let rule = WordRule::for_difficulty(difficulty);
    let words = sample_distinct(rng, WORDS, 5);
    let examples = words[..3]
        .iter()
        .map(|w| format!("{} -> {}", w, rule.apply(w)))
        .collect::<Vec<_>>()
        .join("\n");

    PairSpec {
        base_prompt: format!(
            "Each word below is transformed by the same rule:\n{}\n\
             Apply the rule to \"{}\". Respond with only the transformed word.",
            examples, words[3]
        ),
        base_expected: ExpectedSolution::exact(rule.apply(words[3])),
        transfer_prompt: format!(
            "Apply the same rule to \"{}\". Respond with only the transformed word.",
            words[4]
        ),
        transfer_expected: ExpectedSolution::exact(rule.apply(words[4])),
    }
}

/// Builds `num_tasks` pairs, cycling through the configured difficulties.
pub fn generate_tasks(config: &TransferConfig) -> Vec<TaskPair> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let levels = &config.difficulty_levels;
    if levels.is_empty() {
        return Vec::new();
    }

    (0..config.num_tasks)
        .map(|i| {
            let difficulty = levels[i % levels.len()];
            let family = pick(&mut rng, &Family::ALL);
            let parts = match family {
                Family::Sequence => sequence_pair(&mut rng, difficulty),
                Family::Cipher => cipher_pair(&mut rng, difficulty),
                Family::WordRule => word_rule_pair(&mut rng, difficulty),
            };

            let base = Task::new(
                format!("transfer-{:03}-base", i),
                parts.base_prompt,
                parts.base_expected,
                difficulty,
            )
            .with_category(family.name())
            .with_metadata("pair", i)
            .with_metadata("role", "base");
            let transfer = Task::new(
                format!("transfer-{:03}-transfer", i),
                parts.transfer_prompt,
                parts.transfer_expected,
                difficulty,
            )
            .with_category(family.name())
            .with_metadata("pair", i)
            .with_metadata("role", "transfer");

            TaskPair { base, transfer }
        })
        .collect()
}

/// Measures accuracy and speed-up on base/transfer task pairs.
pub struct TaskAdaptationBenchmark {
    config: TransferConfig,
    scorer: Scorer,
    pairs: OnceLock<Vec<TaskPair>>,
    lifecycle: Lifecycle,
}

impl TaskAdaptationBenchmark {
    pub fn new(options: &Options) -> Result<Self, ConfigError> {
        Ok(Self::from_config(config::configure(options)?))
    }

    pub fn from_config(config: TransferConfig) -> Self {
        Self {
            config,
            scorer: Scorer::text_only(),
            pairs: OnceLock::new(),
            lifecycle: Lifecycle::configured(),
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Generated pairs, created on first access.
    pub fn pairs(&self) -> &[TaskPair] {
        self.pairs.get_or_init(|| {
            let pairs = generate_tasks(&self.config);
            self.lifecycle.mark_generated();
            pairs
        })
    }
}

#[async_trait]
impl Benchmark for TaskAdaptationBenchmark {
    fn kind(&self) -> BenchmarkKind {
        BenchmarkKind::Transfer
    }

    fn options(&self) -> Options {
        config::to_options(&self.config)
    }

    fn state(&self) -> BenchmarkState {
        self.lifecycle.state()
    }

    fn task_count(&self) -> usize {
        self.pairs().len() * 2
    }

    async fn run(&self, agent: &mut dyn AgentClient) -> Result<BenchmarkResult, BenchmarkError> {
        let pairs = self.pairs();
        let guard = self.lifecycle.begin(self.name())?;
        let started_at = Utc::now();
        let evaluator =
            TaskEvaluator::new(self.name(), &self.scorer, time_limit(self.config.time_limit));

        let mut results = Vec::with_capacity(pairs.len());
        for pair in pairs {
            agent.reset();
            let base = evaluator.evaluate(agent, &pair.base).await?;
            let transfer = evaluator.evaluate(agent, &pair.transfer).await?;
            let result = TransferPairResult::new(base, transfer);
            debug!(
                pair = %pair.base.id,
                base_score = result.base_task.score,
                transfer_score = result.transfer_task.score,
                efficiency = result.transfer_efficiency,
                "Transfer pair evaluated"
            );
            results.push(result);
        }

        let result = BenchmarkResult::from_pairs(
            self.name(),
            results,
            &self.config.difficulty_levels,
            started_at,
        );
        guard.succeed(&result);
        Ok(result)
    }
}
