//! Concept formation: infer a hidden concept from labelled examples.
//!
//! Three concept types:
//! * `visual`: a grid transformation shown through input/output examples;
//! * `logical`: a numeric predicate shown through yes/no labelled numbers;
//! * `linguistic`: a word property shown through positive and negative words.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::Utc;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::config::{self, BenchmarkConfig, Options, DEFAULT_SEED, DEFAULT_TIME_LIMIT};
use super::grid::{binary_grid, render, render_inline, Transform};
use super::lexicon::{pick, sample_distinct, WORDS};
use super::{
    time_limit, Benchmark, BenchmarkKind, BenchmarkState, Difficulty, Lifecycle, Task,
    TaskEvaluator,
};
use crate::agent::AgentClient;
use crate::error::{BenchmarkError, ConfigError};
use crate::results::{self, BenchmarkResult, DerivedMetrics};
use crate::scoring::{ExpectedSolution, Scorer};

pub const CONCEPT_TYPES: [&str; 3] = ["visual", "logical", "linguistic"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AbstractionConfig {
    pub concept_types: Vec<String>,
    pub difficulty_levels: Vec<Difficulty>,
    /// Tasks per concept type.
    pub num_tasks: usize,
    pub time_limit: f64,
    pub seed: u64,
}

impl Default for AbstractionConfig {
    fn default() -> Self {
        Self {
            concept_types: CONCEPT_TYPES.iter().map(|s| s.to_string()).collect(),
            difficulty_levels: config::default_difficulties(),
            num_tasks: 3,
            time_limit: DEFAULT_TIME_LIMIT,
            seed: DEFAULT_SEED,
        }
    }
}

impl BenchmarkConfig for AbstractionConfig {
    const BENCHMARK: &'static str = "abstraction";

    fn validate(&self) -> Result<(), ConfigError> {
        config::require_known("concept_types", &self.concept_types, &CONCEPT_TYPES)?;
        config::require_non_empty("difficulty_levels", &self.difficulty_levels)?;
        config::require_distinct("difficulty_levels", &self.difficulty_levels)?;
        config::require_positive("num_tasks", self.num_tasks as u64)?;
        config::require_positive_seconds("time_limit", self.time_limit)
    }
}

fn visual_task(rng: &mut ChaCha8Rng, difficulty: Difficulty) -> (String, String) {
    let (size, choices) = match difficulty {
        Difficulty::Easy => (3, [Transform::Invert, Transform::MirrorHorizontal]),
        Difficulty::Medium => (4, [Transform::FlipVertical, Transform::Transpose]),
        Difficulty::Hard => (5, [Transform::RotateClockwise, Transform::Transpose]),
    };
    let transform = pick(rng, &choices);

    let mut prompt =
        String::from("Each input grid is turned into an output grid by the same transformation.\n");
    for n in 1..=2 {
        let input = binary_grid(rng, size, transform);
        prompt.push_str(&format!(
            "\nExample {n} input:\n{}\nExample {n} output:\n{}\n",
            render(&input),
            render(&transform.apply(&input)),
        ));
    }
    let test = binary_grid(rng, size, transform);
    prompt.push_str(&format!(
        "\nTest input:\n{}\n\nWhat is the output grid? Respond with only the rows separated by '/', \
         for example 010/111/000.",
        render(&test)
    ));

    (prompt, render_inline(&transform.apply(&test)))
}

/// Hidden numeric predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberConcept {
    DivisibleBy(u32),
    OddAbove(u32),
    Prime,
}

impl NumberConcept {
    pub fn holds(&self, n: u32) -> bool {
        match self {
            NumberConcept::DivisibleBy(k) => n % k == 0,
            NumberConcept::OddAbove(t) => n > *t && n % 2 == 1,
            NumberConcept::Prime => n >= 2 && (2..).take_while(|d| d * d <= n).all(|d| n % d != 0),
        }
    }
}

fn logical_task(rng: &mut ChaCha8Rng, difficulty: Difficulty) -> (String, String) {
    let concept = match difficulty {
        Difficulty::Easy => NumberConcept::DivisibleBy(pick(rng, &[2, 3, 5, 10])),
        Difficulty::Medium => NumberConcept::OddAbove(rng.random_range(20..=60)),
        Difficulty::Hard => NumberConcept::Prime,
    };
    let (yes, no): (Vec<u32>, Vec<u32>) = (1..=100).partition(|&n| concept.holds(n));

    let query_is_yes = rng.random_bool(0.5);
    let mut positives = sample_distinct(rng, &yes, if query_is_yes { 5 } else { 4 });
    let mut negatives = sample_distinct(rng, &no, if query_is_yes { 4 } else { 5 });
    let query = if query_is_yes {
        positives.pop()
    } else {
        negatives.pop()
    }
    .unwrap_or(1);

    let mut examples: Vec<(u32, &str)> = positives
        .into_iter()
        .map(|n| (n, "yes"))
        .chain(negatives.into_iter().map(|n| (n, "no")))
        .collect();
    examples.shuffle(rng);

    let listing = examples
        .iter()
        .map(|(n, label)| format!("{}: {}", n, label))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = format!(
        "Numbers are labelled yes or no according to a hidden concept:\n{}\n\
         Is {} labelled yes or no? Respond with only yes or no.",
        listing, query
    );
    let answer = if concept.holds(query) { "yes" } else { "no" };
    (prompt, answer.to_string())
}

fn has_double_letter(word: &str) -> bool {
    word.as_bytes().windows(2).any(|pair| pair[0] == pair[1])
}

/// Splits the word pool by `key` and keeps groups big enough to build a task.
fn usable_groups<K: Ord + Copy>(key: impl Fn(&str) -> K) -> Vec<K> {
    let mut groups: BTreeMap<K, usize> = BTreeMap::new();
    for word in WORDS {
        *groups.entry(key(*word)).or_default() += 1;
    }
    groups
        .into_iter()
        .filter(|&(_, count)| count >= 4 && WORDS.len() - count >= 5)
        .map(|(k, _)| k)
        .collect()
}

fn linguistic_task(rng: &mut ChaCha8Rng, difficulty: Difficulty) -> (String, String) {
    let property: Box<dyn Fn(&str) -> bool> = match difficulty {
        Difficulty::Easy => {
            let first = |w: &str| w.as_bytes()[0];
            let letters = usable_groups(first);
            let letter = pick(rng, &letters);
            Box::new(move |w: &str| first(w) == letter)
        }
        Difficulty::Medium => {
            let lengths = usable_groups(str::len);
            let length = pick(rng, &lengths);
            Box::new(move |w: &str| w.len() == length)
        }
        Difficulty::Hard => Box::new(has_double_letter),
    };
    let (with, without): (Vec<&str>, Vec<&str>) =
        WORDS.iter().copied().partition(|w: &&str| property(*w));

    let positives = sample_distinct(rng, &with, 4);
    let negatives = sample_distinct(rng, &without, 5);
    let answer = positives[3];

    let mut candidates = vec![answer, negatives[3], negatives[4]];
    candidates.shuffle(rng);

    let prompt = format!(
        "These words share a hidden property: {}.\n\
         These words do not have it: {}.\n\
         Which one of the following words has the property: {}? Respond with only that word.",
        positives[..3].join(", "),
        negatives[..3].join(", "),
        candidates.join(", ")
    );
    (prompt, answer.to_string())
}

/// `num_tasks` tasks per concept type, difficulties cycling within each type.
pub fn generate_tasks(config: &AbstractionConfig) -> Vec<Task> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let levels = &config.difficulty_levels;
    if levels.is_empty() {
        return Vec::new();
    }

    let mut tasks = Vec::new();
    for concept_type in &config.concept_types {
        for i in 0..config.num_tasks {
            let difficulty = levels[i % levels.len()];
            let (prompt, answer) = match concept_type.as_str() {
                "visual" => visual_task(&mut rng, difficulty),
                "logical" => logical_task(&mut rng, difficulty),
                "linguistic" => linguistic_task(&mut rng, difficulty),
                _ => continue,
            };
            tasks.push(
                Task::new(
                    format!("abstraction-{}-{:03}", concept_type, i),
                    prompt,
                    ExpectedSolution::exact(answer),
                    difficulty,
                )
                .with_category(concept_type.as_str()),
            );
        }
    }
    tasks
}

/// Measures concept induction across visual, logical and linguistic material.
pub struct ConceptFormationBenchmark {
    config: AbstractionConfig,
    scorer: Scorer,
    tasks: OnceLock<Vec<Task>>,
    lifecycle: Lifecycle,
}

impl ConceptFormationBenchmark {
    pub fn new(options: &Options) -> Result<Self, ConfigError> {
        Ok(Self::from_config(config::configure(options)?))
    }

    pub fn from_config(config: AbstractionConfig) -> Self {
        Self {
            config,
            scorer: Scorer::text_only(),
            tasks: OnceLock::new(),
            lifecycle: Lifecycle::configured(),
        }
    }

    pub fn config(&self) -> &AbstractionConfig {
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
impl Benchmark for ConceptFormationBenchmark {
    fn kind(&self) -> BenchmarkKind {
        BenchmarkKind::Abstraction
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

        let derived = DerivedMetrics {
            concept_type_scores: Some(results::category_scores(
                &task_results,
                &self.config.concept_types,
                |r| r.category.clone(),
            )),
            ..DerivedMetrics::default()
        };
        let result = BenchmarkResult::from_tasks(
            self.name(),
            task_results,
            &self.config.difficulty_levels,
            started_at,
        )
        .with_derived(derived);
        guard.succeed(&result);
        Ok(result)
    }
}
