//! Code generation: write a stdin/stdout program, graded by running it.
//!
//! Tasks cover every language, task type and difficulty combination. Test
//! cases are computed here from randomly drawn inputs, so grading never
//! depends on a reference solution in the target language.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::Utc;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::config::{self, BenchmarkConfig, Options, DEFAULT_SEED, DEFAULT_TIME_LIMIT};
use super::lexicon::{pick, sample_distinct, WORDS};
use super::{
    time_limit, Benchmark, BenchmarkKind, BenchmarkState, Difficulty, Lifecycle, Task,
    TaskEvaluator,
};
use crate::agent::AgentClient;
use crate::error::{BenchmarkError, ConfigError};
use crate::results::{self, BenchmarkResult, DerivedMetrics};
use crate::scoring::{CodeCheck, ExpectedSolution, ProcessSandbox, Scorer, TestCase};

pub const LANGUAGES: [&str; 3] = ["python", "javascript", "rust"];
pub const TASK_TYPES: [&str; 3] = ["algorithm", "data_processing", "web_api"];

const CASES_PER_TASK: usize = 4;
const CATEGORIES: [&str; 5] = ["books", "games", "music", "tools", "toys"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodeConfig {
    pub languages: Vec<String>,
    pub task_types: Vec<String>,
    pub difficulty_levels: Vec<Difficulty>,
    pub time_limit: f64,
    /// Seconds allowed per test case run.
    pub execution_timeout: f64,
    pub seed: u64,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            languages: LANGUAGES.iter().map(|s| s.to_string()).collect(),
            task_types: TASK_TYPES.iter().map(|s| s.to_string()).collect(),
            difficulty_levels: config::default_difficulties(),
            time_limit: DEFAULT_TIME_LIMIT,
            execution_timeout: 10.0,
            seed: DEFAULT_SEED,
        }
    }
}

impl BenchmarkConfig for CodeConfig {
    const BENCHMARK: &'static str = "code";

    fn validate(&self) -> Result<(), ConfigError> {
        config::require_known("languages", &self.languages, &LANGUAGES)?;
        config::require_known("task_types", &self.task_types, &TASK_TYPES)?;
        config::require_non_empty("difficulty_levels", &self.difficulty_levels)?;
        config::require_distinct("difficulty_levels", &self.difficulty_levels)?;
        config::require_positive_seconds("time_limit", self.time_limit)?;
        config::require_positive_seconds("execution_timeout", self.execution_timeout)
    }
}

fn language_label(language: &str) -> &'static str {
    match language {
        "python" => "Python 3",
        "javascript" => "JavaScript (Node.js)",
        _ => "Rust",
    }
}

pub fn fibonacci(n: u32) -> u64 {
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        (a, b) = (b, a.saturating_add(b));
    }
    a
}

/// Number of primes `<= n`.
pub fn prime_count(n: usize) -> usize {
    if n < 2 {
        return 0;
    }
    let mut sieve = vec![true; n + 1];
    sieve[0] = false;
    sieve[1] = false;
    let mut i = 2;
    while i * i <= n {
        if sieve[i] {
            for multiple in (i * i..=n).step_by(i) {
                sieve[multiple] = false;
            }
        }
        i += 1;
    }
    sieve.into_iter().filter(|&p| p).count()
}

struct Problem {
    statement: &'static str,
    cases: Vec<TestCase>,
}

struct Row {
    name: &'static str,
    category: &'static str,
    amount: i64,
}

fn render_rows(rows: &[Row]) -> String {
    rows.iter()
        .map(|r| format!("{},{},{}\n", r.name, r.category, r.amount))
        .collect()
}

fn random_rows(rng: &mut ChaCha8Rng) -> Vec<Row> {
    let count = rng.random_range(3..=8);
    let amounts: Vec<i64> = (1..=999).collect();
    let amounts = sample_distinct(rng, &amounts, count);
    sample_distinct(rng, WORDS, count)
        .into_iter()
        .zip(amounts)
        .map(|(name, amount)| Row {
            name,
            category: pick(rng, &CATEGORIES),
            amount,
        })
        .collect()
}

fn algorithm_case(rng: &mut ChaCha8Rng, difficulty: Difficulty) -> TestCase {
    match difficulty {
        Difficulty::Easy => {
            let count = rng.random_range(1..=8);
            let numbers: Vec<i64> = (0..count).map(|_| rng.random_range(-100..=100)).collect();
            let line = numbers
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            TestCase::new(format!("{}\n", line), numbers.iter().sum::<i64>().to_string())
        }
        Difficulty::Medium => {
            let n = rng.random_range(0..=90);
            TestCase::new(format!("{}\n", n), fibonacci(n).to_string())
        }
        Difficulty::Hard => {
            let n = rng.random_range(1..=100_000);
            TestCase::new(format!("{}\n", n), prime_count(n).to_string())
        }
    }
}

fn data_case(rng: &mut ChaCha8Rng, difficulty: Difficulty) -> TestCase {
    let rows = random_rows(rng);
    let output = match difficulty {
        Difficulty::Easy => rows.iter().map(|r| r.amount).sum::<i64>().to_string(),
        Difficulty::Medium => rows
            .iter()
            .max_by_key(|r| r.amount)
            .map(|r| r.name.to_string())
            .unwrap_or_default(),
        Difficulty::Hard => {
            let mut totals: BTreeMap<&str, i64> = BTreeMap::new();
            for row in &rows {
                *totals.entry(row.category).or_default() += row.amount;
            }
            totals
                .iter()
                .map(|(category, total)| format!("{} {}", category, total))
                .collect::<Vec<_>>()
                .join("\n")
        }
    };
    TestCase::new(render_rows(&rows), output)
}

fn web_case(rng: &mut ChaCha8Rng, difficulty: Difficulty) -> TestCase {
    match difficulty {
        Difficulty::Easy => {
            let count = rng.random_range(1..=5);
            let keys = sample_distinct(rng, WORDS, count + 1);
            let pairs: Vec<(&str, u32)> = keys[..count]
                .iter()
                .map(|&k| (k, rng.random_range(0..=999)))
                .collect();
            let query = pairs
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            let (key, output) = if rng.random_bool(0.25) {
                (keys[count], "missing".to_string())
            } else {
                let (k, v) = pick(rng, &pairs);
                (k, v.to_string())
            };
            TestCase::new(format!("{}\n{}\n", query, key), output)
        }
        Difficulty::Medium => {
            let method = pick(rng, &["GET", "POST", "PUT", "DELETE"]);
            let segments = rng.random_range(1..=3);
            let mut path: String = sample_distinct(rng, WORDS, segments)
                .iter()
                .map(|s| format!("/{}", s))
                .collect();
            if rng.random_bool(0.5) {
                path.push_str(&format!("/{}", rng.random_range(1..=999)));
            }
            let query = if rng.random_bool(0.6) {
                format!("?{}={}", pick(rng, WORDS), rng.random_range(0..=99))
            } else {
                String::new()
            };
            TestCase::new(format!("{} {}{} HTTP/1.1\n", method, path, query), path)
        }
        Difficulty::Hard => {
            let count = rng.random_range(2..=6);
            let keys = sample_distinct(rng, WORDS, count);
            let mut fields = Vec::with_capacity(count);
            let mut sorted = BTreeMap::new();
            for key in keys {
                let (json, plain) = if rng.random_bool(0.5) {
                    let n: i64 = rng.random_range(-500..=500);
                    (Value::from(n).to_string(), n.to_string())
                } else {
                    let word = pick(rng, WORDS);
                    (Value::from(word).to_string(), word.to_string())
                };
                fields.push(format!("\"{}\": {}", key, json));
                sorted.insert(key, plain);
            }
            let output = sorted
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("\n");
            TestCase::new(format!("{{{}}}\n", fields.join(", ")), output)
        }
    }
}

fn problem(rng: &mut ChaCha8Rng, task_type: &str, difficulty: Difficulty) -> Problem {
    let (statement, case): (&'static str, fn(&mut ChaCha8Rng, Difficulty) -> TestCase) =
        match (task_type, difficulty) {
            ("algorithm", Difficulty::Easy) => (
                "The input is a single line of space-separated integers. Print their sum.",
                algorithm_case,
            ),
            ("algorithm", Difficulty::Medium) => (
                "The input is a single integer n (0 <= n <= 90). Print the n-th Fibonacci \
                 number, where F(0) = 0 and F(1) = 1.",
                algorithm_case,
            ),
            ("algorithm", Difficulty::Hard) => (
                "The input is a single integer n (1 <= n <= 100000). Print how many prime \
                 numbers are less than or equal to n.",
                algorithm_case,
            ),
            ("data_processing", Difficulty::Easy) => (
                "Each input line has the form name,category,amount where amount is an \
                 integer. Print the sum of all amounts.",
                data_case,
            ),
            ("data_processing", Difficulty::Medium) => (
                "Each input line has the form name,category,amount where amount is an \
                 integer. Print the name on the line with the largest amount.",
                data_case,
            ),
            ("data_processing", Difficulty::Hard) => (
                "Each input line has the form name,category,amount where amount is an \
                 integer. For every category print the category and the total of its \
                 amounts separated by a space, one category per line, sorted by category name.",
                data_case,
            ),
            (_, Difficulty::Easy) => (
                "The first input line is a URL query string such as a=1&b=2. The second line \
                 is a key. Print the value for that key, or the word missing if the key is \
                 absent.",
                web_case,
            ),
            (_, Difficulty::Medium) => (
                "The input is an HTTP request line such as GET /users/7?active=true HTTP/1.1. \
                 Print the request path without the query string.",
                web_case,
            ),
            (_, Difficulty::Hard) => (
                "The input is a single-line JSON object whose values are strings or integers. \
                 Print one line per key in the form key=value, sorted by key. Print strings \
                 without quotes.",
                web_case,
            ),
        };
    let cases = (0..CASES_PER_TASK).map(|_| case(rng, difficulty)).collect();
    Problem { statement, cases }
}

fn code_task(
    rng: &mut ChaCha8Rng,
    language: &str,
    task_type: &str,
    difficulty: Difficulty,
) -> Task {
    let Problem { statement, cases } = problem(rng, task_type, difficulty);
    let example = cases.first().map_or_else(String::new, |c| {
        format!(
            "\n\nExample input:\n{}\nExample output:\n{}",
            c.input.trim_end(),
            c.expected_output
        )
    });
    let prompt = format!(
        "Write a complete {} program that reads from standard input and writes to standard \
         output.\n\n{}{}\n\nRespond with the full program in a single fenced code block.",
        language_label(language),
        statement,
        example
    );

    Task::new(
        format!("code-{}-{}-{}", language, task_type, difficulty),
        prompt,
        ExpectedSolution::Execution(CodeCheck {
            language: language.to_string(),
            test_cases: cases,
        }),
        difficulty,
    )
    .with_category(task_type)
    .with_metadata("language", language)
    .with_metadata("task_type", task_type)
}

/// One task per language, task type and difficulty.
pub fn generate_tasks(config: &CodeConfig) -> Vec<Task> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut tasks = Vec::new();
    for language in &config.languages {
        for task_type in &config.task_types {
            for &difficulty in &config.difficulty_levels {
                tasks.push(code_task(&mut rng, language, task_type, difficulty));
            }
        }
    }
    tasks
}

/// Measures program synthesis by executing what the agent writes.
pub struct CodeGenerationBenchmark {
    config: CodeConfig,
    scorer: Scorer,
    tasks: OnceLock<Vec<Task>>,
    lifecycle: Lifecycle,
}

impl CodeGenerationBenchmark {
    pub fn new(options: &Options) -> Result<Self, ConfigError> {
        Ok(Self::from_config(config::configure(options)?))
    }

    /// Uses a local [`ProcessSandbox`] bounded by `execution_timeout`.
    pub fn from_config(config: CodeConfig) -> Self {
        let sandbox = ProcessSandbox::new(time_limit(config.execution_timeout));
        Self {
            scorer: Scorer::with_backend(Arc::new(sandbox)),
            config,
            tasks: OnceLock::new(),
            lifecycle: Lifecycle::configured(),
        }
    }

    /// Replaces the scorer, e.g. to grade in a remote sandbox.
    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn config(&self) -> &CodeConfig {
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
impl Benchmark for CodeGenerationBenchmark {
    fn kind(&self) -> BenchmarkKind {
        BenchmarkKind::Code
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
            language_scores: Some(results::category_scores(
                &task_results,
                &self.config.languages,
                |r| r.metadata_key("language"),
            )),
            task_type_scores: Some(results::category_scores(
                &task_results,
                &self.config.task_types,
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
