//! Visual reasoning over text-rendered images.
//!
//! Images are character grids or symbol sequences, so any text model can be
//! evaluated. Three task types:
//! - `pattern_completion`: continue a repeating sequence of shapes
//! - `scene_understanding`: count objects in a labelled scene
//! - `visual_analogy`: A is to B as C is to ?

use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::Utc;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::config::{self, BenchmarkConfig, Options, DEFAULT_SEED, DEFAULT_TIME_LIMIT};
use super::grid::{self, Grid, Transform};
use super::lexicon::{pick, sample_distinct, COLORS};
use super::{
    time_limit, Benchmark, BenchmarkKind, BenchmarkState, Difficulty, Lifecycle, Task,
    TaskEvaluator,
};
use crate::agent::AgentClient;
use crate::error::{BenchmarkError, ConfigError};
use crate::results::{self, BenchmarkResult, DerivedMetrics};
use crate::scoring::{ExpectedSolution, Scorer};

pub const TASK_TYPES: [&str; 3] = ["pattern_completion", "scene_understanding", "visual_analogy"];

const SHAPES: &[&str] = &["circle", "square", "triangle", "star", "hexagon", "diamond"];

/// Scene symbols and the object each one stands for.
const SCENE_OBJECTS: [(char, &str); 4] = [('T', "tree"), ('R', "rock"), ('H', "house"), ('C', "car")];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VisionConfig {
    pub task_types: Vec<String>,
    pub difficulty_levels: Vec<Difficulty>,
    pub time_limit: f64,
    pub seed: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            task_types: TASK_TYPES.iter().map(|s| s.to_string()).collect(),
            difficulty_levels: config::default_difficulties(),
            time_limit: DEFAULT_TIME_LIMIT,
            seed: DEFAULT_SEED,
        }
    }
}

impl BenchmarkConfig for VisionConfig {
    const BENCHMARK: &'static str = "vision";

    fn validate(&self) -> Result<(), ConfigError> {
        config::require_known("task_types", &self.task_types, &TASK_TYPES)?;
        config::require_non_empty("difficulty_levels", &self.difficulty_levels)?;
        config::require_distinct("difficulty_levels", &self.difficulty_levels)?;
        config::require_positive_seconds("time_limit", self.time_limit)
    }
}

/// Repeating shapes; hard patterns pair every shape with a color.
fn pattern_task(rng: &mut ChaCha8Rng, difficulty: Difficulty) -> (String, String) {
    let period = difficulty.pick(2, 3, 4);
    let unit: Vec<String> = match difficulty {
        Difficulty::Hard => sample_distinct(rng, SHAPES, period)
            .into_iter()
            .map(|shape| format!("{} {}", pick(rng, COLORS), shape))
            .collect(),
        _ => sample_distinct(rng, SHAPES, period)
            .into_iter()
            .map(str::to_string)
            .collect(),
    };
    let shown = period * 2 + rng.random_range(0..period);
    let sequence = (0..shown)
        .map(|i| unit[i % period].as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let prompt = format!(
        "A row of figures follows a repeating pattern:\n{}, ?\n\
         Which figure comes next? Respond with only its description, in lowercase.",
        sequence
    );
    (prompt, unit[shown % period].clone())
}

/// A scene with scattered objects; hard scenes ask about the left half only.
fn scene_task(rng: &mut ChaCha8Rng, difficulty: Difficulty) -> (String, String) {
    let size = difficulty.pick(5, 7, 9);
    let kinds = sample_distinct(rng, &SCENE_OBJECTS, difficulty.pick(1, 2, 3));
    let mut scene: Grid = vec![vec!['.'; size]; size];

    let cells: Vec<(usize, usize)> = (0..size)
        .flat_map(|r| (0..size).map(move |c| (r, c)))
        .collect();
    let mut free = sample_distinct(rng, &cells, cells.len()).into_iter();
    for &(symbol, _) in &kinds {
        let count = rng.random_range(1..=size);
        for (r, c) in free.by_ref().take(count) {
            scene[r][c] = symbol;
        }
    }

    let (symbol, name) = pick(rng, &kinds);
    let legend = kinds
        .iter()
        .map(|(s, n)| format!("{} = {}", s, n))
        .chain(std::iter::once(". = empty".to_string()))
        .collect::<Vec<_>>()
        .join(", ");

    let (question, columns) = match difficulty {
        Difficulty::Hard => {
            let half = size / 2;
            (
                format!(
                    "How many {} symbols ({}) are in the leftmost {} columns of the scene?",
                    name, symbol, half
                ),
                half,
            )
        }
        _ => (
            format!("How many {} symbols ({}) are in the scene?", name, symbol),
            size,
        ),
    };
    let count = scene
        .iter()
        .flat_map(|row| row[..columns].iter())
        .filter(|&&cell| cell == symbol)
        .count();

    let prompt = format!(
        "Here is a top-down view of a scene, one character per cell.\nLegend: {}\n\n{}\n\n{} \
         Respond with only the number.",
        legend,
        grid::render(&scene),
        question
    );
    (prompt, count.to_string())
}

/// One worked pair A -> B, then C -> ?; hard analogies chain two transforms.
fn analogy_task(rng: &mut ChaCha8Rng, difficulty: Difficulty) -> (String, String) {
    let size = difficulty.pick(3, 4, 5);
    let transforms: Vec<Transform> = match difficulty {
        Difficulty::Easy => vec![pick(
            rng,
            &[Transform::MirrorHorizontal, Transform::FlipVertical],
        )],
        Difficulty::Medium => vec![pick(
            rng,
            &[Transform::RotateClockwise, Transform::Transpose],
        )],
        Difficulty::Hard => vec![
            pick(
                rng,
                &[Transform::RotateClockwise, Transform::MirrorHorizontal],
            ),
            Transform::Invert,
        ],
    };
    let apply = |g: &Grid| transforms.iter().fold(g.clone(), |acc, t| t.apply(&acc));

    let a = grid::binary_grid(rng, size, transforms[0]);
    let c = grid::binary_grid(rng, size, transforms[0]);
    let prompt = format!(
        "Grid A:\n{}\n\nGrid A transformed into grid B:\n{}\n\n\
         Apply the same transformation to grid C:\n{}\n\n\
         Respond with only the resulting grid on one line, rows separated by '/' (for example 010/101/000).",
        grid::render(&a),
        grid::render(&apply(&a)),
        grid::render(&c)
    );
    (prompt, grid::render_inline(&apply(&c)))
}

/// One task per task type and difficulty.
pub fn generate_tasks(config: &VisionConfig) -> Vec<Task> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut tasks = Vec::new();
    for task_type in &config.task_types {
        for &difficulty in &config.difficulty_levels {
            let (prompt, answer) = match task_type.as_str() {
                "pattern_completion" => pattern_task(&mut rng, difficulty),
                "scene_understanding" => scene_task(&mut rng, difficulty),
                _ => analogy_task(&mut rng, difficulty),
            };
            let index = tasks.len();
            tasks.push(
                Task::new(
                    format!("vision-{}-{:03}", task_type, index),
                    prompt,
                    ExpectedSolution::exact(answer),
                    difficulty,
                )
                .with_category(task_type.as_str())
                .with_metadata("task_type", task_type.as_str()),
            );
        }
    }
    tasks
}

/// Measures reasoning over grid and sequence images.
pub struct VisualReasoningBenchmark {
    config: VisionConfig,
    scorer: Scorer,
    tasks: OnceLock<Vec<Task>>,
    lifecycle: Lifecycle,
}

impl VisualReasoningBenchmark {
    pub fn new(options: &Options) -> Result<Self, ConfigError> {
        Ok(Self::from_config(config::configure(options)?))
    }

    pub fn from_config(config: VisionConfig) -> Self {
        Self {
            config,
            scorer: Scorer::text_only(),
            tasks: OnceLock::new(),
            lifecycle: Lifecycle::configured(),
        }
    }

    pub fn config(&self) -> &VisionConfig {
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
impl Benchmark for VisualReasoningBenchmark {
    fn kind(&self) -> BenchmarkKind {
        BenchmarkKind::Vision
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
