//! Result records and the aggregation math behind them.
//!
//! Everything here is plain data: a [`BenchmarkResult`] is built once from
//! its task results and never changes afterwards, and a [`SuiteResult`] only
//! grows while the runner collects benchmarks.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::benchmark::Difficulty;
use crate::error::ReportError;

/// Lower bound on the transfer time used as a divisor.
pub const MIN_TRANSFER_TIME: f64 = 0.001;

/// Outcome of one evaluated task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    /// Normalized score in `[0.0, 1.0]`.
    pub score: f64,
    /// Wall-clock seconds of the scored agent call.
    pub time: f64,
    /// Raw agent output.
    pub solution: String,
    #[serde(default)]
    pub communication_failed: bool,
    #[serde(default)]
    pub timed_out: bool,
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl TaskResult {
    /// Looks up a metadata value rendered as a breakdown key.
    pub fn metadata_key(&self, key: &str) -> Option<String> {
        self.metadata.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// A base/transfer pair and its efficiency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferPairResult {
    pub base_task: TaskResult,
    pub transfer_task: TaskResult,
    pub transfer_efficiency: f64,
}

impl TransferPairResult {
    pub fn new(base_task: TaskResult, transfer_task: TaskResult) -> Self {
        let transfer_efficiency = transfer_efficiency(
            base_task.score,
            base_task.time,
            transfer_task.score,
            transfer_task.time,
        );
        Self {
            base_task,
            transfer_task,
            transfer_efficiency,
        }
    }

    /// Mean of the two task scores.
    pub fn score(&self) -> f64 {
        (self.base_task.score + self.transfer_task.score) / 2.0
    }
}

/// One entry of a benchmark's ordered result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultEntry {
    Pair(TransferPairResult),
    Task(TaskResult),
}

impl ResultEntry {
    /// The task results inside this entry, in evaluation order.
    pub fn task_results(&self) -> Vec<&TaskResult> {
        match self {
            ResultEntry::Pair(pair) => vec![&pair.base_task, &pair.transfer_task],
            ResultEntry::Task(task) => vec![task],
        }
    }
}

/// Variant-specific aggregates, serialized flat next to `overall_score`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_efficiency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_scores: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_type_scores: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_scores: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizon_scores: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity_scores: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_scores: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type_scores: Option<BTreeMap<String, f64>>,
}

impl DerivedMetrics {
    /// Named category breakdowns that are present, for reporting.
    pub fn breakdowns(&self) -> Vec<(&'static str, &BTreeMap<String, f64>)> {
        [
            ("delay", &self.delay_scores),
            ("concept type", &self.concept_type_scores),
            ("environment", &self.environment_scores),
            ("horizon", &self.horizon_scores),
            ("complexity", &self.complexity_scores),
            ("language", &self.language_scores),
            ("task type", &self.task_type_scores),
        ]
        .into_iter()
        .filter_map(|(name, scores)| scores.as_ref().map(|s| (name, s)))
        .collect()
    }
}

/// Aggregated outcome of one benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub benchmark: String,
    pub tasks: Vec<ResultEntry>,
    pub overall_score: f64,
    #[serde(default)]
    pub difficulty_scores: BTreeMap<String, f64>,
    #[serde(flatten)]
    pub derived: DerivedMetrics,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
}

impl BenchmarkResult {
    /// Aggregates plain task results; `overall_score` is the mean score.
    pub fn from_tasks(
        benchmark: impl Into<String>,
        results: Vec<TaskResult>,
        difficulties: &[Difficulty],
        started_at: DateTime<Utc>,
    ) -> Self {
        let overall_score = mean(results.iter().map(|r| r.score));
        let difficulty_scores = difficulty_scores(results.iter(), difficulties);
        let entries = results.into_iter().map(ResultEntry::Task).collect();
        Self::assemble(
            benchmark.into(),
            entries,
            overall_score,
            difficulty_scores,
            started_at,
        )
    }

    /// Aggregates transfer pairs; `overall_score` is the mean pair score and
    /// `transfer_efficiency` the mean pair efficiency.
    pub fn from_pairs(
        benchmark: impl Into<String>,
        pairs: Vec<TransferPairResult>,
        difficulties: &[Difficulty],
        started_at: DateTime<Utc>,
    ) -> Self {
        let overall_score = mean(pairs.iter().map(TransferPairResult::score));
        let efficiency = mean(pairs.iter().map(|p| p.transfer_efficiency));
        let difficulty_scores = difficulty_scores(
            pairs.iter().flat_map(|p| [&p.base_task, &p.transfer_task]),
            difficulties,
        );
        let entries = pairs.into_iter().map(ResultEntry::Pair).collect();
        let mut result = Self::assemble(
            benchmark.into(),
            entries,
            overall_score,
            difficulty_scores,
            started_at,
        );
        result.derived.transfer_efficiency = Some(efficiency);
        result
    }

    fn assemble(
        benchmark: String,
        tasks: Vec<ResultEntry>,
        overall_score: f64,
        difficulty_scores: BTreeMap<String, f64>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let finished_at = Utc::now();
        let duration_secs = (finished_at - started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Self {
            benchmark,
            tasks,
            overall_score,
            difficulty_scores,
            derived: DerivedMetrics::default(),
            started_at,
            finished_at,
            duration_secs,
        }
    }

    pub fn with_derived(mut self, derived: DerivedMetrics) -> Self {
        // Keep the efficiency computed from pairs.
        let efficiency = self.derived.transfer_efficiency;
        self.derived = derived;
        if self.derived.transfer_efficiency.is_none() {
            self.derived.transfer_efficiency = efficiency;
        }
        self
    }

    /// Every task result in evaluation order, pairs flattened.
    pub fn task_results(&self) -> Vec<&TaskResult> {
        self.tasks.iter().flat_map(ResultEntry::task_results).collect()
    }

    pub fn task_count(&self) -> usize {
        self.task_results().len()
    }
}

/// Aggregated outcome of a suite run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteResult {
    pub run_id: String,
    pub model: String,
    pub generated_at: DateTime<Utc>,
    pub benchmarks: BTreeMap<String, BenchmarkResult>,
    pub overall_score: f64,
    /// Benchmarks that failed to construct or run, with their diagnostics.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}

impl SuiteResult {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            model: model.into(),
            generated_at: Utc::now(),
            benchmarks: BTreeMap::new(),
            overall_score: 0.0,
            errors: BTreeMap::new(),
        }
    }

    /// Adds a benchmark result and refreshes the overall score.
    pub fn insert(&mut self, result: BenchmarkResult) {
        self.benchmarks.insert(result.benchmark.clone(), result);
        self.overall_score = mean(self.benchmarks.values().map(|b| b.overall_score));
    }

    pub fn record_error(&mut self, benchmark: impl Into<String>, message: impl Into<String>) {
        self.errors.insert(benchmark.into(), message.into());
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the results document as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| ReportError::InvalidResults {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// Arithmetic mean; 0.0 for no values.
pub fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// `(score_t / score_b) * (time_b / max(time_t, MIN_TRANSFER_TIME))`, or 0.0
/// when the base task scored 0.0. Not clamped.
pub fn transfer_efficiency(score_b: f64, time_b: f64, score_t: f64, time_t: f64) -> f64 {
    if score_b == 0.0 {
        return 0.0;
    }
    (score_t / score_b) * (time_b / time_t.max(MIN_TRANSFER_TIME))
}

/// Mean score per category.
///
/// Every name in `categories` is present (0.0 when no task matched); results
/// whose key is outside `categories` get their own entry.
pub fn category_scores<'a, I, F>(results: I, categories: &[String], key: F) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = &'a TaskResult>,
    F: Fn(&TaskResult) -> Option<String>,
{
    let mut grouped: BTreeMap<String, Vec<f64>> = categories
        .iter()
        .map(|c| (c.clone(), Vec::new()))
        .collect();
    for result in results {
        if let Some(k) = key(result) {
            grouped.entry(k).or_default().push(result.score);
        }
    }
    grouped
        .into_iter()
        .map(|(k, scores)| (k, mean(scores)))
        .collect()
}

fn difficulty_scores<'a>(
    results: impl IntoIterator<Item = &'a TaskResult>,
    difficulties: &[Difficulty],
) -> BTreeMap<String, f64> {
    let names: Vec<String> = difficulties.iter().map(|d| d.to_string()).collect();
    category_scores(results, &names, |r| Some(r.difficulty.to_string()))
}

/// Negative slope of the least-squares line through mean score per delay.
///
/// Positive when recall degrades as the delay grows; 0.0 with fewer than two
/// distinct delays.
pub fn decay_rate(points: &[(f64, f64)]) -> f64 {
    let mut by_delay: Vec<(f64, Vec<f64>)> = Vec::new();
    for &(delay, score) in points {
        match by_delay.iter_mut().find(|(d, _)| *d == delay) {
            Some((_, scores)) => scores.push(score),
            None => by_delay.push((delay, vec![score])),
        }
    }
    if by_delay.len() < 2 {
        return 0.0;
    }

    let xs: Vec<f64> = by_delay.iter().map(|(d, _)| *d).collect();
    let ys: Vec<f64> = by_delay
        .iter()
        .map(|(_, scores)| mean(scores.iter().copied()))
        .collect();
    let mean_x = mean(xs.iter().copied());
    let mean_y = mean(ys.iter().copied());

    let covariance: f64 = xs
        .iter()
        .zip(&ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    let variance: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
    let slope = covariance / variance;
    if variance == 0.0 || slope == 0.0 {
        return 0.0;
    }
    -slope
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, score: f64, time: f64, difficulty: Difficulty) -> TaskResult {
        TaskResult {
            task_id: id.to_string(),
            score,
            time,
            solution: String::new(),
            communication_failed: false,
            timed_out: false,
            difficulty,
            category: None,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_transfer_efficiency_examples() {
        assert_eq!(transfer_efficiency(1.0, 10.0, 0.8, 2.0), 4.0);
        assert_eq!(transfer_efficiency(0.5, 1.0, 1.0, 0.0), 2000.0);
        assert_eq!(transfer_efficiency(0.5, 10.0, 1.0, 5.0), 4.0);
        assert_eq!(transfer_efficiency(1.0, 2.0, 1.0, 0.0), 2000.0);
        assert_eq!(transfer_efficiency(0.0, 5.0, 1.0, 1.0), 0.0);
        assert_eq!(transfer_efficiency(0.0, 0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_transfer_efficiency_is_unbounded() {
        assert!(transfer_efficiency(0.1, 1000.0, 1.0, 0.0) > 1_000_000.0);
        assert!(transfer_efficiency(0.25, 4.0, 1.0, 2.0) > 1.0);
    }

    #[test]
    fn test_pair_aggregation() {
        let pairs = vec![
            TransferPairResult::new(
                result("b1", 1.0, 10.0, Difficulty::Easy),
                result("t1", 0.8, 2.0, Difficulty::Easy),
            ),
            TransferPairResult::new(
                result("b2", 0.0, 1.0, Difficulty::Hard),
                result("t2", 1.0, 1.0, Difficulty::Hard),
            ),
        ];
        let aggregated =
            BenchmarkResult::from_pairs("Transfer Learning", pairs, &Difficulty::ALL, Utc::now());

        assert!((aggregated.overall_score - (0.9 + 0.5) / 2.0).abs() < 1e-12);
        assert_eq!(aggregated.derived.transfer_efficiency, Some(2.0));
        assert_eq!(aggregated.difficulty_scores["medium"], 0.0);
        assert_eq!(aggregated.task_count(), 4);
    }

    #[test]
    fn test_empty_benchmark_scores_zero() {
        let empty = BenchmarkResult::from_tasks("Visual Reasoning", vec![], &[], Utc::now());
        assert_eq!(empty.overall_score, 0.0);

        let pairs = BenchmarkResult::from_pairs("Transfer Learning", vec![], &[], Utc::now());
        assert_eq!(pairs.overall_score, 0.0);
        assert_eq!(pairs.derived.transfer_efficiency, Some(0.0));
    }

    #[test]
    fn test_suite_overall_is_mean_of_benchmarks() {
        let mut suite = SuiteResult::new("test-model");
        assert_eq!(suite.overall_score, 0.0);

        for (name, score) in [("a", 0.2), ("b", 0.4), ("c", 0.6)] {
            let results = vec![result(name, score, 1.0, Difficulty::Easy)];
            suite.insert(BenchmarkResult::from_tasks(name, results, &[], Utc::now()));
        }
        assert!((suite.overall_score - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_category_scores_include_unattempted() {
        let mut a = result("1", 1.0, 1.0, Difficulty::Easy);
        a.category = Some("visual".to_string());
        let mut b = result("2", 0.5, 1.0, Difficulty::Easy);
        b.category = Some("visual".to_string());

        let categories = vec!["visual".to_string(), "logical".to_string()];
        let scores = category_scores([&a, &b], &categories, |r| r.category.clone());

        assert_eq!(scores["visual"], 0.75);
        assert_eq!(scores["logical"], 0.0);
    }

    #[test]
    fn test_decay_rate() {
        // Perfect recall at delay 1, half at 5, nothing at 9: slope -1/8.
        let points = [(1.0, 1.0), (5.0, 0.5), (9.0, 0.0)];
        assert!((decay_rate(&points) - 0.125).abs() < 1e-12);

        assert!(decay_rate(&[(1.0, 0.0), (10.0, 1.0)]) < 0.0);
        assert_eq!(decay_rate(&[(3.0, 1.0), (3.0, 0.0)]), 0.0);
        assert_eq!(decay_rate(&[]), 0.0);
    }

    #[test]
    fn test_suite_result_json_round_trip() {
        let mut suite = SuiteResult::new("test-model");
        let pair = TransferPairResult::new(
            result("b", 1.0, 2.0, Difficulty::Medium),
            result("t", 1.0, 1.0, Difficulty::Medium),
        );
        suite.insert(BenchmarkResult::from_pairs(
            "Transfer Learning",
            vec![pair],
            &[Difficulty::Medium],
            Utc::now(),
        ));
        suite.record_error("Code Generation", "Configuration error: bad option");

        let json = suite.to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value["benchmarks"]["Transfer Learning"]["transfer_efficiency"],
            2.0
        );
        assert!(value["benchmarks"]["Transfer Learning"]
            .get("decay_rate")
            .is_none());

        let parsed: SuiteResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, suite.run_id);
        assert_eq!(parsed.errors, suite.errors);
        let transfer = &parsed.benchmarks["Transfer Learning"];
        assert!(matches!(transfer.tasks[0], ResultEntry::Pair(_)));
        assert_eq!(transfer.task_results()[1].task_id, "t");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.json");

        let suite = SuiteResult::new("m");
        suite.save(&path).unwrap();
        let loaded = SuiteResult::load(&path).unwrap();
        assert_eq!(loaded.run_id, suite.run_id);

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            SuiteResult::load(&path),
            Err(ReportError::InvalidResults { .. })
        ));
    }
}
