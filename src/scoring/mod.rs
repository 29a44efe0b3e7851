//! Response scoring.
//!
//! Every score is normalized to `[0.0, 1.0]`. Text metrics are pure functions;
//! `execution_result` runs the response through an [`ExecutionBackend`].
//!
//! `token_overlap` is recall against the expected tokens only. A verbose
//! response that contains every expected token scores 1.0 regardless of what
//! else it says. Changing that would shift every derived ranking, so the
//! asymmetry is kept as is.

pub mod execution;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ScoringError;

pub use execution::{
    extract_code, CodeCheck, ExecutionBackend, ProcessSandbox, TestCase, TestCaseOutcome,
};

/// Named evaluation metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ExactMatch,
    TokenOverlap,
    ExecutionResult,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::ExactMatch => "exact_match",
            Metric::TokenOverlap => "token_overlap",
            Metric::ExecutionResult => "execution_result",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact_match" => Ok(Metric::ExactMatch),
            "token_overlap" => Ok(Metric::TokenOverlap),
            "execution_result" => Ok(Metric::ExecutionResult),
            other => Err(ScoringError::UnknownMetric(other.to_string())),
        }
    }
}

/// Reference answer a task is scored against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpectedSolution {
    /// A string compared under a text metric.
    Text { value: String, metric: Metric },
    /// A program checked by running it against test cases.
    Execution(CodeCheck),
}

impl ExpectedSolution {
    pub fn exact(value: impl Into<String>) -> Self {
        ExpectedSolution::Text {
            value: value.into(),
            metric: Metric::ExactMatch,
        }
    }

    pub fn tokens(value: impl Into<String>) -> Self {
        ExpectedSolution::Text {
            value: value.into(),
            metric: Metric::TokenOverlap,
        }
    }

    pub fn metric(&self) -> Metric {
        match self {
            ExpectedSolution::Text { metric, .. } => *metric,
            ExpectedSolution::Execution(_) => Metric::ExecutionResult,
        }
    }
}

/// Scores `response` against `expected` under the metric called `metric`.
///
/// Fails with [`ScoringError::UnknownMetric`] for unrecognized names.
pub fn evaluate(response: &str, expected: &str, metric: &str) -> Result<f64, ScoringError> {
    evaluate_text(response, expected, metric.parse()?)
}

/// Text-metric scoring for an already parsed metric.
pub fn evaluate_text(response: &str, expected: &str, metric: Metric) -> Result<f64, ScoringError> {
    match metric {
        Metric::ExactMatch => Ok(exact_match(response, expected)),
        Metric::TokenOverlap => Ok(token_overlap(response, expected)),
        Metric::ExecutionResult => Err(ScoringError::ExecutionContextRequired),
    }
}

/// 1.0 iff the strings are identical.
pub fn exact_match(response: &str, expected: &str) -> f64 {
    if response == expected {
        1.0
    } else {
        0.0
    }
}

/// Fraction of the expected tokens present in the response (case-insensitive).
pub fn token_overlap(response: &str, expected: &str) -> f64 {
    let expected_tokens = tokenize(expected);
    if expected_tokens.is_empty() {
        return 0.0;
    }
    let response_tokens = tokenize(response);
    let shared = expected_tokens.intersection(&response_tokens).count();
    shared as f64 / expected_tokens.len() as f64
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Fraction of passed test cases; 0.0 when there are none.
pub fn pass_rate(outcomes: &[TestCaseOutcome]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    let passed = outcomes.iter().filter(|o| o.passed).count();
    passed as f64 / outcomes.len() as f64
}

/// Scores responses of any kind, including executable ones.
#[derive(Clone, Default)]
pub struct Scorer {
    backend: Option<Arc<dyn ExecutionBackend>>,
}

impl Scorer {
    /// A scorer for text metrics only.
    pub fn text_only() -> Self {
        Self { backend: None }
    }

    /// A scorer that runs code through `backend`.
    pub fn with_backend(backend: Arc<dyn ExecutionBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Scores a response.
    ///
    /// Execution failures (missing toolchain, compile errors) score 0.0.
    /// A missing backend is a setup mistake and is returned as an error.
    pub async fn score(
        &self,
        response: &str,
        expected: &ExpectedSolution,
    ) -> Result<f64, ScoringError> {
        match expected {
            ExpectedSolution::Text { value, metric } => evaluate_text(response, value, *metric),
            ExpectedSolution::Execution(check) => {
                let backend = self
                    .backend
                    .as_ref()
                    .ok_or(ScoringError::NoExecutionBackend)?;
                let source = extract_code(response);
                if source.trim().is_empty() {
                    return Ok(0.0);
                }
                match backend
                    .execute(&check.language, &source, &check.test_cases)
                    .await
                {
                    Ok(outcomes) => Ok(pass_rate(&outcomes)),
                    Err(e) => {
                        warn!(language = %check.language, error = %e, "Code execution failed");
                        Ok(0.0)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionError;
    use async_trait::async_trait;

    #[test]
    fn test_exact_match() {
        for x in ["", "42", "hello world", "  padded  "] {
            assert_eq!(evaluate(x, x, "exact_match").unwrap(), 1.0);
        }
        assert_eq!(evaluate("42", "43", "exact_match").unwrap(), 0.0);
        assert_eq!(evaluate("Paris", "paris", "exact_match").unwrap(), 0.0);
    }

    #[test]
    fn test_token_overlap_is_case_insensitive() {
        assert_eq!(evaluate("A B", "a b", "token_overlap").unwrap(), 1.0);
    }

    #[test]
    fn test_token_overlap_empty_expected() {
        assert_eq!(evaluate("anything", "", "token_overlap").unwrap(), 0.0);
        assert_eq!(evaluate("", "   ", "token_overlap").unwrap(), 0.0);
    }

    #[test]
    fn test_token_overlap_is_recall() {
        assert_eq!(token_overlap("red", "red blue"), 0.5);
        // Extra tokens in the response are not penalized.
        assert_eq!(token_overlap("red blue green yellow", "red blue"), 1.0);
        // Duplicates count once.
        assert_eq!(token_overlap("red red", "red red blue"), 0.5);
    }

    #[test]
    fn test_unknown_metric_propagates() {
        let err = evaluate("a", "a", "bleu").unwrap_err();
        assert!(matches!(err, ScoringError::UnknownMetric(ref m) if m == "bleu"));
    }

    #[test]
    fn test_execution_result_needs_context() {
        let err = evaluate("print(1)", "1", "execution_result").unwrap_err();
        assert!(matches!(err, ScoringError::ExecutionContextRequired));
    }

    #[test]
    fn test_metric_round_trip_names() {
        for metric in [Metric::ExactMatch, Metric::TokenOverlap, Metric::ExecutionResult] {
            assert_eq!(metric.as_str().parse::<Metric>().unwrap(), metric);
        }
    }

    #[test]
    fn test_pass_rate() {
        let outcome = |passed| TestCaseOutcome {
            input: String::new(),
            expected_output: String::new(),
            actual_output: String::new(),
            passed,
        };
        assert_eq!(pass_rate(&[]), 0.0);
        assert_eq!(pass_rate(&[outcome(true), outcome(false)]), 0.5);
    }

    struct FixedBackend(Result<Vec<bool>, ()>);

    #[async_trait]
    impl ExecutionBackend for FixedBackend {
        async fn execute(
            &self,
            language: &str,
            _source: &str,
            _test_cases: &[TestCase],
        ) -> Result<Vec<TestCaseOutcome>, ExecutionError> {
            match &self.0 {
                Ok(results) => Ok(results
                    .iter()
                    .map(|&passed| TestCaseOutcome {
                        input: String::new(),
                        expected_output: String::new(),
                        actual_output: String::new(),
                        passed,
                    })
                    .collect()),
                Err(()) => Err(ExecutionError::UnsupportedLanguage(language.to_string())),
            }
        }
    }

    fn check() -> ExpectedSolution {
        ExpectedSolution::Execution(CodeCheck {
            language: "python".to_string(),
            test_cases: vec![TestCase::new("1\n", "1")],
        })
    }

    #[tokio::test]
    async fn test_scorer_execution_pass_rate() {
        let scorer = Scorer::with_backend(Arc::new(FixedBackend(Ok(vec![true, true, false, true]))));
        let score = scorer.score("```python\nprint(1)\n```", &check()).await.unwrap();
        assert_eq!(score, 0.75);
    }

    #[tokio::test]
    async fn test_scorer_backend_failure_scores_zero() {
        let scorer = Scorer::with_backend(Arc::new(FixedBackend(Err(()))));
        assert_eq!(scorer.score("print(1)", &check()).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_scorer_empty_response_scores_zero() {
        let scorer = Scorer::with_backend(Arc::new(FixedBackend(Ok(vec![true]))));
        assert_eq!(scorer.score("", &check()).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_scorer_without_backend_errors() {
        let err = Scorer::text_only().score("print(1)", &check()).await.unwrap_err();
        assert!(matches!(err, ScoringError::NoExecutionBackend));
    }

    #[tokio::test]
    async fn test_scorer_text_metric() {
        let scorer = Scorer::text_only();
        let score = scorer
            .score("the answer is 7", &ExpectedSolution::tokens("7"))
            .await
            .unwrap();
        assert_eq!(score, 1.0);
    }
}
