//! Plain-text summary.

use std::fmt::Write;

use crate::results::{BenchmarkResult, SuiteResult};

const TITLE: &str = "AGI Benchmark Suite - Results Summary";

/// Renders the summary of a suite run.
pub fn summary(suite: &SuiteResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", TITLE);
    let _ = writeln!(out, "{}\n", "=".repeat(TITLE.len()));
    let _ = writeln!(out, "Model: {}", suite.model);
    let _ = writeln!(out, "Run: {}", suite.run_id);
    let _ = writeln!(
        out,
        "Generated: {}",
        suite.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "Overall Score: {:.2}\n", suite.overall_score);

    let _ = writeln!(out, "Benchmark Scores:");
    let _ = writeln!(out, "-----------------");
    if suite.benchmarks.is_empty() {
        let _ = writeln!(out, "(no benchmarks completed)\n");
    }
    for (name, result) in &suite.benchmarks {
        write_benchmark(&mut out, name, result);
    }

    if !suite.errors.is_empty() {
        let _ = writeln!(out, "Failed Benchmarks:");
        let _ = writeln!(out, "------------------");
        for (name, message) in &suite.errors {
            let _ = writeln!(out, "{}: {}", name, message);
        }
    }
    out
}

fn write_benchmark(out: &mut String, name: &str, result: &BenchmarkResult) {
    let _ = writeln!(
        out,
        "{}: {:.2} ({} tasks, {:.1}s)",
        name,
        result.overall_score,
        result.task_count(),
        result.duration_secs
    );

    if let Some(efficiency) = result.derived.transfer_efficiency {
        let _ = writeln!(out, "  Transfer Efficiency: {:.2}", efficiency);
    }
    if let Some(decay) = result.derived.decay_rate {
        let _ = writeln!(out, "  Memory Decay Rate: {:.2}", decay);
    }
    if !result.difficulty_scores.is_empty() {
        let _ = writeln!(out, "  Difficulty Scores:");
        for (level, score) in &result.difficulty_scores {
            let _ = writeln!(out, "    {}: {:.2}", level, score);
        }
    }
    for (label, scores) in result.derived.breakdowns() {
        let _ = writeln!(out, "  {} Scores:", title_case(label));
        for (key, score) in scores {
            let _ = writeln!(out, "    {}: {:.2}", key, score);
        }
    }

    let timed_out = result.task_results().iter().filter(|t| t.timed_out).count();
    let failed = result
        .task_results()
        .iter()
        .filter(|t| t.communication_failed)
        .count();
    if timed_out > 0 || failed > 0 {
        let _ = writeln!(
            out,
            "  Incomplete: {} timed out, {} communication failures",
            timed_out, failed
        );
    }
    out.push('\n');
}

fn title_case(label: &str) -> String {
    label
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::DerivedMetrics;
    use chrono::Utc;
    use std::collections::BTreeMap;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("task type"), "Task Type");
        assert_eq!(title_case("delay"), "Delay");
    }

    #[test]
    fn test_summary_lists_every_benchmark() {
        let mut suite = SuiteResult::new("gemma3:latest");
        suite.insert(
            BenchmarkResult::from_tasks("Episodic Memory", Vec::new(), &[], Utc::now()).with_derived(
                DerivedMetrics {
                    decay_rate: Some(0.3),
                    delay_scores: Some(BTreeMap::from([("1".to_string(), 1.0)])),
                    ..DerivedMetrics::default()
                },
            ),
        );
        suite.insert(BenchmarkResult::from_pairs("Transfer Learning", Vec::new(), &[], Utc::now()));
        suite.record_error("Code Generation", "Configuration error: bad languages");

        let text = summary(&suite);
        assert!(text.starts_with(TITLE));
        assert!(text.contains("Model: gemma3:latest"));
        assert!(text.contains("Episodic Memory: 0.00 (0 tasks"));
        assert!(text.contains("  Memory Decay Rate: 0.30"));
        assert!(text.contains("  Delay Scores:\n    1: 1.00"));
        assert!(text.contains("  Transfer Efficiency: 0.00"));
        assert!(text.contains("Failed Benchmarks:\n------------------\nCode Generation:"));
    }

    #[test]
    fn test_summary_without_benchmarks() {
        let text = summary(&SuiteResult::new("m"));
        assert!(text.contains("Overall Score: 0.00"));
        assert!(text.contains("(no benchmarks completed)"));
    }
}
