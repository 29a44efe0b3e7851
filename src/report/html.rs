//! HTML report rendered with tera.

use serde::Serialize;
use tera::{Context, Tera};

use super::chart;
use crate::error::ReportError;
use crate::results::{BenchmarkResult, SuiteResult};

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>AGI Benchmark Report - {{ model }}</title>
<style>
  body { font-family: Arial, sans-serif; margin: 24px; color: #222; }
  h1, h2 { color: #333; }
  .chart { margin: 20px 0; text-align: center; }
  .chart svg { max-width: 100%; height: auto; }
  table { border-collapse: collapse; width: 100%; }
  th, td { border: 1px solid #ddd; padding: 8px; text-align: left; vertical-align: top; }
  th { background-color: #f2f2f2; }
  tr:nth-child(even) { background-color: #f9f9f9; }
  .error { color: #b00020; }
</style>
</head>
<body>
<h1>AGI Benchmark Suite - Results Report</h1>
<p><strong>Model:</strong> {{ model }}</p>
<p><strong>Run:</strong> {{ run_id }}</p>
<p><strong>Overall Score:</strong> {{ overall_score }}</p>

<h2>Benchmark Comparison</h2>
<div class="chart">{{ overall_chart | safe }}</div>
{% if task_type_chart %}
<h2>Task Type Performance</h2>
<div class="chart">{{ task_type_chart | safe }}</div>
{% endif %}
<h2>Detailed Results</h2>
<table>
  <tr><th>Benchmark</th><th>Overall Score</th><th>Tasks</th><th>Details</th></tr>
{% for row in rows %}
  <tr>
    <td>{{ row.name }}</td>
    <td>{{ row.score }}</td>
    <td>{{ row.tasks }}</td>
    <td>{% if row.details %}{% for line in row.details %}{{ line }}{% if not loop.last %}<br>{% endif %}{% endfor %}{% else %}No detailed metrics available{% endif %}</td>
  </tr>
{% endfor %}
</table>
{% if errors %}
<h2>Failed Benchmarks</h2>
<ul>
{% for error in errors %}  <li class="error"><strong>{{ error.name }}</strong>: {{ error.message }}</li>
{% endfor %}</ul>
{% endif %}
<p>Report generated on {{ generated_at }}</p>
</body>
</html>
"#;

#[derive(Debug, Serialize)]
struct Row {
    name: String,
    score: String,
    tasks: usize,
    details: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ErrorRow<'a> {
    name: &'a str,
    message: &'a str,
}

fn details(result: &BenchmarkResult) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(efficiency) = result.derived.transfer_efficiency {
        lines.push(format!("Transfer Efficiency: {:.2}", efficiency));
    }
    if let Some(decay) = result.derived.decay_rate {
        lines.push(format!("Memory Decay Rate: {:.2}", decay));
    }
    let mut breakdowns = vec![("difficulty", &result.difficulty_scores)];
    breakdowns.extend(result.derived.breakdowns());
    for (label, scores) in breakdowns {
        if scores.is_empty() {
            continue;
        }
        let joined = scores
            .iter()
            .map(|(key, score)| format!("{}: {:.2}", key, score))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("{} scores: {}", label, joined));
    }
    lines
}

/// Renders a self-contained page with inline SVG charts.
pub fn render(suite: &SuiteResult) -> Result<String, ReportError> {
    let rows: Vec<Row> = suite
        .benchmarks
        .iter()
        .map(|(name, result)| Row {
            name: name.clone(),
            score: format!("{:.2}", result.overall_score),
            tasks: result.task_count(),
            details: details(result),
        })
        .collect();
    let errors: Vec<ErrorRow<'_>> = suite
        .errors
        .iter()
        .map(|(name, message)| ErrorRow { name, message })
        .collect();

    let mut context = Context::new();
    context.insert("model", &suite.model);
    context.insert("run_id", &suite.run_id);
    context.insert("overall_score", &format!("{:.2}", suite.overall_score));
    context.insert(
        "generated_at",
        &suite.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );
    context.insert("overall_chart", &chart::overall_chart(suite).to_svg());
    context.insert(
        "task_type_chart",
        &chart::task_type_chart(suite).map(|c| c.to_svg()),
    );
    context.insert("rows", &rows);
    context.insert("errors", &errors);

    Ok(Tera::one_off(TEMPLATE, &context, true)?)
}
