//! Inline SVG bar charts.

use std::collections::BTreeSet;
use std::fmt::Write;

use crate::results::SuiteResult;

const WIDTH: f64 = 720.0;
const HEIGHT: f64 = 360.0;
const MARGIN_LEFT: f64 = 48.0;
const MARGIN_RIGHT: f64 = 24.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 64.0;

const PALETTE: [&str; 6] = ["#4e79a7", "#f28e2b", "#59a14f", "#e15759", "#76b7b2", "#b07aa1"];

/// One group of bars sharing an x-axis label.
#[derive(Debug, Clone, PartialEq)]
pub struct BarGroup {
    pub label: String,
    pub values: Vec<f64>,
}

/// A bar chart on a fixed `[0, 1]` score axis.
#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    pub title: String,
    /// One name per bar within a group; shown as a legend when more than one.
    pub series: Vec<String>,
    pub groups: Vec<BarGroup>,
    /// Optional horizontal reference line.
    pub reference: Option<(String, f64)>,
}

impl BarChart {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            series: Vec::new(),
            groups: Vec::new(),
            reference: None,
        }
    }

    pub fn with_series(mut self, series: Vec<String>) -> Self {
        self.series = series;
        self
    }

    pub fn with_group(mut self, label: impl Into<String>, values: Vec<f64>) -> Self {
        self.groups.push(BarGroup {
            label: label.into(),
            values,
        });
        self
    }

    pub fn with_reference(mut self, label: impl Into<String>, value: f64) -> Self {
        self.reference = Some((label.into(), value));
        self
    }

    /// Renders a standalone `<svg>` element.
    pub fn to_svg(&self) -> String {
        let plot_width = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_height = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
        let baseline = MARGIN_TOP + plot_height;
        let y_of = |score: f64| baseline - score.clamp(0.0, 1.0) * plot_height;

        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}" font-family="sans-serif" font-size="12">"#,
            w = WIDTH,
            h = HEIGHT
        );
        let _ = write!(
            svg,
            r#"<text x="{}" y="22" text-anchor="middle" font-size="15">{}</text>"#,
            WIDTH / 2.0,
            escape(&self.title)
        );

        for tick in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let y = y_of(tick);
            let _ = write!(
                svg,
                r##"<line x1="{x1}" y1="{y:.1}" x2="{x2}" y2="{y:.1}" stroke="#e0e0e0"/><text x="{tx}" y="{ty:.1}" text-anchor="end">{tick:.2}</text>"##,
                x1 = MARGIN_LEFT,
                x2 = WIDTH - MARGIN_RIGHT,
                tx = MARGIN_LEFT - 6.0,
                ty = y + 4.0,
            );
        }

        let slot = plot_width / self.groups.len().max(1) as f64;
        for (g, group) in self.groups.iter().enumerate() {
            let bars = group.values.len().max(1) as f64;
            let bar_width = slot * 0.7 / bars;
            let start = MARGIN_LEFT + slot * g as f64 + slot * 0.15;

            for (b, &value) in group.values.iter().enumerate() {
                let x = start + bar_width * b as f64;
                let y = y_of(value);
                let _ = write!(
                    svg,
                    r#"<rect x="{x:.1}" y="{y:.1}" width="{w:.1}" height="{h:.1}" fill="{fill}"><title>{label}: {value:.2}</title></rect>"#,
                    w = bar_width,
                    h = baseline - y,
                    fill = PALETTE[b % PALETTE.len()],
                    label = escape(&group.label),
                );
                if group.values.len() == 1 {
                    let _ = write!(
                        svg,
                        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">{:.2}</text>"#,
                        x + bar_width / 2.0,
                        y - 4.0,
                        value
                    );
                }
            }
            let _ = write!(
                svg,
                r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
                MARGIN_LEFT + slot * (g as f64 + 0.5),
                baseline + 18.0,
                escape(&group.label)
            );
        }

        if let Some((label, value)) = &self.reference {
            let y = y_of(*value);
            let _ = write!(
                svg,
                r##"<line x1="{x1}" y1="{y:.1}" x2="{x2}" y2="{y:.1}" stroke="#d62728" stroke-width="2"/><text x="{x2}" y="{ty:.1}" text-anchor="end" fill="#d62728">{label}: {value:.2}</text>"##,
                x1 = MARGIN_LEFT,
                x2 = WIDTH - MARGIN_RIGHT,
                ty = y - 6.0,
                label = escape(label),
            );
        }

        if self.series.len() > 1 {
            for (i, name) in self.series.iter().enumerate() {
                let x = MARGIN_LEFT + 130.0 * i as f64;
                let y = HEIGHT - 18.0;
                let _ = write!(
                    svg,
                    r#"<rect x="{x:.1}" y="{ry:.1}" width="10" height="10" fill="{fill}"/><text x="{tx:.1}" y="{y:.1}">{name}</text>"#,
                    ry = y - 9.0,
                    tx = x + 14.0,
                    fill = PALETTE[i % PALETTE.len()],
                    name = escape(name),
                );
            }
        }

        svg.push_str("</svg>");
        svg
    }
}

/// One bar per benchmark plus the suite mean as a reference line.
pub fn overall_chart(suite: &SuiteResult) -> BarChart {
    suite
        .benchmarks
        .iter()
        .fold(
            BarChart::new(format!("Benchmark results: {}", suite.model)),
            |chart, (name, result)| chart.with_group(name.as_str(), vec![result.overall_score]),
        )
        .with_reference("Overall", suite.overall_score)
}

/// Task-type scores grouped by benchmark, or `None` when no benchmark
/// reports task types.
pub fn task_type_chart(suite: &SuiteResult) -> Option<BarChart> {
    let task_types: BTreeSet<&String> = suite
        .benchmarks
        .values()
        .filter_map(|b| b.derived.task_type_scores.as_ref())
        .flat_map(|scores| scores.keys())
        .collect();
    if task_types.is_empty() {
        return None;
    }

    let series: Vec<String> = task_types.iter().map(|t| t.to_string()).collect();
    let chart = suite.benchmarks.iter().fold(
        BarChart::new(format!("Task type performance: {}", suite.model))
            .with_series(series.clone()),
        |chart, (name, result)| {
            let values = series
                .iter()
                .map(|t| {
                    result
                        .derived
                        .task_type_scores
                        .as_ref()
                        .and_then(|scores| scores.get(t))
                        .copied()
                        .unwrap_or(0.0)
                })
                .collect();
            chart.with_group(name.as_str(), values)
        },
    );
    Some(chart)
}

/// Minimal XML text escaping.
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
