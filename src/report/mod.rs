//! Reports for suite results.
//!
//! A [`Reporter`] writes into one directory:
//! - `summary_<date>.txt`: plain-text scores and breakdowns
//! - `report_<date>.html`: a self-contained page with inline SVG charts
//! - `charts/overall.svg` and `charts/task_types.svg`: the charts on their own
//!
//! The date is the day the results were generated, so re-rendering an old
//! results document reproduces the same file names.

pub mod chart;
pub mod html;
pub mod text;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::info;

use crate::error::ReportError;
use crate::results::SuiteResult;

pub use chart::{overall_chart, task_type_chart, BarChart};

/// Which report documents to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    Text,
    Html,
    #[default]
    All,
}

impl ReportFormat {
    pub fn includes_text(&self) -> bool {
        matches!(self, ReportFormat::Text | ReportFormat::All)
    }

    pub fn includes_html(&self) -> bool {
        matches!(self, ReportFormat::Html | ReportFormat::All)
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportFormat::Text => "text",
            ReportFormat::Html => "html",
            ReportFormat::All => "all",
        })
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "html" => Ok(ReportFormat::Html),
            "all" => Ok(ReportFormat::All),
            other => Err(format!(
                "Invalid report format '{}': must be 'text', 'html', or 'all'",
                other
            )),
        }
    }
}

/// Writes report files for a suite result.
#[derive(Debug, Clone)]
pub struct Reporter {
    output_dir: PathBuf,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new("reports")
    }
}

impl Reporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes the requested documents plus the standalone charts and
    /// returns every path written.
    pub fn write(
        &self,
        suite: &SuiteResult,
        format: ReportFormat,
    ) -> Result<Vec<PathBuf>, ReportError> {
        let chart_dir = self.output_dir.join("charts");
        fs::create_dir_all(&chart_dir)?;
        let date = suite.generated_at.format("%Y-%m-%d");
        let mut written = Vec::new();

        if format.includes_text() {
            let path = self.output_dir.join(format!("summary_{}.txt", date));
            fs::write(&path, text::summary(suite))?;
            written.push(path);
        }
        if format.includes_html() {
            let path = self.output_dir.join(format!("report_{}.html", date));
            fs::write(&path, html::render(suite)?)?;
            written.push(path);
        }

        let path = chart_dir.join("overall.svg");
        fs::write(&path, overall_chart(suite).to_svg())?;
        written.push(path);
        if let Some(chart) = task_type_chart(suite) {
            let path = chart_dir.join("task_types.svg");
            fs::write(&path, chart.to_svg())?;
            written.push(path);
        }

        for path in &written {
            info!(path = %path.display(), "Report written");
        }
        Ok(written)
    }

    /// Loads a saved results document and writes its reports.
    pub fn write_from_file(
        &self,
        results: impl AsRef<Path>,
        format: ReportFormat,
    ) -> Result<Vec<PathBuf>, ReportError> {
        let suite = SuiteResult::load(results)?;
        self.write(&suite, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::BenchmarkResult;
    use chrono::Utc;

    fn suite() -> SuiteResult {
        let mut suite = SuiteResult::new("test-model");
        suite.insert(BenchmarkResult::from_tasks("Sequential Decision", Vec::new(), &[], Utc::now()));
        suite
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("HTML".parse::<ReportFormat>().unwrap(), ReportFormat::Html);
        assert_eq!(ReportFormat::default(), ReportFormat::All);
        assert!("pdf".parse::<ReportFormat>().is_err());
        assert!(ReportFormat::All.includes_text() && ReportFormat::All.includes_html());
        assert!(!ReportFormat::Text.includes_html());
    }

    #[test]
    fn test_write_text_only() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = Reporter::new(dir.path().join("reports"));

        let written = reporter.write(&suite(), ReportFormat::Text).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names.len(), 2);
        assert!(names[0].starts_with("summary_") && names[0].ends_with(".txt"));
        assert_eq!(names[1], "overall.svg");
        let summary = fs::read_to_string(&written[0]).unwrap();
        assert!(summary.contains("Sequential Decision"));
    }

    #[test]
    fn test_write_from_saved_results() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results.json");
        suite().save(&results).unwrap();

        let written = Reporter::new(dir.path())
            .write_from_file(&results, ReportFormat::All)
            .unwrap();
        assert_eq!(written.len(), 3);
        assert!(written.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_write_from_invalid_results() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results.json");
        fs::write(&results, "{\"model\": 3}").unwrap();

        let err = Reporter::new(dir.path())
            .write_from_file(&results, ReportFormat::Text)
            .unwrap_err();
        assert!(matches!(err, ReportError::InvalidResults { .. }));
    }
}
