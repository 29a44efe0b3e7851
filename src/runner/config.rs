//! Suite configuration files.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::benchmark::{BenchmarkKind, Options};
use crate::error::ConfigError;

/// Per-benchmark option maps, keyed by benchmark key (`transfer`, `memory`, ...).
///
/// ```yaml
/// memory:
///   memory_span: 5
///   delay_intervals: [1, 3]
/// code:
///   languages: [python]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuiteConfig {
    benchmarks: BTreeMap<String, Options>,
}

impl SuiteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a `.yaml`/`.yml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file_error = |message: String| ConfigError::File {
            path: path.display().to_string(),
            message,
        };

        let content = fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase);

        let config: SuiteConfig = match extension.as_deref() {
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| file_error(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content).map_err(|e| file_error(e.to_string()))?,
            _ => {
                return Err(file_error(
                    "unsupported extension, expected .yaml, .yml or .json".to_string(),
                ))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Sets the options of one benchmark, replacing earlier ones.
    pub fn with_options(mut self, kind: BenchmarkKind, options: Options) -> Self {
        self.benchmarks.insert(kind.key().to_string(), options);
        self
    }

    /// Options for `kind`, empty when the file does not mention it.
    pub fn options_for(&self, kind: BenchmarkKind) -> Options {
        self.benchmarks.get(kind.key()).cloned().unwrap_or_default()
    }

    /// Every section must name a known benchmark.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for key in self.benchmarks.keys() {
            key.parse::<BenchmarkKind>()?;
        }
        Ok(())
    }
}
