//! Error types for agi-bench operations.
//!
//! Defines error types for the subsystems of the harness:
//! - Benchmark configuration and execution
//! - Response scoring and sandboxed code execution
//! - LLM API interactions
//! - Report generation

use thiserror::Error;

/// Errors raised while building a benchmark configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for option '{option}': {reason}")]
    InvalidOption { option: String, reason: String },

    #[error("Malformed configuration for '{benchmark}': {message}")]
    Malformed { benchmark: String, message: String },

    #[error("Unknown benchmark '{0}': expected one of transfer, memory, abstraction, planning, code, vision, all")]
    UnknownBenchmark(String),

    #[error("Failed to load configuration file '{path}': {message}")]
    File { path: String, message: String },
}

impl ConfigError {
    /// Shorthand for an option that failed a range or type check.
    pub fn invalid(option: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by the scorer.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Unknown evaluation metric: {0}")]
    UnknownMetric(String),

    #[error("Metric 'execution_result' needs source code and test cases, not a plain expected string")]
    ExecutionContextRequired,

    #[error("No execution backend configured for metric 'execution_result'")]
    NoExecutionBackend,
}

/// Errors raised by a code execution backend.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Toolchain '{tool}' is not available: {message}")]
    ToolchainUnavailable { tool: String, message: String },

    #[error("Compilation failed: {0}")]
    CompileFailed(String),

    #[error("Execution timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that abort a benchmark run or its construction.
///
/// Per-task failures never show up here; they are folded into a zero score.
#[derive(Debug, Error)]
pub enum BenchmarkError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Scoring error: {0}")]
    Scoring(#[from] ScoringError),

    #[error("Benchmark '{benchmark}' is already running on this instance")]
    ConcurrentRun { benchmark: String },
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API base URL: AGI_BENCH_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

/// Errors that can occur while writing reports.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to read results document '{path}': {message}")]
    InvalidResults { path: String, message: String },

    #[error("Template rendering error: {0}")]
    Template(#[from] tera::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
