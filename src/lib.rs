//! agi-bench: a benchmark harness for general-intelligence capabilities of
//! language models.
//!
//! Six benchmark domains (transfer learning, episodic memory, concept
//! formation, sequential decision making, code generation and visual
//! reasoning) generate tasks deterministically from a seed, drive an
//! [`agent::AgentClient`] through them, score every response and aggregate
//! the scores into a [`results::SuiteResult`].

pub mod agent;
pub mod benchmark;
pub mod cli;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod report;
pub mod results;
pub mod runner;
pub mod scoring;

// Re-export commonly used types
pub use agent::{AgentClient, AgentFactory, LlmAgent, Solution};
pub use benchmark::{Benchmark, BenchmarkKind, Difficulty, Options, Task};
pub use error::{BenchmarkError, ConfigError, ExecutionError, LlmError, ReportError, ScoringError};
pub use results::{BenchmarkResult, SuiteResult, TaskResult};
pub use runner::{run_suite, SuiteConfig, SuiteRunner};
