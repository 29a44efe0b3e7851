//! Suite runner.
//!
//! Selects benchmarks by name, builds each from a [`SuiteConfig`], runs them
//! against an agent and merges everything into one [`SuiteResult`].
//!
//! ```text
//! names → BenchmarkKind::select → build(options) → Benchmark::run(agent) → SuiteResult
//! ```
//!
//! # Example
//!
//! ```ignore
//! use agi_bench::runner::{SuiteConfig, SuiteRunner};
//!
//! let runner = SuiteRunner::new(SuiteConfig::from_file("suite.yaml")?);
//! let suite = runner.run_suite(&["memory", "planning"], &mut agent).await?;
//! suite.save("results.json")?;
//! ```
//!
//! [`SuiteResult`]: crate::results::SuiteResult

pub mod config;
pub mod suite;

pub use config::SuiteConfig;
pub use suite::{run_suite, SuiteRunner};
