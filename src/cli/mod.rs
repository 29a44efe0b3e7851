//! Command-line interface for agi-bench.
//!
//! Provides the `run` command for executing benchmark suites and the
//! `report` command for rendering saved results.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands, Provider, ReportArgs, RunArgs};
