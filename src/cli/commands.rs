//! CLI command definitions for agi-bench.
//!
//! Two subcommands:
//! - `run`: execute benchmarks against a model and save the results document
//! - `report`: render text/HTML reports from a saved results document

use std::fmt;
use std::fs;
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use crate::agent::{AgentClient, LlmAgent};
use crate::llm::{
    ChatCompletionsClient, LlmProvider, OllamaClient, DEFAULT_OLLAMA_MODEL, OLLAMA_BASE_URL,
};
use crate::metrics::{export_metrics, init_metrics};
use crate::report::{ReportFormat, Reporter};
use crate::results::SuiteResult;
use crate::runner::{SuiteConfig, SuiteRunner};

/// Default path of the results document.
const DEFAULT_OUTPUT: &str = "results.json";

/// Default directory for report artifacts.
const DEFAULT_REPORT_DIR: &str = "reports";

/// Benchmark harness for general-intelligence capabilities of language models.
#[derive(Parser, Debug)]
#[command(name = "agi-bench")]
#[command(about = "Run AGI capability benchmarks against a language model")]
#[command(version)]
#[command(
    long_about = "agi-bench evaluates a model on transfer learning, episodic memory, concept formation, sequential decision making, code generation and visual reasoning.\n\nExample usage:\n  agi-bench run -b memory planning -m gemma3:latest --visualize\n  agi-bench report -i results.json --format html"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run benchmarks and save the results document.
    Run(RunArgs),

    /// Generate reports from a saved results document.
    Report(ReportArgs),
}

/// Model backend for the agent under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    OpenAi,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::Ollama => "ollama",
            Provider::OpenAi => "openai",
        })
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Provider::Ollama),
            "openai" => Ok(Provider::OpenAi),
            other => Err(format!(
                "Invalid provider '{}': must be 'ollama' or 'openai'",
                other
            )),
        }
    }
}

/// Arguments for `agi-bench run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Benchmarks to run: transfer, memory, abstraction, planning, code, vision, or all.
    #[arg(short = 'b', long, num_args = 1.., default_value = "all")]
    pub benchmarks: Vec<String>,

    /// Model identifier passed to the provider.
    #[arg(short = 'm', long, default_value = DEFAULT_OLLAMA_MODEL)]
    pub model: String,

    /// Output path for the results document.
    #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT)]
    pub output: String,

    /// Model backend (ollama or openai).
    #[arg(long, default_value = "ollama")]
    pub provider: Provider,

    /// Base URL of the model API (defaults to the local Ollama server).
    #[arg(long, env = "AGI_BENCH_API_BASE")]
    pub api_base: Option<String>,

    /// Bearer token for OpenAI-compatible endpoints.
    #[arg(long, env = "AGI_BENCH_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Suite configuration file (.yaml, .yml or .json) with per-benchmark options.
    #[arg(short = 'c', long)]
    pub config: Option<String>,

    /// Run benchmarks concurrently, each with its own conversation.
    #[arg(long)]
    pub parallel: bool,

    /// Sampling temperature sent with every request.
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Generate reports and charts after the run.
    #[arg(long)]
    pub visualize: bool,

    /// Report format to generate with --visualize (text, html, all).
    #[arg(long, default_value = "all")]
    pub report_format: ReportFormat,

    /// Directory for report artifacts.
    #[arg(long, default_value = DEFAULT_REPORT_DIR)]
    pub report_dir: String,

    /// Write Prometheus metrics in text format to this file after the run.
    #[arg(long)]
    pub metrics_output: Option<String>,
}

/// Arguments for `agi-bench report`.
#[derive(Parser, Debug)]
pub struct ReportArgs {
    /// Results document produced by `agi-bench run`.
    #[arg(short = 'i', long, default_value = DEFAULT_OUTPUT)]
    pub input: String,

    /// Report format (text, html, all).
    #[arg(short = 'f', long, default_value = "all")]
    pub format: ReportFormat,

    /// Directory for report artifacts.
    #[arg(long, default_value = DEFAULT_REPORT_DIR)]
    pub report_dir: String,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse CLI arguments and execute the command.
///
/// For control over logging initialization, use `parse_cli()` and `run_with_cli()`.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_benchmarks_command(args).await,
        Commands::Report(args) => run_report_command(args),
    }
}

fn build_provider(args: &RunArgs) -> anyhow::Result<Arc<dyn LlmProvider>> {
    match args.provider {
        Provider::Ollama => {
            let base = args
                .api_base
                .clone()
                .unwrap_or_else(|| OLLAMA_BASE_URL.to_string());
            info!(base_url = %base, model = %args.model, "Using Ollama");
            Ok(Arc::new(OllamaClient::new(base, args.model.clone())?))
        }
        Provider::OpenAi => {
            let base = args.api_base.clone().ok_or_else(|| {
                anyhow::anyhow!(
                    "The openai provider needs --api-base or the AGI_BENCH_API_BASE env var"
                )
            })?;
            info!(base_url = %base, model = %args.model, "Using OpenAI-compatible endpoint");
            Ok(Arc::new(ChatCompletionsClient::new(
                base,
                args.api_key.clone(),
                args.model.clone(),
            )?))
        }
    }
}

fn build_agent(provider: Arc<dyn LlmProvider>, args: &RunArgs) -> LlmAgent {
    let agent = LlmAgent::new(provider).with_model(args.model.clone());
    match args.temperature {
        Some(temperature) => agent.with_temperature(temperature),
        None => agent,
    }
}

async fn run_benchmarks_command(args: RunArgs) -> anyhow::Result<()> {
    if let Err(e) = init_metrics() {
        warn!(error = %e, "Failed to initialize metrics, continuing without them");
    }

    let config = match &args.config {
        Some(path) => SuiteConfig::from_file(path)?,
        None => SuiteConfig::new(),
    };
    let runner = SuiteRunner::new(config);
    let provider = build_provider(&args)?;

    let suite = if args.parallel {
        let factory = || -> Box<dyn AgentClient> { Box::new(build_agent(provider.clone(), &args)) };
        runner.run_suite_parallel(&args.benchmarks, &factory).await?
    } else {
        let mut agent = build_agent(provider, &args);
        runner.run_suite(&args.benchmarks, &mut agent).await?
    };

    suite.save(&args.output)?;
    print!("{}", run_summary(&suite, &args.output));

    if args.visualize {
        println!("\nGenerating reports...");
        let written = Reporter::new(&args.report_dir).write(&suite, args.report_format)?;
        for path in written {
            println!("  {}", path.display());
        }
    }

    if let Some(path) = &args.metrics_output {
        fs::write(path, export_metrics())?;
        info!(path = %path, "Metrics written");
    }
    Ok(())
}

fn run_summary(suite: &SuiteResult, output: &str) -> String {
    let mut lines = vec![String::new()];
    for (name, result) in &suite.benchmarks {
        lines.push(format!("{:<22} {:.2}", name, result.overall_score));
    }
    for (name, message) in &suite.errors {
        lines.push(format!("{:<22} FAILED: {}", name, message));
    }
    lines.push(String::new());
    if suite.errors.is_empty() {
        lines.push("All benchmarks completed.".to_string());
    } else {
        lines.push(format!(
            "{} of {} benchmarks completed, {} failed.",
            suite.benchmarks.len(),
            suite.benchmarks.len() + suite.errors.len(),
            suite.errors.len()
        ));
    }
    lines.push(format!("Overall AGI score: {:.2}", suite.overall_score));
    lines.push(format!("Detailed results saved to {}", output));
    lines.join("\n") + "\n"
}

fn run_report_command(args: ReportArgs) -> anyhow::Result<()> {
    let written = Reporter::new(&args.report_dir).write_from_file(&args.input, args.format)?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}
