//! Sandboxed execution of generated code.
//!
//! The scorer only depends on [`ExecutionBackend`]. [`ProcessSandbox`] is the
//! local implementation: it writes the program into a throwaway directory and
//! runs the language toolchain once per test case with piped stdin and a hard
//! timeout.

use std::path::Path;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::ExecutionError;

/// Default per-test-case timeout.
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(10);

/// One stdin/stdout example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
        }
    }
}

/// The executable reference of a code-generation task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeCheck {
    pub language: String,
    pub test_cases: Vec<TestCase>,
}

/// Result of running one test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseOutcome {
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub passed: bool,
}

/// Runs source code against test cases in some isolated environment.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Returns one outcome per test case, in order.
    async fn execute(
        &self,
        language: &str,
        source: &str,
        test_cases: &[TestCase],
    ) -> Result<Vec<TestCaseOutcome>, ExecutionError>;
}

fn code_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_+#-]*[ \t]*\r?\n(.*?)```").expect("valid code block regex")
    })
}

/// Pulls the first fenced code block out of a response, or the trimmed response.
pub fn extract_code(response: &str) -> String {
    code_block_regex()
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| response.trim().to_string())
}

/// Output comparison ignoring trailing whitespace and CRLF line endings.
fn outputs_match(actual: &str, expected: &str) -> bool {
    let normalize = |s: &str| {
        s.replace("\r\n", "\n")
            .lines()
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join("\n")
            .trim_end()
            .to_string()
    };
    normalize(actual) == normalize(expected)
}

/// Runs programs as local child processes inside a temporary directory.
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    timeout: Duration,
}

impl Default for ProcessSandbox {
    fn default() -> Self {
        Self::new(DEFAULT_EXECUTION_TIMEOUT)
    }
}

impl ProcessSandbox {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Compilation gets a larger budget than a single test run.
    fn compile_budget(&self) -> Duration {
        self.timeout.saturating_mul(6)
    }

    /// Writes the source and, for compiled languages, builds it.
    ///
    /// Returns the program and arguments to launch per test case.
    async fn prepare(
        &self,
        dir: &Path,
        language: &str,
        source: &str,
    ) -> Result<(String, Vec<String>), ExecutionError> {
        match language.to_lowercase().as_str() {
            "python" | "python3" => {
                let path = dir.join("main.py");
                tokio::fs::write(&path, source).await?;
                Ok(("python3".to_string(), vec![path_arg(&path)]))
            }
            "javascript" | "js" | "node" => {
                let path = dir.join("main.js");
                tokio::fs::write(&path, source).await?;
                Ok(("node".to_string(), vec![path_arg(&path)]))
            }
            "rust" => {
                let src = dir.join("main.rs");
                let bin = dir.join("main");
                tokio::fs::write(&src, source).await?;
                self.compile_rust(&src, &bin).await?;
                Ok((path_arg(&bin), Vec::new()))
            }
            other => Err(ExecutionError::UnsupportedLanguage(other.to_string())),
        }
    }

    async fn compile_rust(&self, src: &Path, bin: &Path) -> Result<(), ExecutionError> {
        let budget = self.compile_budget();
        let child = Command::new("rustc")
            .args(["--edition", "2021", "-O", "-o"])
            .arg(bin)
            .arg(src)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| toolchain_error("rustc", e))?;

        let output = tokio::time::timeout(budget, child.wait_with_output())
            .await
            .map_err(|_| ExecutionError::Timeout {
                seconds: budget.as_secs(),
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExecutionError::CompileFailed(truncate(&stderr, 2000)));
        }
        Ok(())
    }

    async fn run_case(
        &self,
        dir: &Path,
        program: &str,
        args: &[String],
        case: &TestCase,
    ) -> Result<TestCaseOutcome, ExecutionError> {
        let mut child = Command::new(program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| toolchain_error(program, e))?;

        // Writing the input is bounded by the timeout too.
        let run = async move {
            if let Some(mut stdin) = child.stdin.take() {
                // The program may exit without reading its input.
                let _ = stdin.write_all(case.input.as_bytes()).await;
            }
            child.wait_with_output().await
        };

        let (actual_output, passed) =
            match tokio::time::timeout(self.timeout, run).await {
                Ok(output) => {
                    let output = output?;
                    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                    let passed =
                        output.status.success() && outputs_match(&stdout, &case.expected_output);
                    (stdout, passed)
                }
                Err(_) => {
                    debug!(timeout = ?self.timeout, "Test case timed out");
                    (String::new(), false)
                }
            };

        Ok(TestCaseOutcome {
            input: case.input.clone(),
            expected_output: case.expected_output.clone(),
            actual_output,
            passed,
        })
    }
}

#[async_trait]
impl ExecutionBackend for ProcessSandbox {
    async fn execute(
        &self,
        language: &str,
        source: &str,
        test_cases: &[TestCase],
    ) -> Result<Vec<TestCaseOutcome>, ExecutionError> {
        let workdir = TempDir::new()?;
        let (program, args) = self.prepare(workdir.path(), language, source).await?;

        let mut outcomes = Vec::with_capacity(test_cases.len());
        for case in test_cases {
            outcomes.push(self.run_case(workdir.path(), &program, &args, case).await?);
        }

        debug!(
            language,
            passed = outcomes.iter().filter(|o| o.passed).count(),
            total = outcomes.len(),
            "Executed generated code"
        );
        Ok(outcomes)
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn toolchain_error(tool: &str, e: std::io::Error) -> ExecutionError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ExecutionError::ToolchainUnavailable {
            tool: tool.to_string(),
            message: e.to_string(),
        }
    } else {
        ExecutionError::Io(e)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{}... [truncated]", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_code_fenced() {
        let response = "Here you go:\n```python\nprint(input())\n```\nDone.";
        assert_eq!(extract_code(response), "print(input())\n");
    }

    #[test]
    fn test_extract_code_first_block_wins() {
        let response = "```js\nconsole.log(1)\n```\n```js\nconsole.log(2)\n```";
        assert_eq!(extract_code(response), "console.log(1)\n");
    }

    #[test]
    fn test_extract_code_unfenced() {
        assert_eq!(extract_code("  print(1)  \n"), "print(1)");
    }

    #[test]
    fn test_outputs_match_normalizes_whitespace() {
        assert!(outputs_match("1\r\n2  \n\n", "1\n2"));
        assert!(!outputs_match("1 2", "1\n2"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc... [truncated]");
    }

    #[test]
    fn test_compile_budget_saturates() {
        assert_eq!(
            ProcessSandbox::new(Duration::from_secs(10)).compile_budget(),
            Duration::from_secs(60)
        );
        assert_eq!(ProcessSandbox::new(Duration::MAX).compile_budget(), Duration::MAX);
        assert_eq!(
            ProcessSandbox::new(Duration::from_secs(u64::MAX / 2)).compile_budget(),
            Duration::MAX
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_program_ignoring_large_input_times_out() {
        let sandbox = ProcessSandbox::new(Duration::from_millis(300));
        let dir = TempDir::new().unwrap();
        let case = TestCase::new("x".repeat(4 * 1024 * 1024), "");

        let started = std::time::Instant::now();
        let outcome = sandbox
            .run_case(dir.path(), "sleep", &["30".to_string()], &case)
            .await
            .unwrap();

        assert!(!outcome.passed);
        assert!(outcome.actual_output.is_empty());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_unsupported_language() {
        let sandbox = ProcessSandbox::default();
        let err = sandbox
            .execute("cobol", "DISPLAY 'HI'.", &[TestCase::new("", "HI")])
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::UnsupportedLanguage(ref l) if l == "cobol"));
    }

    #[tokio::test]
    #[ignore] // Requires python3 on PATH
    async fn test_python_round_trip() {
        let sandbox = ProcessSandbox::new(Duration::from_secs(5));
        let outcomes = sandbox
            .execute(
                "python",
                "import sys\nprint(sum(int(x) for x in sys.stdin.read().split()))\n",
                &[TestCase::new("1 2 3\n", "6"), TestCase::new("4\n", "5")],
            )
            .await
            .unwrap();
        assert!(outcomes[0].passed);
        assert!(!outcomes[1].passed);
    }
}
