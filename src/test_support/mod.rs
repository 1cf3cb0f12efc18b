//! Test utilities and mocks for berth unit tests.
//!
//! [`MockRunner`] stands in for the Docker CLI: it records every command
//! and answers with scripted outputs. [`WorkspaceFixture`] writes a uv
//! workspace to a temporary directory.
//!
//! # Example
//!
//! ```rust,ignore
//! use berth::test_support::{MockProcessOutput, MockRunner, WorkspaceFixture};
//!
//! #[test]
//! fn test_example() {
//!     let ws = WorkspaceFixture::new().member("api", &["core"]).member("core", &[]).build();
//!
//!     let runner = MockRunner::new();
//!     runner.expect_contains("build", MockProcessOutput::success("").writing("--iidfile", "sha256:1"));
//!     // hand the runner to a DockerEngine...
//! }
//! ```

pub mod fixtures;

use std::path::Path;
use std::sync::Mutex;

use anyhow::{bail, Result};

use crate::util::process::{ProcessBuilder, ProcessOutput, ProcessRunner};

pub use fixtures::*;

/// Mock process output for testing command execution.
#[derive(Debug, Clone)]
pub struct MockProcessOutput {
    /// Exit status code (0 = success).
    pub status: i32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Files to write at the path following a flag, e.g. `--iidfile`.
    pub writes: Vec<(String, String)>,
    /// Files to create under the `dest=` of `--output type=local`.
    pub exports: Vec<(String, String)>,
}

impl MockProcessOutput {
    /// Create a successful output with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        MockProcessOutput {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            writes: Vec::new(),
            exports: Vec::new(),
        }
    }

    /// Create a failure output with the given stderr and status code.
    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        MockProcessOutput {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
            writes: Vec::new(),
            exports: Vec::new(),
        }
    }

    /// Write `contents` to the path passed after `flag`.
    pub fn writing(mut self, flag: impl Into<String>, contents: impl Into<String>) -> Self {
        self.writes.push((flag.into(), contents.into()));
        self
    }

    /// Create `relative` with `contents` in the local export destination.
    pub fn exporting(mut self, relative: impl Into<String>, contents: impl Into<String>) -> Self {
        self.exports.push((relative.into(), contents.into()));
        self
    }

    fn to_output(&self) -> ProcessOutput {
        ProcessOutput {
            code: Some(self.status),
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        }
    }

    fn apply_side_effects(&self, cmd: &ProcessBuilder) -> Result<()> {
        for (flag, contents) in &self.writes {
            if let Some(path) = cmd.flag_value(flag) {
                std::fs::write(path, contents)?;
            }
        }

        if !self.exports.is_empty() {
            let dest = cmd
                .flag_value("--output")
                .and_then(|spec| spec.split(',').find_map(|kv| kv.strip_prefix("dest=")));
            let Some(dest) = dest else {
                bail!("export scripted for a command without `--output ...,dest=`");
            };
            for (relative, contents) in &self.exports {
                let path = Path::new(dest).join(relative);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, contents)?;
            }
        }

        Ok(())
    }
}

impl Default for MockProcessOutput {
    fn default() -> Self {
        MockProcessOutput::success("")
    }
}

/// Pattern for matching commands in MockRunner.
#[derive(Debug, Clone)]
pub enum CommandPattern {
    /// Exact match on full command string.
    Exact(String),
    /// Match if command starts with prefix.
    StartsWith(String),
    /// Match if command contains substring.
    Contains(String),
    /// Match using a regex pattern.
    Regex(String),
    /// Match any command.
    Any,
}

impl CommandPattern {
    /// Check if this pattern matches the given command.
    pub fn matches(&self, cmd: &str) -> bool {
        match self {
            CommandPattern::Exact(s) => cmd == s,
            CommandPattern::StartsWith(s) => cmd.starts_with(s),
            CommandPattern::Contains(s) => cmd.contains(s),
            CommandPattern::Regex(pattern) => regex::Regex::new(pattern)
                .map(|re| re.is_match(cmd))
                .unwrap_or(false),
            CommandPattern::Any => true,
        }
    }
}

/// Expectation for a command execution.
#[derive(Debug, Clone)]
pub struct CommandExpectation {
    /// Pattern to match against commands.
    pub pattern: CommandPattern,
    /// Output to return when matched.
    pub output: MockProcessOutput,
    /// Number of times this expectation can be used (None = unlimited).
    pub times: Option<usize>,
    /// Number of times this expectation has been used.
    pub used: usize,
}

impl CommandExpectation {
    /// Create a new expectation.
    pub fn new(pattern: CommandPattern, output: MockProcessOutput) -> Self {
        CommandExpectation {
            pattern,
            output,
            times: None,
            used: 0,
        }
    }

    /// Set the number of times this expectation can be used.
    pub fn times(mut self, n: usize) -> Self {
        self.times = Some(n);
        self
    }

    fn available(&self) -> bool {
        match self.times {
            Some(n) => self.used < n,
            None => true,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    expectations: Vec<CommandExpectation>,
    calls: Vec<ProcessBuilder>,
    default_output: Option<MockProcessOutput>,
}

/// Scripted process runner.
///
/// Records every command it is asked to run and answers from the first
/// matching expectation. Interior mutability lets one runner be shared by
/// concurrent engine calls.
#[derive(Debug, Default)]
pub struct MockRunner {
    state: Mutex<MockState>,
}

impl MockRunner {
    /// Create a new mock runner.
    pub fn new() -> Self {
        MockRunner::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MockState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    /// Add an expectation for a command containing a substring.
    pub fn expect_contains(&self, substring: &str, output: MockProcessOutput) -> &Self {
        self.expect_pattern(CommandExpectation::new(
            CommandPattern::Contains(substring.to_string()),
            output,
        ))
    }

    /// Add an expectation for a command starting with a prefix.
    pub fn expect_prefix(&self, prefix: &str, output: MockProcessOutput) -> &Self {
        self.expect_pattern(CommandExpectation::new(
            CommandPattern::StartsWith(prefix.to_string()),
            output,
        ))
    }

    /// Add a custom expectation.
    pub fn expect_pattern(&self, expectation: CommandExpectation) -> &Self {
        self.with_state(|s| s.expectations.push(expectation));
        self
    }

    /// Set a default output for commands that don't match any expectation.
    pub fn set_default(&self, output: MockProcessOutput) -> &Self {
        self.with_state(|s| s.default_output = Some(output));
        self
    }

    /// All commands that were run.
    pub fn calls(&self) -> Vec<ProcessBuilder> {
        self.with_state(|s| s.calls.clone())
    }

    /// All commands that were run, rendered as strings.
    pub fn call_strings(&self) -> Vec<String> {
        self.with_state(|s| s.calls.iter().map(ProcessBuilder::display_command).collect())
    }

    /// Verify that all expectations with a specific count were satisfied.
    pub fn verify(&self) -> Result<()> {
        self.with_state(|s| {
            for (i, exp) in s.expectations.iter().enumerate() {
                if let Some(expected) = exp.times {
                    if exp.used != expected {
                        bail!(
                            "expectation {} was used {} times, expected {}",
                            i,
                            exp.used,
                            expected
                        );
                    }
                }
            }
            Ok(())
        })
    }
}

impl ProcessRunner for MockRunner {
    fn run(&self, cmd: &ProcessBuilder) -> Result<ProcessOutput> {
        let full_cmd = cmd.display_command();

        let output = self.with_state(|s| {
            s.calls.push(cmd.clone());
            for exp in &mut s.expectations {
                if exp.pattern.matches(&full_cmd) && exp.available() {
                    exp.used += 1;
                    return Some(exp.output.clone());
                }
            }
            s.default_output.clone()
        });

        let Some(output) = output else {
            bail!("unexpected command: {}", full_cmd);
        };
        output.apply_side_effects(cmd)?;
        Ok(output.to_output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mock_runner_records_and_matches() {
        let runner = MockRunner::new();
        runner.expect_contains("build", MockProcessOutput::failure(1, "boom"));

        let cmd = ProcessBuilder::new("docker").args(["build", "."]);
        let output = runner.run(&cmd).unwrap();

        assert_eq!(output.code, Some(1));
        assert_eq!(output.stderr, "boom");
        assert_eq!(runner.call_strings(), vec!["docker build ."]);
        assert!(runner.run(&ProcessBuilder::new("docker").arg("info")).is_err());
    }

    #[test]
    fn test_mock_runner_side_effects() {
        let tmp = TempDir::new().unwrap();
        let iid = tmp.path().join("iid");
        let dest = tmp.path().join("out");

        let runner = MockRunner::new();
        runner.set_default(
            MockProcessOutput::success("")
                .writing("--iidfile", "sha256:abc")
                .exporting("assets/app.js", "x"),
        );

        let cmd = ProcessBuilder::new("docker").args([
            "build".to_string(),
            "--iidfile".to_string(),
            iid.display().to_string(),
            "--output".to_string(),
            format!("type=local,dest={}", dest.display()),
        ]);
        runner.run(&cmd).unwrap();

        assert_eq!(std::fs::read_to_string(&iid).unwrap(), "sha256:abc");
        assert!(dest.join("assets/app.js").is_file());
    }

    #[test]
    fn test_verify_counts() {
        let runner = MockRunner::new();
        runner.expect_pattern(
            CommandExpectation::new(CommandPattern::Any, MockProcessOutput::default()).times(2),
        );
        runner.run(&ProcessBuilder::new("docker")).unwrap();

        assert!(runner.verify().is_err());
        runner.run(&ProcessBuilder::new("docker")).unwrap();
        assert!(runner.verify().is_ok());
    }
}
