//! Trial Executor
//!
//! Runs one instrumented test as a fresh pytest subprocess. Pass and fail
//! exits are ordinary outcomes; only failing to locate the test file or
//! to start the interpreter is an error.

use crate::config::{HarnessConfig, TIMEOUT_EXIT_CODE};
use crate::result::FlakeResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

/// Opaque seed configuration forwarded to the test process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedConfiguration {
    /// Configuration name (may itself be a `, `-separated group)
    pub name: String,
    /// Seed value
    pub value: u64,
    /// File the test-side fixture loads configurations from
    pub config_file: PathBuf,
}

impl SeedConfiguration {
    /// Create a seed configuration
    pub fn new(name: impl Into<String>, value: u64, config_file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            value,
            config_file: config_file.into(),
        }
    }

    /// Folder name used for this configuration's output (`SEEDS_<name>`)
    #[must_use]
    pub fn folder_name(&self) -> String {
        format!("SEEDS_{}", self.name.replace(", ", "_"))
    }
}

/// Inputs of one trial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialSpec {
    /// Test file to run (instrumented or original)
    pub path: PathBuf,
    /// Test class, empty for module-level tests
    pub class: String,
    /// Test function
    pub test: String,
    /// Seed configuration
    pub seed: SeedConfiguration,
}

/// Terminal status of a trial subprocess
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialStatus {
    /// Exit code 0
    Passed,
    /// Exit code 1
    Failed,
    /// Killed after exceeding the ceiling
    TimedOut,
    /// Any other exit (None when terminated by a signal)
    Unexpected(Option<i32>),
}

impl TrialStatus {
    /// Classify a process exit code
    #[must_use]
    pub const fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => Self::Passed,
            Some(1) => Self::Failed,
            other => Self::Unexpected(other),
        }
    }

    /// Exit code under the process exit protocol
    #[must_use]
    pub const fn exit_code(self) -> Option<i32> {
        match self {
            Self::Passed => Some(0),
            Self::Failed => Some(1),
            Self::TimedOut => Some(TIMEOUT_EXIT_CODE),
            Self::Unexpected(code) => code,
        }
    }

    /// Whether the status is a valid sampling outcome
    #[must_use]
    pub const fn is_outcome(self) -> bool {
        matches!(self, Self::Passed | Self::Failed)
    }
}

/// Captured result of one trial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialOutput {
    /// Terminal status
    pub status: TrialStatus,
    /// Captured stdout lines
    pub stdout: Vec<String>,
    /// Captured stderr lines
    pub stderr: Vec<String>,
}

impl TrialOutput {
    /// Last `n` stderr lines joined for error messages
    #[must_use]
    pub fn stderr_tail(&self, n: usize) -> String {
        let start = self.stderr.len().saturating_sub(n);
        self.stderr[start..].join("\n")
    }
}

/// Launches pytest subprocesses
#[derive(Debug, Clone)]
pub struct TrialExecutor {
    python: String,
    pytest_args: Vec<String>,
    repo_root: PathBuf,
    timeout: Duration,
}

impl TrialExecutor {
    /// Create an executor running tests from `repo_root`
    pub fn new(config: &HarnessConfig, repo_root: impl Into<PathBuf>) -> Self {
        Self {
            python: config.python.clone(),
            pytest_args: config.pytest_args.clone(),
            repo_root: repo_root.into(),
            timeout: config.timeout(),
        }
    }

    /// Override the per-trial ceiling
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Per-trial ceiling
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// pytest node id `<relative path>::<Class>::<test>`
    ///
    /// # Errors
    ///
    /// Returns [`std::io::ErrorKind::NotFound`] when the test file does not exist.
    pub fn node_id(&self, spec: &TrialSpec) -> FlakeResult<String> {
        let rel = spec
            .path
            .strip_prefix(&self.repo_root)
            .unwrap_or(&spec.path);
        if !self.repo_root.join(rel).is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("test file not found: {}", spec.path.display()),
            )
            .into());
        }

        let rel = rel.to_string_lossy().replace('\\', "/");
        Ok(if spec.class.is_empty() {
            format!("{rel}::{}", spec.test)
        } else {
            format!("{rel}::{}::{}", spec.class, spec.test)
        })
    }

    /// Arguments after the interpreter
    pub fn arguments(&self, spec: &TrialSpec) -> FlakeResult<Vec<String>> {
        let mut args = vec!["-m".to_string(), "pytest".to_string(), self.node_id(spec)?];
        args.extend(self.pytest_args.iter().cloned());
        args.extend([
            "--seed-config-file".to_string(),
            spec.seed.config_file.to_string_lossy().into_owned(),
            "--seed-config-name".to_string(),
            spec.seed.name.clone(),
            "--seed-value".to_string(),
            spec.seed.value.to_string(),
        ]);
        Ok(args)
    }

    /// Run one trial to completion or timeout
    ///
    /// # Errors
    ///
    /// Fails only when the test file is missing or the process cannot start.
    pub async fn run(&self, spec: &TrialSpec) -> FlakeResult<TrialOutput> {
        let args = self.arguments(spec)?;
        tracing::debug!(python = %self.python, args = ?args, "starting trial");

        let mut cmd = tokio::process::Command::new(&self.python);
        cmd.args(&args)
            .current_dir(&self.repo_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let child = cmd.spawn()?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                Ok(TrialOutput {
                    status: TrialStatus::from_code(output.status.code()),
                    stdout: split_lines(&output.stdout),
                    stderr: split_lines(&output.stderr),
                })
            }
            Err(_) => {
                tracing::debug!(secs = self.timeout.as_secs(), "trial timed out");
                Ok(TrialOutput {
                    status: TrialStatus::TimedOut,
                    stdout: Vec::new(),
                    stderr: vec![format!(
                        "pytest timed out after {}s",
                        self.timeout.as_secs()
                    )],
                })
            }
        }
    }
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_string)
        .collect()
}
