//! Harness configuration
//!
//! Loaded from an optional YAML file (default `flakestat.yaml`); command-line
//! flags override individual fields afterwards.

use crate::result::{FlakeError, FlakeResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default file name probed when no config path is given
pub const DEFAULT_CONFIG_FILE: &str = "flakestat.yaml";

/// Marker printed in front of every emitted value
pub const DEFAULT_TAG: &str = "FLAKY_METRIC";

/// Exit code reported for a trial that hit the timeout ceiling
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Settings shared by instrumentation and sampling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Python interpreter used to launch pytest
    pub python: String,
    /// Extra arguments passed to pytest after the node id
    pub pytest_args: Vec<String>,
    /// Per-trial ceiling in seconds
    pub timeout_secs: u64,
    /// Attempts per trial before giving up
    pub max_attempts: usize,
    /// Trials per sampling unit
    pub trials: usize,
    /// Concurrent trials (0 = available parallelism)
    pub workers: usize,
    /// Marker for emitted values
    pub tag: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            pytest_args: vec!["-q".to_string(), "-s".to_string()],
            timeout_secs: 300,
            max_attempts: 2,
            trials: 100,
            workers: 4,
            tag: DEFAULT_TAG.to_string(),
        }
    }
}

impl HarnessConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a YAML file; missing fields keep their defaults
    pub fn from_yaml_file(path: &Path) -> FlakeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Parse from YAML text
    pub fn from_yaml_str(text: &str) -> FlakeResult<Self> {
        let config: Self = serde_yaml_ng::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else `flakestat.yaml` in the working directory if present,
    /// else defaults
    pub fn discover(path: Option<&Path>) -> FlakeResult<Self> {
        match path {
            Some(p) => Self::from_yaml_file(p),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_yaml_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Reject settings that would make sampling meaningless
    pub fn validate(&self) -> FlakeResult<()> {
        if self.trials == 0 {
            return Err(FlakeError::config("trials must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(FlakeError::config("max_attempts must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(FlakeError::config("timeout_secs must be at least 1"));
        }
        if self.tag.trim().is_empty() {
            return Err(FlakeError::config("tag must not be empty"));
        }
        if self.python.trim().is_empty() {
            return Err(FlakeError::config("python interpreter must not be empty"));
        }
        Ok(())
    }

    /// Set trial count
    #[must_use]
    pub const fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    /// Set worker count
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set attempt ceiling
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set timeout
    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set interpreter
    #[must_use]
    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }

    /// Set emission tag
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Per-trial timeout as a duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Effective worker count
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1)
        } else {
            self.workers
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.timeout_secs, 300);
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.tag, "FLAKY_METRIC");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = HarnessConfig::from_yaml_str("trials: 10\nworkers: 2\n").unwrap();
        assert_eq!(config.trials, 10);
        assert_eq!(config.workers, 2);
        assert_eq!(config.python, "python3");
        assert_eq!(config.pytest_args, vec!["-q", "-s"]);
    }

    #[test]
    fn test_yaml_rejects_zero_trials() {
        let err = HarnessConfig::from_yaml_str("trials: 0\n").unwrap_err();
        assert!(err.to_string().contains("trials"));
    }

    #[test]
    fn test_validate_rejects_empty_tag() {
        let config = HarnessConfig::default().with_tag("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_workers_auto() {
        let config = HarnessConfig::default().with_workers(0);
        assert!(config.effective_workers() >= 1);
        assert_eq!(HarnessConfig::default().with_workers(3).effective_workers(), 3);
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flakestat.yaml");
        std::fs::write(&path, "python: /usr/bin/python3.11\ntimeout_secs: 60\n").unwrap();
        let config = HarnessConfig::discover(Some(&path)).unwrap();
        assert_eq!(config.python, "/usr/bin/python3.11");
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }
}
