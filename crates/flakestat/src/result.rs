//! Result and error types for Flakestat.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Flakestat operations
pub type FlakeResult<T> = Result<T, FlakeError>;

/// Errors that can occur while mining, instrumenting or sampling
#[derive(Debug, Error)]
pub enum FlakeError {
    /// Source or data file could not be parsed
    #[error("Failed to parse {path}: {message}")]
    Parse {
        /// File that failed to parse
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Source file was never loaded into the index
    #[error("Source not indexed: {path}")]
    SourceNotIndexed {
        /// Requested path
        path: PathBuf,
    },

    /// Source file changed between mining and instrumentation
    #[error("Source changed since mining: {path}")]
    SourceDrift {
        /// Path whose hash no longer matches
        path: PathBuf,
    },

    /// An assertion site could not be instrumented (non-fatal for a batch)
    #[error("Instrumentation failed for {path}:{line}: {reason}")]
    InstrumentationFailure {
        /// Source file of the site
        path: PathBuf,
        /// Target line
        line: usize,
        /// Why the site was rejected
        reason: InstrumentationFailureKind,
    },

    /// Captured output does not follow the tagged-value protocol
    #[error("Protocol violation: {message}")]
    ProtocolViolation {
        /// Error message
        message: String,
    },

    /// Test process exited outside the pass/fail/timeout set
    #[error("Test process exited with unexpected status {code:?}: {detail}")]
    ExecutionFailure {
        /// Exit code (None when killed by a signal)
        code: Option<i32>,
        /// Last lines of stderr
        detail: String,
    },

    /// Test process exceeded the per-trial ceiling
    #[error("Test process timed out after {secs}s")]
    Timeout {
        /// Ceiling in seconds
        secs: u64,
    },

    /// Every bounded retry attempt failed
    #[error("All {attempts} attempts failed; last error: {last}")]
    RetryExhausted {
        /// Number of attempts made
        attempts: usize,
        /// Error of the final attempt
        last: Box<FlakeError>,
    },

    /// Pair lists of one sampling unit disagree in shape
    #[error("Aggregation inconsistency: trial {trial} produced {actual} pairs, expected {expected}")]
    AggregationInconsistency {
        /// Completion index of the offending trial
        trial: usize,
        /// Pair count fixed by the first successful trial
        expected: usize,
        /// Pair count of the offending trial
        actual: usize,
    },

    /// Two series files of an output tree carry the same parametrization tag
    #[error("Duplicate series {tag} for {test} under {seed_config}")]
    DuplicateSeries {
        /// Test folder
        test: String,
        /// Seed configuration folder
        seed_config: String,
        /// `<expected>-p<index>` tag
        tag: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

/// Reason an assertion site was rejected by the instrumenter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrumentationFailureKind {
    /// No function recorded under this (class, function) key
    FunctionNotFound {
        /// `Class.function` lookup key
        key: String,
    },
    /// The function holds no assertion statement starting on the line
    LineNotFound,
    /// The statement shares its line with other code, so nothing can be prepended
    SharedLine,
}

impl std::fmt::Display for InstrumentationFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FunctionNotFound { key } => write!(f, "no function recorded for `{key}`"),
            Self::LineNotFound => write!(f, "no statement starts on this line"),
            Self::SharedLine => write!(f, "statement does not start its own line"),
        }
    }
}

impl FlakeError {
    /// Create a protocol violation
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the error only affects a single catalog row and a batch may continue
    #[must_use]
    pub const fn is_site_local(&self) -> bool {
        matches!(
            self,
            Self::InstrumentationFailure { .. }
                | Self::RetryExhausted { .. }
                | Self::AggregationInconsistency { .. }
                | Self::SourceDrift { .. }
                | Self::SourceNotIndexed { .. }
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_exhausted_carries_last_error() {
        let err = FlakeError::RetryExhausted {
            attempts: 2,
            last: Box::new(FlakeError::protocol("odd tagged-value count")),
        };
        let text = err.to_string();
        assert!(text.contains("All 2 attempts"));
        assert!(text.contains("odd tagged-value count"));
    }

    #[test]
    fn test_instrumentation_failure_display() {
        let err = FlakeError::InstrumentationFailure {
            path: PathBuf::from("tests/test_model.py"),
            line: 42,
            reason: InstrumentationFailureKind::FunctionNotFound {
                key: "TestModel.test_loss".to_string(),
            },
        };
        let text = err.to_string();
        assert!(text.contains("tests/test_model.py:42"));
        assert!(text.contains("TestModel.test_loss"));
    }

    #[test]
    fn test_site_local_classification() {
        assert!(FlakeError::AggregationInconsistency {
            trial: 3,
            expected: 2,
            actual: 1
        }
        .is_site_local());
        assert!(!FlakeError::config("bad").is_site_local());
        assert!(!FlakeError::protocol("bad").is_site_local());
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FlakeError = io_err.into();
        assert!(err.to_string().contains("I/O"));
    }
}
