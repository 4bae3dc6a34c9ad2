//! Row selection and settings shared by the sampling handlers

use crate::commands::SamplingArgs;
use crate::error::{CliError, CliResult};
use flakestat::{HarnessConfig, InstrumentedRow};
use std::collections::BTreeSet;

/// Outcome counts of a batch command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Units that completed
    pub ok: usize,
    /// Units that failed and were skipped
    pub failed: usize,
    /// Rows filtered out before running
    pub skipped: usize,
}

/// Split `a;b, c;` into `["a", "b, c"]`
#[must_use]
pub fn split_seed_configs(names: &str) -> Vec<String> {
    names
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Rows to sample: test functions, optionally restricted to `assertions`
/// ids, and (when `need_logged`) only rows that were instrumented
#[must_use]
pub fn select_rows<'a>(
    rows: &'a [InstrumentedRow],
    assertions: &[String],
    need_logged: bool,
) -> (Vec<&'a InstrumentedRow>, usize) {
    let wanted: BTreeSet<&str> = assertions
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    let mut skipped = 0;
    let selected = rows
        .iter()
        .filter(|row| {
            let keep = row.testname.contains("test")
                && (!need_logged || row.logged_path.is_some())
                && (wanted.is_empty() || wanted.contains(row.id().as_str()));
            if !keep {
                skipped += 1;
            }
            keep
        })
        .collect();
    (selected, skipped)
}

/// Harness configuration with the command-line overrides applied
pub fn harness_with_overrides(
    base: &HarnessConfig,
    args: &SamplingArgs,
    tag: Option<&str>,
) -> CliResult<HarnessConfig> {
    let mut harness = base.clone();
    if let Some(trials) = args.trials {
        harness = harness.with_trials(trials);
    }
    if let Some(workers) = args.workers {
        harness = harness.with_workers(workers);
    }
    if let Some(tag) = tag {
        harness = harness.with_tag(tag);
    }
    harness
        .validate()
        .map_err(|e| CliError::invalid_argument(e.to_string()))?;
    Ok(harness)
}
