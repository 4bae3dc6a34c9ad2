//! Per-parametrization accumulation
//!
//! Position `i` of every trial's pair list feeds series `i`. Trial
//! completion order never affects which series a value lands in.

use crate::result::{FlakeError, FlakeResult};
use crate::trial::ValuePair;
use serde::{Deserialize, Serialize};

/// Observed values of one parametrization index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSeries {
    /// Position in each trial's pair list
    pub index: usize,
    /// Expected value from the first trial
    pub expected: f64,
    /// Observed values in trial completion order
    pub values: Vec<f64>,
    /// False when a later trial reported a different expected value
    pub expected_stable: bool,
}

/// All series of one sampling unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    /// One series per parametrization index
    pub series: Vec<ParameterSeries>,
    /// Trials folded in
    pub trials: usize,
}

impl Distribution {
    /// Expected value of every series, by index
    #[must_use]
    pub fn expected(&self) -> Vec<f64> {
        self.series.iter().map(|s| s.expected).collect()
    }
}

fn same_value(a: f64, b: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return a.is_nan() && b.is_nan();
    }
    (a - b).abs() <= f64::EPSILON * a.abs().max(b.abs()).max(1.0)
}

/// Folds trial pair lists into series as trials complete
#[derive(Debug, Clone, Default)]
pub struct SeriesAccumulator {
    series: Vec<ParameterSeries>,
    trials: usize,
}

impl SeriesAccumulator {
    /// Create an empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trials folded so far
    #[must_use]
    pub const fn trials(&self) -> usize {
        self.trials
    }

    /// Fold one trial's pairs
    ///
    /// # Errors
    ///
    /// [`FlakeError::AggregationInconsistency`] when the pair count differs
    /// from the first folded trial.
    pub fn push(&mut self, pairs: &[ValuePair]) -> FlakeResult<()> {
        self.trials += 1;
        if self.trials == 1 {
            self.series = pairs
                .iter()
                .enumerate()
                .map(|(index, pair)| ParameterSeries {
                    index,
                    expected: pair.expected,
                    values: vec![pair.observed],
                    expected_stable: true,
                })
                .collect();
            return Ok(());
        }

        if pairs.len() != self.series.len() {
            return Err(FlakeError::AggregationInconsistency {
                trial: self.trials,
                expected: self.series.len(),
                actual: pairs.len(),
            });
        }

        for (series, pair) in self.series.iter_mut().zip(pairs) {
            if series.expected_stable && !same_value(series.expected, pair.expected) {
                tracing::warn!(
                    index = series.index,
                    first = series.expected,
                    now = pair.expected,
                    "expected value drifted between trials"
                );
                series.expected_stable = false;
            }
            series.values.push(pair.observed);
        }
        Ok(())
    }

    /// Finish accumulation
    #[must_use]
    pub fn finish(self) -> Distribution {
        Distribution {
            series: self.series,
            trials: self.trials,
        }
    }
}
