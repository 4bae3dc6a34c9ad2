//! Summary statistics of a value series
//!
//! Variance, skewness and kurtosis use population moments; kurtosis is the
//! bias-corrected Fisher excess (G2). Percentiles interpolate linearly
//! between closest ranks.

use serde::{Deserialize, Serialize};

/// Moments and order statistics of one series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    /// Sample size
    pub n: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Population variance
    pub var: f64,
    /// 25th percentile
    pub q25: f64,
    /// 75th percentile
    pub q75: f64,
    /// Minimum
    pub min: f64,
    /// Maximum
    pub max: f64,
    /// Population skewness (g1); undefined for constant series
    pub skew: Option<f64>,
    /// Bias-corrected excess kurtosis (G2); needs four values and spread
    pub kurtosis: Option<f64>,
}

impl SeriesSummary {
    /// Summarize `values`; `None` for an empty series
    #[must_use]
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = values.len() as f64;
        let mean = values.iter().sum::<f64>() / count;
        let moment = |k: i32| values.iter().map(|v| (v - mean).powi(k)).sum::<f64>() / count;
        let m2 = moment(2);
        let m3 = moment(3);
        let m4 = moment(4);

        let spread = sorted[0] < sorted[sorted.len() - 1] && m2 > 0.0;
        let skew = spread.then(|| m3 / m2.powf(1.5));
        let kurtosis = (spread && values.len() > 3).then(|| {
            let n = count;
            ((n * n - 1.0) * m4 / (m2 * m2) - 3.0 * (n - 1.0).powi(2)) / ((n - 2.0) * (n - 3.0))
        });

        Some(Self {
            n: values.len(),
            mean,
            var: m2,
            q25: percentile(&sorted, 0.25),
            q75: percentile(&sorted, 0.75),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            skew,
            kurtosis,
        })
    }
}

/// Linear-interpolated percentile of an ascending, non-empty slice
#[must_use]
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_one_to_ten() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let s = SeriesSummary::of(&values).unwrap();
        assert_eq!(s.n, 10);
        assert!(close(s.mean, 5.5));
        assert!(close(s.var, 8.25));
        assert!(close(s.q25, 3.25));
        assert!(close(s.q75, 7.75));
        assert!(close(s.min, 1.0));
        assert!(close(s.max, 10.0));
        assert!(close(s.skew.unwrap(), 0.0));
        // scipy.stats.kurtosis(range(1, 11), fisher=True, bias=False)
        assert!(close(s.kurtosis.unwrap(), -1.2));
    }

    #[test]
    fn test_skewed_series() {
        let s = SeriesSummary::of(&[1.0, 1.0, 1.0, 10.0]).unwrap();
        // m2 = 15.1875, m3 = 68.34375
        assert!(close(s.skew.unwrap(), 68.34375 / 15.1875_f64.powf(1.5)));
        assert!(s.skew.unwrap() > 1.0);
    }

    #[test]
    fn test_constant_series_has_no_shape() {
        let s = SeriesSummary::of(&[2.0; 6]).unwrap();
        assert!(close(s.var, 0.0));
        assert_eq!(s.skew, None);
        assert_eq!(s.kurtosis, None);
    }

    #[test]
    fn test_repeated_inexact_value_has_no_shape() {
        let s = SeriesSummary::of(&[0.1; 7]).unwrap();
        assert_eq!(s.skew, None);
        assert_eq!(s.kurtosis, None);
    }

    #[test]
    fn test_shape_is_scale_free() {
        let base = [1.0, 2.0, 3.0, 4.0, 10.0];
        let tiny: Vec<f64> = base.iter().map(|v| v * 1e-9).collect();
        let a = SeriesSummary::of(&base).unwrap();
        let b = SeriesSummary::of(&tiny).unwrap();
        assert!(b.var > 0.0);

        let (skew_a, skew_b) = (a.skew.unwrap(), b.skew.unwrap());
        let (kurt_a, kurt_b) = (a.kurtosis.unwrap(), b.kurtosis.unwrap());
        assert!((skew_a - skew_b).abs() < 1e-9 * skew_a.abs());
        assert!((kurt_a - kurt_b).abs() < 1e-9 * kurt_a.abs());
    }

    #[test]
    fn test_small_series() {
        let s = SeriesSummary::of(&[1.0, 2.0, 4.0]).unwrap();
        assert!(s.skew.is_some());
        assert_eq!(s.kurtosis, None);
        assert!(close(s.q25, 1.5));
        assert!(SeriesSummary::of(&[]).is_none());
    }
}
