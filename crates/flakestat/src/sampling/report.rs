//! Sampling output tree
//!
//! ```text
//! <out>/<testname>_<line>/SEEDS_<config>/data/_<expected>_<index>.txt
//! <out>/<testname>_<line>/SEEDS_<config>/data/results.txt
//! <out>/<testname>_<line>/SEEDS_<config>/summary.json
//! ```

use super::orchestrator::PassRate;
use super::series::Distribution;
use super::stats::SeriesSummary;
use crate::result::{FlakeError, FlakeResult};
use crate::trial::SeedConfiguration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Name of the pass/fail outcome file
pub const RESULTS_FILE: &str = "results.txt";

/// Name of the per-unit summary file
pub const SUMMARY_FILE: &str = "summary.json";

/// Directory of one (site, seed configuration) unit
#[must_use]
pub fn unit_dir(out: &Path, site_id: &str, seed: &SeedConfiguration) -> PathBuf {
    out.join(site_id).join(seed.folder_name())
}

/// File name of series `index` with expected value `expected`
#[must_use]
pub fn series_file_name(expected: f64, index: usize) -> String {
    format!("_{expected:?}_{index}.txt")
}

/// Split `_<expected>_<index>` back into its parts
#[must_use]
pub fn parse_series_stem(stem: &str) -> Option<(f64, usize)> {
    let rest = stem.strip_prefix('_')?;
    let (expected, index) = rest.rsplit_once('_')?;
    Some((expected.parse().ok()?, index.parse().ok()?))
}

/// Statistics of one series as stored in `summary.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesReport {
    /// Parametrization index
    pub index: usize,
    /// Expected value
    pub expected: f64,
    /// Whether every trial agreed on the expected value
    pub expected_stable: bool,
    /// Statistics, absent for an empty series
    pub summary: Option<SeriesSummary>,
}

/// Contents of `summary.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSummary {
    /// `testname_line`
    pub site: String,
    /// Seed configuration name
    pub seed_config: String,
    /// Seed value
    pub seed_value: u64,
    /// Trials folded in
    pub trials: usize,
    /// Per-series statistics
    pub series: Vec<SeriesReport>,
}

impl UnitSummary {
    /// Summarize a distribution
    #[must_use]
    pub fn new(site: &str, seed: &SeedConfiguration, dist: &Distribution) -> Self {
        Self {
            site: site.to_string(),
            seed_config: seed.name.clone(),
            seed_value: seed.value,
            trials: dist.trials,
            series: dist
                .series
                .iter()
                .map(|s| SeriesReport {
                    index: s.index,
                    expected: s.expected,
                    expected_stable: s.expected_stable,
                    summary: SeriesSummary::of(&s.values),
                })
                .collect(),
        }
    }
}

/// Write one data file per series plus `summary.json` into `dir`
pub fn write_distribution(dir: &Path, summary: &UnitSummary, dist: &Distribution) -> FlakeResult<Vec<PathBuf>> {
    let data = dir.join("data");
    std::fs::create_dir_all(&data)?;

    let mut written = Vec::with_capacity(dist.series.len());
    for series in &dist.series {
        let path = data.join(series_file_name(series.expected, series.index));
        let mut text = String::with_capacity(series.values.len() * 16);
        for value in &series.values {
            text.push_str(&format!("{value:.10}\n"));
        }
        std::fs::write(&path, text)?;
        written.push(path);
    }

    std::fs::write(
        dir.join(SUMMARY_FILE),
        serde_json::to_string_pretty(summary)?,
    )?;
    Ok(written)
}

/// Write `data/results.txt` with the exit code of each trial (`0` passed, `1` failed)
pub fn write_pass_rate(dir: &Path, rate: &PassRate) -> FlakeResult<PathBuf> {
    let data = dir.join("data");
    std::fs::create_dir_all(&data)?;
    let path = data.join(RESULTS_FILE);
    let text: String = rate
        .results
        .iter()
        .map(|passed| if *passed { "0\n" } else { "1\n" })
        .collect();
    std::fs::write(&path, text)?;
    Ok(path)
}

/// Read one series file
pub fn read_series(path: &Path) -> FlakeResult<Vec<f64>> {
    let text = std::fs::read_to_string(path)?;
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.parse::<f64>().map_err(|e| FlakeError::Parse {
                path: path.to_path_buf(),
                message: format!("bad value `{line}`: {e}"),
            })
        })
        .collect()
}

/// Statistics row of one series file found in an output tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesStatsRow {
    /// `testname_line` folder
    pub test_name: String,
    /// `SEEDS_*` folder
    pub seed_cfg: String,
    /// `<expected>-p<index>`
    pub param_tag: String,
    /// Expected value
    pub expected: f64,
    /// Statistics; absent for an empty file
    pub summary: Option<SeriesSummary>,
    /// Series file
    pub path: PathBuf,
}

/// Recompute statistics for every series file under `root`
///
/// # Errors
///
/// [`FlakeError::DuplicateSeries`] when two files map to the same
/// (test, seed configuration, parametrization) tag.
pub fn collect_series_stats(root: &Path) -> FlakeResult<Vec<SeriesStatsRow>> {
    let pattern = root.join("*").join("*").join("data").join("*.txt");
    let pattern = pattern.to_string_lossy();
    let paths = glob::glob(&pattern)
        .map_err(|e| FlakeError::config(format!("bad search pattern {pattern}: {e}")))?;

    let mut rows = Vec::new();
    let mut seen = BTreeSet::new();
    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable path in output tree");
                continue;
            }
        };
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        let Some((expected, index)) = parse_series_stem(&stem) else {
            tracing::debug!(path = %path.display(), "not a series file");
            continue;
        };
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        let mut parts = rel.components().map(|c| c.as_os_str().to_string_lossy().into_owned());
        let (Some(test_name), Some(seed_cfg)) = (parts.next(), parts.next()) else {
            continue;
        };

        let param_tag = format!("{expected:?}-p{index}");
        if !seen.insert((test_name.clone(), seed_cfg.clone(), param_tag.clone())) {
            return Err(FlakeError::DuplicateSeries {
                test: test_name,
                seed_config: seed_cfg,
                tag: param_tag,
            });
        }

        let values = read_series(&path)?;
        rows.push(SeriesStatsRow {
            test_name,
            seed_cfg,
            param_tag,
            expected,
            summary: SeriesSummary::of(&values),
            path,
        });
    }
    Ok(rows)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::sampling::series::ParameterSeries;
    use tempfile::TempDir;

    fn dist() -> Distribution {
        Distribution {
            series: vec![
                ParameterSeries {
                    index: 0,
                    expected: 5.0,
                    values: (1..=10).map(f64::from).collect(),
                    expected_stable: true,
                },
                ParameterSeries {
                    index: 1,
                    expected: -0.25,
                    values: vec![0.5, 0.25],
                    expected_stable: true,
                },
            ],
            trials: 10,
        }
    }

    #[test]
    fn test_series_names() {
        assert_eq!(series_file_name(5.0, 0), "_5.0_0.txt");
        assert_eq!(series_file_name(-0.25, 3), "_-0.25_3.txt");
        assert_eq!(parse_series_stem("_5.0_0"), Some((5.0, 0)));
        assert_eq!(parse_series_stem("_1e-5_2"), Some((1e-5, 2)));
        assert_eq!(parse_series_stem("results"), None);
    }

    #[test]
    fn test_unit_dir_layout() {
        let seed = SeedConfiguration::new("numpy, random", 1, "s.yaml");
        assert_eq!(
            unit_dir(Path::new("out"), "test_fit_42", &seed),
            PathBuf::from("out/test_fit_42/SEEDS_numpy_random")
        );
    }

    #[test]
    fn test_write_and_collect() {
        let dir = TempDir::new().unwrap();
        let seed = SeedConfiguration::new("numpy", 1, "s.yaml");
        let unit = unit_dir(dir.path(), "test_fit_42", &seed);
        let dist = dist();
        let summary = UnitSummary::new("test_fit_42", &seed, &dist);

        let written = write_distribution(&unit, &summary, &dist).unwrap();
        assert_eq!(written.len(), 2);
        let first = std::fs::read_to_string(&written[0]).unwrap();
        assert_eq!(first.lines().next(), Some("1.0000000000"));
        assert_eq!(first.lines().count(), 10);

        let json = std::fs::read_to_string(unit.join(SUMMARY_FILE)).unwrap();
        let back: UnitSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.series[0].summary.unwrap().n, 10);

        let results = write_pass_rate(
            &unit,
            &PassRate {
                results: vec![true, false, true],
            },
        )
        .unwrap();
        assert_eq!(std::fs::read_to_string(results).unwrap(), "0\n1\n0\n");

        let rows = collect_series_stats(dir.path()).unwrap();
        assert_eq!(rows.len(), 2);
        let row = rows.iter().find(|r| r.param_tag == "5.0-p0").unwrap();
        assert_eq!(row.test_name, "test_fit_42");
        assert_eq!(row.seed_cfg, "SEEDS_numpy");
        assert!((row.summary.unwrap().mean - 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("t_1").join("SEEDS_a").join("data");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join("_5.0_0.txt"), "1.0\n").unwrap();
        std::fs::write(data.join("_5_0.txt"), "2.0\n").unwrap();

        let err = collect_series_stats(dir.path()).unwrap_err();
        assert!(matches!(err, FlakeError::DuplicateSeries { .. }));
    }

    #[test]
    fn test_bad_value_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("_1.0_0.txt");
        std::fs::write(&path, "1.0\nabc\n").unwrap();
        assert!(matches!(
            read_series(&path),
            Err(FlakeError::Parse { .. })
        ));
    }
}
