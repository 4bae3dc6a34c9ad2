//! Sample command handler

use super::batch::{harness_with_overrides, select_rows, split_seed_configs, BatchSummary};
use crate::commands::SampleArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use flakestat::mining::read_csv;
use flakestat::sampling::{unit_dir, write_distribution, UnitSummary};
use flakestat::{
    HarnessConfig, InstrumentedRow, OutputDecoder, SamplingOrchestrator, SeedConfiguration,
    TrialExecutor, TrialSpec, ValueTrialRunner,
};
use std::time::Instant;

/// Execute the sample command
///
/// Every (row, seed configuration) unit is sampled in turn; a unit that
/// fails is reported and skipped.
pub fn execute_sample(
    config: &CliConfig,
    harness: &HarnessConfig,
    args: &SampleArgs,
) -> CliResult<BatchSummary> {
    let start = Instant::now();
    let sampling = &args.sampling;
    let harness = harness_with_overrides(harness, sampling, args.tag.as_deref())?;
    let rows: Vec<InstrumentedRow> = read_csv(&sampling.catalog)?;
    let (selected, skipped) = select_rows(&rows, &sampling.assertions, true);
    let seed_names = split_seed_configs(&sampling.seed_config_names);
    if seed_names.is_empty() {
        return Err(CliError::invalid_argument("no seed configuration names given"));
    }

    let mut reporter = config.reporter();
    reporter.header(&format!(
        "Sampling {} assertions x {} seed configurations ({} trials, {} workers)",
        selected.len(),
        seed_names.len(),
        harness.trials,
        harness.effective_workers()
    ));

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::command(format!("Failed to create runtime: {e}")))?;
    let executor = TrialExecutor::new(&harness, &sampling.repo_root);
    let decoder = OutputDecoder::new(&harness.tag)?;
    let orchestrator = SamplingOrchestrator::from_config(&harness);

    let mut summary = BatchSummary {
        skipped,
        ..BatchSummary::default()
    };
    for row in selected {
        let Some(logged) = row.logged_path.clone() else {
            continue;
        };
        for name in &seed_names {
            let seed = SeedConfiguration::new(
                name.as_str(),
                sampling.seed_value,
                sampling.seed_config_file.clone(),
            );
            let spec = TrialSpec {
                path: logged.clone(),
                class: row.testclass.clone(),
                test: row.testname.clone(),
                seed: seed.clone(),
            };
            let runner = ValueTrialRunner::new(executor.clone(), decoder.clone(), spec);

            reporter.start_progress(orchestrator.trials() as u64, &format!("{} {name}", row.id()));
            let result = rt.block_on(orchestrator.sample(&runner, |done, _| {
                reporter.set_position(done as u64);
            }));
            reporter.finish();

            let written = result.and_then(|dist| {
                let unit = UnitSummary::new(&row.id(), &seed, &dist);
                let dir = unit_dir(&sampling.dir_out, &row.id(), &seed);
                write_distribution(&dir, &unit, &dist).map(|files| (dist, files))
            });
            match written {
                Ok((dist, files)) => {
                    summary.ok += 1;
                    let unstable = dist.series.iter().filter(|s| !s.expected_stable).count();
                    if unstable > 0 {
                        reporter.warning(&format!(
                            "{} {name}: expected value varied in {unstable} series",
                            row.id()
                        ));
                    }
                    reporter.success(&format!(
                        "{} {name}: {} series from {} trials",
                        row.id(),
                        files.len(),
                        dist.trials
                    ));
                }
                Err(e) => {
                    if e.is_site_local() {
                        tracing::warn!(site = %row.id(), seed_config = %name, error = %e, "sampling failed");
                    } else {
                        tracing::error!(site = %row.id(), seed_config = %name, error = %e, "sampling failed");
                    }
                    reporter.failure(&format!("{} {name}: {e}", row.id()));
                    summary.failed += 1;
                }
            }
        }
    }

    reporter.summary(
        "units",
        summary.ok,
        summary.failed,
        summary.skipped,
        start.elapsed(),
    );
    Ok(summary)
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::commands::SamplingArgs;
    use crate::config::Verbosity;
    use flakestat::mining::write_csv;
    use flakestat::AssertionIdiom;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    fn fake_python(dir: &Path, body: &str) -> String {
        let path = dir.join("fake_python.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn row(dir: &Path, name: &str, logged: bool) -> InstrumentedRow {
        let path = dir.join("test_fit.py");
        std::fs::write(&path, "def test_fit():\n    pass\n").unwrap();
        InstrumentedRow {
            filepath: path.clone(),
            testclass: String::new(),
            testname: name.to_string(),
            assertion_type: AssertionIdiom::ThresholdCompare,
            line_number: 2,
            assert_string: "assert a < 1".to_string(),
            logged_path: logged.then_some(path),
        }
    }

    fn args(dir: &Path, catalog: &Path) -> SampleArgs {
        SampleArgs {
            sampling: SamplingArgs {
                catalog: catalog.to_path_buf(),
                repo_root: dir.to_path_buf(),
                seed_value: 7,
                seed_config_file: dir.join("seeds.yaml"),
                seed_config_names: "numpy;numpy, random".to_string(),
                trials: Some(3),
                workers: Some(2),
                assertions: Vec::new(),
                dir_out: dir.join("out"),
            },
            tag: None,
        }
    }

    #[test]
    fn test_sample_writes_one_unit_per_seed_config() {
        let dir = TempDir::new().unwrap();
        let catalog = dir.path().join("instrumented.csv");
        write_csv(
            &catalog,
            &[
                row(dir.path(), "test_fit", true),
                row(dir.path(), "test_skip", false),
            ],
        )
        .unwrap();
        let python = fake_python(
            dir.path(),
            "echo 'FLAKY_METRIC: 0.5'\necho 'FLAKY_METRIC: 1.0'\necho '1 passed in 0.1s'\nexit 0",
        );
        let harness = HarnessConfig::default().with_python(python);
        let config = CliConfig::new().with_verbosity(Verbosity::Quiet);

        let summary = execute_sample(&config, &harness, &args(dir.path(), &catalog)).unwrap();
        assert_eq!(summary.ok, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.skipped, 1);

        let data = dir.path().join("out/test_fit_2/SEEDS_numpy_random/data/_1.0_0.txt");
        let text = std::fs::read_to_string(data).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().all(|l| l == "0.5000000000"));
    }

    #[test]
    fn test_failing_unit_is_counted_and_skipped() {
        let dir = TempDir::new().unwrap();
        let catalog = dir.path().join("instrumented.csv");
        write_csv(&catalog, &[row(dir.path(), "test_fit", true)]).unwrap();
        let python = fake_python(dir.path(), "echo 'collection error' >&2\nexit 4");
        let harness = HarnessConfig::default()
            .with_python(python)
            .with_max_attempts(1);
        let config = CliConfig::new().with_verbosity(Verbosity::Quiet);

        let summary = execute_sample(&config, &harness, &args(dir.path(), &catalog)).unwrap();
        assert_eq!(summary.ok, 0);
        assert_eq!(summary.failed, 2);
        assert!(!dir.path().join("out/test_fit_2").exists());
    }
}
