//! Flakiness command handler

use super::batch::{harness_with_overrides, select_rows, split_seed_configs, BatchSummary};
use crate::commands::FlakinessArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use flakestat::mining::read_csv;
use flakestat::sampling::{unit_dir, write_pass_rate};
use flakestat::{
    HarnessConfig, InstrumentedRow, OutcomeTrialRunner, SamplingOrchestrator, SeedConfiguration,
    TrialExecutor, TrialSpec,
};
use std::time::Instant;

/// Execute the flakiness command
///
/// Runs each original (uninstrumented) test and records its pass rate
/// per seed configuration.
pub fn execute_flakiness(
    config: &CliConfig,
    harness: &HarnessConfig,
    args: &FlakinessArgs,
) -> CliResult<BatchSummary> {
    let start = Instant::now();
    let sampling = &args.sampling;
    let harness = harness_with_overrides(harness, sampling, None)?;
    let rows: Vec<InstrumentedRow> = read_csv(&sampling.catalog)?;
    let (selected, skipped) = select_rows(&rows, &sampling.assertions, false);
    let seed_names = split_seed_configs(&sampling.seed_config_names);
    if seed_names.is_empty() {
        return Err(CliError::invalid_argument("no seed configuration names given"));
    }

    let mut reporter = config.reporter();
    reporter.header(&format!(
        "Checking {} tests x {} seed configurations ({} trials)",
        selected.len(),
        seed_names.len(),
        harness.trials
    ));

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::command(format!("Failed to create runtime: {e}")))?;
    let executor = TrialExecutor::new(&harness, &sampling.repo_root);
    let orchestrator = SamplingOrchestrator::from_config(&harness);

    let mut summary = BatchSummary {
        skipped,
        ..BatchSummary::default()
    };
    for row in selected {
        for name in &seed_names {
            let seed = SeedConfiguration::new(
                name.as_str(),
                sampling.seed_value,
                sampling.seed_config_file.clone(),
            );
            let spec = TrialSpec {
                path: row.filepath.clone(),
                class: row.testclass.clone(),
                test: row.testname.clone(),
                seed: seed.clone(),
            };
            let runner = OutcomeTrialRunner::new(executor.clone(), spec);

            reporter.start_progress(orchestrator.trials() as u64, &format!("{} {name}", row.id()));
            let result = rt.block_on(orchestrator.pass_rate(&runner, |done, _| {
                reporter.set_position(done as u64);
            }));
            reporter.finish();

            let written = result.and_then(|rate| {
                let dir = unit_dir(&sampling.dir_out, &row.id(), &seed);
                write_pass_rate(&dir, &rate).map(|_| rate)
            });
            match written {
                Ok(rate) => {
                    summary.ok += 1;
                    let message = format!(
                        "{} {name}: {}/{} passed ({:.1}%)",
                        row.id(),
                        rate.passed(),
                        rate.results.len(),
                        rate.rate() * 100.0
                    );
                    if rate.passed() == rate.results.len() {
                        reporter.success(&message);
                    } else {
                        reporter.warning(&message);
                    }
                }
                Err(e) => {
                    if e.is_site_local() {
                        tracing::warn!(site = %row.id(), seed_config = %name, error = %e, "flakiness run failed");
                    } else {
                        tracing::error!(site = %row.id(), seed_config = %name, error = %e, "flakiness run failed");
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
    use flakestat::sampling::RESULTS_FILE;
    use flakestat::AssertionIdiom;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn test_pass_rate_written_per_seed_config() {
        let dir = TempDir::new().unwrap();
        let test_file = dir.path().join("test_fit.py");
        std::fs::write(&test_file, "def test_fit():\n    pass\n").unwrap();
        let catalog = dir.path().join("instrumented.csv");
        write_csv(
            &catalog,
            &[InstrumentedRow {
                filepath: test_file,
                testclass: String::new(),
                testname: "test_fit".to_string(),
                assertion_type: AssertionIdiom::ThresholdCompare,
                line_number: 2,
                assert_string: "assert a < 1".to_string(),
                logged_path: None,
            }],
        )
        .unwrap();

        let python = dir.path().join("fake_python.sh");
        std::fs::write(&python, "#!/bin/sh\necho '1 failed in 0.1s'\nexit 1\n").unwrap();
        std::fs::set_permissions(&python, std::fs::Permissions::from_mode(0o755)).unwrap();
        let harness = HarnessConfig::default().with_python(python.to_string_lossy());

        let args = FlakinessArgs {
            sampling: SamplingArgs {
                catalog,
                repo_root: dir.path().to_path_buf(),
                seed_value: 1,
                seed_config_file: dir.path().join("seeds.yaml"),
                seed_config_names: "numpy".to_string(),
                trials: Some(4),
                workers: Some(2),
                assertions: Vec::new(),
                dir_out: dir.path().join("out"),
            },
        };
        let config = CliConfig::new().with_verbosity(Verbosity::Quiet);
        let summary = execute_flakiness(&config, &harness, &args).unwrap();
        assert_eq!(summary.ok, 1);

        let results = dir
            .path()
            .join("out/test_fit_2/SEEDS_numpy/data")
            .join(RESULTS_FILE);
        let text = std::fs::read_to_string(results).unwrap();
        assert_eq!(text, "1\n1\n1\n1\n");
    }
}
