//! Stats command handler

use crate::commands::StatsArgs;
use crate::config::CliConfig;
use crate::error::CliResult;
use flakestat::sampling::{collect_series_stats, SeriesStatsRow};
use std::fmt::Write as _;

fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.6}"))
}

/// Render rows as a fixed-width table
#[must_use]
pub fn render_stats_table(rows: &[SeriesStatsRow]) -> String {
    let test_width = rows
        .iter()
        .map(|r| r.test_name.len())
        .max()
        .unwrap_or(0)
        .max(4);
    let seed_width = rows
        .iter()
        .map(|r| r.seed_cfg.len())
        .max()
        .unwrap_or(0)
        .max(4);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<test_width$}  {:<seed_width$}  {:<14}  {:>6}  {:>14}  {:>14}  {:>10}  {:>10}",
        "test", "seed", "tag", "n", "mean", "var", "skew", "kurtosis"
    );
    for row in rows {
        let (n, mean, var, skew, kurtosis) = row.summary.map_or_else(
            || ("0".to_string(), cell(None), cell(None), cell(None), cell(None)),
            |s| {
                (
                    s.n.to_string(),
                    cell(Some(s.mean)),
                    cell(Some(s.var)),
                    cell(s.skew),
                    cell(s.kurtosis),
                )
            },
        );
        let _ = writeln!(
            out,
            "{:<test_width$}  {:<seed_width$}  {:<14}  {:>6}  {:>14}  {:>14}  {:>10}  {:>10}",
            row.test_name, row.seed_cfg, row.param_tag, n, mean, var, skew, kurtosis
        );
    }
    out
}

/// Execute the stats command
pub fn execute_stats(config: &CliConfig, args: &StatsArgs) -> CliResult<Vec<SeriesStatsRow>> {
    let rows = collect_series_stats(&args.dir)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if rows.is_empty() {
        config
            .reporter()
            .warning(&format!("No series files under {}", args.dir.display()));
    } else {
        print!("{}", render_stats_table(&rows));
    }
    Ok(rows)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Verbosity;
    use tempfile::TempDir;

    #[test]
    fn test_table_marks_undefined_moments() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("test_fit_3").join("SEEDS_numpy").join("data");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join("_2.0_0.txt"), "1.0\n1.0\n").unwrap();

        let args = StatsArgs {
            dir: dir.path().to_path_buf(),
            json: true,
        };
        let config = CliConfig::new().with_verbosity(Verbosity::Quiet);
        let rows = execute_stats(&config, &args).unwrap();
        assert_eq!(rows.len(), 1);

        let table = render_stats_table(&rows);
        let mut lines = table.lines();
        assert!(lines.next().unwrap().starts_with("test"));
        let row = lines.next().unwrap();
        assert!(row.contains("test_fit_3"));
        assert!(row.contains("2.0-p0"));
        assert!(row.trim_end().ends_with('-'));
    }

    #[test]
    fn test_empty_tree() {
        let dir = TempDir::new().unwrap();
        let args = StatsArgs {
            dir: dir.path().to_path_buf(),
            json: false,
        };
        let config = CliConfig::new().with_verbosity(Verbosity::Quiet);
        assert!(execute_stats(&config, &args).unwrap().is_empty());
        assert_eq!(render_stats_table(&[]).lines().count(), 1);
    }
}
