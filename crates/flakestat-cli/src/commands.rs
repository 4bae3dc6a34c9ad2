//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Flakestat: measure how stable the numeric assertions of a pytest suite are
#[derive(Parser, Debug)]
#[command(name = "flakestat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit log events as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Harness configuration file (default: ./flakestat.yaml when present)
    #[arg(long, global = true, env = "FLAKESTAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse a project's Python files and record a source manifest
    Compile(CompileArgs),

    /// Mine numeric assertion sites into a catalog
    Mine(MineArgs),

    /// Write an instrumented copy of the test file for every catalog row
    Instrument(InstrumentArgs),

    /// Resample instrumented tests and record value distributions
    Sample(SampleArgs),

    /// Resample original tests and record pass/fail outcomes
    Flakiness(FlakinessArgs),

    /// Recompute series statistics of a sampling output tree
    Stats(StatsArgs),
}

/// Arguments for the compile command
#[derive(Parser, Debug)]
pub struct CompileArgs {
    /// Repository to clone before compiling
    #[arg(long)]
    pub project_link: Option<String>,

    /// Project directory (clone target when --project-link is given)
    #[arg(long)]
    pub clone_dir: PathBuf,

    /// Comma-separated test directories below the project root
    #[arg(long, value_delimiter = ',')]
    pub test_dirs: Vec<String>,

    /// Manifest output path
    #[arg(long, default_value = "manifest.json")]
    pub manifest_out: PathBuf,
}

/// Arguments for the mine command
#[derive(Parser, Debug)]
pub struct MineArgs {
    /// Source manifest written by `compile`
    #[arg(long, conflicts_with = "root", required_unless_present = "root")]
    pub manifest: Option<PathBuf>,

    /// Project directory to scan directly
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Keep only files whose first folder below the root is this one
    #[arg(long)]
    pub test_dir: Option<String>,

    /// Catalog CSV output path
    #[arg(long, default_value = "catalog.csv")]
    pub csv_out: PathBuf,

    /// Function lookup JSON output path
    #[arg(long, default_value = "functions.json")]
    pub functions_out: PathBuf,
}

/// Arguments for the instrument command
#[derive(Parser, Debug)]
pub struct InstrumentArgs {
    /// Catalog CSV written by `mine`
    #[arg(long)]
    pub catalog: PathBuf,

    /// Function lookup JSON written by `mine`
    #[arg(long)]
    pub functions: PathBuf,

    /// Instrumented catalog CSV output path
    #[arg(long, default_value = "instrumented.csv")]
    pub csv_out: PathBuf,

    /// Marker printed before emitted values (overrides config)
    #[arg(long)]
    pub tag: Option<String>,
}

/// Sampling options shared by `sample` and `flakiness`
#[derive(Parser, Debug)]
pub struct SamplingArgs {
    /// Instrumented catalog CSV
    #[arg(long)]
    pub catalog: PathBuf,

    /// Directory pytest runs from; test paths are made relative to it
    #[arg(long)]
    pub repo_root: PathBuf,

    /// Seed value forwarded to every trial
    #[arg(long)]
    pub seed_value: u64,

    /// Seed configuration file forwarded to every trial
    #[arg(long)]
    pub seed_config_file: PathBuf,

    /// `;`-separated seed configuration names
    #[arg(long)]
    pub seed_config_names: String,

    /// Trials per unit (overrides config)
    #[arg(long)]
    pub trials: Option<usize>,

    /// Concurrent trials, 0 = available parallelism (overrides config)
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Comma-separated `testname_line` ids to sample (default: all)
    #[arg(long, value_delimiter = ',')]
    pub assertions: Vec<String>,

    /// Output directory
    #[arg(long)]
    pub dir_out: PathBuf,
}

/// Arguments for the sample command
#[derive(Parser, Debug)]
pub struct SampleArgs {
    /// Shared sampling options
    #[command(flatten)]
    pub sampling: SamplingArgs,

    /// Marker printed before emitted values (overrides config)
    #[arg(long)]
    pub tag: Option<String>,
}

/// Arguments for the flakiness command
#[derive(Parser, Debug)]
pub struct FlakinessArgs {
    /// Shared sampling options
    #[command(flatten)]
    pub sampling: SamplingArgs,
}

/// Arguments for the stats command
#[derive(Parser, Debug)]
pub struct StatsArgs {
    /// Sampling output directory
    #[arg(long)]
    pub dir: PathBuf,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Color output argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["flakestat", "-vv", "--log-json", "stats", "--dir", "out"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.log_json);
        assert!(matches!(cli.command, Commands::Stats(_)));
    }

    #[test]
    fn test_mine_requires_source() {
        assert!(Cli::try_parse_from(["flakestat", "mine"]).is_err());
        assert!(Cli::try_parse_from([
            "flakestat",
            "mine",
            "--manifest",
            "m.json",
            "--root",
            "."
        ])
        .is_err());
    }

    #[test]
    fn test_sample_args() {
        let cli = Cli::try_parse_from([
            "flakestat",
            "sample",
            "--catalog",
            "i.csv",
            "--repo-root",
            "repo",
            "--seed-value",
            "42",
            "--seed-config-file",
            "seeds.yaml",
            "--seed-config-names",
            "numpy;numpy, torch",
            "--assertions",
            "test_a_10,test_b_20",
            "--dir-out",
            "out",
            "-j",
            "8",
        ])
        .unwrap();
        let Commands::Sample(args) = cli.command else {
            panic!("expected sample");
        };
        assert_eq!(args.sampling.seed_value, 42);
        assert_eq!(args.sampling.workers, Some(8));
        assert_eq!(args.sampling.assertions, vec!["test_a_10", "test_b_20"]);
        assert_eq!(args.tag, None);
    }
}
