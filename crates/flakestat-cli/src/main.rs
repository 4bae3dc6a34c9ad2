//! Flakestat CLI: statistical stability of numeric pytest assertions
//!
//! ## Usage
//!
//! ```bash
//! flakestat compile --project-link <git url> --test-dirs tests
//! flakestat mine --manifest manifest.json
//! flakestat instrument --catalog catalog.csv --functions functions.json
//! flakestat sample --catalog instrumented.csv --repo-root proj \
//!     --seed-value 1 --seed-config-file seeds.yaml --seed-config-names "numpy;numpy, random" \
//!     --dir-out runs
//! flakestat stats --dir runs
//! ```

use clap::Parser;
use flakestat::HarnessConfig;
use flakestat_cli::{handlers, init_tracing, Cli, CliConfig, CliResult, Commands, Verbosity};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(&config)?;

    match &cli.command {
        Commands::Compile(args) => handlers::execute_compile(&config, args).map(|_| ()),
        Commands::Mine(args) => handlers::execute_mine(&config, args).map(|_| ()),
        Commands::Instrument(args) => {
            let harness = load_harness(&cli)?;
            handlers::execute_instrument(&config, &harness, args).map(|_| ())
        }
        Commands::Sample(args) => {
            let harness = load_harness(&cli)?;
            handlers::execute_sample(&config, &harness, args).map(|_| ())
        }
        Commands::Flakiness(args) => {
            let harness = load_harness(&cli)?;
            handlers::execute_flakiness(&config, &harness, args).map(|_| ())
        }
        Commands::Stats(args) => handlers::execute_stats(&config, args).map(|_| ()),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.into())
        .with_log_json(cli.log_json)
}

fn load_harness(cli: &Cli) -> CliResult<HarnessConfig> {
    let harness = HarnessConfig::discover(cli.config.as_deref())?;
    tracing::debug!(?harness, "harness configuration");
    Ok(harness)
}
