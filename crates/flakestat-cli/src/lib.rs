//! Flakestat CLI Library
//!
//! Command-line front end for the `flakestat` library: each subcommand
//! is one pipeline stage reading the previous stage's files.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]

mod commands;
mod config;
mod error;
pub mod handlers;
mod logging;
mod output;

pub use commands::{
    Cli, ColorArg, Commands, CompileArgs, FlakinessArgs, InstrumentArgs, MineArgs, SampleArgs,
    SamplingArgs, StatsArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use logging::{env_filter, init_tracing};
pub use output::ProgressReporter;
