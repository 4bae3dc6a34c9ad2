//! Flakestat: Statistical Stability of Numeric Test Assertions
//!
//! Finds numeric assertions in a pytest suite, instruments each one so the
//! compared values are printed at run time, and re-runs the instrumented
//! test under varying seed configurations to build empirical
//! distributions of the observed values.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ SourceIndex │──►│ Miner        │──►│ Instrumenter │
//! │ (parse once)│   │ catalog +    │   │ <stem>_<ln>  │
//! └─────────────┘   │ fn lookup    │   └──────┬───────┘
//!                   └──────────────┘          │
//!        ┌────────────────────────────────────┘
//!        ▼
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Executor ×N  │──►│ Decoder      │──►│ Orchestrator │
//! │ (pytest)     │   │ (obs, exp)   │   │ per-index    │
//! └──────────────┘   └──────────────┘   │ series       │
//!                                       └──────────────┘
//! ```

#![warn(missing_docs)]

#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
mod config;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod instrument;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod mining;
mod result;
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub mod sampling;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
mod source_index;
pub mod syntax;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod trial;

pub use config::{HarnessConfig, DEFAULT_CONFIG_FILE, DEFAULT_TAG, TIMEOUT_EXIT_CODE};
pub use instrument::{derived_path, Instrumentation, Instrumenter};
pub use mining::{
    mine_file, mine_index, AssertionIdiom, AssertionSite, Catalog, FunctionLookup,
    FunctionRecord, InstrumentedRow,
};
pub use result::{FlakeError, FlakeResult, InstrumentationFailureKind};
pub use sampling::{
    Distribution, OutcomeTrialRunner, ParameterSeries, PassRate, SamplingOrchestrator,
    SeriesSummary, TrialRunner, ValueTrialRunner,
};
pub use source_index::{
    content_hash, discover_python_files, python_parser, ManifestEntry, SourceFile, SourceIndex,
    SourceManifest,
};
pub use trial::{
    OutputDecoder, SeedConfiguration, TrialExecutor, TrialOutput, TrialSpec, TrialStatus,
    ValuePair,
};
