//! Sampling: trial fan-out, per-index series, statistics and the output tree.

mod orchestrator;
mod report;
mod series;
mod stats;

pub use orchestrator::{
    OutcomeTrialRunner, PassRate, SamplingOrchestrator, TrialRunner, ValueTrialRunner,
};
pub use report::{
    collect_series_stats, parse_series_stem, read_series, series_file_name, unit_dir,
    write_distribution, write_pass_rate, SeriesReport, SeriesStatsRow, UnitSummary, RESULTS_FILE,
    SUMMARY_FILE,
};
pub use series::{Distribution, ParameterSeries, SeriesAccumulator};
pub use stats::{percentile, SeriesSummary};
