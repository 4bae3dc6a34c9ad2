//! Instrument command handler

use super::batch::BatchSummary;
use crate::commands::InstrumentArgs;
use crate::config::CliConfig;
use crate::error::CliResult;
use flakestat::mining::{read_csv, write_csv};
use flakestat::{
    AssertionSite, FunctionLookup, HarnessConfig, InstrumentedRow, Instrumenter, SourceFile,
    SourceIndex,
};
use std::collections::BTreeSet;
use std::time::Instant;

/// Parse every file referenced by `sites`; unreadable ones are left out
fn index_sites(sites: &[AssertionSite]) -> SourceIndex {
    let paths: BTreeSet<_> = sites.iter().map(|s| s.path.clone()).collect();
    let mut index = SourceIndex::new();
    for path in paths {
        match SourceFile::load(&path) {
            Ok(file) => index.insert(file),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot load source"),
        }
    }
    index
}

/// Execute the instrument command
pub fn execute_instrument(
    config: &CliConfig,
    harness: &HarnessConfig,
    args: &InstrumentArgs,
) -> CliResult<BatchSummary> {
    let start = Instant::now();
    let mut reporter = config.reporter();
    let sites: Vec<AssertionSite> = read_csv(&args.catalog)?;
    let lookup = FunctionLookup::read(&args.functions)?;
    let index = index_sites(&sites);
    let tag = args.tag.as_deref().unwrap_or(&harness.tag);
    let instrumenter = Instrumenter::new(&index, &lookup, tag);

    let mut summary = BatchSummary::default();
    let mut rows = Vec::with_capacity(sites.len());
    reporter.start_progress(sites.len() as u64, "instrumenting");
    for site in &sites {
        let logged = match instrumenter.instrument_to_disk(site) {
            Ok(out) if out.emitted => {
                summary.ok += 1;
                Some(out.path)
            }
            Ok(_) => {
                summary.skipped += 1;
                None
            }
            Err(e) => {
                if e.is_site_local() {
                    tracing::warn!(site = %site.id(), error = %e, "instrumentation failed");
                } else {
                    tracing::error!(site = %site.id(), error = %e, "instrumentation failed");
                }
                reporter.failure(&format!("{}: {e}", site.id()));
                summary.failed += 1;
                None
            }
        };
        rows.push(InstrumentedRow::new(site, logged));
        reporter.increment(1);
    }
    reporter.finish();

    write_csv(&args.csv_out, &rows)?;
    reporter.summary(
        "sites",
        summary.ok,
        summary.failed,
        summary.skipped,
        start.elapsed(),
    );
    Ok(summary)
}
