//! Mine command handler

use crate::commands::MineArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use flakestat::mining::write_csv;
use flakestat::{discover_python_files, mine_index, Catalog, SourceIndex, SourceManifest};
use std::path::PathBuf;

fn load_index(args: &MineArgs) -> CliResult<(SourceIndex, PathBuf)> {
    match (&args.manifest, &args.root) {
        (Some(manifest), _) => {
            let manifest = SourceManifest::read(manifest)?;
            let index = SourceIndex::from_manifest(&manifest)?;
            Ok((index, manifest.root))
        }
        (None, Some(root)) => {
            let paths = discover_python_files(root, &[])?;
            Ok((SourceIndex::from_paths(paths)?, root.clone()))
        }
        (None, None) => Err(CliError::invalid_argument(
            "either --manifest or --root is required",
        )),
    }
}

/// Execute the mine command
pub fn execute_mine(config: &CliConfig, args: &MineArgs) -> CliResult<Catalog> {
    let reporter = config.reporter();
    let (mut index, root) = load_index(args)?;
    if let Some(ref dir) = args.test_dir {
        index.retain_test_dir(&root, dir);
    }

    let catalog = mine_index(&index);
    write_csv(&args.csv_out, &catalog.sites)?;
    catalog.functions.write(&args.functions_out)?;

    if config.verbosity.is_verbose() {
        for (idiom, count) in catalog.idiom_counts() {
            reporter.info(&format!("{idiom}: {count}"));
        }
    }
    reporter.success(&format!(
        "Mined {} assertion sites from {} files -> {}",
        catalog.sites.len(),
        index.len(),
        args.csv_out.display()
    ));
    Ok(catalog)
}
