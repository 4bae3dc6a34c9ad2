//! Assertion Miner
//!
//! Walks every file of a [`SourceIndex`] and produces:
//!
//! - the catalog of [`AssertionSite`] records, in path order then preorder
//! - the [`FunctionLookup`] table used by the instrumenter to find the
//!   definition enclosing each site
//!
//! Shapes outside the recognized idioms are skipped silently.

mod catalog;
mod idiom;
mod visitor;

pub use catalog::{
    function_key, read_csv, write_csv, AssertionSite, FileFunctions, FunctionLookup,
    FunctionRecord, InstrumentedRow,
};
pub use idiom::{
    classify_assert, classify_call, AssertionIdiom, APPROX_WRAPPERS, ARRAY_ALMOST_METHODS,
    ASSERT_METHODS, CUSTOM_CLOSE_HELPERS, FRAMEWORK_ALIAS, FRAMEWORK_ALLCLOSE,
};
pub use visitor::Scope;

use crate::source_index::{SourceFile, SourceIndex};

/// Mining output for one file
#[derive(Debug, Clone, Default)]
pub struct FileMining {
    /// Sites in traversal order
    pub sites: Vec<AssertionSite>,
    /// Function records and the hash they were taken from
    pub functions: FileFunctions,
}

/// Mining output for a whole index
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Every site, files in path order
    pub sites: Vec<AssertionSite>,
    /// Function lookup for every mined file
    pub functions: FunctionLookup,
}

impl Catalog {
    /// Number of sites per idiom
    #[must_use]
    pub fn idiom_counts(&self) -> std::collections::BTreeMap<AssertionIdiom, usize> {
        let mut counts = std::collections::BTreeMap::new();
        for site in &self.sites {
            *counts.entry(site.idiom).or_insert(0) += 1;
        }
        counts
    }
}

/// Mine a single parsed file
#[must_use]
pub fn mine_file(file: &SourceFile) -> FileMining {
    let visit = visitor::visit(file);
    FileMining {
        sites: visit.sites,
        functions: FileFunctions {
            sha256: file.sha256().to_string(),
            functions: visit.functions,
        },
    }
}

/// Mine every file of an index
#[must_use]
pub fn mine_index(index: &SourceIndex) -> Catalog {
    let mut catalog = Catalog::default();
    for file in index.iter() {
        let mined = mine_file(file);
        tracing::debug!(
            path = %file.path().display(),
            sites = mined.sites.len(),
            functions = mined.functions.functions.len(),
            "mined file"
        );
        catalog.sites.extend(mined.sites);
        catalog
            .functions
            .files
            .insert(file.path().to_path_buf(), mined.functions);
    }
    tracing::info!(
        files = index.len(),
        sites = catalog.sites.len(),
        "mining complete"
    );
    catalog
}
