//! Catalog records and the function lookup table
//!
//! The catalog is a CSV file with the columns
//! `filepath, testclass, testname, assertion_type, line_number, assert_string`;
//! the instrumented catalog appends `logged_path`. The function lookup is a
//! JSON document keyed by file and by `Class.function`.

use super::idiom::AssertionIdiom;
use crate::result::FlakeResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Lookup key of a function: `Class.function`, or `.function` at module scope
#[must_use]
pub fn function_key(class: &str, function: &str) -> String {
    format!("{class}.{function}")
}

/// One classified assertion call-site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionSite {
    /// Source file
    #[serde(rename = "filepath")]
    pub path: PathBuf,
    /// Enclosing class, empty at module scope
    #[serde(rename = "testclass")]
    pub class: String,
    /// Enclosing function
    #[serde(rename = "testname")]
    pub function: String,
    /// Recognized idiom
    #[serde(rename = "assertion_type")]
    pub idiom: AssertionIdiom,
    /// 1-based line the statement starts on
    #[serde(rename = "line_number")]
    pub line: usize,
    /// Source snippet of the assertion
    #[serde(rename = "assert_string")]
    pub snippet: String,
}

impl AssertionSite {
    /// `Class.function` key into the [`FunctionLookup`]
    #[must_use]
    pub fn key(&self) -> String {
        function_key(&self.class, &self.function)
    }

    /// `function_line` identifier used by sampling filters and output folders
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}_{}", self.function, self.line)
    }
}

/// Location of one function definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// First byte of the `def` (decorators excluded)
    pub start_byte: usize,
    /// One past the last byte of the body
    pub end_byte: usize,
    /// 1-based first line
    pub start_line: usize,
    /// 1-based last line
    pub end_line: usize,
}

impl FunctionRecord {
    /// Whether the 1-based `line` lies inside the definition
    #[must_use]
    pub const fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }
}

/// Functions of one file together with the hash they were mined from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFunctions {
    /// Content hash at mining time
    pub sha256: String,
    /// Records by `Class.function` key
    pub functions: BTreeMap<String, FunctionRecord>,
}

/// Per-file `(class, function)` → definition table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionLookup {
    /// Entries by file path
    pub files: BTreeMap<PathBuf, FileFunctions>,
}

impl FunctionLookup {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Functions recorded for `path`
    #[must_use]
    pub fn file(&self, path: &Path) -> Option<&FileFunctions> {
        self.files.get(path)
    }

    /// Record for `(class, function)` in `path`
    #[must_use]
    pub fn get(&self, path: &Path, class: &str, function: &str) -> Option<&FunctionRecord> {
        self.files
            .get(path)?
            .functions
            .get(&function_key(class, function))
    }

    /// Write as pretty JSON
    pub fn write(&self, path: &Path) -> FlakeResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read from JSON
    pub fn read(path: &Path) -> FlakeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Catalog row after batch instrumentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentedRow {
    /// Source file
    pub filepath: PathBuf,
    /// Enclosing class
    pub testclass: String,
    /// Enclosing function
    pub testname: String,
    /// Recognized idiom
    pub assertion_type: AssertionIdiom,
    /// Target line
    pub line_number: usize,
    /// Assertion snippet
    pub assert_string: String,
    /// Derived file, absent when instrumentation failed
    pub logged_path: Option<PathBuf>,
}

impl InstrumentedRow {
    /// Extend a site with the outcome of instrumenting it
    #[must_use]
    pub fn new(site: &AssertionSite, logged_path: Option<PathBuf>) -> Self {
        Self {
            filepath: site.path.clone(),
            testclass: site.class.clone(),
            testname: site.function.clone(),
            assertion_type: site.idiom,
            line_number: site.line,
            assert_string: site.snippet.clone(),
            logged_path,
        }
    }

    /// `testname_line` identifier
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}_{}", self.testname, self.line_number)
    }
}

/// Write rows with a header line
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> FlakeResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read every row of a headed CSV file
pub fn read_csv<T: serde::de::DeserializeOwned>(path: &Path) -> FlakeResult<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}
