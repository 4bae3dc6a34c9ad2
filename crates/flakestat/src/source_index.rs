//! Source Index
//!
//! Every Python file of the target project is parsed exactly once into a
//! tree-sitter syntax tree. A [`SourceFile`] never changes after loading;
//! rewrites work on owned copies of its text.

use crate::result::{FlakeError, FlakeResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tree_sitter::{Node, Parser, Tree};

/// Create a parser configured for the Python grammar
pub fn python_parser() -> FlakeResult<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| FlakeError::config(format!("python grammar rejected: {e}")))?;
    Ok(parser)
}

/// Hex SHA-256 of a file's text
#[must_use]
pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// One parsed source file
#[derive(Clone)]
pub struct SourceFile {
    path: PathBuf,
    text: String,
    tree: Tree,
    sha256: String,
}

impl std::fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFile")
            .field("path", &self.path)
            .field("bytes", &self.text.len())
            .field("sha256", &self.sha256)
            .finish()
    }
}

impl SourceFile {
    /// Parse `text` as the contents of `path`
    ///
    /// # Errors
    ///
    /// Returns [`FlakeError::Parse`] when the text contains syntax errors.
    pub fn parse(path: impl Into<PathBuf>, text: impl Into<String>) -> FlakeResult<Self> {
        let path = path.into();
        let text = text.into();
        let mut parser = python_parser()?;
        let tree = parser
            .parse(text.as_bytes(), None)
            .ok_or_else(|| FlakeError::Parse {
                path: path.clone(),
                message: "parser returned no tree".to_string(),
            })?;

        if tree.root_node().has_error() {
            return Err(FlakeError::Parse {
                path,
                message: first_error_location(&tree),
            });
        }

        let sha256 = content_hash(&text);
        Ok(Self {
            path,
            text,
            tree,
            sha256,
        })
    }

    /// Read and parse a file from disk
    pub fn load(path: impl Into<PathBuf>) -> FlakeResult<Self> {
        let path = path.into();
        let text = std::fs::read_to_string(&path)?;
        Self::parse(path, text)
    }

    /// Path the file was loaded from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Module node
    #[must_use]
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Content hash taken at load time
    #[must_use]
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Number of lines
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }

    /// Source segment covered by `node`
    #[must_use]
    pub fn node_text(&self, node: Node<'_>) -> &str {
        self.text.get(node.byte_range()).unwrap_or("")
    }
}

fn first_error_location(tree: &Tree) -> String {
    let mut cursor = tree.walk();
    let mut stack = vec![tree.root_node()];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let pos = node.start_position();
            return format!("syntax error at line {}", pos.row + 1);
        }
        if node.has_error() {
            let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }
    "syntax error".to_string()
}

/// All parsed files of a project, keyed by path
#[derive(Debug, Clone, Default)]
pub struct SourceIndex {
    files: BTreeMap<PathBuf, SourceFile>,
}

impl SourceIndex {
    /// Create an empty index
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parsed file, replacing any earlier entry for the same path
    pub fn insert(&mut self, file: SourceFile) {
        self.files.insert(file.path.clone(), file);
    }

    /// Parse every path; files with syntax errors are skipped with a warning
    pub fn from_paths<I, P>(paths: I) -> FlakeResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut index = Self::new();
        for path in paths {
            match SourceFile::load(path) {
                Ok(file) => index.insert(file),
                Err(FlakeError::Parse { path, message }) => {
                    tracing::warn!(path = %path.display(), %message, "skipping unparsable source");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(index)
    }

    /// Parse every file listed in a manifest
    pub fn from_manifest(manifest: &SourceManifest) -> FlakeResult<Self> {
        let index = Self::from_paths(manifest.files.iter().map(|e| e.path.clone()))?;
        for entry in &manifest.files {
            if let Some(file) = index.get(&entry.path) {
                if file.sha256() != entry.sha256 {
                    tracing::warn!(path = %entry.path.display(), "source changed since compile");
                }
            }
        }
        Ok(index)
    }

    /// Keep only files whose first path component below `root` is `test_dir`
    pub fn retain_test_dir(&mut self, root: &Path, test_dir: &str) {
        self.files
            .retain(|path, _| first_component_under(path, root).as_deref() == Some(test_dir));
    }

    /// Look up a file
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&SourceFile> {
        self.files.get(path)
    }

    /// Look up a file, failing when it was never indexed
    pub fn require(&self, path: &Path) -> FlakeResult<&SourceFile> {
        self.get(path).ok_or_else(|| FlakeError::SourceNotIndexed {
            path: path.to_path_buf(),
        })
    }

    /// Files in path order
    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    /// Number of files
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no files are indexed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn first_component_under(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    match rel.components().next()? {
        Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
        _ => None,
    }
}

/// Find every `*.py` file below each test directory of `root`, sorted
///
/// An empty `test_dirs` slice searches the whole root.
pub fn discover_python_files(root: &Path, test_dirs: &[String]) -> FlakeResult<Vec<PathBuf>> {
    let dirs: Vec<PathBuf> = if test_dirs.is_empty() {
        vec![root.to_path_buf()]
    } else {
        test_dirs.iter().map(|d| root.join(d)).collect()
    };

    let mut found = Vec::new();
    for dir in dirs {
        let pattern = dir.join("**").join("*.py");
        let pattern = pattern.to_string_lossy();
        let paths = glob::glob(&pattern)
            .map_err(|e| FlakeError::config(format!("bad search pattern {pattern}: {e}")))?;
        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => found.push(path),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "unreadable path during discovery"),
            }
        }
    }
    found.sort();
    found.dedup();
    Ok(found)
}

/// One file recorded by `compile`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path of the file (root-joined)
    pub path: PathBuf,
    /// Content hash at compile time
    pub sha256: String,
    /// Line count
    pub lines: usize,
}

/// Persisted membership of a [`SourceIndex`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceManifest {
    /// Project root
    pub root: PathBuf,
    /// Creation time (RFC 3339)
    pub created_at: String,
    /// Parsed files in path order
    pub files: Vec<ManifestEntry>,
}

impl SourceManifest {
    /// Discover, parse and record the Python files of a project
    pub fn build(root: &Path, test_dirs: &[String]) -> FlakeResult<(Self, SourceIndex)> {
        let paths = discover_python_files(root, test_dirs)?;
        let index = SourceIndex::from_paths(paths)?;
        let files = index
            .iter()
            .map(|f| ManifestEntry {
                path: f.path().to_path_buf(),
                sha256: f.sha256().to_string(),
                lines: f.line_count(),
            })
            .collect();
        let manifest = Self {
            root: root.to_path_buf(),
            created_at: chrono::Utc::now().to_rfc3339(),
            files,
        };
        Ok((manifest, index))
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
