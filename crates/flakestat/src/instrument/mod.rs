//! Instrumenter
//!
//! Rewrites one assertion site so the values flowing into it are printed
//! before the assertion runs:
//!
//! ```text
//!     print("\nFLAKY_METRIC:", float(<observed>))
//!     print("\nFLAKY_METRIC:", float(<expected>))
//!     assert <observed> < <expected>
//! ```
//!
//! The enclosing function is copied out of the indexed text, edited as an
//! owned string and spliced back into an owned copy of the file, so every
//! byte outside the two inserted lines is unchanged. Each site produces its
//! own derived file `<stem>_<line><ext>` next to the original.

pub mod operands;

use crate::mining::{function_key, AssertionSite, FunctionLookup, FunctionRecord};
use crate::result::{FlakeError, FlakeResult, InstrumentationFailureKind};
use crate::source_index::{SourceFile, SourceIndex};
use crate::syntax;
use std::path::{Path, PathBuf};
use tree_sitter::Node;

/// Sibling path `<stem>_<line><ext>` of `path`
#[must_use]
pub fn derived_path(path: &Path, line: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{line}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{line}"),
    };
    path.with_file_name(name)
}

/// The instrumented form of one site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrumentation {
    /// Derived file path
    pub path: PathBuf,
    /// Full text of the derived file
    pub text: String,
    /// Whether emission statements were inserted
    pub emitted: bool,
}

/// Builds instrumented copies of indexed files
#[derive(Debug, Clone)]
pub struct Instrumenter<'a> {
    index: &'a SourceIndex,
    lookup: &'a FunctionLookup,
    tag: String,
}

impl<'a> Instrumenter<'a> {
    /// Create an instrumenter emitting `tag`
    pub fn new(index: &'a SourceIndex, lookup: &'a FunctionLookup, tag: impl Into<String>) -> Self {
        Self {
            index,
            lookup,
            tag: tag.into(),
        }
    }

    /// Instrument `site` in memory
    ///
    /// # Errors
    ///
    /// - [`FlakeError::SourceNotIndexed`] if the file was never parsed
    /// - [`FlakeError::SourceDrift`] if the file changed since mining
    /// - [`FlakeError::InstrumentationFailure`] if the function or line is missing
    pub fn instrument(&self, site: &AssertionSite) -> FlakeResult<Instrumentation> {
        let file = self.index.require(&site.path)?;
        let record = self.record(file, site)?;
        let function = rewrite_function(file, &record, Some(site.line), &self.tag)?;

        let text = file.text();
        let mut out = String::with_capacity(text.len() + function.text.len());
        out.push_str(&text[..record.start_byte]);
        out.push_str(&function.text);
        out.push_str(&text[record.end_byte..]);

        if !function.emitted {
            tracing::warn!(
                path = %site.path.display(),
                line = site.line,
                "operands not resolvable, statement left untouched"
            );
        }

        Ok(Instrumentation {
            path: derived_path(&site.path, site.line),
            text: out,
            emitted: function.emitted,
        })
    }

    /// Instrument `site` and write the derived file
    ///
    /// Nothing is written when the operands could not be resolved.
    pub fn instrument_to_disk(&self, site: &AssertionSite) -> FlakeResult<Instrumentation> {
        let instrumentation = self.instrument(site)?;
        if instrumentation.emitted {
            std::fs::write(&instrumentation.path, &instrumentation.text)?;
            tracing::debug!(path = %instrumentation.path.display(), "wrote instrumented file");
        }
        Ok(instrumentation)
    }

    fn record(&self, file: &SourceFile, site: &AssertionSite) -> FlakeResult<FunctionRecord> {
        let not_found = || FlakeError::InstrumentationFailure {
            path: site.path.clone(),
            line: site.line,
            reason: InstrumentationFailureKind::FunctionNotFound {
                key: function_key(&site.class, &site.function),
            },
        };

        let functions = self.lookup.file(&site.path).ok_or_else(not_found)?;
        if functions.sha256 != file.sha256() {
            return Err(FlakeError::SourceDrift {
                path: site.path.clone(),
            });
        }
        let record = functions
            .functions
            .get(&site.key())
            .copied()
            .ok_or_else(not_found)?;
        if record.end_byte > file.text().len() || record.start_byte > record.end_byte {
            return Err(not_found());
        }
        Ok(record)
    }
}

/// Text of one function, optionally with a target statement instrumented
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenFunction {
    /// Function source from `def` to the end of its body
    pub text: String,
    /// Whether emission statements were inserted
    pub emitted: bool,
}

/// Copy the function described by `record` out of `file`, instrumenting the
/// statement on `target` when given
///
/// With `target == None` the returned text equals the original definition.
pub fn rewrite_function(
    file: &SourceFile,
    record: &FunctionRecord,
    target: Option<usize>,
    tag: &str,
) -> FlakeResult<RewrittenFunction> {
    let text = file.text();
    let original = text
        .get(record.start_byte..record.end_byte)
        .unwrap_or_default()
        .to_string();

    let Some(line) = target else {
        return Ok(RewrittenFunction {
            text: original,
            emitted: false,
        });
    };

    let failure = |reason| FlakeError::InstrumentationFailure {
        path: file.path().to_path_buf(),
        line,
        reason,
    };

    let function = function_node(file, record).ok_or_else(|| {
        failure(InstrumentationFailureKind::FunctionNotFound {
            key: format!("{}..{}", record.start_byte, record.end_byte),
        })
    })?;
    if !record.contains_line(line) {
        return Err(failure(InstrumentationFailureKind::LineNotFound));
    }
    let node = target_node(text, function, line)
        .ok_or_else(|| failure(InstrumentationFailureKind::LineNotFound))?;
    let statement = enclosing_statement(node);

    let line_start = text[..statement.start_byte()]
        .rfind('\n')
        .map_or(0, |i| i + 1);
    let indent = &text[line_start..statement.start_byte()];
    if !indent.chars().all(|c| c == ' ' || c == '\t') || line_start <= record.start_byte {
        return Err(failure(InstrumentationFailureKind::SharedLine));
    }

    let Some(ops) = operands::extract(text, node) else {
        return Ok(RewrittenFunction {
            text: original,
            emitted: false,
        });
    };

    let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };
    let mut emission = String::new();
    for operand in [ops.left, ops.right] {
        emission.push_str(&emission_line(
            indent,
            tag,
            syntax::text(text, operand),
            newline,
        ));
    }

    let offset = line_start - record.start_byte;
    let mut rewritten = original;
    rewritten.insert_str(offset, &emission);
    Ok(RewrittenFunction {
        text: rewritten,
        emitted: true,
    })
}

/// One `print("\n<TAG>:", float(<expr>))` statement
#[must_use]
pub fn emission_line(indent: &str, tag: &str, expr: &str, newline: &str) -> String {
    format!("{indent}print(\"\\n{tag}:\", float({expr})){newline}")
}

fn function_node<'t>(file: &'t SourceFile, record: &FunctionRecord) -> Option<Node<'t>> {
    let mut node = file
        .root()
        .descendant_for_byte_range(record.start_byte, record.end_byte)?;
    loop {
        if node.kind() == "function_definition"
            && node.start_byte() == record.start_byte
            && node.end_byte() == record.end_byte
        {
            return Some(node);
        }
        node = node.parent()?;
    }
}

/// First assertion node in preorder starting on the 1-based `line`
fn target_node<'t>(source: &str, function: Node<'t>, line: usize) -> Option<Node<'t>> {
    let row = line.checked_sub(1)?;
    let mut stack = vec![function];
    while let Some(node) = stack.pop() {
        if node.start_position().row > row || node.end_position().row < row {
            continue;
        }
        if node.start_position().row == row {
            let recognized = match node.kind() {
                "assert_statement" => true,
                "call" => crate::mining::classify_call(source, node).is_some(),
                _ => false,
            };
            if recognized {
                return Some(node);
            }
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}

/// Outermost ancestor of `node` that is a statement of a block
fn enclosing_statement(node: Node<'_>) -> Node<'_> {
    let mut current = node;
    while let Some(parent) = current.parent() {
        if matches!(parent.kind(), "block" | "module") {
            break;
        }
        current = parent;
    }
    current
}
