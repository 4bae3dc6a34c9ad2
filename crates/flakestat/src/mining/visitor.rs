//! Scope-tracking traversal of one syntax tree
//!
//! The enclosing class and function travel with each pending node instead
//! of living in visitor fields, so sibling scopes never observe each
//! other's context.

use super::catalog::{function_key, AssertionSite, FunctionRecord};
use super::idiom::{self, AssertionIdiom};
use crate::source_index::SourceFile;
use crate::syntax;
use std::collections::BTreeMap;
use tree_sitter::Node;

/// Enclosing definitions of a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scope<'s> {
    /// Innermost class name, empty at module scope
    pub class: &'s str,
    /// Innermost function name, empty outside functions
    pub function: &'s str,
}

/// Everything found in one file
#[derive(Debug, Clone, Default)]
pub struct Visit {
    /// Sites in preorder
    pub sites: Vec<AssertionSite>,
    /// Function definitions by `Class.function` key
    pub functions: BTreeMap<String, FunctionRecord>,
}

/// Walk `file` in preorder and collect assertion sites and function records
pub fn visit(file: &SourceFile) -> Visit {
    let source = file.text();
    let mut out = Visit::default();
    let mut stack: Vec<(Node<'_>, Scope<'_>)> = vec![(file.root(), Scope::default())];

    while let Some((node, scope)) = stack.pop() {
        let inner = match node.kind() {
            "class_definition" => enter_class(source, node, scope),
            "function_definition" => enter_function(source, node, scope, &mut out.functions),
            "assert_statement" => {
                if let Some((idiom, snippet)) = idiom::classify_assert(source, node) {
                    out.sites.push(site(file, node, scope, idiom, snippet));
                }
                scope
            }
            "call" => {
                if let Some(idiom) = idiom::classify_call(source, node) {
                    let snippet = syntax::text(source, node).to_string();
                    out.sites.push(site(file, node, scope, idiom, snippet));
                }
                scope
            }
            _ => scope,
        };

        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev().map(|child| (child, inner)));
    }

    out
}

fn enter_class<'s>(source: &'s str, node: Node<'_>, scope: Scope<'s>) -> Scope<'s> {
    match node.child_by_field_name("name") {
        Some(name) => Scope {
            class: syntax::text(source, name),
            ..scope
        },
        None => scope,
    }
}

fn enter_function<'s>(
    source: &'s str,
    node: Node<'_>,
    scope: Scope<'s>,
    functions: &mut BTreeMap<String, FunctionRecord>,
) -> Scope<'s> {
    let Some(name) = node.child_by_field_name("name") else {
        return scope;
    };
    let name = syntax::text(source, name);
    let key = function_key(scope.class, name);
    let record = FunctionRecord {
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
        start_line: syntax::start_line(node),
        end_line: node.end_position().row + 1,
    };

    if let Some(shadowed) = functions.insert(key.clone(), record) {
        tracing::debug!(
            %key,
            line = record.start_line,
            shadowed = shadowed.start_line,
            "later definition replaces earlier one"
        );
    }

    Scope {
        function: name,
        ..scope
    }
}

fn site(
    file: &SourceFile,
    node: Node<'_>,
    scope: Scope<'_>,
    idiom: AssertionIdiom,
    snippet: String,
) -> AssertionSite {
    let site = AssertionSite {
        path: file.path().to_path_buf(),
        class: scope.class.to_string(),
        function: scope.function.to_string(),
        idiom,
        line: syntax::start_line(node),
        snippet,
    };
    tracing::debug!(
        path = %site.path.display(),
        line = site.line,
        idiom = %site.idiom,
        "assertion site"
    );
    site
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const NESTED: &str = "\
import numpy as np

class TestOuter:
    def test_a(self):
        assert self.value() < 1.0

    class Inner:
        def test_b(self):
            np.testing.assert_allclose(a, b)

    def test_c(self):
        self.assertLess(x, 3)

def test_free():
    def helper():
        assert_close(p, q)
    assert y == approx(2)
";

    #[test]
    fn test_scopes_restore_between_siblings() {
        let file = SourceFile::parse("t.py", NESTED).unwrap();
        let visit = visit(&file);
        let found: Vec<(&str, &str, AssertionIdiom, usize)> = visit
            .sites
            .iter()
            .map(|s| (s.class.as_str(), s.function.as_str(), s.idiom, s.line))
            .collect();

        assert_eq!(
            found,
            vec![
                ("TestOuter", "test_a", AssertionIdiom::ThresholdCompare, 5),
                ("Inner", "test_b", AssertionIdiom::ArrayAlmostEqual, 9),
                ("TestOuter", "test_c", AssertionIdiom::AssertMethodCompare, 12),
                ("", "helper", AssertionIdiom::CustomClose, 16),
                ("", "test_free", AssertionIdiom::ApproxEquality, 17),
            ]
        );
    }

    #[test]
    fn test_function_records() {
        let file = SourceFile::parse("t.py", NESTED).unwrap();
        let visit = visit(&file);
        let keys: Vec<&str> = visit.functions.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                ".helper",
                ".test_free",
                "Inner.test_b",
                "TestOuter.test_a",
                "TestOuter.test_c"
            ]
        );

        let free = visit.functions[".test_free"];
        assert_eq!(free.start_line, 14);
        assert_eq!(free.end_line, 17);
        assert!(file.text()[free.start_byte..].starts_with("def test_free"));
    }

    #[test]
    fn test_duplicate_function_last_wins() {
        let src = "def test_x():\n    assert a < 1\n\ndef test_x():\n    assert b < 2\n";
        let file = SourceFile::parse("t.py", src).unwrap();
        let visit = visit(&file);
        assert_eq!(visit.functions[".test_x"].start_line, 4);
        assert_eq!(visit.functions[".test_x"].end_line, 5);
        assert_eq!(visit.sites.len(), 2);
    }

    #[test]
    fn test_module_scope_site() {
        let file = SourceFile::parse("t.py", "assert RATE > 0\n").unwrap();
        let visit = visit(&file);
        assert_eq!(visit.sites.len(), 1);
        assert_eq!(visit.sites[0].class, "");
        assert_eq!(visit.sites[0].function, "");
    }

    #[test]
    fn test_unrecognized_shapes_skipped() {
        let src = "def test_x():\n    assert a\n    assert a is not None\n    foo(a, b)\n";
        let file = SourceFile::parse("t.py", src).unwrap();
        assert!(visit(&file).sites.is_empty());
    }
}
