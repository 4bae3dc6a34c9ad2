//! Operand extraction per assertion shape

use crate::mining::classify_call;
use crate::mining::APPROX_WRAPPERS;
use crate::syntax::{self, Call, Comparison};
use tree_sitter::Node;

/// Keywords naming the observed operand of a call assertion
pub const LEFT_KEYWORDS: &[&str] = &["first", "actual", "x", "a"];

/// Keywords naming the expected operand of a call assertion
pub const RIGHT_KEYWORDS: &[&str] = &["second", "desired", "y", "b", "expected"];

/// The two expressions fed into an assertion
#[derive(Debug, Clone, Copy)]
pub struct Operands<'t> {
    /// Observed value
    pub left: Node<'t>,
    /// Expected value
    pub right: Node<'t>,
}

/// Operands of an `assert` statement whose test is a comparison
pub fn from_assert<'t>(source: &str, node: Node<'t>) -> Option<Operands<'t>> {
    let test = syntax::named_children(node).into_iter().next()?;
    let cmp = Comparison::of(syntax::unwrap_parens(test))?;

    if cmp.single_operator() == Some("==") {
        let rhs = syntax::unwrap_parens(cmp.right());
        if let Some(call) = Call::of(rhs) {
            let is_approx = call
                .name(source)
                .is_some_and(|name| APPROX_WRAPPERS.contains(&name));
            if is_approx {
                if let Some(expected) = call.positional().first() {
                    return Some(Operands {
                        left: cmp.left(),
                        right: *expected,
                    });
                }
            }
        }
    }

    Some(Operands {
        left: cmp.left(),
        right: cmp.right(),
    })
}

/// Operands of a call assertion: first two positionals, then keyword aliases
pub fn from_call<'t>(source: &str, call: &Call<'t>) -> Option<Operands<'t>> {
    let positional = call.positional();
    if let [left, right, ..] = positional.as_slice() {
        return Some(Operands {
            left: *left,
            right: *right,
        });
    }

    let left = positional
        .first()
        .copied()
        .or_else(|| call.keyword(source, LEFT_KEYWORDS))?;
    let right = call.keyword(source, RIGHT_KEYWORDS)?;
    Some(Operands { left, right })
}

/// Operands of whatever recognized assertion `node` is
pub fn extract<'t>(source: &str, node: Node<'t>) -> Option<Operands<'t>> {
    match node.kind() {
        "assert_statement" => from_assert(source, node),
        "call" => classify_call(source, node)
            .and_then(|_| Call::of(node))
            .and_then(|call| from_call(source, &call)),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::source_index::SourceFile;

    fn first<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
        if node.kind() == kind {
            return Some(node);
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
        children.into_iter().find_map(|child| first(child, kind))
    }

    fn operands(src: &str, kind: &str) -> Option<(String, String)> {
        let file = SourceFile::parse("t.py", src).unwrap();
        let node = first(file.root(), kind).unwrap();
        extract(file.text(), node).map(|ops| {
            (
                file.node_text(ops.left).to_string(),
                file.node_text(ops.right).to_string(),
            )
        })
    }

    fn pair(left: &str, right: &str) -> Option<(String, String)> {
        Some((left.to_string(), right.to_string()))
    }

    #[test]
    fn test_generic_comparison() {
        assert_eq!(
            operands("assert (err(a, b) <= 1e-3)\n", "assert_statement"),
            pair("err(a, b)", "1e-3")
        );
    }

    #[test]
    fn test_approx_takes_first_argument() {
        assert_eq!(
            operands(
                "assert y == pytest.approx(2.0, rel=1e-3)\n",
                "assert_statement"
            ),
            pair("y", "2.0")
        );
    }

    #[test]
    fn test_approx_without_positional_falls_back_to_call() {
        assert_eq!(
            operands("assert y == approx(expected=2.0)\n", "assert_statement"),
            pair("y", "approx(expected=2.0)")
        );
    }

    #[test]
    fn test_call_positional() {
        assert_eq!(
            operands("self.assertLess(loss, 0.5, msg='x')\n", "call"),
            pair("loss", "0.5")
        );
    }

    #[test]
    fn test_call_keyword_aliases() {
        assert_eq!(
            operands("np.testing.assert_allclose(actual=a1, desired=d1)\n", "call"),
            pair("a1", "d1")
        );
        assert_eq!(
            operands("assert_close(out, expected=ref)\n", "call"),
            pair("out", "ref")
        );
        assert_eq!(
            operands("tf.assertAllClose(x=p, y=q)\n", "call"),
            pair("p", "q")
        );
    }

    #[test]
    fn test_call_unresolved() {
        assert_eq!(operands("np.testing.assert_allclose(a1)\n", "call"), None);
        assert_eq!(operands("assert_close(*pair)\n", "call"), None);
    }
}
