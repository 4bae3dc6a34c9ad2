//! Assertion idioms and their classification rules
//!
//! | Tag | Trigger |
//! |-----|---------|
//! | `threshold-compare` | `assert x <op> <literal>` with `op` in `< > <= >=` |
//! | `approx-equality` | `assert x == approx(...)` (bare or qualified `approx`) |
//! | `assert-method-compare` | `assertGreater`/`assertGreaterEqual`/`assertLess`/`assertLessEqual` |
//! | `array-almost-equal` | numpy-style checks called through a `.testing.` qualifier |
//! | `framework-allclose` | `tf.assertAllClose(...)` |
//! | `custom-close` | `assert_close(...)` helper |
//!
//! Anything else is skipped without error.

use crate::syntax::{self, Call, Comparison};
use serde::{Deserialize, Serialize};
use tree_sitter::Node;

/// Names accepted as approximate-equality wrappers
pub const APPROX_WRAPPERS: &[&str] = &["approx"];

/// Test-case inequality methods
pub const ASSERT_METHODS: &[&str] = &[
    "assertGreater",
    "assertGreaterEqual",
    "assertLess",
    "assertLessEqual",
];

/// Array comparison helpers recognized under a `.testing.` qualifier
pub const ARRAY_ALMOST_METHODS: &[&str] = &[
    "assert_almost_equal",
    "assert_approx_equal",
    "assert_array_almost_equal",
    "assert_allclose",
    "assert_array_less",
];

/// Qualifier segment required in front of [`ARRAY_ALMOST_METHODS`]
pub const TESTING_QUALIFIER: &str = "testing";

/// Close-comparison method of the framework session object
pub const FRAMEWORK_ALLCLOSE: &str = "assertAllClose";

/// Alias the framework session object is imported under
pub const FRAMEWORK_ALIAS: &str = "tf";

/// Project-specific close-comparison helpers
pub const CUSTOM_CLOSE_HELPERS: &[&str] = &["assert_close"];

const THRESHOLD_OPERATORS: &[&str] = &["<", ">", "<=", ">="];

/// A recognized assertion calling convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssertionIdiom {
    /// `assert x < 5.0`
    ThresholdCompare,
    /// `assert x == pytest.approx(y)`
    ApproxEquality,
    /// `self.assertLess(x, y)`
    AssertMethodCompare,
    /// `np.testing.assert_allclose(x, y)`
    ArrayAlmostEqual,
    /// `tf.assertAllClose(x, y)`
    FrameworkAllclose,
    /// `assert_close(x, y)`
    CustomClose,
}

impl AssertionIdiom {
    /// Every idiom in catalog order
    pub const ALL: [Self; 6] = [
        Self::ThresholdCompare,
        Self::ApproxEquality,
        Self::AssertMethodCompare,
        Self::ArrayAlmostEqual,
        Self::FrameworkAllclose,
        Self::CustomClose,
    ];

    /// Catalog tag
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::ThresholdCompare => "threshold-compare",
            Self::ApproxEquality => "approx-equality",
            Self::AssertMethodCompare => "assert-method-compare",
            Self::ArrayAlmostEqual => "array-almost-equal",
            Self::FrameworkAllclose => "framework-allclose",
            Self::CustomClose => "custom-close",
        }
    }
}

impl std::fmt::Display for AssertionIdiom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl std::str::FromStr for AssertionIdiom {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|idiom| idiom.tag() == s)
            .ok_or_else(|| format!("unknown assertion idiom `{s}`"))
    }
}

/// Whether `call` is a bare or attribute-qualified `approx(...)`
pub fn is_approx_call(source: &str, call: &Call<'_>) -> bool {
    call.name(source)
        .is_some_and(|name| APPROX_WRAPPERS.contains(&name))
}

/// Classify an `assert_statement`; returns the idiom and its catalog snippet
pub fn classify_assert(source: &str, node: Node<'_>) -> Option<(AssertionIdiom, String)> {
    let test = syntax::named_children(node).into_iter().next()?;
    let cmp = Comparison::of(syntax::unwrap_parens(test))?;
    let op = cmp.single_operator()?;

    if THRESHOLD_OPERATORS.contains(&op) && syntax::is_literal_constant(cmp.right()) {
        return Some((
            AssertionIdiom::ThresholdCompare,
            syntax::text(source, node).to_string(),
        ));
    }

    if op == "==" {
        let rhs = syntax::unwrap_parens(cmp.right());
        if let Some(call) = Call::of(rhs) {
            if is_approx_call(source, &call) {
                let snippet = format!(
                    "{} == {}",
                    syntax::text(source, cmp.left()),
                    syntax::text(source, rhs)
                );
                return Some((AssertionIdiom::ApproxEquality, snippet));
            }
        }
    }

    None
}

/// Classify a `call` expression
pub fn classify_call(source: &str, node: Node<'_>) -> Option<AssertionIdiom> {
    let call = Call::of(node)?;
    let name = call.name(source)?;

    if ASSERT_METHODS.contains(&name) {
        return Some(AssertionIdiom::AssertMethodCompare);
    }

    if ARRAY_ALMOST_METHODS.contains(&name) {
        let qualified = call.owner().is_some_and(|owner| {
            owner.kind() == "attribute"
                && owner
                    .child_by_field_name("attribute")
                    .is_some_and(|attr| syntax::text(source, attr) == TESTING_QUALIFIER)
        });
        return qualified.then_some(AssertionIdiom::ArrayAlmostEqual);
    }

    if name == FRAMEWORK_ALLCLOSE {
        let owned = call.owner().is_some_and(|owner| {
            owner.kind() == "identifier" && syntax::text(source, owner) == FRAMEWORK_ALIAS
        });
        return owned.then_some(AssertionIdiom::FrameworkAllclose);
    }

    if CUSTOM_CLOSE_HELPERS.contains(&name) {
        return Some(AssertionIdiom::CustomClose);
    }

    None
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

    fn assert_idiom(source: &str) -> Option<AssertionIdiom> {
        let file = SourceFile::parse("t.py", source).unwrap();
        let node = first(file.root(), "assert_statement")?;
        classify_assert(file.text(), node).map(|(idiom, _)| idiom)
    }

    fn call_idiom(source: &str) -> Option<AssertionIdiom> {
        let file = SourceFile::parse("t.py", source).unwrap();
        let node = first(file.root(), "call")?;
        classify_call(file.text(), node)
    }

    mod assert_rules {
        use super::*;

        #[test]
        fn test_threshold_against_literal() {
            for src in [
                "assert x < 5.0\n",
                "assert x > 1\n",
                "assert (err <= 1e-3)\n",
                "assert loss >= -0.5\n",
            ] {
                assert_eq!(
                    assert_idiom(src),
                    Some(AssertionIdiom::ThresholdCompare),
                    "{src}"
                );
            }
        }

        #[test]
        fn test_threshold_requires_literal_rhs() {
            assert_eq!(assert_idiom("assert x < limit\n"), None);
            assert_eq!(assert_idiom("assert x == 5\n"), None);
            assert_eq!(assert_idiom("assert 0 < x < 1\n"), None);
        }

        #[test]
        fn test_approx_bare_and_qualified() {
            assert_eq!(
                assert_idiom("assert y == approx(2.0)\n"),
                Some(AssertionIdiom::ApproxEquality)
            );
            assert_eq!(
                assert_idiom("assert y == pytest.approx(2.0, rel=1e-2)\n"),
                Some(AssertionIdiom::ApproxEquality)
            );
            assert_eq!(assert_idiom("assert y == close(2.0)\n"), None);
        }

        #[test]
        fn test_approx_snippet_shape() {
            let file = SourceFile::parse("t.py", "assert  y ==  pytest.approx(2.0)\n").unwrap();
            let node = first(file.root(), "assert_statement").unwrap();
            let (_, snippet) = classify_assert(file.text(), node).unwrap();
            assert_eq!(snippet, "y == pytest.approx(2.0)");
        }
    }

    mod call_rules {
        use super::*;

        #[test]
        fn test_assert_methods() {
            assert_eq!(
                call_idiom("self.assertLess(a, 1)\n"),
                Some(AssertionIdiom::AssertMethodCompare)
            );
            assert_eq!(
                call_idiom("assertGreaterEqual(a, 1)\n"),
                Some(AssertionIdiom::AssertMethodCompare)
            );
            assert_eq!(call_idiom("self.assertTrue(a)\n"), None);
        }

        #[test]
        fn test_array_almost_requires_testing_qualifier() {
            assert_eq!(
                call_idiom("np.testing.assert_allclose(a, b)\n"),
                Some(AssertionIdiom::ArrayAlmostEqual)
            );
            assert_eq!(
                call_idiom("numpy.testing.assert_array_less(a, b)\n"),
                Some(AssertionIdiom::ArrayAlmostEqual)
            );
            assert_eq!(call_idiom("torch.assert_allclose(a, b)\n"), None);
            assert_eq!(call_idiom("assert_allclose(a, b)\n"), None);
            assert_eq!(call_idiom("testing.assert_allclose(a, b)\n"), None);
        }

        #[test]
        fn test_framework_allclose_owner() {
            assert_eq!(
                call_idiom("tf.assertAllClose(a, b)\n"),
                Some(AssertionIdiom::FrameworkAllclose)
            );
            assert_eq!(call_idiom("self.assertAllClose(a, b)\n"), None);
        }

        #[test]
        fn test_custom_close() {
            assert_eq!(
                call_idiom("assert_close(a, b)\n"),
                Some(AssertionIdiom::CustomClose)
            );
            assert_eq!(
                call_idiom("helpers.assert_close(a, b)\n"),
                Some(AssertionIdiom::CustomClose)
            );
        }
    }

    #[test]
    fn test_tag_roundtrip() {
        for idiom in AssertionIdiom::ALL {
            assert_eq!(idiom.tag().parse::<AssertionIdiom>().unwrap(), idiom);
        }
        assert!("nonsense".parse::<AssertionIdiom>().is_err());
    }
}
