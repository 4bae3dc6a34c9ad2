//! Output Decoder
//!
//! Recovers `(observed, expected)` pairs from a trial's stdout. The number
//! of pairs is checked against pytest's own `N passed` / `N failed` tally;
//! every mismatch is a [`FlakeError::ProtocolViolation`].

use crate::result::{FlakeError, FlakeResult};
use regex::Regex;
use serde::{Deserialize, Serialize};

const ANSI_PATTERN: &str = r"\x1b\[[0-9;]*m";
const NUMBER_PATTERN: &str = r"[-+]?(?:\d*\.\d+|\d+)(?:[eE][-+]?\d+)?";

/// One observed value and the expected value it was compared against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuePair {
    /// Value produced by the test
    pub observed: f64,
    /// Value it was asserted against
    pub expected: f64,
}

/// Parses tagged lines out of captured stdout
#[derive(Debug, Clone)]
pub struct OutputDecoder {
    tag: String,
    ansi: Regex,
    number: Regex,
    passed: Regex,
    failed: Regex,
}

impl OutputDecoder {
    /// Create a decoder for `<tag>:` lines
    pub fn new(tag: &str) -> FlakeResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| FlakeError::config(format!("bad pattern: {e}")))
        };
        Ok(Self {
            tag: format!("{tag}:"),
            ansi: compile(ANSI_PATTERN)?,
            number: compile(NUMBER_PATTERN)?,
            passed: compile(r"(\d+)\s+passed")?,
            failed: compile(r"(\d+)\s+failed")?,
        })
    }

    /// Marker searched for, including the trailing colon
    #[must_use]
    pub fn marker(&self) -> &str {
        &self.tag
    }

    fn strip<'a>(&self, line: &'a str) -> std::borrow::Cow<'a, str> {
        self.ansi.replace_all(line, "")
    }

    /// Tests pytest reports as passed plus failed
    #[must_use]
    pub fn expected_pairs(&self, stdout: &[String]) -> usize {
        let full = stdout
            .iter()
            .map(|line| self.strip(line).into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        let count = |re: &Regex| {
            re.captures(&full)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<usize>().ok())
                .unwrap_or(0)
        };
        count(&self.passed) + count(&self.failed)
    }

    /// Values of every tagged line, in order
    pub fn tagged_values(&self, stdout: &[String]) -> FlakeResult<Vec<f64>> {
        let mut values = Vec::new();
        for line in stdout {
            let text = self.strip(line);
            let Some(pos) = text.find(&self.tag) else {
                continue;
            };
            let rest = &text[pos + self.tag.len()..];
            let matches: Vec<&str> = self.number.find_iter(rest).map(|m| m.as_str()).collect();
            let [raw] = matches.as_slice() else {
                return Err(FlakeError::protocol(format!(
                    "expected exactly one value on tagged line: {}",
                    line.trim()
                )));
            };
            let value = raw.parse::<f64>().map_err(|e| {
                FlakeError::protocol(format!("unparsable value `{raw}`: {e}"))
            })?;
            values.push(value);
        }
        Ok(values)
    }

    /// Decode and validate the pair list of one trial
    ///
    /// # Errors
    ///
    /// [`FlakeError::ProtocolViolation`] when pytest reports no tests, a
    /// tagged line carries other than one number, the value count is odd,
    /// or the pair count differs from the reported test count.
    pub fn decode(&self, stdout: &[String]) -> FlakeResult<Vec<ValuePair>> {
        let expected = self.expected_pairs(stdout);
        if expected == 0 {
            return Err(FlakeError::protocol(
                "pytest reported no passed or failed tests",
            ));
        }

        let values = self.tagged_values(stdout)?;
        if values.len() % 2 != 0 {
            return Err(FlakeError::protocol(format!(
                "odd number of tagged values ({})",
                values.len()
            )));
        }

        let pairs: Vec<ValuePair> = values
            .chunks_exact(2)
            .map(|pair| ValuePair {
                observed: pair[0],
                expected: pair[1],
            })
            .collect();
        if pairs.len() != expected {
            return Err(FlakeError::protocol(format!(
                "expected {expected} pairs, parsed {}",
                pairs.len()
            )));
        }
        Ok(pairs)
    }
}
