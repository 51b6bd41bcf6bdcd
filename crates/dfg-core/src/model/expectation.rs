//! A recorded statement template with learned tolerance.

use dfg_common::ExpectationId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::matching::Token;

/// One expected statement.
///
/// `tokens` and `uuid` are fixed at recording time. Verification only touches
/// `fulfilled`, `verified` and `ignore_diffs`, and `ignore_diffs` is only ever
/// non-empty once `verified > 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expectation {
    /// Absent for additional expectations, which are never recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<ExpectationId>,

    pub tokens: Vec<Token>,

    /// Spec of the pattern that selected the statement.
    pub pattern: String,

    /// Token positions allowed to differ, learned on the first verification.
    #[serde(default)]
    pub ignore_diffs: BTreeSet<usize>,

    /// Matched during the current verification run.
    #[serde(default)]
    pub fulfilled: bool,

    /// Number of verification runs that matched this expectation.
    #[serde(default)]
    pub verified: u32,
}

impl Expectation {
    /// A freshly recorded expectation.
    pub fn recorded(uuid: ExpectationId, tokens: Vec<Token>, pattern: impl Into<String>) -> Self {
        Self {
            uuid: Some(uuid),
            tokens,
            pattern: pattern.into(),
            ignore_diffs: BTreeSet::new(),
            fulfilled: false,
            verified: 0,
        }
    }

    /// A statement seen during verification that no expectation consumed.
    pub fn additional(tokens: Vec<Token>, pattern: impl Into<String>) -> Self {
        Self {
            uuid: None,
            tokens,
            pattern: pattern.into(),
            ignore_diffs: BTreeSet::new(),
            fulfilled: false,
            verified: 0,
        }
    }

    /// Whether a reference diff has been learned.
    pub fn has_reference(&self) -> bool {
        self.verified > 0
    }

    /// Positional equality tolerating the learned ignore positions.
    pub fn equal(&self, tokens: &[Token]) -> bool {
        if tokens.len() != self.tokens.len() {
            return false;
        }
        let mut equal = true;
        for (index, (expected, actual)) in self.tokens.iter().zip(tokens).enumerate() {
            if expected == actual {
                continue;
            }
            let allowed = self.ignore_diffs.contains(&index);
            debug!(index, expected = %expected, actual = %actual, allowed, "deviate");
            if !allowed {
                equal = false;
            }
        }
        equal
    }

    /// Every position where `tokens` differs, or `None` when lengths differ.
    pub fn diff(&self, tokens: &[Token]) -> Option<BTreeSet<usize>> {
        if tokens.len() != self.tokens.len() {
            return None;
        }
        Some(
            self.tokens
                .iter()
                .zip(tokens)
                .enumerate()
                .filter(|(_, (expected, actual))| expected != actual)
                .map(|(index, _)| index)
                .collect(),
        )
    }

    /// Copy keeping only the first `n` tokens, for compact display.
    pub fn shorten(&self, n: usize) -> Self {
        let mut short = self.clone();
        short.tokens.truncate(n);
        short
    }

    pub fn summary(&self, n: usize) -> String {
        summary(&self.tokens, n)
    }
}

/// The first `n` tokens space-joined, with `...` when truncated.
pub fn summary(tokens: &[Token], n: usize) -> String {
    let mut s = tokens
        .iter()
        .take(n)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");
    if tokens.len() > n {
        s.push_str(" ...");
    }
    s
}
