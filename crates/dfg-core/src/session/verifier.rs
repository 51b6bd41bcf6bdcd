//! Verification: match a replayed log against recorded expectations.
//!
//! The first statement that verifies a never-verified expectation becomes its
//! reference: every token position where the two differ (a generated id, a
//! timestamp) is stored in `ignore_diffs`. From then on exactly those
//! positions may vary and every other token has to match.

use chrono::Utc;
use dfg_config::ExpectationOptions;
use serde::{Deserialize, Serialize};
use tracing::{error, info, trace};

use super::{write_back, SessionDeps, SessionError};
use crate::cancel::CancelToken;
use crate::log_source::LogError;
use crate::matching::Token;
use crate::model::{summary, Expectation, Testcase};
use crate::report::{build_report, Report};
use crate::store::StoreError;

/// Tokens shown when logging verification events.
const SUMMARY_TOKENS: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Collect pattern-matching lines that no expectation consumed.
    pub report_additional: bool,
}

impl From<&ExpectationOptions> for VerifyOptions {
    fn from(options: &ExpectationOptions) -> Self {
        Self {
            report_additional: options.report_additional,
        }
    }
}

/// How a verification run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    AllFulfilled,
    /// Cancelled by the caller or the log ended.
    Cancelled,
}

/// Result of a completed verification run.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub status: VerificationStatus,
    pub testcase: Testcase,
}

impl VerificationOutcome {
    pub fn report(&self) -> Report {
        build_report(&self.testcase)
    }
}

/// What happened to a statement offered to the expectations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Matched an expectation with a learned reference.
    Verified { index: usize },
    /// Became the reference of a never-verified expectation.
    Reference { index: usize },
    Unmatched,
}

/// Offer `tokens` to the first eligible expectation that accepts them.
///
/// Eligible are expectations of the same pattern not yet fulfilled in this
/// run, scanned in recording order. Length mismatches just move on.
pub fn verify_against(expectations: &mut [Expectation], tokens: &[Token], pattern: &str) -> Verdict {
    for (index, e) in expectations.iter_mut().enumerate() {
        if e.fulfilled || e.pattern != pattern {
            continue;
        }
        if e.has_reference() {
            if e.equal(tokens) {
                e.fulfilled = true;
                e.verified += 1;
                return Verdict::Verified { index };
            }
            continue;
        }
        if let Some(diff) = e.diff(tokens) {
            e.ignore_diffs = diff;
            e.fulfilled = true;
            e.verified = 1;
            return Verdict::Reference { index };
        }
    }
    Verdict::Unmatched
}

/// Runs one verification pass over a stored testcase.
pub struct Verifier {
    testcase: Testcase,
    deps: SessionDeps,
    options: VerifyOptions,
}

impl Verifier {
    pub fn new(testcase: Testcase, deps: SessionDeps, options: VerifyOptions) -> Self {
        Self {
            testcase,
            deps,
            options,
        }
    }

    /// Load the testcase `name` from the session's store.
    pub fn load(name: &str, deps: SessionDeps, options: VerifyOptions) -> Result<Self, StoreError> {
        let testcase = deps.store.read(name)?;
        Ok(Self::new(testcase, deps, options))
    }

    pub fn name(&self) -> &str {
        &self.testcase.name
    }

    pub fn testcase(&self) -> &Testcase {
        &self.testcase
    }

    /// Verify until every expectation is fulfilled or `cancel` fires, then
    /// store the updated testcase.
    pub fn run(mut self, cancel: &CancelToken) -> Result<VerificationOutcome, SessionError> {
        self.testcase.begin_verification_run(Utc::now());
        self.deps.window.start();
        info!(
            testcase = %self.testcase.name,
            run = self.testcase.verifications,
            expectations = self.testcase.expectations.len(),
            start = ?self.deps.window.start_time(),
            "verification started"
        );

        if let Err(source) = self.deps.log.seek_to_end() {
            error!(testcase = %self.testcase.name, error = %source, "cannot position log");
            return Err(SessionError::LogRead {
                source,
                persisted: false,
            });
        }

        let (status, read) = match self.verify(cancel) {
            Ok(status) => (status, Ok(())),
            Err(e) => {
                error!(testcase = %self.testcase.name, error = %e, "verification aborted");
                (VerificationStatus::Cancelled, Err(e))
            }
        };
        info!(
            testcase = %self.testcase.name,
            ?status,
            fulfilled = self.testcase.fulfilled(),
            expectations = self.testcase.expectations.len(),
            additional = self.testcase.additional_expectations.len(),
            "verification done"
        );
        let testcase = write_back(self.deps.store.as_ref(), self.testcase, read)?;
        Ok(VerificationOutcome { status, testcase })
    }

    fn verify(&mut self, cancel: &CancelToken) -> Result<VerificationStatus, LogError> {
        loop {
            if self.testcase.all_fulfilled() {
                return Ok(VerificationStatus::AllFulfilled);
            }
            if cancel.is_cancelled() {
                return Ok(VerificationStatus::Cancelled);
            }
            match self.deps.log.next_line(cancel)? {
                Some(line) => {
                    self.observe(&line);
                }
                None => return Ok(VerificationStatus::Cancelled),
            }
        }
    }

    /// Process one log line. `None` when the line was filtered out before
    /// reaching the expectations.
    pub fn observe(&mut self, line: &str) -> Option<Verdict> {
        let ts = match self.deps.log.timestamp(line) {
            Ok(ts) => ts,
            Err(e) => {
                trace!(error = %e, "skipping line without timestamp");
                return None;
            }
        };
        if !self.deps.window.matches(ts) {
            return None;
        }
        let pattern = self.deps.patterns.matching_pattern(line)?;

        let tokens = self.deps.tokenizer.tokenize(line, pattern);
        let verdict = verify_against(&mut self.testcase.expectations, &tokens, pattern.spec());
        match verdict {
            Verdict::Verified { index } => {
                info!(
                    index,
                    statement = %summary(&tokens, SUMMARY_TOKENS),
                    "expectation verified"
                );
            }
            Verdict::Reference { index } => {
                info!(
                    index,
                    ignore_diffs = ?self.testcase.expectations[index].ignore_diffs,
                    statement = %summary(&tokens, SUMMARY_TOKENS),
                    "reference expectation found"
                );
            }
            Verdict::Unmatched if self.options.report_additional => {
                let additional = Expectation::additional(tokens, pattern.spec());
                info!(
                    statement = %additional.summary(SUMMARY_TOKENS),
                    "additional expectation found"
                );
                self.testcase.additional_expectations.push(additional);
            }
            Verdict::Unmatched => {}
        }
        Some(verdict)
    }
}
