//! Verification run summaries.

use chrono::{DateTime, Utc};
use dfg_common::SCHEMA_VERSION;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{Expectation, Testcase};

/// Tokens kept per additional expectation in a report.
pub const ADDITIONAL_TOKEN_LIMIT: usize = 6;

/// Read-only summary of a testcase after a verification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub schema_version: String,
    pub testname: String,
    pub last_execution: Option<DateTime<Utc>>,
    pub expectations: usize,
    pub verifications: u32,
    pub fulfilled: usize,
    /// Mean of `verified` over all expectations; 0 without expectations.
    pub verification_mean: f64,
    pub unfulfilled: Vec<Expectation>,
    pub additional_expectations: Vec<Expectation>,
}

impl Report {
    pub fn all_fulfilled(&self) -> bool {
        self.fulfilled == self.expectations
    }
}

/// Build a report, shortening additional expectations to [`ADDITIONAL_TOKEN_LIMIT`].
pub fn build_report(testcase: &Testcase) -> Report {
    build_report_with_limit(testcase, Some(ADDITIONAL_TOKEN_LIMIT))
}

/// Build a report; `None` keeps additional expectations complete.
pub fn build_report_with_limit(testcase: &Testcase, token_limit: Option<usize>) -> Report {
    let verified_sum: u64 = testcase
        .expectations
        .iter()
        .map(|e| u64::from(e.verified))
        .sum();

    Report {
        schema_version: SCHEMA_VERSION.to_string(),
        testname: testcase.name.clone(),
        last_execution: testcase.last_execution,
        expectations: testcase.expectations.len(),
        verifications: testcase.verifications,
        fulfilled: testcase.fulfilled(),
        verification_mean: verification_mean(verified_sum, testcase.expectations.len()),
        unfulfilled: testcase.unfulfilled().cloned().collect(),
        additional_expectations: testcase
            .additional_expectations
            .iter()
            .map(|e| match token_limit {
                Some(n) => e.shorten(n),
                None => e.clone(),
            })
            .collect(),
    }
}

fn verification_mean(sum: u64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    sum as f64 / count as f64
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Testcase:          {}", self.testname)?;
        match self.last_execution {
            Some(ts) => writeln!(f, "Last execution:    {}", ts.to_rfc3339())?,
            None => writeln!(f, "Last execution:    never")?,
        }
        writeln!(f, "Verifications:     {}", self.verifications)?;
        writeln!(f, "Expectations:      {}", self.expectations)?;
        writeln!(f, "Fulfilled:         {}", self.fulfilled)?;
        writeln!(f, "Verification mean: {:.2}", self.verification_mean)?;
        if !self.unfulfilled.is_empty() {
            writeln!(f, "Unfulfilled:")?;
            for e in &self.unfulfilled {
                writeln!(f, "  - {}", e.summary(usize::MAX))?;
            }
        }
        if !self.additional_expectations.is_empty() {
            writeln!(f, "Additional:")?;
            for e in &self.additional_expectations {
                writeln!(f, "  + {}", e.summary(usize::MAX))?;
            }
        }
        Ok(())
    }
}
