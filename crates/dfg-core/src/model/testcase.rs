//! A named, recorded interaction scenario.

use chrono::{DateTime, Utc};
use dfg_common::SCHEMA_VERSION;
use serde::{Deserialize, Serialize};

use super::expectation::Expectation;

/// Expectations in recording order plus verification run metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Testcase {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    pub name: String,

    /// Recording order; earlier expectations win ties during verification.
    #[serde(default)]
    pub expectations: Vec<Expectation>,

    /// Pattern-matching statements of the current run that no expectation consumed.
    #[serde(default)]
    pub additional_expectations: Vec<Expectation>,

    #[serde(default)]
    pub verifications: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execution: Option<DateTime<Utc>>,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl Testcase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema_version: default_schema_version(),
            name: name.into(),
            expectations: Vec::new(),
            additional_expectations: Vec::new(),
            verifications: 0,
            last_execution: None,
        }
    }

    /// Reset per-run state before a verification run.
    ///
    /// Learned state (`verified`, `ignore_diffs`) is kept.
    pub fn begin_verification_run(&mut self, now: DateTime<Utc>) {
        self.verifications += 1;
        self.last_execution = Some(now);
        self.additional_expectations.clear();
        for e in &mut self.expectations {
            e.fulfilled = false;
        }
    }

    /// Number of fulfilled expectations.
    pub fn fulfilled(&self) -> usize {
        self.expectations.iter().filter(|e| e.fulfilled).count()
    }

    /// The expectations not fulfilled in the current run.
    pub fn unfulfilled(&self) -> impl Iterator<Item = &Expectation> {
        self.expectations.iter().filter(|e| !e.fulfilled)
    }

    /// True when every expectation is fulfilled (vacuously for none).
    pub fn all_fulfilled(&self) -> bool {
        self.expectations.iter().all(|e| e.fulfilled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn testcase() -> Testcase {
        let mut tc = Testcase::new("create-job");
        for i in 0..3 {
            let mut e = Expectation::recorded(
                format!("id-{i}").as_str().into(),
                vec!["insert".into(), format!("({i})")],
                "insert",
            );
            e.fulfilled = i != 1;
            e.verified = 2;
            e.ignore_diffs = BTreeSet::from([1]);
            tc.expectations.push(e);
        }
        tc.additional_expectations
            .push(Expectation::additional(vec!["insert".into()], "insert"));
        tc
    }

    #[test]
    fn test_counts() {
        let tc = testcase();
        assert_eq!(tc.fulfilled(), 2);
        assert_eq!(tc.unfulfilled().count(), 1);
        assert!(!tc.all_fulfilled());
        assert!(Testcase::new("empty").all_fulfilled());
    }

    #[test]
    fn test_begin_run_resets_run_state_only() {
        let mut tc = testcase();
        let now = Utc::now();
        tc.begin_verification_run(now);
        assert_eq!(tc.verifications, 1);
        assert_eq!(tc.last_execution, Some(now));
        assert!(tc.additional_expectations.is_empty());
        assert_eq!(tc.fulfilled(), 0);
        assert!(tc.expectations.iter().all(|e| e.verified == 2));
        assert!(tc
            .expectations
            .iter()
            .all(|e| e.ignore_diffs == BTreeSet::from([1])));
    }

    #[test]
    fn test_json_round_trip_keeps_learned_state() {
        let tc = testcase();
        let json = serde_json::to_string(&tc).unwrap();
        assert!(json.contains("\"additionalExpectations\""));
        assert!(json.contains("\"schemaVersion\""));
        let back: Testcase = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tc);
    }

    #[test]
    fn test_minimal_json_gets_defaults() {
        let tc: Testcase = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert_eq!(tc.schema_version, SCHEMA_VERSION);
        assert!(tc.expectations.is_empty());
        assert_eq!(tc.verifications, 0);
    }
}
