//! Session lifecycle tests: threads, cancellation, write-back.
//!
//! Sessions run on their own thread against a `MemoryLog`, so every test
//! drives exactly the same loop the CLI runs against a file.

use chrono::{TimeZone, Utc};
use dfg_common::SequentialIdProvider;
use dfg_config::TimestampFormat;
use dfg_core::log_source::{MemoryLog, MemoryLogWriter};
use dfg_core::matching::{PatternSet, StatementTokenizer};
use dfg_core::session::{
    spawn_recording, spawn_verification, Recorder, SessionDeps, SessionError,
    VerificationStatus, Verifier, VerifyOptions,
};
use dfg_core::store::{MemoryTestcaseStore, TestcaseStore};
use dfg_core::window::SessionWindow;
use dfg_core::{build_report, Testcase};
use std::collections::BTreeSet;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// ============================================================================
// Helpers
// ============================================================================

const PATTERNS: &[&str] = &["insert", "update!password"];

fn deps(store: &Arc<MemoryTestcaseStore>) -> (SessionDeps, MemoryLogWriter) {
    let (log, writer) = MemoryLog::new(TimestampFormat::Rfc3339);
    let deps = SessionDeps {
        log: Box::new(log.keep_backlog()),
        window: Box::new(SessionWindow::fixed(
            Utc.with_ymd_and_hms(2024, 2, 13, 10, 0, 0).unwrap(),
        )),
        patterns: Box::new(PatternSet::new(PATTERNS)),
        tokenizer: Box::new(StatementTokenizer),
        store: store.clone(),
    };
    (deps, writer)
}

fn wait_for(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(2));
    }
}

fn record(store: &Arc<MemoryTestcaseStore>, name: &str, lines: &[&str]) -> Testcase {
    let (deps, writer) = deps(store);
    let recorder = Recorder::new(name, deps, Box::new(SequentialIdProvider::new(name)));
    let handle = spawn_recording(recorder).unwrap();
    writer.push_all(lines.iter().copied());
    wait_for("recorder to drain the log", || writer.pending() == 0);
    handle.stop().unwrap()
}

const RECORDED: &[&str] = &[
    "2024-02-13T09:59:59Z\tinsert into audit values (0)",
    "2024-02-13T10:00:01Z\tinsert into jobs values (1, 'nightly build')",
    "2024-02-13T10:00:02Z\tselect * from jobs",
    "2024-02-13T10:00:03Z\tupdate users set password = 'x'",
    "2024-02-13T10:00:04Z\tupdate jobs set state = 'done' where id = 1",
];

// ============================================================================
// Recording
// ============================================================================

#[test]
fn test_cancel_writes_back_exactly_once() {
    let store = Arc::new(MemoryTestcaseStore::new());
    let tc = record(&store, "create-job", RECORDED);

    assert_eq!(store.writes(), 1);
    assert_eq!(tc.expectations.len(), 2);
    assert_eq!(store.read("create-job").unwrap(), tc);
}

#[test]
fn test_recording_keeps_arrival_order_and_distinct_ids() {
    let store = Arc::new(MemoryTestcaseStore::new());
    let tc = record(&store, "create-job", RECORDED);

    let patterns: Vec<_> = tc.expectations.iter().map(|e| e.pattern.as_str()).collect();
    assert_eq!(patterns, ["insert", "update!password"]);
    assert_eq!(
        tc.expectations[0].tokens,
        ["insert", "into", "jobs", "values", "(1,", "nightly build)"]
    );
    let ids: BTreeSet<_> = tc.expectations.iter().map(|e| e.uuid.clone()).collect();
    assert_eq!(ids.len(), 2);
    assert!(tc.expectations.iter().all(|e| e.verified == 0 && !e.fulfilled));
}

#[test]
fn test_cancel_without_new_lines_still_completes() {
    let store = Arc::new(MemoryTestcaseStore::new());
    let (deps, _writer) = deps(&store);
    let handle = spawn_recording(Recorder::new("idle", deps, Box::new(SequentialIdProvider::default()))).unwrap();
    thread::sleep(Duration::from_millis(20));
    assert!(!handle.is_finished());

    let tc = handle.stop().unwrap();
    assert!(tc.expectations.is_empty());
    assert_eq!(store.writes(), 1);
}

#[test]
fn test_broken_log_persists_progress_and_reports_failure() {
    let store = Arc::new(MemoryTestcaseStore::new());
    let (deps, writer) = deps(&store);
    writer.push("2024-02-13T10:00:01Z\tinsert into jobs values (1)");
    writer.fail(io::ErrorKind::UnexpectedEof);
    writer.push("2024-02-13T10:00:02Z\tinsert into jobs values (2)");

    let handle = spawn_recording(Recorder::new("broken", deps, Box::new(SequentialIdProvider::default()))).unwrap();
    let err = handle.join().unwrap_err();

    assert!(matches!(err, SessionError::LogRead { persisted: true, .. }));
    assert_eq!(store.writes(), 1);
    assert_eq!(store.read("broken").unwrap().expectations.len(), 1);
}

// ============================================================================
// Verification
// ============================================================================

#[test]
fn test_two_runs_learn_then_enforce_reference() {
    let store = Arc::new(MemoryTestcaseStore::new());
    record(&store, "create-job", RECORDED);

    // First run: the generated id differs and becomes the learned tolerance.
    let (d, writer) = deps(&store);
    writer.push_all([
        "2024-02-13T11:00:01Z\tinsert into jobs values (7, 'nightly build')",
        "2024-02-13T11:00:02Z\tupdate jobs set state = 'done' where id = 7",
    ]);
    let verifier = Verifier::load("create-job", d, VerifyOptions::default()).unwrap();
    let outcome = spawn_verification(verifier).unwrap().join().unwrap();
    assert_eq!(outcome.status, VerificationStatus::AllFulfilled);
    let tc = &outcome.testcase;
    assert_eq!(tc.expectations[0].ignore_diffs, BTreeSet::from([4]));
    assert_eq!(tc.expectations[1].ignore_diffs, BTreeSet::from([9]));
    assert_eq!(tc.verifications, 1);

    // Second run: a changed name is outside the learned positions.
    let (d, writer) = deps(&store);
    writer.push_all([
        "2024-02-13T12:00:01Z\tinsert into jobs values (8, 'weekly build')",
        "2024-02-13T12:00:02Z\tupdate jobs set state = 'done' where id = 8",
    ]);
    let verifier = Verifier::load("create-job", d, VerifyOptions::default()).unwrap();
    let handle = spawn_verification(verifier).unwrap();
    wait_for("verifier to drain the log", || writer.pending() == 0);
    let outcome = handle.stop().unwrap();

    assert_eq!(outcome.status, VerificationStatus::Cancelled);
    let report = outcome.report();
    assert_eq!(report.verifications, 2);
    assert_eq!(report.fulfilled, 1);
    assert_eq!(report.unfulfilled.len(), 1);
    assert_eq!(report.unfulfilled[0].pattern, "insert");
    assert_eq!(report.verification_mean, 1.5);
    assert_eq!(store.read("create-job").unwrap(), outcome.testcase);
}

#[test]
fn test_all_fulfilled_stops_before_remaining_lines() {
    let store = Arc::new(MemoryTestcaseStore::new());
    record(&store, "create-job", RECORDED);
    let writes_before = store.writes();

    let (d, writer) = deps(&store);
    writer.push_all([
        "2024-02-13T11:00:01Z\tinsert into jobs values (7, 'nightly build')",
        "2024-02-13T11:00:02Z\tupdate jobs set state = 'done' where id = 7",
        "2024-02-13T11:00:03Z\tinsert into jobs values (8, 'nightly build')",
        "2024-02-13T11:00:04Z\tinsert into jobs values (9, 'nightly build')",
    ]);
    let verifier = Verifier::load("create-job", d, VerifyOptions::default()).unwrap();
    let outcome = spawn_verification(verifier).unwrap().join().unwrap();

    assert_eq!(outcome.status, VerificationStatus::AllFulfilled);
    assert_eq!(writer.pending(), 2);
    assert_eq!(store.writes(), writes_before + 1);
}

#[test]
fn test_additional_expectations_are_per_run() {
    let store = Arc::new(MemoryTestcaseStore::new());
    record(&store, "create-job", RECORDED);
    let options = VerifyOptions {
        report_additional: true,
    };

    let (d, writer) = deps(&store);
    writer.push_all([
        "2024-02-13T11:00:01Z\tinsert into audit values (1, 'created', 'job', 7)",
        "2024-02-13T11:00:02Z\tinsert into jobs values (7, 'nightly build')",
    ]);
    let verifier = Verifier::load("create-job", d, options).unwrap();
    let handle = spawn_verification(verifier).unwrap();
    wait_for("verifier to drain the log", || writer.pending() == 0);
    let outcome = handle.stop().unwrap();
    assert_eq!(outcome.testcase.additional_expectations.len(), 1);
    assert!(outcome.testcase.additional_expectations[0].uuid.is_none());

    let report = build_report(&outcome.testcase);
    assert_eq!(report.additional_expectations[0].tokens.len(), 6);

    let (d, _writer) = deps(&store);
    let verifier = Verifier::load("create-job", d, options).unwrap();
    let outcome = spawn_verification(verifier).unwrap().stop().unwrap();
    assert!(outcome.testcase.additional_expectations.is_empty());
    assert_eq!(outcome.testcase.verifications, 2);
}

#[test]
fn test_missing_testcase_cannot_be_verified() {
    let store = Arc::new(MemoryTestcaseStore::new());
    let (d, _writer) = deps(&store);
    assert!(Verifier::load("nope", d, VerifyOptions::default()).is_err());
}
