//! Recording: harvest expectations from a live log.

use dfg_common::IdProvider;
use tracing::{error, info, trace};

use super::{write_back, SessionDeps, SessionError};
use crate::cancel::CancelToken;
use crate::log_source::LogError;
use crate::model::{Expectation, Testcase};

/// Tokens shown when logging a new expectation.
const SUMMARY_TOKENS: usize = 8;

/// Records every statement that matches a pattern inside the recording
/// window into a new testcase.
pub struct Recorder {
    testcase: Testcase,
    deps: SessionDeps,
    ids: Box<dyn IdProvider>,
}

impl Recorder {
    pub fn new(name: impl Into<String>, deps: SessionDeps, ids: Box<dyn IdProvider>) -> Self {
        Self {
            testcase: Testcase::new(name),
            deps,
            ids,
        }
    }

    pub fn name(&self) -> &str {
        &self.testcase.name
    }

    pub fn testcase(&self) -> &Testcase {
        &self.testcase
    }

    /// Record until `cancel` fires (or the log ends), then store the testcase.
    ///
    /// A broken log stream aborts the recording; what was recorded up to that
    /// point is still written back before the error is returned.
    pub fn run(mut self, cancel: &CancelToken) -> Result<Testcase, SessionError> {
        self.deps.window.start();
        info!(
            testcase = %self.testcase.name,
            start = ?self.deps.window.start_time(),
            "recording started"
        );

        if let Err(source) = self.deps.log.seek_to_end() {
            error!(testcase = %self.testcase.name, error = %source, "cannot position log");
            return Err(SessionError::LogRead {
                source,
                persisted: false,
            });
        }

        let read = self.record(cancel);
        match &read {
            Ok(()) => info!(
                testcase = %self.testcase.name,
                expectations = self.testcase.expectations.len(),
                "recording stopped"
            ),
            Err(e) => error!(testcase = %self.testcase.name, error = %e, "recording aborted"),
        }
        write_back(self.deps.store.as_ref(), self.testcase, read)
    }

    fn record(&mut self, cancel: &CancelToken) -> Result<(), LogError> {
        while !cancel.is_cancelled() {
            let Some(line) = self.deps.log.next_line(cancel)? else {
                break;
            };
            self.observe(&line);
        }
        Ok(())
    }

    /// Process one log line. Returns `true` if it became an expectation.
    pub fn observe(&mut self, line: &str) -> bool {
        let ts = match self.deps.log.timestamp(line) {
            Ok(ts) => ts,
            Err(e) => {
                trace!(error = %e, "skipping line without timestamp");
                return false;
            }
        };
        if !self.deps.window.matches(ts) {
            return false;
        }
        let Some(pattern) = self.deps.patterns.matching_pattern(line) else {
            return false;
        };

        let tokens = self.deps.tokenizer.tokenize(line, pattern);
        let expectation = Expectation::recorded(self.ids.new_id(), tokens, pattern.spec());
        info!(
            pattern = %expectation.pattern,
            statement = %expectation.summary(SUMMARY_TOKENS),
            "new expectation"
        );
        self.testcase.expectations.push(expectation);
        true
    }
}
