//! Recording and verification sessions.
//!
//! A session is one sequential loop over a log stream, running on its own
//! thread. The caller holds a [`SessionHandle`]: cancelling it makes the
//! blocked log read return, the session writes its testcase back to the
//! store exactly once, and joining the handle is the completion signal.
//!
//! ```text
//! Recorder:  Recording ──cancel──▶ Stopped
//! Verifier:  Verifying ──all fulfilled──▶ Done(all fulfilled)
//!                      ──cancel─────────▶ Done(cancelled)
//! ```

pub mod recorder;
pub mod registry;
pub mod verifier;

use dfg_config::ChannelConfig;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::cancel::CancelToken;
use crate::log_source::{FileLog, LogError, LogSource};
use crate::matching::{tokenizer_for, PatternMatcher, PatternSet, Tokenizer};
use crate::model::Testcase;
use crate::store::{StoreError, TestcaseStore};
use crate::window::{RecordingWindow, SessionWindow};

pub use recorder::Recorder;
pub use registry::{session_channel, RegistryError, SessionKind, SessionRegistry, SessionResult};
pub use verifier::{
    verify_against, VerificationOutcome, VerificationStatus, Verdict, Verifier, VerifyOptions,
};

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The log stream broke. `persisted` tells whether the best-effort
    /// write-back of the progress so far succeeded.
    #[error("reading the log failed: {source}")]
    LogRead {
        #[source]
        source: LogError,
        persisted: bool,
    },

    /// The session finished but its testcase could not be stored. The
    /// in-memory testcase is handed back for a retry.
    #[error("writing testcase {name} failed: {source}")]
    WriteBack {
        name: String,
        #[source]
        source: StoreError,
        testcase: Box<Testcase>,
    },

    #[error("failed to spawn session thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("session thread for {name} panicked")]
    Panicked { name: String },
}

impl SessionError {
    /// The unsaved testcase of a failed write-back.
    pub fn into_testcase(self) -> Option<Testcase> {
        match self {
            SessionError::WriteBack { testcase, .. } => Some(*testcase),
            _ => None,
        }
    }
}

impl From<SessionError> for dfg_common::Error {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::LogRead { .. } => dfg_common::Error::LogSource(err.to_string()),
            SessionError::WriteBack { .. } => dfg_common::Error::Storage(err.to_string()),
            other => dfg_common::Error::Session(other.to_string()),
        }
    }
}

/// Collaborators a session drives.
pub struct SessionDeps {
    pub log: Box<dyn LogSource>,
    pub window: Box<dyn RecordingWindow>,
    pub patterns: Box<dyn PatternMatcher>,
    pub tokenizer: Box<dyn Tokenizer>,
    pub store: Arc<dyn TestcaseStore>,
}

impl SessionDeps {
    /// Production wiring for a configured channel: tail its log file.
    pub fn for_channel(
        channel: &ChannelConfig,
        poll_interval: Duration,
        store: Arc<dyn TestcaseStore>,
    ) -> Self {
        Self {
            log: Box::new(FileLog::new(
                &channel.log,
                channel.timestamp_format,
                poll_interval,
            )),
            window: Box::new(SessionWindow::new()),
            patterns: Box::new(PatternSet::new(&channel.patterns)),
            tokenizer: tokenizer_for(channel.tokenizer),
            store,
        }
    }
}

/// Store the testcase once the loop has ended, however it ended.
fn write_back(
    store: &dyn TestcaseStore,
    testcase: Testcase,
    read: Result<(), LogError>,
) -> Result<Testcase, SessionError> {
    let written = store.write(&testcase.name, &testcase);
    match (read, written) {
        (Ok(()), Ok(())) => Ok(testcase),
        (Ok(()), Err(source)) => Err(SessionError::WriteBack {
            name: testcase.name.clone(),
            source,
            testcase: Box::new(testcase),
        }),
        (Err(source), written) => {
            if let Err(e) = &written {
                warn!(testcase = %testcase.name, error = %e, "write-back after log failure failed");
            }
            Err(SessionError::LogRead {
                source,
                persisted: written.is_ok(),
            })
        }
    }
}

/// Handle to a session running on its own thread.
#[derive(Debug)]
pub struct SessionHandle<T> {
    name: String,
    cancel: CancelToken,
    thread: JoinHandle<Result<T, SessionError>>,
}

impl<T> SessionHandle<T> {
    /// Testcase name the session works on.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the session has completed (naturally or after cancel).
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for completion.
    pub fn join(self) -> Result<T, SessionError> {
        self.thread
            .join()
            .map_err(|_| SessionError::Panicked { name: self.name })?
    }

    /// Cancel and wait for completion.
    pub fn stop(self) -> Result<T, SessionError> {
        self.cancel();
        self.join()
    }
}

/// Run a recorder on its own thread.
pub fn spawn_recording(recorder: Recorder) -> Result<SessionHandle<Testcase>, SessionError> {
    let name = recorder.name().to_string();
    spawn(name, "record", move |cancel| recorder.run(cancel))
}

/// Run a verifier on its own thread.
pub fn spawn_verification(
    verifier: Verifier,
) -> Result<SessionHandle<VerificationOutcome>, SessionError> {
    let name = verifier.name().to_string();
    spawn(name, "verify", move |cancel| verifier.run(cancel))
}

fn spawn<T, F>(name: String, kind: &str, run: F) -> Result<SessionHandle<T>, SessionError>
where
    T: Send + 'static,
    F: FnOnce(&CancelToken) -> Result<T, SessionError> + Send + 'static,
{
    let cancel = CancelToken::new();
    let token = cancel.clone();
    let thread = thread::Builder::new()
        .name(format!("dfg-{kind}-{name}"))
        .spawn(move || run(&token))
        .map_err(SessionError::Spawn)?;
    Ok(SessionHandle {
        name,
        cancel,
        thread,
    })
}
