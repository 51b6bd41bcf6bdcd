//! Registry of running sessions, keyed by testcase name.

use dfg_config::{ChannelConfig, Config, ConfigError};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{info, warn};

use super::{
    spawn_recording, spawn_verification, Recorder, SessionError, SessionHandle,
    VerificationOutcome, Verifier,
};
use crate::model::Testcase;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("session already running for testcase {name}")]
    AlreadyRunning { name: String },

    #[error("no session running for testcase {name}")]
    NotRunning { name: String },

    #[error("no channel configured")]
    NoChannel,

    #[error("channel not configured: {0}")]
    UnknownChannel(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<RegistryError> for dfg_common::Error {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AlreadyRunning { name } => dfg_common::Error::AlreadyRunning { name },
            RegistryError::NotRunning { name } => dfg_common::Error::NotRunning { name },
            RegistryError::NoChannel => dfg_common::Error::NoChannel,
            RegistryError::UnknownChannel(name) => dfg_common::Error::UnknownChannel(name),
            RegistryError::Session(e) => e.into(),
        }
    }
}

/// The channel a session should run against: `name`, or the first one.
pub fn session_channel<'a>(
    config: &'a Config,
    name: Option<&str>,
) -> Result<&'a ChannelConfig, RegistryError> {
    config.channel(name).map_err(|e| match e {
        ConfigError::UnknownChannel(name) => RegistryError::UnknownChannel(name),
        _ => RegistryError::NoChannel,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Recording,
    Verification,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Recording => write!(f, "recording"),
            SessionKind::Verification => write!(f, "verification"),
        }
    }
}

/// What a finished session produced.
#[derive(Debug)]
pub enum SessionResult {
    Recorded(Testcase),
    Verified(VerificationOutcome),
}

impl SessionResult {
    pub fn testcase(&self) -> &Testcase {
        match self {
            SessionResult::Recorded(tc) => tc,
            SessionResult::Verified(outcome) => &outcome.testcase,
        }
    }
}

#[derive(Debug)]
enum ActiveSession {
    Recording(SessionHandle<Testcase>),
    Verification(SessionHandle<VerificationOutcome>),
}

impl ActiveSession {
    fn kind(&self) -> SessionKind {
        match self {
            ActiveSession::Recording(_) => SessionKind::Recording,
            ActiveSession::Verification(_) => SessionKind::Verification,
        }
    }

    fn is_finished(&self) -> bool {
        match self {
            ActiveSession::Recording(h) => h.is_finished(),
            ActiveSession::Verification(h) => h.is_finished(),
        }
    }

    fn cancel(&self) {
        match self {
            ActiveSession::Recording(h) => h.cancel(),
            ActiveSession::Verification(h) => h.cancel(),
        }
    }

    fn join(self) -> Result<SessionResult, SessionError> {
        match self {
            ActiveSession::Recording(h) => h.join().map(SessionResult::Recorded),
            ActiveSession::Verification(h) => h.join().map(SessionResult::Verified),
        }
    }
}

/// At most one running session per testcase name.
///
/// Sessions that ended on their own (a verification that fulfilled every
/// expectation, a log that broke) stay registered until the next start,
/// `stop` or `running` call reaps them.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    state: Mutex<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    sessions: HashMap<String, ActiveSession>,
    /// Names whose session was cancelled and is still writing back.
    stopping: HashSet<String>,
}

impl RegistryState {
    fn reserve(&mut self, name: &str) -> Result<(), RegistryError> {
        reap(&mut self.sessions);
        if self.sessions.contains_key(name) || self.stopping.contains(name) {
            return Err(RegistryError::AlreadyRunning {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn start_recording(&self, recorder: Recorder) -> Result<(), RegistryError> {
        let mut state = self.lock();
        let name = recorder.name().to_string();
        state.reserve(&name)?;
        let handle = spawn_recording(recorder)?;
        info!(testcase = %name, "recording session registered");
        state.sessions.insert(name, ActiveSession::Recording(handle));
        Ok(())
    }

    pub fn start_verification(&self, verifier: Verifier) -> Result<(), RegistryError> {
        let mut state = self.lock();
        let name = verifier.name().to_string();
        state.reserve(&name)?;
        let handle = spawn_verification(verifier)?;
        info!(testcase = %name, "verification session registered");
        state.sessions.insert(name, ActiveSession::Verification(handle));
        Ok(())
    }

    /// Cancel the session for `name` and wait until it has written back.
    ///
    /// The name stays reserved while waiting, so no new session for it can
    /// start before the old one has stored its testcase. Other names are
    /// not blocked.
    pub fn stop(&self, name: &str) -> Result<SessionResult, RegistryError> {
        let session = {
            let mut state = self.lock();
            let session = state
                .sessions
                .remove(name)
                .ok_or_else(|| RegistryError::NotRunning {
                    name: name.to_string(),
                })?;
            state.stopping.insert(name.to_string());
            session
        };
        session.cancel();
        let result = session.join();
        self.lock().stopping.remove(name);
        Ok(result?)
    }

    /// Whether a session for `name` has not finished yet, including one
    /// that is stopping.
    pub fn is_running(&self, name: &str) -> bool {
        let state = self.lock();
        state.stopping.contains(name)
            || state.sessions.get(name).is_some_and(|s| !s.is_finished())
    }

    /// Running sessions, sorted by name.
    pub fn running(&self) -> Vec<(String, SessionKind)> {
        let mut state = self.lock();
        reap(&mut state.sessions);
        let mut running: Vec<_> = state
            .sessions
            .iter()
            .map(|(name, s)| (name.clone(), s.kind()))
            .collect();
        running.sort();
        running
    }

    /// Cancel every session, then wait for each.
    pub fn stop_all(&self) -> Vec<(String, Result<SessionResult, SessionError>)> {
        let sessions: Vec<(String, ActiveSession)> = {
            let mut state = self.lock();
            let drained: Vec<_> = state.sessions.drain().collect();
            for (name, session) in &drained {
                session.cancel();
                state.stopping.insert(name.clone());
            }
            drained
        };
        let mut results: Vec<_> = sessions
            .into_iter()
            .map(|(name, session)| {
                let result = session.join();
                self.lock().stopping.remove(&name);
                (name, result)
            })
            .collect();
        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }
}

fn reap(sessions: &mut HashMap<String, ActiveSession>) {
    let finished: Vec<String> = sessions
        .iter()
        .filter(|(_, s)| s.is_finished())
        .map(|(name, _)| name.clone())
        .collect();
    for name in finished {
        let Some(session) = sessions.remove(&name) else {
            continue;
        };
        let kind = session.kind();
        match session.join() {
            Ok(_) => info!(testcase = %name, %kind, "finished session reaped"),
            Err(e) => warn!(testcase = %name, %kind, error = %e, "session ended with error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_source::{MemoryLog, MemoryLogWriter};
    use crate::matching::{PatternSet, StatementTokenizer};
    use crate::session::{SessionDeps, VerificationStatus, VerifyOptions};
    use crate::store::{MemoryTestcaseStore, StoreError, TestcaseStore};
    use crate::window::SessionWindow;
    use chrono::{TimeZone, Utc};
    use dfg_common::SequentialIdProvider;
    use dfg_config::TimestampFormat;
    use std::sync::mpsc;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::{Duration, Instant};

    /// Holds every write until the test releases it.
    struct GatedStore {
        inner: MemoryTestcaseStore,
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl GatedStore {
        fn new() -> (Arc<Self>, mpsc::Receiver<()>, mpsc::Sender<()>) {
            let (entered_tx, entered_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            let store = Arc::new(Self {
                inner: MemoryTestcaseStore::new(),
                entered: Mutex::new(entered_tx),
                release: Mutex::new(release_rx),
            });
            (store, entered_rx, release_tx)
        }
    }

    impl TestcaseStore for GatedStore {
        fn write(&self, name: &str, testcase: &Testcase) -> Result<(), StoreError> {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
            self.inner.write(name, testcase)
        }

        fn read(&self, name: &str) -> Result<Testcase, StoreError> {
            self.inner.read(name)
        }

        fn list(&self) -> Result<Vec<String>, StoreError> {
            self.inner.list()
        }

        fn delete(&self, name: &str) -> Result<(), StoreError> {
            self.inner.delete(name)
        }
    }

    fn deps(store: &Arc<MemoryTestcaseStore>) -> (SessionDeps, MemoryLogWriter) {
        deps_with_store(store.clone())
    }

    fn deps_with_store(store: Arc<dyn TestcaseStore>) -> (SessionDeps, MemoryLogWriter) {
        let (log, writer) = MemoryLog::new(TimestampFormat::Rfc3339);
        let deps = SessionDeps {
            log: Box::new(log.keep_backlog()),
            window: Box::new(SessionWindow::fixed(
                Utc.with_ymd_and_hms(2024, 2, 13, 10, 0, 0).unwrap(),
            )),
            patterns: Box::new(PatternSet::new(&["insert"])),
            tokenizer: Box::new(StatementTokenizer),
            store,
        };
        (deps, writer)
    }

    fn recorder(name: &str, store: &Arc<MemoryTestcaseStore>) -> (Recorder, MemoryLogWriter) {
        let (deps, writer) = deps(store);
        let ids = Box::new(SequentialIdProvider::new(name));
        (Recorder::new(name, deps, ids), writer)
    }

    fn wait_until_finished(registry: &SessionRegistry, name: &str) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while registry.is_running(name) {
            assert!(Instant::now() < deadline, "session {name} did not finish");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_second_session_for_same_name_is_rejected() {
        let store = Arc::new(MemoryTestcaseStore::new());
        let registry = SessionRegistry::new();
        let (first, _w1) = recorder("signup", &store);
        let (second, _w2) = recorder("signup", &store);

        registry.start_recording(first).unwrap();
        assert!(registry.is_running("signup"));
        assert!(matches!(
            registry.start_recording(second),
            Err(RegistryError::AlreadyRunning { .. })
        ));

        let (other, _w3) = recorder("login", &store);
        registry.start_recording(other).unwrap();
        assert_eq!(
            registry.running(),
            vec![
                ("login".to_string(), SessionKind::Recording),
                ("signup".to_string(), SessionKind::Recording),
            ]
        );
        assert_eq!(registry.stop_all().len(), 2);
        assert_eq!(store.writes(), 2);
    }

    #[test]
    fn test_stop_returns_recorded_testcase() {
        let store = Arc::new(MemoryTestcaseStore::new());
        let registry = SessionRegistry::new();
        let (rec, writer) = recorder("signup", &store);
        writer.push("2024-02-13T10:00:01Z\tinsert into users values (1)");
        registry.start_recording(rec).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while writer.pending() > 0 {
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(5));
        }

        let result = registry.stop("signup").unwrap();
        assert!(matches!(result, SessionResult::Recorded(_)));
        assert_eq!(result.testcase().expectations.len(), 1);
        assert!(!registry.is_running("signup"));
        assert!(matches!(
            registry.stop("signup"),
            Err(RegistryError::NotRunning { .. })
        ));
        assert_eq!(store.read("signup").unwrap().expectations.len(), 1);
    }

    #[test]
    fn test_finished_verification_is_reaped() {
        let store = Arc::new(MemoryTestcaseStore::new());
        let registry = SessionRegistry::new();

        // An empty testcase is fulfilled right away.
        let (d, _writer) = deps(&store);
        let verifier = Verifier::new(Testcase::new("empty"), d, VerifyOptions::default());
        registry.start_verification(verifier).unwrap();
        wait_until_finished(&registry, "empty");

        assert!(registry.running().is_empty());
        let (d, _writer) = deps(&store);
        let verifier = Verifier::new(Testcase::new("empty"), d, VerifyOptions::default());
        registry.start_verification(verifier).unwrap();
        wait_until_finished(&registry, "empty");

        match registry.stop("empty").unwrap() {
            SessionResult::Verified(outcome) => {
                assert_eq!(outcome.status, VerificationStatus::AllFulfilled)
            }
            other => panic!("expected verification, got {other:?}"),
        }
        assert_eq!(store.writes(), 2);
    }

    #[test]
    fn test_stopping_one_session_does_not_block_others() {
        let plain = Arc::new(MemoryTestcaseStore::new());
        let (gated, entered, release) = GatedStore::new();
        let registry = Arc::new(SessionRegistry::new());

        let (d, _wa) = deps_with_store(gated.clone());
        let slow = Recorder::new("slow", d, Box::new(SequentialIdProvider::new("slow")));
        registry.start_recording(slow).unwrap();
        let (fast, _wb) = recorder("fast", &plain);
        registry.start_recording(fast).unwrap();

        let stopper = {
            let registry = registry.clone();
            thread::spawn(move || registry.stop("slow"))
        };
        entered
            .recv_timeout(Duration::from_secs(5))
            .expect("write-back started");

        // The write-back of "slow" is parked; the registry must still answer.
        let (tx, rx) = mpsc::channel();
        {
            let registry = registry.clone();
            let plain = plain.clone();
            thread::spawn(move || {
                let fast_running = registry.is_running("fast");
                let (again, _w) = recorder("slow", &plain);
                let restart = registry.start_recording(again);
                let _ = tx.send((fast_running, restart));
            });
        }
        let (fast_running, restart) = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("registry blocked by a stop in progress");
        assert!(fast_running);
        assert!(matches!(restart, Err(RegistryError::AlreadyRunning { .. })));
        assert!(registry.is_running("slow"));

        release.send(()).unwrap();
        let result = stopper.join().unwrap().unwrap();
        assert!(matches!(result, SessionResult::Recorded(_)));
        assert_eq!(gated.inner.writes(), 1);
        assert!(!registry.is_running("slow"));

        let (again, _w) = recorder("slow", &plain);
        registry.start_recording(again).unwrap();
        assert_eq!(registry.stop_all().len(), 2);
    }

    #[test]
    fn test_concurrent_starts_for_same_name_admit_one() {
        const THREADS: usize = 8;
        let store = Arc::new(MemoryTestcaseStore::new());
        let registry = Arc::new(SessionRegistry::new());
        let barrier = Arc::new(Barrier::new(THREADS));

        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let (rec, writer) = recorder("signup", &store);
                let registry = registry.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let result = registry.start_recording(rec);
                    (result, writer)
                })
            })
            .collect();
        let results: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();

        let started = results.iter().filter(|(r, _)| r.is_ok()).count();
        assert_eq!(started, 1);
        assert!(results.iter().all(|(r, _)| matches!(
            r,
            Ok(()) | Err(RegistryError::AlreadyRunning { .. })
        )));
        assert_eq!(registry.stop_all().len(), 1);
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn test_session_channel_lookup() {
        let config = Config::from_json_str(
            r#"{"channels":[{"name":"mysql","log":"general.log","patterns":["insert"]}]}"#,
        )
        .unwrap();
        assert_eq!(session_channel(&config, None).unwrap().name, "mysql");
        assert!(matches!(
            session_channel(&config, Some("pg")),
            Err(RegistryError::UnknownChannel(_))
        ));
        assert!(matches!(
            session_channel(&Config::default(), None),
            Err(RegistryError::NoChannel)
        ));
    }

    #[test]
    fn test_errors_map_to_common_codes() {
        let err: dfg_common::Error = RegistryError::AlreadyRunning { name: "a".into() }.into();
        assert_eq!(err.code(), 31);
        let err: dfg_common::Error = RegistryError::NoChannel.into();
        assert_eq!(err.code(), 12);
    }
}
