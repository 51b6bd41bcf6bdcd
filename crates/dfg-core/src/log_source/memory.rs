//! In-memory log source.
//!
//! Lines are fed through a [`MemoryLogWriter`] while a session reads them.
//! Used to replay captured logs and to drive sessions in tests.

use chrono::{DateTime, Utc};
use dfg_config::TimestampFormat;
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use super::{parse_timestamp, LogError, LogSource};
use crate::cancel::CancelToken;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2);
const MEMORY_PATH: &str = "<memory>";

#[derive(Debug)]
enum Entry {
    Line(String),
    Failure(io::ErrorKind),
}

#[derive(Debug, Default)]
struct Shared {
    entries: VecDeque<Entry>,
    closed: bool,
    delivered: usize,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Producer side of a [`MemoryLog`].
#[derive(Debug, Clone)]
pub struct MemoryLogWriter {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryLogWriter {
    pub fn push(&self, line: impl Into<String>) {
        lock(&self.shared).entries.push_back(Entry::Line(line.into()));
    }

    pub fn push_all<I, S>(&self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut shared = lock(&self.shared);
        shared
            .entries
            .extend(lines.into_iter().map(|l| Entry::Line(l.into())));
    }

    /// Make the reader fail with an I/O error once it gets here.
    pub fn fail(&self, kind: io::ErrorKind) {
        lock(&self.shared).entries.push_back(Entry::Failure(kind));
    }

    /// No more lines will come; the reader ends after draining.
    pub fn close(&self) {
        lock(&self.shared).closed = true;
    }

    /// Lines not yet handed to the reader.
    pub fn pending(&self) -> usize {
        lock(&self.shared).entries.len()
    }

    /// Lines handed to the reader so far.
    pub fn delivered(&self) -> usize {
        lock(&self.shared).delivered
    }
}

/// Consumer side: a [`LogSource`] reading what the writer pushed.
#[derive(Debug)]
pub struct MemoryLog {
    shared: Arc<Mutex<Shared>>,
    format: TimestampFormat,
    poll_interval: Duration,
    keep_backlog: bool,
}

impl MemoryLog {
    pub fn new(format: TimestampFormat) -> (Self, MemoryLogWriter) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let log = Self {
            shared: Arc::clone(&shared),
            format,
            poll_interval: DEFAULT_POLL_INTERVAL,
            keep_backlog: false,
        };
        (log, MemoryLogWriter { shared })
    }

    /// Keep lines pushed before `seek_to_end`, replaying them as new activity.
    pub fn keep_backlog(mut self) -> Self {
        self.keep_backlog = true;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

impl LogSource for MemoryLog {
    fn seek_to_end(&mut self) -> Result<(), LogError> {
        if !self.keep_backlog {
            lock(&self.shared).entries.clear();
        }
        Ok(())
    }

    fn next_line(&mut self, cancel: &CancelToken) -> Result<Option<String>, LogError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            {
                let mut shared = lock(&self.shared);
                match shared.entries.pop_front() {
                    Some(Entry::Line(line)) => {
                        shared.delivered += 1;
                        return Ok(Some(line));
                    }
                    Some(Entry::Failure(kind)) => {
                        return Err(LogError::Io {
                            path: PathBuf::from(MEMORY_PATH),
                            source: io::Error::from(kind),
                        });
                    }
                    None if shared.closed => return Ok(None),
                    None => {}
                }
            }
            thread::sleep(self.poll_interval);
        }
    }

    fn timestamp(&self, line: &str) -> Result<DateTime<Utc>, LogError> {
        parse_timestamp(line, self.format)
    }
}
