//! Recording/verification window.
//!
//! A session only looks at log lines stamped at or after the moment it
//! started. The window stays open until the session is cancelled.

use chrono::{DateTime, Utc};

/// Decides whether a log timestamp falls into the active capture period.
pub trait RecordingWindow: Send {
    /// Open the window. Called once when the session starts.
    fn start(&mut self);

    fn start_time(&self) -> Option<DateTime<Utc>>;

    fn matches(&self, ts: DateTime<Utc>) -> bool;
}

/// Window opening at session start (UTC wall clock), open-ended.
#[derive(Debug, Clone, Default)]
pub struct SessionWindow {
    start: Option<DateTime<Utc>>,
    fixed: bool,
}

impl SessionWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// A window with a preset start that `start()` does not move.
    pub fn fixed(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            fixed: true,
        }
    }
}

impl RecordingWindow for SessionWindow {
    fn start(&mut self) {
        if !self.fixed {
            self.start = Some(Utc::now());
        }
    }

    fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    fn matches(&self, ts: DateTime<Utc>) -> bool {
        self.start.is_some_and(|start| ts >= start)
    }
}
