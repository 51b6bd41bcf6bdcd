//! Log sources: where sessions read database statements from.
//!
//! A session only needs three things from a log: jump to its end, hand out
//! the next complete line (blocking, but giving up promptly on cancellation),
//! and tell the timestamp of a line.

pub mod file;
pub mod memory;
pub mod timestamp;

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

use crate::cancel::CancelToken;

pub use file::FileLog;
pub use memory::{MemoryLog, MemoryLogWriter};
pub use timestamp::parse_timestamp;

/// Errors from log sources.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line carries no timestamp")]
    MissingTimestamp,

    #[error("invalid timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl LogError {
    /// Timestamp problems only disqualify a line; I/O problems end the session.
    pub fn is_timestamp(&self) -> bool {
        matches!(
            self,
            LogError::MissingTimestamp | LogError::InvalidTimestamp { .. }
        )
    }
}

impl From<LogError> for dfg_common::Error {
    fn from(err: LogError) -> Self {
        dfg_common::Error::LogSource(err.to_string())
    }
}

/// A live stream of log lines.
pub trait LogSource: Send {
    /// Skip everything written so far.
    fn seek_to_end(&mut self) -> Result<(), LogError>;

    /// Block until the next complete line is available.
    ///
    /// Returns `Ok(None)` once `cancel` is observed or the source is closed.
    fn next_line(&mut self, cancel: &CancelToken) -> Result<Option<String>, LogError>;

    /// Timestamp of a line.
    fn timestamp(&self, line: &str) -> Result<DateTime<Utc>, LogError>;
}
