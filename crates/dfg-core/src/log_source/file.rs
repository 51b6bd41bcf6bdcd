//! Tailing a growing log file.

use chrono::{DateTime, Utc};
use dfg_config::TimestampFormat;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

use super::{parse_timestamp, LogError, LogSource};
use crate::cancel::CancelToken;

/// `tail -f` over a database log file.
///
/// Lines are handed out only once their newline has been written, so a
/// statement the database is still flushing is never split. If the file
/// shrinks (truncation or rotation) reading restarts at its beginning.
#[derive(Debug)]
pub struct FileLog {
    path: PathBuf,
    format: TimestampFormat,
    poll_interval: Duration,
    reader: Option<BufReader<File>>,
    position: u64,
    pending: Vec<u8>,
}

impl FileLog {
    pub fn new(path: impl Into<PathBuf>, format: TimestampFormat, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            format,
            poll_interval,
            reader: None,
            position: 0,
            pending: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> LogError {
        LogError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn open_at(&mut self, from: SeekFrom) -> Result<(), LogError> {
        let mut file = File::open(&self.path).map_err(|e| self.io_error(e))?;
        self.position = file.seek(from).map_err(|e| self.io_error(e))?;
        self.reader = Some(BufReader::new(file));
        self.pending.clear();
        Ok(())
    }

    fn reopen_if_truncated(&mut self) -> Result<(), LogError> {
        let len = std::fs::metadata(&self.path)
            .map_err(|e| self.io_error(e))?
            .len();
        if len < self.position {
            info!(path = %self.path.display(), len, position = self.position, "log truncated, reading from start");
            self.open_at(SeekFrom::Start(0))?;
        }
        Ok(())
    }

    /// Read what is available. Returns a line once its newline has arrived.
    fn read_available(&mut self) -> Result<Option<String>, LogError> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        let read = match reader.read_until(b'\n', &mut self.pending) {
            Ok(n) => n,
            Err(e) => return Err(self.io_error(e)),
        };
        self.position += read as u64;
        if !self.pending.ends_with(b"\n") {
            return Ok(None);
        }
        let bytes = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&bytes);
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }
}

impl LogSource for FileLog {
    fn seek_to_end(&mut self) -> Result<(), LogError> {
        self.open_at(SeekFrom::End(0))?;
        debug!(path = %self.path.display(), position = self.position, "log positioned at end");
        Ok(())
    }

    fn next_line(&mut self, cancel: &CancelToken) -> Result<Option<String>, LogError> {
        if self.reader.is_none() {
            self.open_at(SeekFrom::Start(0))?;
        }
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            if let Some(line) = self.read_available()? {
                return Ok(Some(line));
            }
            self.reopen_if_truncated()?;
            thread::sleep(self.poll_interval);
        }
    }

    fn timestamp(&self, line: &str) -> Result<DateTime<Utc>, LogError> {
        parse_timestamp(line, self.format)
    }
}
