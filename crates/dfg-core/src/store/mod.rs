//! Testcase persistence.
//!
//! Recording hands its testcase to a store when it ends; verification loads
//! it from there and writes the updated copy back.

pub mod file;
pub mod memory;

use std::path::PathBuf;
use thiserror::Error;

use crate::model::Testcase;

pub use file::FileTestcaseStore;
pub use memory::MemoryTestcaseStore;

/// Errors from testcase stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("testcase not found: {name}")]
    NotFound { name: String },

    #[error("invalid testcase name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse testcase {name}: {source}")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("testcase {name} cannot be read: {source}")]
    IncompatibleSchema {
        name: String,
        #[source]
        source: dfg_common::SchemaError,
    },
}

impl From<StoreError> for dfg_common::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { name } => dfg_common::Error::TestcaseNotFound { name },
            StoreError::InvalidName { .. } => dfg_common::Error::InvalidName(err.to_string()),
            StoreError::Io { source, .. } => dfg_common::Error::Io(source),
            other => dfg_common::Error::Storage(other.to_string()),
        }
    }
}

/// Persistent home of testcases, keyed by name.
pub trait TestcaseStore: Send + Sync {
    fn write(&self, name: &str, testcase: &Testcase) -> Result<(), StoreError>;

    fn read(&self, name: &str) -> Result<Testcase, StoreError>;

    /// Names of all stored testcases, sorted.
    fn list(&self) -> Result<Vec<String>, StoreError>;

    fn delete(&self, name: &str) -> Result<(), StoreError>;

    fn exists(&self, name: &str) -> Result<bool, StoreError> {
        match self.read(name) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Reject names that cannot safely become a file name.
pub fn validate_testcase_name(name: &str) -> Result<(), StoreError> {
    let reason = if name.trim().is_empty() {
        "name cannot be empty"
    } else if name != name.trim() {
        "name cannot have leading or trailing whitespace"
    } else if name.contains('/') || name.contains('\\') {
        "name cannot contain path separators"
    } else if name == "." || name == ".." {
        "name cannot be `.` or `..`"
    } else {
        return Ok(());
    };
    Err(StoreError::InvalidName {
        name: name.to_string(),
        reason,
    })
}
