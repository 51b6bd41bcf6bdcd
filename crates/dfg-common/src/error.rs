//! Error types for datafrog.

use thiserror::Error;

/// Result type alias for datafrog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for datafrog.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("channel not configured: {0}")]
    UnknownChannel(String),

    #[error("no channel configured")]
    NoChannel,

    // Log source errors (20-29)
    #[error("log source failed: {0}")]
    LogSource(String),

    // Session errors (30-39)
    #[error("session failed: {0}")]
    Session(String),

    #[error("session already running for testcase {name}")]
    AlreadyRunning { name: String },

    #[error("no session running for testcase {name}")]
    NotRunning { name: String },

    // Storage errors (50-59)
    #[error("testcase not found: {name}")]
    TestcaseNotFound { name: String },

    #[error("invalid testcase name: {0}")]
    InvalidName(String),

    #[error("storage failed: {0}")]
    Storage(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON output.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::UnknownChannel(_) => 11,
            Error::NoChannel => 12,
            Error::LogSource(_) => 20,
            Error::Session(_) => 30,
            Error::AlreadyRunning { .. } => 31,
            Error::NotRunning { .. } => 32,
            Error::TestcaseNotFound { .. } => 50,
            Error::InvalidName(_) => 51,
            Error::Storage(_) => 52,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }
}
