//! Exit codes for the dfg CLI.
//!
//! Scripts driving a record/verify cycle can branch on these without parsing
//! output. They are stable.

/// Exit codes for dfg commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Command succeeded; a verification fulfilled every expectation
    Clean = 0,

    /// Verification left expectations unfulfilled
    Unfulfilled = 1,

    /// Configuration error (including unknown or missing channel)
    ConfigError = 10,

    /// The log source could not be read
    LogSourceError = 11,

    /// A session could not be started or ended abnormally
    SessionError = 12,

    /// Testcase storage or other I/O error
    IoError = 13,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean)
    }

    /// Check if this exit code indicates an error requiring attention.
    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Exit code for an error, by its code family.
    pub fn for_error(err: &dfg_common::Error) -> Self {
        match err.code() {
            10..=19 => ExitCode::ConfigError,
            20..=29 => ExitCode::LogSourceError,
            30..=39 => ExitCode::SessionError,
            50..=69 => ExitCode::IoError,
            _ => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}
