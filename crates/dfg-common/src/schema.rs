//! Version stamp of stored testcases.

use thiserror::Error;

/// Written into every stored testcase and report.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Stored testcases are readable when their major version equals this one.
pub const SCHEMA_MAJOR: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unreadable schema version '{0}'")]
    Unparseable(String),

    #[error("schema major version {found} is not supported, expected {}", SCHEMA_MAJOR)]
    UnsupportedMajor { found: u32 },
}

fn major(version: &str) -> Option<u32> {
    version.split('.').next()?.parse().ok()
}

/// Accept a testcase's `schemaVersion`, returning its major version.
pub fn check_compatible(version: &str) -> Result<u32, SchemaError> {
    match major(version) {
        Some(SCHEMA_MAJOR) => Ok(SCHEMA_MAJOR),
        Some(found) => Err(SchemaError::UnsupportedMajor { found }),
        None => Err(SchemaError::Unparseable(version.to_string())),
    }
}
