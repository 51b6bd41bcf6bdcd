//! Configuration types.
//!
//! These types match the `config.json` layout. Every field has a default so
//! that an empty object (or no file at all) yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::validate::ValidationError;

/// Default poll interval for log tailing.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Errors from loading or querying configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {}", format_problems(.0))]
    Invalid(Vec<ValidationError>),

    #[error("channel not configured: {0}")]
    UnknownChannel(String),

    #[error("no channel configured")]
    NoChannel,
}

fn format_problems(problems: &[ValidationError]) -> String {
    problems
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ConfigError> for dfg_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownChannel(name) => dfg_common::Error::UnknownChannel(name),
            ConfigError::NoChannel => dfg_common::Error::NoChannel,
            other => dfg_common::Error::Config(other.to_string()),
        }
    }
}

/// Complete datafrog configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log sources to record from and verify against.
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,

    #[serde(default)]
    pub expectations: ExpectationOptions,

    #[serde(default)]
    pub testcases: TestcaseOptions,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// How long the log tailer sleeps when no new line is available.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            expectations: ExpectationOptions::default(),
            testcases: TestcaseOptions::default(),
            logging: LoggingConfig::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl Config {
    /// Load and parse a config file. Does not validate.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a config from a JSON string. Does not validate.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Look up a channel by name, or the first channel when `name` is `None`.
    pub fn channel(&self, name: Option<&str>) -> Result<&ChannelConfig, ConfigError> {
        match name {
            Some(name) => self
                .channels
                .iter()
                .find(|c| c.name == name)
                .ok_or_else(|| ConfigError::UnknownChannel(name.to_string())),
            None => self.channels.first().ok_or(ConfigError::NoChannel),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Directory holding stored testcases.
    pub fn testcase_dir(&self) -> PathBuf {
        self.testcases
            .dir
            .clone()
            .unwrap_or_else(default_testcase_dir)
    }
}

/// One monitored log together with the patterns that select statements from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,

    /// Path of the database log file.
    pub log: PathBuf,

    #[serde(default)]
    pub timestamp_format: TimestampFormat,

    #[serde(default)]
    pub tokenizer: TokenizerKind,

    /// Pattern specs in priority order: `include` or `include!exclude`.
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// How the leading timestamp of a log line is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    /// `2024-02-13T10:53:48.123456Z` as the first field (MySQL general log).
    #[default]
    Rfc3339,
    /// `2024-02-13 10:53:48.123` as the first two fields, in UTC (PostgreSQL).
    Postgres,
}

/// Which part of a matching line is tokenized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    /// Start at the matched pattern's include, dropping the log prefix.
    #[default]
    Statement,
    /// The whole line.
    Line,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpectationOptions {
    /// Collect pattern-matching lines that no expectation consumed.
    #[serde(default)]
    pub report_additional: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestcaseOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<LogFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Human,
    Json,
}

/// Get the default testcase directory.
pub fn default_testcase_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("datafrog")
        .join("testcases")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "channels": [
            {
                "name": "mysql",
                "log": "/var/log/mysql/general.log",
                "patterns": ["insert", "update!password"]
            },
            {
                "name": "pg",
                "log": "/var/log/postgresql/pg.log",
                "timestamp_format": "postgres",
                "tokenizer": "line",
                "patterns": ["INSERT"]
            }
        ],
        "expectations": { "report_additional": true },
        "testcases": { "dir": "/tmp/tc" },
        "logging": { "level": "debug", "format": "json" },
        "poll_interval_ms": 25
    }"#;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert!(config.channels.is_empty());
        assert!(!config.expectations.report_additional);
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert!(config.logging.level.is_none());
    }

    #[test]
    fn test_full_config_parses() {
        let config = Config::from_json_str(FULL).unwrap();
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.channels[0].timestamp_format, TimestampFormat::Rfc3339);
        assert_eq!(config.channels[0].tokenizer, TokenizerKind::Statement);
        assert_eq!(config.channels[1].timestamp_format, TimestampFormat::Postgres);
        assert_eq!(config.channels[1].tokenizer, TokenizerKind::Line);
        assert!(config.expectations.report_additional);
        assert_eq!(config.testcase_dir(), PathBuf::from("/tmp/tc"));
        assert_eq!(config.logging.format, Some(LogFormat::Json));
        assert_eq!(config.poll_interval(), Duration::from_millis(25));
    }

    #[test]
    fn test_channel_lookup() {
        let config = Config::from_json_str(FULL).unwrap();
        assert_eq!(config.channel(None).unwrap().name, "mysql");
        assert_eq!(config.channel(Some("pg")).unwrap().name, "pg");
        assert!(matches!(
            config.channel(Some("oracle")),
            Err(ConfigError::UnknownChannel(_))
        ));
        assert!(matches!(
            Config::default().channel(None),
            Err(ConfigError::NoChannel)
        ));
    }

    #[test]
    fn test_from_path_reports_missing_file() {
        let err = Config::from_path("/nonexistent/dfg.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
