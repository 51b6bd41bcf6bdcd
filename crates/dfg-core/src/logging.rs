//! Tracing subscriber setup for the dfg binary.
//!
//! Logs go to stderr; stdout is reserved for command output.

use dfg_config::{LogFormat, LoggingConfig};
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level `{0}`; expected one of trace, debug, info, warn, error, off")]
    InvalidLevel(String),

    #[error("initialize logging subscriber: {0}")]
    Init(String),
}

impl From<LoggingError> for dfg_common::Error {
    fn from(err: LoggingError) -> Self {
        dfg_common::Error::Config(err.to_string())
    }
}

/// Install the global subscriber.
///
/// The level comes from `cli_level_override`, then `logging.level`, then
/// `info`. `RUST_LOG` directives are layered on top when set.
pub fn init(config: &LoggingConfig, cli_level_override: Option<&str>) -> Result<(), LoggingError> {
    let level = resolve_log_level(config, cli_level_override)?;
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    match resolve_log_format(config) {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .try_init(),
        LogFormat::Human => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .try_init(),
    }
    .map_err(|err| LoggingError::Init(err.to_string()))
}

fn resolve_log_level(
    config: &LoggingConfig,
    cli_level_override: Option<&str>,
) -> Result<LevelFilter, LoggingError> {
    let raw_level = cli_level_override
        .or(config.level.as_deref())
        .unwrap_or(DEFAULT_LOG_LEVEL);
    let normalized = raw_level.trim().to_ascii_lowercase();

    normalized
        .parse::<LevelFilter>()
        .map_err(|_| LoggingError::InvalidLevel(raw_level.to_string()))
}

fn resolve_log_format(config: &LoggingConfig) -> LogFormat {
    config.format.unwrap_or(LogFormat::Human)
}
