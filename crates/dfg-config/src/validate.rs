//! Semantic validation of a parsed configuration.
//!
//! Parsing only checks shape. Validation catches configurations that would
//! parse fine but make recording or verification meaningless.

use std::collections::HashSet;
use thiserror::Error;

use crate::config::Config;

/// A single configuration problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("channel #{index} has an empty name")]
    EmptyChannelName { index: usize },

    #[error("channel name '{name}' is used more than once")]
    DuplicateChannel { name: String },

    #[error("channel '{channel}' has no patterns")]
    NoPatterns { channel: String },

    #[error("channel '{channel}': pattern '{pattern}' has an empty include")]
    EmptyInclude { channel: String, pattern: String },

    #[error("channel '{channel}': pattern '{pattern}' has more than one '!'")]
    AmbiguousPattern { channel: String, pattern: String },

    #[error("poll_interval_ms must be greater than zero")]
    ZeroPollInterval,
}

/// All problems found, or `Ok(())`.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate a configuration, collecting every problem.
pub fn validate(config: &Config) -> ValidationResult {
    let mut problems = Vec::new();
    let mut seen = HashSet::new();

    for (index, channel) in config.channels.iter().enumerate() {
        if channel.name.trim().is_empty() {
            problems.push(ValidationError::EmptyChannelName { index });
        } else if !seen.insert(channel.name.as_str()) {
            problems.push(ValidationError::DuplicateChannel {
                name: channel.name.clone(),
            });
        }

        if channel.patterns.is_empty() {
            problems.push(ValidationError::NoPatterns {
                channel: channel.name.clone(),
            });
        }

        for pattern in &channel.patterns {
            if pattern.matches('!').count() > 1 {
                problems.push(ValidationError::AmbiguousPattern {
                    channel: channel.name.clone(),
                    pattern: pattern.clone(),
                });
                continue;
            }
            let include = pattern.split('!').next().unwrap_or_default();
            if include.is_empty() {
                problems.push(ValidationError::EmptyInclude {
                    channel: channel.name.clone(),
                    pattern: pattern.clone(),
                });
            }
        }
    }

    if config.poll_interval_ms == 0 {
        problems.push(ValidationError::ZeroPollInterval);
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}
