//! datafrog configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for `config.json` (channels, patterns, options)
//! - Config resolution (CLI → env → working dir → XDG → defaults)
//! - Semantic validation reporting every problem at once

pub mod config;
pub mod resolve;
pub mod validate;

pub use config::{
    ChannelConfig, Config, ConfigError, ExpectationOptions, LogFormat, LoggingConfig,
    TestcaseOptions, TimestampFormat, TokenizerKind,
};
pub use resolve::{resolve_config, ConfigPaths, ConfigSource, ResolvedConfig};
pub use validate::{validate, ValidationError, ValidationResult};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "DFG_CONFIG";
