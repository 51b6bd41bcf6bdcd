//! Config file resolution.
//!
//! Precedence, first hit wins:
//! 1. `--config <path>` on the command line (must exist)
//! 2. `DFG_CONFIG` environment variable (must exist)
//! 3. `./dfg.json` in the working directory
//! 4. `$XDG_CONFIG_HOME/datafrog/config.json`
//! 5. built-in defaults (no channels)

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{Config, ConfigError};
use crate::validate::validate;
use crate::CONFIG_ENV_VAR;

const WORKING_DIR_FILE: &str = "dfg.json";
const XDG_APP_DIR: &str = "datafrog";
const XDG_FILE: &str = "config.json";

/// Candidate config locations, gathered once so resolution stays testable.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    pub explicit: Option<PathBuf>,
    pub env: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
    pub xdg: Option<PathBuf>,
}

impl ConfigPaths {
    /// Collect candidates from the process environment.
    pub fn from_env(explicit: Option<PathBuf>) -> Self {
        Self {
            explicit,
            env: std::env::var_os(CONFIG_ENV_VAR)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            working_dir: Some(PathBuf::from(WORKING_DIR_FILE)),
            xdg: dirs::config_dir().map(|d| d.join(XDG_APP_DIR).join(XDG_FILE)),
        }
    }
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum ConfigSource {
    Explicit(PathBuf),
    Env(PathBuf),
    WorkingDir(PathBuf),
    Xdg(PathBuf),
    Defaults,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::Explicit(p)
            | ConfigSource::Env(p)
            | ConfigSource::WorkingDir(p)
            | ConfigSource::Xdg(p) => Some(p),
            ConfigSource::Defaults => None,
        }
    }
}

/// A loaded and validated configuration.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: Config,
    pub source: ConfigSource,
}

/// Resolve, load and validate the effective configuration.
pub fn resolve_config(paths: &ConfigPaths) -> Result<ResolvedConfig, ConfigError> {
    let source = locate(paths);
    let config = match source.path() {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };
    validate(&config).map_err(ConfigError::Invalid)?;
    Ok(ResolvedConfig { config, source })
}

fn locate(paths: &ConfigPaths) -> ConfigSource {
    // Explicit locations are returned even when missing so the load fails loudly.
    if let Some(p) = &paths.explicit {
        return ConfigSource::Explicit(p.clone());
    }
    if let Some(p) = &paths.env {
        return ConfigSource::Env(p.clone());
    }
    if let Some(p) = paths.working_dir.as_ref().filter(|p| p.is_file()) {
        return ConfigSource::WorkingDir(p.clone());
    }
    if let Some(p) = paths.xdg.as_ref().filter(|p| p.is_file()) {
        return ConfigSource::Xdg(p.clone());
    }
    ConfigSource::Defaults
}
