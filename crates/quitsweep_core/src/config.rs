//! Process configuration loaded from a JSON file.
//!
//! # Responsibility
//! - Locate the configuration file (flag, environment, default path).
//! - Parse and validate database and logging settings.
//!
//! # Invariants
//! - A missing default file yields defaults; a missing explicit file is an error.
//! - `debug_mode` always wins over the configured log level.

use crate::logging::default_log_level;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "QUITSWEEP_CONFIG";
/// Configuration file looked up in the working directory by default.
pub const DEFAULT_CONFIG_FILE: &str = "quitsweep.json";

const DEFAULT_DB_FILE: &str = "quitsweep.sqlite3";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const MAX_BUSY_TIMEOUT_MS: u64 = 10 * 60 * 1_000;

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Free-form environment label echoed in startup logs.
    pub env: String,
    pub debug_mode: bool,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            env: "dev".to_string(),
            debug_mode: false,
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// SQLite connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_FILE),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

/// Logging settings; `dir = None` logs to stderr only.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

impl AppConfig {
    /// Parses and validates configuration JSON.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Log level after applying `debug_mode`.
    pub fn effective_log_level(&self) -> &str {
        if self.debug_mode {
            "debug"
        } else {
            self.logging.level.as_str()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "database.path must not be empty".to_string(),
            ));
        }
        if self.database.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "database.busy_timeout_ms must be at most {MAX_BUSY_TIMEOUT_MS}, got {}",
                self.database.busy_timeout_ms
            )));
        }
        Ok(())
    }
}

/// Where the configuration file location came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Passed on the command line; must exist.
    Explicit(PathBuf),
    /// Named by [`CONFIG_ENV_VAR`]; must exist.
    Environment(PathBuf),
    /// [`DEFAULT_CONFIG_FILE`]; optional.
    Default(PathBuf),
}

impl ConfigSource {
    pub fn path(&self) -> &Path {
        match self {
            Self::Explicit(path) | Self::Environment(path) | Self::Default(path) => path,
        }
    }
}

/// Resolves the configuration location: explicit path, then environment, then default.
pub fn locate_config(explicit: Option<&Path>) -> ConfigSource {
    if let Some(path) = explicit {
        return ConfigSource::Explicit(path.to_path_buf());
    }
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(value) if !value.is_empty() => ConfigSource::Environment(PathBuf::from(value)),
        _ => ConfigSource::Default(PathBuf::from(DEFAULT_CONFIG_FILE)),
    }
}

/// Loads configuration from `source`.
///
/// # Errors
/// - Returns `Io` when an explicit or environment-named file cannot be read.
/// - Returns `Parse`/`Invalid` when the file content is rejected.
pub fn load_config(source: &ConfigSource) -> Result<AppConfig, ConfigError> {
    let path = source.path();
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound && matches!(source, ConfigSource::Default(_)) => {
            return Ok(AppConfig::default());
        }
        Err(err) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: err,
            });
        }
    };
    AppConfig::from_json_str(&raw)
}

/// Configuration load errors.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config JSON: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}
