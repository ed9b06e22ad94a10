//! Configuration management for clipredact.
//!
//! This module loads process settings using figment, supporting TOML config
//! files, environment variables, and defaults. Detection rules are not part
//! of this configuration; they live in the database and are managed through
//! [`ConfigManager`](crate::rules::ConfigManager).

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "clipredact";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "clipredact.db";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "CLIPREDACT_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CLIPREDACT_`, sections separated
///    by `__`, e.g. `CLIPREDACT_MONITOR__MAX_CONTENT_LENGTH`)
/// 2. TOML config file at `~/.config/clipredact/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Monitor configuration.
    pub monitor: MonitorConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/clipredact/clipredact.db`
    pub database_path: Option<PathBuf>,
    /// Maximum number of audit entries to retain.
    /// Set to 0 for unlimited.
    pub max_audit_entries: usize,
}

/// Monitor loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Delay before the next read after the text source fails, in milliseconds.
    pub read_error_backoff_ms: u64,
    /// Text longer than this many bytes is left alone.
    pub max_content_length: usize,
    /// How often `run` checks the database for rule edits made by other
    /// processes, in milliseconds.
    pub rules_check_interval_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            max_audit_entries: 10_000,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            read_error_backoff_ms: 1_000,
            max_content_length: 1_000_000,
            rules_check_interval_ms: 1_000,
        }
    }
}

impl MonitorConfig {
    /// Get the read error backoff as a Duration.
    #[must_use]
    pub fn read_error_backoff(&self) -> Duration {
        Duration::from_millis(self.read_error_backoff_ms)
    }

    /// Get the rule check interval as a Duration.
    #[must_use]
    pub fn rules_check_interval(&self) -> Duration {
        Duration::from_millis(self.rules_check_interval_ms)
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        let config = Self::figment(&config_file).extract::<Config>()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_file: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.monitor.read_error_backoff_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "read_error_backoff_ms must be greater than 0".to_string(),
            });
        }

        if self.monitor.max_content_length == 0 {
            return Err(Error::ConfigValidation {
                message: "max_content_length must be greater than 0".to_string(),
            });
        }

        if self.monitor.rules_check_interval_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "rules_check_interval_ms must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }
}
