//! Configuration management for yourtime.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;
use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "yourtime";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "stopwatch.db";

/// Placeholder label given to new records.
pub const DEFAULT_RECORD_NAME: &str = "untilted";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `YOURTIME_`, sections split on `__`)
/// 2. TOML config file at `~/.config/yourtime/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Timer configuration.
    pub timer: TimerConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/yourtime/stopwatch.db`
    pub database_path: Option<PathBuf>,
}

/// Timer-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Tick and poll period in milliseconds.
    pub period_ms: u64,
    /// Name given to records created without one.
    pub default_name: String,
    /// Consecutive store failures before an engine reports the store as degraded.
    pub failure_threshold: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            period_ms: 1_000,
            default_name: DEFAULT_RECORD_NAME.to_string(),
            failure_threshold: 5,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("YOURTIME_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
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
        if self.timer.period_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "period_ms must be greater than 0".to_string(),
            });
        }

        if self.timer.default_name.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "default_name must not be blank".to_string(),
            });
        }

        if self.timer.failure_threshold == 0 {
            return Err(Error::ConfigValidation {
                message: "failure_threshold must be greater than 0".to_string(),
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

    /// Get the tick/poll period as a Duration.
    #[must_use]
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.timer.period_ms)
    }

    /// Settings for mounting a timer engine.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            period: self.period(),
            failure_threshold: self.timer.failure_threshold,
            placeholder_name: self.timer.default_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.storage.database_path.is_none());
        assert_eq!(config.timer.period_ms, 1_000);
        assert_eq!(config.timer.default_name, "untilted");
        assert_eq!(config.timer.failure_threshold, 5);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_period() {
        let mut config = Config::default();
        config.timer.period_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("period_ms"));
    }

    #[test]
    fn test_validate_blank_default_name() {
        let mut config = Config::default();
        config.timer.default_name = "   ".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("default_name"));
    }

    #[test]
    fn test_validate_zero_failure_threshold() {
        let mut config = Config::default();
        config.timer.failure_threshold = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("failure_threshold"));
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("stopwatch.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_period() {
        assert_eq!(Config::default().period(), Duration::from_secs(1));
    }

    #[test]
    fn test_engine_config() {
        let mut config = Config::default();
        config.timer.period_ms = 250;
        config.timer.default_name = "task".to_string();

        let engine = config.engine_config();
        assert_eq!(engine.period, Duration::from_millis(250));
        assert_eq!(engine.failure_threshold, 5);
        assert_eq!(engine.placeholder_name, "task");
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("yourtime"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_default_data_dir() {
        assert!(Config::default_data_dir()
            .to_string_lossy()
            .contains("yourtime"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[timer]\nperiod_ms = 500\ndefault_name = \"focus\"\n\n[storage]\ndatabase_path = \"/tmp/yt.db\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.timer.period_ms, 500);
        assert_eq!(config.timer.default_name, "focus");
        assert_eq!(config.timer.failure_threshold, 5);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/yt.db"));
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[timer]\nperiod_ms = 0\n").unwrap();

        assert!(Config::load_from(Some(path)).is_err());
    }

    #[test]
    fn test_timer_config_deserialize_partial() {
        let json = r#"{"period_ms": 2000}"#;
        let timer: TimerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(timer.period_ms, 2_000);
        assert_eq!(timer.default_name, "untilted");
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("period_ms"));
        assert!(json.contains("database_path"));
    }
}
