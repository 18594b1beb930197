//! Configuration for keyquiz
//!
//! # Configuration File Format
//!
//! TOML format, by default in `<data dir>/keyquiz/config.toml`:
//!
//! ```toml
//! [backend]
//! base_url = "http://localhost:8000"
//! timeout_seconds = 30
//!
//! [tracking]
//! default_threshold = 5
//! history_limit = 100
//!
//! [storage]
//! db_path = "/home/me/.local/share/keyquiz/state.db"
//!
//! [server]
//! addr = "127.0.0.1:3000"
//! ```
//!
//! `KEYQUIZ_BACKEND_URL` and `KEYQUIZ_DB_PATH` override the file.

use crate::error::{KeyquizError, Result};
use crate::types::{DEFAULT_HISTORY_LIMIT, DEFAULT_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `backend.base_url`
pub const BACKEND_URL_ENV: &str = "KEYQUIZ_BACKEND_URL";

/// Environment variable overriding `storage.db_path`
pub const DB_PATH_ENV: &str = "KEYQUIZ_DB_PATH";

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyquizConfig {
    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub tracking: TrackingSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub server: ServerSettings,
}

/// Quiz backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL of the quiz generation service
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    /// Upper bound for a single backend call
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default = "default_quiz_path")]
    pub quiz_path: String,

    #[serde(default = "default_keywords_path")]
    pub keywords_path: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            timeout_seconds: default_timeout_seconds(),
            quiz_path: default_quiz_path(),
            keywords_path: default_keywords_path(),
        }
    }
}

impl BackendSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Tracking engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSettings {
    /// Threshold for topics that do not set their own
    #[serde(default = "default_threshold")]
    pub default_threshold: u32,

    /// Maximum number of quiz completions kept
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_THRESHOLD,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// State store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_addr")]
    pub addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: default_addr(),
        }
    }
}

// Default value helpers
fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_quiz_path() -> String {
    "/generate-quiz".to_string()
}

fn default_keywords_path() -> String {
    "/generate-keywords".to_string()
}

fn default_threshold() -> u32 {
    DEFAULT_THRESHOLD
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("keyquiz")
}

fn default_db_path() -> PathBuf {
    data_dir().join("state.db")
}

impl KeyquizConfig {
    /// Default location of the configuration file
    pub fn default_path() -> PathBuf {
        data_dir().join("config.toml")
    }

    /// Load configuration from file, falling back to defaults if it is missing
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("Config file not found, using defaults: {:?}", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            KeyquizError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file: {}", e),
            ))
        })?;

        let config: KeyquizConfig = toml::from_str(&content)
            .map_err(|e| KeyquizError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| KeyquizError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                KeyquizError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create config directory: {}", e),
                ))
            })?;
        }

        std::fs::write(path, content).map_err(|e| {
            KeyquizError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write config file: {}", e),
            ))
        })?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Apply `KEYQUIZ_*` environment overrides
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup (environment in production)
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BACKEND_URL_ENV).filter(|v| !v.trim().is_empty()) {
            tracing::debug!("Backend URL overridden by {}", BACKEND_URL_ENV);
            self.backend.base_url = url;
        }
        if let Some(path) = lookup(DB_PATH_ENV).filter(|v| !v.trim().is_empty()) {
            tracing::debug!("Database path overridden by {}", DB_PATH_ENV);
            self.storage.db_path = PathBuf::from(path);
        }
        self
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.tracking.default_threshold == 0 {
            return Err(KeyquizError::Config(
                "tracking.default_threshold must be at least 1".to_string(),
            ));
        }
        if self.tracking.history_limit == 0 {
            return Err(KeyquizError::Config(
                "tracking.history_limit must be at least 1".to_string(),
            ));
        }
        if self.backend.timeout_seconds == 0 {
            return Err(KeyquizError::Config(
                "backend.timeout_seconds must be at least 1".to_string(),
            ));
        }
        if self.backend.base_url.trim().is_empty() {
            return Err(KeyquizError::Config("backend.base_url is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = KeyquizConfig::default();
        assert_eq!(config.backend.base_url, "http://localhost:8000");
        assert_eq!(config.backend.timeout(), Duration::from_secs(30));
        assert_eq!(config.tracking.default_threshold, 5);
        assert_eq!(config.tracking.history_limit, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = KeyquizConfig::load(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, KeyquizConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = KeyquizConfig::default();
        config.tracking.default_threshold = 3;
        config.backend.base_url = "http://quiz.internal:9000".to_string();
        config.save(&path).unwrap();

        let loaded = KeyquizConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[tracking]\ndefault_threshold = 7\n").unwrap();

        let config = KeyquizConfig::load(&path).unwrap();
        assert_eq!(config.tracking.default_threshold, 7);
        assert_eq!(config.tracking.history_limit, 100);
        assert_eq!(config.backend.quiz_path, "/generate-quiz");
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[tracking]\ndefault_threshold = 0\n").unwrap();

        let err = KeyquizConfig::load(&path).unwrap_err();
        assert!(matches!(err, KeyquizError::Config(_)));
    }

    #[test]
    fn test_overrides() {
        let config = KeyquizConfig::default().with_overrides(|name| match name {
            BACKEND_URL_ENV => Some("http://other:1234".to_string()),
            DB_PATH_ENV => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.backend.base_url, "http://other:1234");
        assert_eq!(config.storage.db_path, default_db_path());
    }
}
