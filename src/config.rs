// src/config.rs

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::fetch::SourceTemplate;
use crate::schema::KeywordRegistry;

/// Built-in settings, used when no config file is supplied.
const DEFAULT_CONFIG: &str = include_str!("../config/default.yaml");

/// Env var naming an alternative config file.
pub const CONFIG_ENV: &str = "JEPX_CONFIG";
const LOCAL_CONFIG: &str = "config/jepx.yaml";

pub const MAX_RETRIES_PER_SOURCE: u32 = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to deserialize config: {0}")]
    Serde(#[from] serde_yaml::Error),
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    #[serde(default)]
    pub referer: Option<String>,
    #[serde(default = "default_retries")]
    pub retries_per_source: u32,
    #[serde(default = "default_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Encoding label assumed when the payload declares none.
    pub default_encoding: String,
    pub min_payload_bytes: usize,
}

fn default_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_prefix() -> String {
    "spot_".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: PathBuf,
    #[serde(default = "default_prefix")]
    pub file_prefix: String,
    /// Earliest fiscal year the publisher has ever served.
    pub floor_year: i32,
    pub transport: TransportConfig,
    /// Candidates for a single fiscal year, tried in order.
    pub current: Vec<SourceTemplate>,
    /// Candidates for the consolidated multi-year history payload.
    #[serde(default)]
    pub archive: Vec<SourceTemplate>,
    #[serde(default)]
    pub backfill_years: bool,
    pub registry: KeywordRegistry,
}

impl Settings {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_yaml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml(DEFAULT_CONFIG)
    }

    /// `$JEPX_CONFIG`, then `config/jepx.yaml`, then the built-in defaults.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = env::var(CONFIG_ENV) {
            info!(path = %path, "loading settings from {}", CONFIG_ENV);
            return Self::from_file(path);
        }
        if Path::new(LOCAL_CONFIG).is_file() {
            info!(path = LOCAL_CONFIG, "loading settings");
            return Self::from_file(LOCAL_CONFIG);
        }
        info!("using built-in settings");
        Self::builtin()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.current.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one `current` source is required".into(),
            ));
        }
        if self.transport.timeout_secs == 0 {
            return Err(ConfigError::Invalid("`timeout_secs` must be at least 1".into()));
        }
        if self.transport.retries_per_source > MAX_RETRIES_PER_SOURCE {
            return Err(ConfigError::Invalid(format!(
                "`retries_per_source` is {}, the limit is {}",
                self.transport.retries_per_source, MAX_RETRIES_PER_SOURCE
            )));
        }
        if self.file_prefix.is_empty() {
            return Err(ConfigError::Invalid("`file_prefix` must not be empty".into()));
        }
        if encoding_rs::Encoding::for_label(self.transport.default_encoding.as_bytes()).is_none()
        {
            return Err(ConfigError::Invalid(format!(
                "unknown encoding label `{}`",
                self.transport.default_encoding
            )));
        }
        for source in self.current.iter().chain(&self.archive) {
            source
                .resolve(self.floor_year)
                .check()
                .map_err(ConfigError::Invalid)?;
        }
        self.registry.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_settings_are_valid() {
        let settings = Settings::builtin().expect("built-in config must load");
        assert_eq!(settings.file_prefix, "spot_");
        assert_eq!(settings.floor_year, 2005);
        assert!(!settings.current.is_empty());
        assert!(settings.registry.areas.iter().any(|a| a.area == "System"));
    }

    #[test]
    fn test_rejects_unknown_encoding() {
        let text = DEFAULT_CONFIG.replace("default_encoding: Shift_JIS", "default_encoding: klingon");
        let err = Settings::from_yaml(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("klingon")));
    }

    #[test]
    fn test_rejects_missing_current_sources() {
        let mut settings = Settings::builtin().unwrap();
        settings.current.clear();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_timeout_and_runaway_retries() {
        let mut settings = Settings::builtin().unwrap();
        settings.transport.timeout_secs = 0;
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("timeout_secs")));

        let mut settings = Settings::builtin().unwrap();
        settings.transport.retries_per_source = MAX_RETRIES_PER_SOURCE;
        assert!(settings.validate().is_ok());
        settings.transport.retries_per_source = 70;
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("retries_per_source")));
    }
}
