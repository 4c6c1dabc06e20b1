//! Connection settings for the embedded store. Built in code or read from env (`.env` honoured).

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteConnectOptions;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_URL: &str = "sqlite::memory:";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite URL, e.g. `sqlite::memory:` or `sqlite://data/library.db`.
    pub url: String,
    #[serde(default = "default_true")]
    pub create_if_missing: bool,
    /// Leave on: relation constraints are how dependent rows are protected on delete.
    #[serde(default = "default_true")]
    pub foreign_keys: bool,
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_busy_timeout() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self {
            url: DEFAULT_URL.into(),
            create_if_missing: true,
            foreign_keys: true,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            url: format!("sqlite://{}", path.as_ref().display()),
            ..Self::in_memory()
        }
    }

    /// Read `ENTITY_STORE_URL`, `ENTITY_STORE_BUSY_TIMEOUT_MS` and `ENTITY_STORE_FOREIGN_KEYS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::in_memory();
        if let Ok(url) = std::env::var("ENTITY_STORE_URL") {
            config.url = url;
        }
        if let Ok(v) = std::env::var("ENTITY_STORE_BUSY_TIMEOUT_MS") {
            config.busy_timeout_ms = v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "ENTITY_STORE_BUSY_TIMEOUT_MS",
                value: v.clone(),
            })?;
        }
        if let Ok(v) = std::env::var("ENTITY_STORE_FOREIGN_KEYS") {
            config.foreign_keys = parse_bool(&v).ok_or(ConfigError::InvalidValue {
                key: "ENTITY_STORE_FOREIGN_KEYS",
                value: v.clone(),
            })?;
        }
        Ok(config)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub(crate) fn connect_options(&self) -> Result<SqliteConnectOptions, ConfigError> {
        let options = SqliteConnectOptions::from_str(&self.url)
            .map_err(|e| ConfigError::Load(format!("{}: {}", self.url, e)))?;
        Ok(options
            .create_if_missing(self.create_if_missing)
            .foreign_keys(self.foreign_keys)
            .busy_timeout(self.busy_timeout()))
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_config_builds_sqlite_url() {
        let config = StoreConfig::file("/tmp/library.db");
        assert_eq!(config.url, "sqlite:///tmp/library.db");
        assert!(config.foreign_keys);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"url":"sqlite::memory:"}"#).unwrap();
        assert_eq!(config, StoreConfig::in_memory());
    }

    #[test]
    fn parses_boolean_spellings() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
