//! Configuration module for backend selection, compression and gathering
//!
//! The configuration is read from a TOML file and can be overridden per key
//! through `SLAPPER_`-prefixed environment variables, where the section and
//! key are joined with `_` (for example `SLAPPER_DATABASE_URI`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::{Result, SnapshotError};

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "SLAPPER";

/// Default system configuration directory
pub const DEFAULT_SYSTEM_CONFIG_DIR: &str = "/etc";

/// Enumeration of supported storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Embedded single-file SQLite database
    Sqlite,
    /// PostgreSQL server
    Postgres,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Sqlite => "sqlite",
            StorageBackend::Postgres => "postgres",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "postgres" => Ok(StorageBackend::Postgres),
            other => Err(SnapshotError::UnsupportedBackend(other.to_string())),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines on stderr
    Text,
    /// One JSON object per line
    Json,
}

/// `[database]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Storage type tag, `sqlite` or `postgres`
    #[serde(rename = "type")]
    pub kind: String,
    /// Connection string: a file path for SQLite, a libpq URI for PostgreSQL
    pub uri: String,
}

impl DatabaseConfig {
    /// Parse the type tag
    pub fn backend(&self) -> Result<StorageBackend> {
        self.kind.parse()
    }
}

/// `[compression]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub algorithm: String,
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            algorithm: "gzip".to_string(),
            level: 6,
        }
    }
}

/// `[gather]` section. Empty strings mean "not configured".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatherConfig {
    /// Overrides `<home>/.config`
    pub xdg_config_home: String,
    /// Colon-separated list, overrides `/etc/xdg`
    pub xdg_config_dirs: String,
    pub system_config_dir: String,
}

impl Default for GatherConfig {
    fn default() -> Self {
        Self {
            xdg_config_home: String::new(),
            xdg_config_dirs: String::new(),
            system_config_dir: DEFAULT_SYSTEM_CONFIG_DIR.to_string(),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl LoggingConfig {
    /// Anything other than `json` selects text output
    pub fn log_format(&self) -> LogFormat {
        if self.format.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub compression: CompressionConfig,
    pub gather: GatherConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file, apply environment overrides,
    /// fill defaults and validate
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SnapshotError::config(format!("error reading config {}: {e}", path.display()))
        })?;

        let mut config = Self::from_toml_str(&contents)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.finalize()?;
        Ok(config)
    }

    /// Parse configuration from TOML text without overrides or validation
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| SnapshotError::config(format!("error unmarshaling config: {e}")))
    }

    /// Apply `SLAPPER_*` overrides using the given lookup function
    ///
    /// A variable that is set but empty counts as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(&format!("{ENV_PREFIX}_{key}")).filter(|v| !v.is_empty());

        if let Some(value) = var("DATABASE_TYPE") {
            self.database.kind = value;
        }
        if let Some(value) = var("DATABASE_URI") {
            self.database.uri = value;
        }
        if let Some(value) = var("COMPRESSION_ALGORITHM") {
            self.compression.algorithm = value;
        }
        if let Some(value) = var("COMPRESSION_LEVEL") {
            self.compression.level = value.trim().parse().map_err(|_| {
                SnapshotError::config(format!(
                    "{ENV_PREFIX}_COMPRESSION_LEVEL must be an integer, got {value:?}"
                ))
            })?;
        }
        if let Some(value) = var("GATHER_XDG_CONFIG_HOME") {
            self.gather.xdg_config_home = value;
        }
        if let Some(value) = var("GATHER_XDG_CONFIG_DIRS") {
            self.gather.xdg_config_dirs = value;
        }
        if let Some(value) = var("GATHER_SYSTEM_CONFIG_DIR") {
            self.gather.system_config_dir = value;
        }
        if let Some(value) = var("LOGGING_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = var("LOGGING_FORMAT") {
            self.logging.format = value;
        }
        Ok(())
    }

    /// Fill defaults for empty values, then validate
    pub fn finalize(&mut self) -> Result<()> {
        if self.gather.system_config_dir.is_empty() {
            self.gather.system_config_dir = DEFAULT_SYSTEM_CONFIG_DIR.to_string();
        }
        if self.logging.level.is_empty() {
            self.logging.level = "info".to_string();
        }
        if self.logging.format.is_empty() {
            self.logging.format = "text".to_string();
        }
        self.validate()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.kind.is_empty() {
            return Err(SnapshotError::config("database.type is required"));
        }
        if self.database.uri.is_empty() {
            return Err(SnapshotError::config("database.uri is required"));
        }
        Ok(())
    }
}
