//! Configuration: collaborator endpoints, batch limits, API and admin settings.
//!
//! Loaded from a TOML file; every section and key is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV: &str = "CATALOG_CONFIG";

const APP_DIR: &str = "airflow-catalog";

/// Configuration for batch downloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Largest batch, in bytes, that may be started.
    pub max_batch_bytes: u64,
    /// Number of archive-mode fetches in flight at once.
    pub concurrent_fetches: usize,
    /// Delay between consecutive direct-mode triggers, in milliseconds.
    pub direct_stagger_ms: u64,
    /// Stem of the synthesized archive file name.
    pub archive_name: String,
    /// Directory where archives and direct downloads are saved.
    pub output_dir: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_batch_bytes: 100 * 1024 * 1024,
            concurrent_fetches: 8,
            direct_stagger_ms: 300,
            archive_name: "selected_files".to_string(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl DownloadConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the batch size cap in bytes.
    #[must_use]
    pub const fn with_max_batch_bytes(mut self, bytes: u64) -> Self {
        self.max_batch_bytes = bytes;
        self
    }

    /// Sets the number of concurrent archive fetches.
    #[must_use]
    pub const fn with_concurrent_fetches(mut self, concurrent: usize) -> Self {
        self.concurrent_fetches = concurrent;
        self
    }

    /// Sets the delay between direct-mode triggers.
    #[must_use]
    pub const fn with_direct_stagger_ms(mut self, millis: u64) -> Self {
        self.direct_stagger_ms = millis;
        self
    }

    /// Sets the archive file name stem.
    #[must_use]
    pub fn with_archive_name(mut self, name: impl Into<String>) -> Self {
        self.archive_name = name.into();
        self
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    #[must_use]
    pub const fn direct_stagger(&self) -> Duration {
        Duration::from_millis(self.direct_stagger_ms)
    }
}

/// Where the metadata index and the storage listing come from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// URL returning the metadata index JSON array.
    pub metadata_url: Option<String>,
    /// URL of the listing/signing endpoint.
    pub listing_url: Option<String>,
    /// Storage prefix passed to the listing endpoint.
    pub listing_prefix: String,
}

/// API server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API server bind address.
    pub host: String,
    /// API server port.
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9724,
        }
    }
}

/// Admin settings for editing the metadata index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// JSON file holding the editable metadata array.
    pub metadata_file: PathBuf,
}

impl Default for AdminConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            metadata_file: data_dir.join(APP_DIR).join("metadata.json"),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sources: SourcesConfig,
    pub download: DownloadConfig,
    pub api: ApiConfig,
    pub admin: AdminConfig,
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration file location, honouring [`CONFIG_ENV`].
    #[must_use]
    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration TOML.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Loads configuration from `path`; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                log::debug!("Loading config from {}", path.display());
                Self::from_toml_str(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Loads from `path` if given, else from [`default_path`](Self::default_path).
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::load(&Self::default_path()),
        }
    }
}
