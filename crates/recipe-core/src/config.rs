//! Root configuration model.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Deflate level the exporter uses unless configured otherwise.
pub const DEFAULT_COMPRESSION_LEVEL: i64 = 5;

/// Request timeout for the HTTP backend unless configured otherwise.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where recipes are persisted.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// One JSON file per recipe in a local directory.
    /// `path` defaults to the platform data directory.
    Directory {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
    /// A remote recipe API.
    Http {
        base_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Directory { path: None }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Deflate level (0-9) for zipped exports
    #[serde(default = "default_compression_level")]
    pub compression_level: i64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

fn default_compression_level() -> i64 {
    DEFAULT_COMPRESSION_LEVEL
}

/// Contents of `config.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub export: ExportConfig,
    /// Default tracing filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            export: ExportConfig::default(),
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
