// traffic-collector-config - Layered configuration for the collector
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from TRAFFIC_COLLECTOR_CONFIG env var
// 3. Default config file location (./traffic-collector.toml)
// 4. Built-in defaults (lowest priority)
//
// The unprefixed variables TIMEOUT, FILENAME, S3_BUCKET and PORT are honoured
// so existing deployments keep working without renaming anything.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{apply_env_overrides, EnvSource, ENV_PREFIX};

/// Number of captured requests that triggers a flush.
pub const DEFAULT_BATCH_MAX_RECORDS: usize = 1000;

/// Main runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub request: RequestConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Batch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_records: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_BATCH_MAX_RECORDS,
        }
    }
}

/// Request handling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub max_body_bytes: usize,
    /// Carried over from the `TIMEOUT` variable. Reported at startup only.
    pub timeout_secs: u64,
}

impl RequestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 8 * 1024 * 1024,
            timeout_secs: 5,
        }
    }
}

/// Storage configuration. A non-empty S3 bucket wins over the local file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub file: FileConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Config>,
}

impl StorageConfig {
    /// The backend that receives flushed batches.
    pub fn backend(&self) -> StorageBackend {
        match &self.s3 {
            Some(s3) if !s3.bucket.is_empty() => StorageBackend::S3,
            _ => StorageBackend::File,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    File,
    S3,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::File => write!(f, "file"),
            StorageBackend::S3 => write!(f, "s3"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// File name prefix; files are named `<prefix>_<HHMMSS>.json`.
    pub prefix: String,
    /// Directory the files are written to.
    pub dir: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            prefix: "sample_data".to_string(),
            dir: ".".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Key prefix, always ending in `/` once normalised.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl RuntimeConfig {
    /// Load configuration from the default file locations and the process environment.
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration from a specific file path (for CLI usage).
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Merge a file-sourced config into this one (used for TOML layering).
    pub fn merge(&mut self, other: RuntimeConfig) {
        self.batch = other.batch;
        self.request = other.request;
        self.storage = other.storage;
        self.server = other.server;
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let config = RuntimeConfig::default();
        assert_eq!(config.batch.max_records, 1000);
        assert_eq!(config.storage.file.prefix, "sample_data");
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.listen_addr(), "0.0.0.0:8081");
        assert_eq!(config.request.timeout(), Duration::from_secs(5));
        assert_eq!(config.server.log_format, LogFormat::Text);
        assert_eq!(config.storage.backend(), StorageBackend::File);
    }

    #[test]
    fn empty_bucket_selects_file_backend() {
        let mut storage = StorageConfig {
            s3: Some(S3Config::default()),
            ..Default::default()
        };
        assert_eq!(storage.backend(), StorageBackend::File);

        storage.s3.as_mut().unwrap().bucket = "captures".to_string();
        assert_eq!(storage.backend(), StorageBackend::S3);
        assert_eq!(storage.backend().to_string(), "s3");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: RuntimeConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [storage.s3]
            bucket = "captures"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.batch.max_records, DEFAULT_BATCH_MAX_RECORDS);
        assert_eq!(config.storage.file.prefix, "sample_data");
        assert_eq!(config.storage.backend(), StorageBackend::S3);
    }
}
