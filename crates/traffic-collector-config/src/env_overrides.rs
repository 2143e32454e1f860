use super::{LogFormat, RuntimeConfig, S3Config};
use anyhow::{anyhow, Result};
use std::fmt::Display;
use std::str::FromStr;

pub const ENV_PREFIX: &str = "TRAFFIC_COLLECTOR_";

/// Abstraction over environment-variable lookups so tests can supply their
/// own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the TRAFFIC_COLLECTOR_ prefix.
    /// Used for the unprefixed deployment variables (PORT, S3_BUCKET, ...).
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Original deployment variables
    if let Some(timeout) = get_raw_env_parsed::<_, u64>(env, "TIMEOUT")? {
        config.request.timeout_secs = timeout;
    }
    if let Some(filename) = env.get_raw("FILENAME") {
        config.storage.file.prefix = filename;
    }
    if let Some(bucket) = env.get_raw("S3_BUCKET") {
        ensure_s3(config).bucket = bucket;
    }
    if let Some(port) = get_raw_env_parsed::<_, u16>(env, "PORT")? {
        config.server.port = port;
    }

    // Server configuration (log level/format)
    if let Some(level) = env.get("LOG_LEVEL") {
        config.server.log_level = level;
    }
    if let Some(format) = env.get("LOG_FORMAT") {
        config.server.log_format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    // Batch and request configuration
    if let Some(val) = get_env_parsed::<_, usize>(env, "BATCH_MAX_RECORDS")? {
        config.batch.max_records = val;
    }
    if let Some(val) = get_env_parsed::<_, usize>(env, "MAX_BODY_BYTES")? {
        config.request.max_body_bytes = val;
    }

    // Local file storage
    if let Some(dir) = env.get("OUTPUT_DIR") {
        config.storage.file.dir = dir;
    }

    // S3 storage
    if let Some(region) = env.get("S3_REGION") {
        ensure_s3(config).region = Some(region);
    }
    if let Some(endpoint) = env.get("S3_ENDPOINT") {
        ensure_s3(config).endpoint = Some(endpoint);
    }
    if let Some(prefix) = env.get("S3_PREFIX") {
        ensure_s3(config).prefix = normalize_prefix(prefix);
    }

    Ok(())
}

fn ensure_s3(config: &mut RuntimeConfig) -> &mut S3Config {
    config.storage.s3.get_or_insert_with(S3Config::default)
}

fn get_env_parsed<E, T>(env: &E, key: &str) -> Result<Option<T>>
where
    E: EnvSource,
    T: FromStr,
    T::Err: Display,
{
    env.get(key)
        .map(|val| {
            val.trim()
                .parse::<T>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))
        })
        .transpose()
}

fn get_raw_env_parsed<E, T>(env: &E, key: &str) -> Result<Option<T>>
where
    E: EnvSource,
    T: FromStr,
    T::Err: Display,
{
    env.get_raw(key)
        .map(|val| {
            val.trim()
                .parse::<T>()
                .map_err(|e| anyhow!("Failed to parse {}: {}", key, e))
        })
        .transpose()
}

pub(crate) fn normalize_prefix(prefix: String) -> Option<String> {
    if prefix.is_empty() {
        None
    } else if prefix.ends_with('/') {
        Some(prefix)
    } else {
        Some(format!("{}/", prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageBackend;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapEnv {
        vars: HashMap<String, String>,
    }

    impl MapEnv {
        fn with(mut self, key: &str, value: &str) -> Self {
            self.vars.insert(key.to_string(), value.to_string());
            self
        }
    }

    impl EnvSource for MapEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(&format!("{}{}", ENV_PREFIX, key)).cloned()
        }

        fn get_raw(&self, key: &str) -> Option<String> {
            self.vars.get(key).cloned()
        }
    }

    #[test]
    fn unprefixed_variables_override_defaults() {
        let env = MapEnv::default()
            .with("TIMEOUT", "30")
            .with("FILENAME", "capture")
            .with("PORT", "9090");

        let mut config = RuntimeConfig::default();
        apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.request.timeout_secs, 30);
        assert_eq!(config.storage.file.prefix, "capture");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.storage.backend(), StorageBackend::File);
    }

    #[test]
    fn bucket_variable_selects_s3() {
        let env = MapEnv::default()
            .with("S3_BUCKET", "traffic")
            .with("TRAFFIC_COLLECTOR_S3_REGION", "eu-west-1")
            .with("TRAFFIC_COLLECTOR_S3_PREFIX", "staging");

        let mut config = RuntimeConfig::default();
        apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.storage.backend(), StorageBackend::S3);
        let s3 = config.storage.s3.unwrap();
        assert_eq!(s3.bucket, "traffic");
        assert_eq!(s3.region.as_deref(), Some("eu-west-1"));
        assert_eq!(s3.prefix.as_deref(), Some("staging/"));
    }

    #[test]
    fn empty_bucket_variable_keeps_file_backend() {
        let env = MapEnv::default().with("S3_BUCKET", "");
        let mut config = RuntimeConfig::default();
        apply_env_overrides(&mut config, &env).unwrap();
        assert_eq!(config.storage.backend(), StorageBackend::File);
    }

    #[test]
    fn prefixed_variables_override_defaults() {
        let env = MapEnv::default()
            .with("TRAFFIC_COLLECTOR_LOG_LEVEL", "debug")
            .with("TRAFFIC_COLLECTOR_LOG_FORMAT", "JSON")
            .with("TRAFFIC_COLLECTOR_BATCH_MAX_RECORDS", "250")
            .with("TRAFFIC_COLLECTOR_MAX_BODY_BYTES", "1024")
            .with("TRAFFIC_COLLECTOR_OUTPUT_DIR", "/var/lib/collector");

        let mut config = RuntimeConfig::default();
        apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.server.log_format, LogFormat::Json);
        assert_eq!(config.batch.max_records, 250);
        assert_eq!(config.request.max_body_bytes, 1024);
        assert_eq!(config.storage.file.dir, "/var/lib/collector");
    }

    #[test]
    fn invalid_port_is_an_error() {
        let env = MapEnv::default().with("PORT", "http");
        let mut config = RuntimeConfig::default();
        let err = apply_env_overrides(&mut config, &env).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn prefix_normalization() {
        assert_eq!(normalize_prefix(String::new()), None);
        assert_eq!(normalize_prefix("a/".to_string()).as_deref(), Some("a/"));
        assert_eq!(normalize_prefix("a".to_string()).as_deref(), Some("a/"));
    }
}
