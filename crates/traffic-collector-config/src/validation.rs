// Configuration validation
//
// Validates that required fields are present and values are sensible

use super::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_batch_config(&config.batch)?;
    validate_request_config(&config.request)?;
    validate_storage_config(&config.storage)?;
    validate_server_config(&config.server)?;
    Ok(())
}

fn validate_batch_config(config: &BatchConfig) -> Result<()> {
    if config.max_records == 0 {
        bail!("batch.max_records must be greater than 0");
    }

    if config.max_records > 1_000_000 {
        warn!(
            max_records = config.max_records,
            "batch.max_records is very large; a full batch is held in memory until flushed"
        );
    }

    Ok(())
}

fn validate_request_config(config: &RequestConfig) -> Result<()> {
    if config.max_body_bytes == 0 {
        bail!("request.max_body_bytes must be greater than 0");
    }

    if config.max_body_bytes > 100 * 1024 * 1024 {
        warn!(
            max_body_bytes = config.max_body_bytes,
            "request.max_body_bytes is very large; may cause issues"
        );
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    match config.backend() {
        StorageBackend::File => {
            if config.file.prefix.is_empty() {
                bail!(
                    "File name prefix is required\n\n\
                    How to fix:\n\
                      • Environment: export FILENAME=sample_data\n\
                      • TOML: [storage.file]\n              prefix = \"sample_data\""
                );
            }
            if config.file.prefix.contains('/') {
                bail!(
                    "File name prefix '{}' must not contain '/'; use {}OUTPUT_DIR for the directory",
                    config.file.prefix,
                    ENV_PREFIX
                );
            }
            if config.file.dir.is_empty() {
                bail!("storage.file.dir must not be empty");
            }
        }
        StorageBackend::S3 => {
            if let Some(s3) = &config.s3 {
                if s3.region.is_none() {
                    warn!(
                        bucket = %s3.bucket,
                        "No S3 region configured; falling back to the AWS environment"
                    );
                }
            }
        }
    }

    Ok(())
}

fn validate_server_config(config: &ServerConfig) -> Result<()> {
    if config.port == 0 {
        bail!("server.port must be greater than 0");
    }

    if config.host.is_empty() {
        bail!("server.host must not be empty");
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.log_level.to_lowercase().as_str())
        && !config.log_level.contains('=')
    {
        warn!(
            log_level = %config.log_level,
            "Unrecognised log level; falling back to info"
        );
    }

    Ok(())
}
