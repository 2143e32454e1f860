// Initialization utilities for the collector
//
// Sink selection and logging/tracing setup

use anyhow::Result;
use std::sync::Arc;
use traffic_collector_config::{LogFormat, RuntimeConfig};
use traffic_collector_writer::{build_sink, Sink, SinkTarget};
use tracing::info;

/// Build the single sink this process flushes into.
pub(crate) fn init_sink(target: &SinkTarget) -> Result<Arc<dyn Sink>> {
    info!("Initializing sink with storage backend: {}", target.backend());

    match target {
        SinkTarget::LocalFile(file) => {
            info!(
                "Using local file storage: dir={}, prefix={}",
                file.dir, file.prefix
            );
        }
        SinkTarget::ObjectStore(s3) => {
            info!(
                "Using S3 storage: bucket={}, region={}",
                s3.bucket,
                s3.region.as_deref().unwrap_or("<from environment>")
            );
        }
    }

    build_sink(target).map_err(|e| anyhow::anyhow!("Failed to initialize sink: {}", e))
}

/// Initialize tracing/logging from RuntimeConfig
pub fn init_tracing(config: &RuntimeConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let server = &config.server;
    let env_filter =
        EnvFilter::try_new(&server.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Ignore the error if a subscriber is already set (idempotent)
    let _ = match server.log_format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
    };
}
