use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use traffic_collector_config::{RuntimeConfig, StorageBackend};

/// Passive HTTP traffic collector writing captured requests to files or S3
#[derive(Parser)]
#[command(name = "traffic-collector")]
#[command(version)]
#[command(about = "Passive HTTP traffic collector writing captured requests to files or S3", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// HTTP listen port (overrides config file and PORT)
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Output directory for batch files (file backend only)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load().context("Failed to load configuration")?
    };

    apply_cli_overrides(&mut config, &cli)?;
    config.validate()?;

    traffic_collector::init_tracing(&config);

    validate_output(&config)?;
    display_startup_info(&config);

    traffic_collector::run_with_config(config).await
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) -> Result<()> {
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    if let Some(output) = &cli.output {
        if config.storage.backend() != StorageBackend::File {
            anyhow::bail!(
                "--output flag only works with the file backend, but backend is '{}'.\n\
                Either remove --output or unset S3_BUCKET.",
                config.storage.backend()
            );
        }
        config.storage.file.dir = output.to_string_lossy().to_string();
    }

    if let Some(level) = &cli.log_level {
        config.server.log_level = level.clone();
    }

    Ok(())
}

/// Create the output directory and make sure it is writable before the
/// first request arrives.
fn validate_output(config: &RuntimeConfig) -> Result<()> {
    use std::fs;
    use tracing::info;

    if config.storage.backend() != StorageBackend::File {
        return Ok(());
    }

    let dir = &config.storage.file.dir;
    let output_path = PathBuf::from(dir);

    if !output_path.exists() {
        info!("Creating output directory: {}", dir);
        fs::create_dir_all(&output_path)
            .with_context(|| format!("Failed to create output directory: {}", dir))?;
    }

    let test_file = output_path.join(".traffic-collector-write-test");
    fs::write(&test_file, b"test").with_context(|| {
        format!(
            "Output directory '{}' is not writable. Check permissions.",
            dir
        )
    })?;
    fs::remove_file(&test_file).context("Failed to remove test file")?;
    info!("Output directory validated: {}", dir);

    Ok(())
}

fn display_startup_info(config: &RuntimeConfig) {
    use tracing::info;

    let backend = config.storage.backend();

    info!("╭─────────────────────────────────────────────────");
    info!("│ traffic-collector v{}", env!("CARGO_PKG_VERSION"));
    info!("├─────────────────────────────────────────────────");
    info!("│ Listen address: http://{}", config.server.listen_addr());
    info!("│ Storage backend: {}", backend);

    match (backend, &config.storage.s3) {
        (StorageBackend::S3, Some(s3)) => {
            info!("│ S3 bucket: {}", s3.bucket);
            if let Some(region) = &s3.region {
                info!("│ S3 region: {}", region);
            }
            if let Some(prefix) = &s3.prefix {
                info!("│ Key prefix: {}", prefix);
            }
        }
        _ => {
            info!("│ Output directory: {}", config.storage.file.dir);
            info!("│ File prefix: {}", config.storage.file.prefix);
        }
    }

    info!("│ Log level: {}", config.server.log_level);
    info!("│ Batch size: {} records", config.batch.max_records);
    info!("│ Shutdown grace: {}s", config.request.timeout_secs);
    info!("╰─────────────────────────────────────────────────");
}
