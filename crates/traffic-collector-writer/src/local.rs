//! Local file sink.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use traffic_collector_core::RecordedRequest;

use crate::encoding::encode_batch;
use crate::error::{Result, WriterError};
use crate::path::file_name;
use crate::sink::Sink;

/// Appends each batch to `<dir>/<prefix>_<HHMMSS>.json`, creating the file
/// when needed. Two flushes within the same second land in the same file.
#[derive(Debug, Clone)]
pub struct LocalFileSink {
    dir: PathBuf,
    prefix: String,
}

impl LocalFileSink {
    pub fn new(dir: impl AsRef<Path>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl Sink for LocalFileSink {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn flush(&self, batch: &[RecordedRequest]) -> Result<String> {
        let path = self.dir.join(file_name(&self.prefix, Utc::now()));
        let data = encode_batch(batch)?;

        tracing::info!(path = %path.display(), records = batch.len(), "Writing to file");

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .await
            .map_err(|e| {
                WriterError::write_failure(format!("opening '{}': {}", path.display(), e))
            })?;

        file.write_all(&data).await.map_err(|e| {
            WriterError::write_failure(format!("writing to '{}': {}", path.display(), e))
        })?;
        file.flush().await.map_err(|e| {
            WriterError::write_failure(format!("flushing '{}': {}", path.display(), e))
        })?;

        Ok(path.display().to_string())
    }
}
