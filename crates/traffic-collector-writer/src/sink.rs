//! Sink abstraction and selection.

use async_trait::async_trait;
use std::sync::Arc;
use traffic_collector_config::{FileConfig, S3Config, StorageBackend, StorageConfig};
use traffic_collector_core::RecordedRequest;

use crate::error::Result;
use crate::local::LocalFileSink;
use crate::object_store::ObjectStoreSink;
use crate::storage::build_s3_operator;

/// Durable write of one batch.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Persist `batch` and return where it was written.
    async fn flush(&self, batch: &[RecordedRequest]) -> Result<String>;
}

/// The single storage target selected at startup.
#[derive(Debug, Clone)]
pub enum SinkTarget {
    ObjectStore(S3Config),
    LocalFile(FileConfig),
}

impl SinkTarget {
    /// A non-empty bucket selects the object store, otherwise the local file.
    pub fn from_config(storage: &StorageConfig) -> Self {
        match (storage.backend(), &storage.s3) {
            (StorageBackend::S3, Some(s3)) => SinkTarget::ObjectStore(s3.clone()),
            _ => SinkTarget::LocalFile(storage.file.clone()),
        }
    }

    pub fn backend(&self) -> StorageBackend {
        match self {
            SinkTarget::ObjectStore(_) => StorageBackend::S3,
            SinkTarget::LocalFile(_) => StorageBackend::File,
        }
    }
}

/// Construct the sink for `target`.
pub fn build_sink(target: &SinkTarget) -> Result<Arc<dyn Sink>> {
    let sink: Arc<dyn Sink> = match target {
        SinkTarget::ObjectStore(s3) => {
            let operator = build_s3_operator(s3)?;
            Arc::new(ObjectStoreSink::new(operator, s3.prefix.clone()))
        }
        SinkTarget::LocalFile(file) => Arc::new(LocalFileSink::new(&file.dir, &file.prefix)),
    };
    Ok(sink)
}
