//! Object store sink.
//!
//! Writes each batch as a new object through an OpenDAL operator (S3 in
//! production). Objects are created without any ACL grant, so they stay
//! private to the bucket owner.

use async_trait::async_trait;
use chrono::Utc;
use traffic_collector_core::RecordedRequest;

use crate::encoding::encode_batch;
use crate::error::{Result, WriterError};
use crate::path::object_key;
use crate::sink::Sink;

const CONTENT_TYPE: &str = "application/json";

pub struct ObjectStoreSink {
    operator: opendal::Operator,
    prefix: Option<String>,
}

impl ObjectStoreSink {
    pub fn new(operator: opendal::Operator, prefix: Option<String>) -> Self {
        Self { operator, prefix }
    }
}

#[async_trait]
impl Sink for ObjectStoreSink {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn flush(&self, batch: &[RecordedRequest]) -> Result<String> {
        let key = object_key(self.prefix.as_deref(), Utc::now());
        let data = encode_batch(batch)?;
        let bytes_written = data.len();

        self.operator
            .write_with(&key, data)
            .content_type(CONTENT_TYPE)
            .await
            .map_err(|e| WriterError::write_failure(format!("put object '{}': {}", key, e)))?;

        tracing::info!(
            key = %key,
            records = batch.len(),
            bytes = bytes_written,
            "Wrote batch to object store"
        );

        Ok(key)
    }
}
