//! Storage operator construction.

use traffic_collector_config::S3Config;

use super::error::{Result, WriterError};

/// Build an OpenDAL S3 operator for the configured bucket.
///
/// Credentials and, when not configured, the region come from the standard
/// AWS environment.
pub fn build_s3_operator(s3: &S3Config) -> Result<opendal::Operator> {
    if s3.bucket.is_empty() {
        return Err(WriterError::invalid_config(
            "S3 bucket name is required for the object store sink",
        ));
    }

    let mut builder = opendal::services::S3::default().bucket(&s3.bucket);

    if let Some(region) = &s3.region {
        builder = builder.region(region);
    }
    if let Some(endpoint) = &s3.endpoint {
        builder = builder.endpoint(endpoint);
    }

    let operator = opendal::Operator::new(builder)
        .map_err(|e| WriterError::invalid_config(format!("Failed to create S3 operator: {}", e)))?
        .finish();

    tracing::debug!(bucket = %s3.bucket, "S3 operator initialized");
    Ok(operator)
}
