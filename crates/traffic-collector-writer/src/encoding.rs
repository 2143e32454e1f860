//! Batch serialization.
//!
//! A batch is written as a JSON array of recorded requests, indented with a
//! single space per nesting level.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use traffic_collector_core::RecordedRequest;

use crate::error::{Result, WriterError};

const INDENT: &[u8] = b" ";

pub fn encode_batch(batch: &[RecordedRequest]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(batch.len() * 256);
    let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(INDENT));
    batch
        .serialize(&mut serializer)
        .map_err(|e| WriterError::encode(e.to_string()))?;
    Ok(out)
}
