//! Batch sinks for captured traffic.
//!
//! A [`Sink`] durably writes one batch of recorded requests. Exactly one sink
//! is active per process, chosen from configuration by [`SinkTarget`].

mod encoding;
mod error;
mod local;
mod object_store;
mod path;
mod sink;
mod storage;

pub use encoding::encode_batch;
pub use error::{ErrorCode, Result, WriterError};
pub use local::LocalFileSink;
pub use object_store::ObjectStoreSink;
pub use path::{file_name, object_key};
pub use sink::{build_sink, Sink, SinkTarget};
pub use storage::build_s3_operator;
