// traffic-collector-core - Captured request model
//
// This crate holds the immutable snapshot of one inbound HTTP call and the
// helpers that turn `http` request parts into it. No I/O, no async.

pub mod record;

pub use record::{canonical_header_name, RecordedRequest, ValueMap};
