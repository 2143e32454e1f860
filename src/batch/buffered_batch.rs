// Pending batch accumulation logic
//
// Owns the ordered list of captured requests and flushes it through the sink
// once the record threshold is reached or a flush is requested.

use metrics::counter;
use std::sync::Arc;
use tracing::{debug, error, info};
use traffic_collector_core::RecordedRequest;
use traffic_collector_writer::Sink;

/// Why a flush was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// The pending batch reached `max_records`.
    Threshold,
    /// A flush-now command arrived.
    Requested,
    /// Final flush before the worker stops.
    Shutdown,
    /// Every producer went away while records were still pending.
    Closed,
}

impl FlushReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Threshold => "threshold",
            Self::Requested => "requested",
            Self::Shutdown => "shutdown",
            Self::Closed => "closed",
        }
    }
}

/// Result of one flush attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending; the sink was not called.
    Empty,
    Written { location: String, records: usize },
    /// The sink failed. The records are gone.
    Failed { records: usize, error: String },
}

/// Pending batch plus the sink it drains into.
///
/// Only the buffer worker touches this, so appends and flushes never
/// interleave.
pub struct BatchBuffer {
    pending: Vec<RecordedRequest>,
    max_records: usize,
    sink: Arc<dyn Sink>,
}

impl BatchBuffer {
    pub fn new(sink: Arc<dyn Sink>, max_records: usize) -> Self {
        let max_records = max_records.max(1);
        Self {
            pending: Vec::with_capacity(max_records),
            max_records,
            sink,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    pub fn pending(&self) -> &[RecordedRequest] {
        &self.pending
    }

    /// Append `record`, flushing when the threshold is reached.
    pub async fn push(&mut self, record: RecordedRequest) -> Option<FlushOutcome> {
        self.pending.push(record);
        if self.pending.len() >= self.max_records {
            Some(self.flush(FlushReason::Threshold).await)
        } else {
            None
        }
    }

    /// Write the pending batch through the sink and clear it, whatever the
    /// sink returns.
    pub async fn flush(&mut self, reason: FlushReason) -> FlushOutcome {
        if self.pending.is_empty() {
            debug!(reason = reason.as_str(), "Nothing pending, skipping flush");
            return FlushOutcome::Empty;
        }

        let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.max_records));
        let records = batch.len();

        match self.sink.flush(&batch).await {
            Ok(location) => {
                counter!("collector.flush.success", 1);
                info!(
                    location = %location,
                    records,
                    sink = self.sink.name(),
                    reason = reason.as_str(),
                    "Flushed batch"
                );
                FlushOutcome::Written { location, records }
            }
            Err(e) => {
                counter!("collector.flush.failure", 1);
                counter!("collector.records.discarded", records as u64);
                error!(
                    error = %e,
                    records,
                    sink = self.sink.name(),
                    reason = reason.as_str(),
                    "Failed to flush batch, records discarded"
                );
                FlushOutcome::Failed {
                    records,
                    error: e.to_string(),
                }
            }
        }
    }
}
