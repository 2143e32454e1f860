//! In-memory batch accumulation for the collector.
//!
//! Request handlers never touch the pending batch. They send
//! [`BufferCommand`]s over a hand-off channel to a single worker task that
//! owns the [`BatchBuffer`], so appends, threshold flushes and the shutdown
//! flush are all serialized through one consumer.
//!
//! The channel holds a single command: while the worker is busy flushing,
//! every producer waits in [`BufferHandle::submit`]. Flush-now and shutdown
//! requests travel through the same channel, so they are ordered after every
//! record submitted before them.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;
use traffic_collector_core::RecordedRequest;

mod buffered_batch;

pub use buffered_batch::{BatchBuffer, FlushOutcome, FlushReason};

const HANDOFF_CAPACITY: usize = 1;

/// Messages accepted by the buffer worker.
#[derive(Debug)]
pub enum BufferCommand {
    Record(RecordedRequest),
    /// Flush whatever is pending right now and report the outcome.
    Flush {
        reply: oneshot::Sender<FlushOutcome>,
    },
    /// Final flush; the worker stops accepting commands afterwards.
    Shutdown {
        reply: oneshot::Sender<FlushOutcome>,
    },
}

#[derive(Debug, Error)]
#[error("batch buffer worker has stopped")]
pub struct BufferClosed;

/// Producer side of the hand-off channel.
#[derive(Debug, Clone)]
pub struct BufferHandle {
    tx: mpsc::Sender<BufferCommand>,
}

impl BufferHandle {
    /// Hand `record` to the worker. Waits until the worker has room for it.
    pub async fn submit(&self, record: RecordedRequest) -> Result<(), BufferClosed> {
        self.tx
            .send(BufferCommand::Record(record))
            .await
            .map_err(|_| BufferClosed)
    }

    /// Ask the worker to flush its pending batch. Every record submitted
    /// before this call is part of that flush.
    pub async fn flush(&self) -> Result<FlushOutcome, BufferClosed> {
        let (reply, outcome) = oneshot::channel();
        self.tx
            .send(BufferCommand::Flush { reply })
            .await
            .map_err(|_| BufferClosed)?;
        outcome.await.map_err(|_| BufferClosed)
    }

    /// Flush the pending batch and stop the worker. Later submissions from
    /// any clone of this handle fail with [`BufferClosed`].
    pub async fn shutdown(&self) -> Result<FlushOutcome, BufferClosed> {
        let (reply, outcome) = oneshot::channel();
        self.tx
            .send(BufferCommand::Shutdown { reply })
            .await
            .map_err(|_| BufferClosed)?;
        outcome.await.map_err(|_| BufferClosed)
    }
}

/// Start the worker that owns `buffer`.
///
/// The worker exits on [`BufferHandle::shutdown`] or once every handle is
/// dropped, flushing any records still pending at that point.
pub fn spawn(buffer: BatchBuffer) -> (BufferHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
    let worker = tokio::spawn(run_worker(buffer, rx));
    (BufferHandle { tx }, worker)
}

async fn run_worker(mut buffer: BatchBuffer, mut rx: mpsc::Receiver<BufferCommand>) {
    debug!(
        max_records = buffer.max_records(),
        "Batch buffer worker started"
    );

    while let Some(command) = rx.recv().await {
        match command {
            BufferCommand::Record(record) => {
                buffer.push(record).await;
            }
            BufferCommand::Flush { reply } => {
                let outcome = buffer.flush(FlushReason::Requested).await;
                // The requester may have given up waiting; the flush happened either way.
                let _ = reply.send(outcome);
            }
            BufferCommand::Shutdown { reply } => {
                let outcome = buffer.flush(FlushReason::Shutdown).await;
                let _ = reply.send(outcome);
                break;
            }
        }
    }

    // Pick up anything a producer managed to enqueue behind the shutdown.
    rx.close();
    while let Ok(command) = rx.try_recv() {
        match command {
            BufferCommand::Record(record) => {
                buffer.push(record).await;
            }
            BufferCommand::Flush { reply } | BufferCommand::Shutdown { reply } => {
                let _ = reply.send(FlushOutcome::Empty);
            }
        }
    }

    if !buffer.is_empty() {
        buffer.flush(FlushReason::Closed).await;
    }

    debug!("Batch buffer worker stopped");
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use traffic_collector_core::{RecordedRequest, ValueMap};
    use traffic_collector_writer::{Sink, WriterError};

    pub(crate) fn record(i: usize) -> RecordedRequest {
        RecordedRequest::new(
            "GET",
            format!("/{}", i),
            "example.com",
            ValueMap::new(),
            ValueMap::new(),
            b"",
        )
    }

    /// Keeps every flushed batch in memory.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        batches: Mutex<Vec<Vec<RecordedRequest>>>,
    }

    impl RecordingSink {
        pub(crate) fn batches(&self) -> Vec<Vec<RecordedRequest>> {
            self.batches.lock().clone()
        }
    }

    #[async_trait]
    impl Sink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn flush(&self, batch: &[RecordedRequest]) -> traffic_collector_writer::Result<String> {
            let mut batches = self.batches.lock();
            batches.push(batch.to_vec());
            Ok(format!("memory/{}", batches.len()))
        }
    }

    pub(crate) struct FailingSink;

    #[async_trait]
    impl Sink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn flush(&self, _batch: &[RecordedRequest]) -> traffic_collector_writer::Result<String> {
            Err(WriterError::write_failure("bucket unreachable"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{record, FailingSink, RecordingSink};
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn worker_flushes_at_threshold() {
        let sink = Arc::new(RecordingSink::default());
        let (handle, worker) = spawn(BatchBuffer::new(sink.clone(), 4));

        for i in 0..4 {
            handle.submit(record(i)).await.unwrap();
        }
        // A flush command is processed after every earlier record.
        assert_eq!(handle.flush().await.unwrap(), FlushOutcome::Empty);

        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        let paths: Vec<_> = batches[0].iter().map(|r| r.path().to_string()).collect();
        assert_eq!(paths, vec!["/0", "/1", "/2", "/3"]);

        drop(handle);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn flush_command_drains_pending_records() {
        let sink = Arc::new(RecordingSink::default());
        let (handle, worker) = spawn(BatchBuffer::new(sink.clone(), 1000));

        for i in 0..7 {
            handle.submit(record(i)).await.unwrap();
        }
        let outcome = handle.flush().await.unwrap();

        assert!(matches!(outcome, FlushOutcome::Written { records: 7, .. }));
        assert_eq!(sink.batches().len(), 1);

        drop(handle);
        worker.await.unwrap();
        assert_eq!(sink.batches().len(), 1);
    }

    #[tokio::test]
    async fn flush_command_with_nothing_pending_skips_sink() {
        let sink = Arc::new(RecordingSink::default());
        let (handle, worker) = spawn(BatchBuffer::new(sink.clone(), 1000));

        assert_eq!(handle.flush().await.unwrap(), FlushOutcome::Empty);
        drop(handle);
        worker.await.unwrap();
        assert!(sink.batches().is_empty());
    }

    #[tokio::test]
    async fn closing_the_channel_flushes_leftovers() {
        let sink = Arc::new(RecordingSink::default());
        let (handle, worker) = spawn(BatchBuffer::new(sink.clone(), 1000));

        handle.submit(record(0)).await.unwrap();
        handle.submit(record(1)).await.unwrap();
        drop(handle);
        worker.await.unwrap();

        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[tokio::test]
    async fn concurrent_producers_lose_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let (handle, worker) = spawn(BatchBuffer::new(sink.clone(), 10));

        let mut tasks = Vec::new();
        for producer in 0..5 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..9 {
                    handle.submit(record(producer * 100 + i)).await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        handle.flush().await.unwrap();

        let batches = sink.batches();
        let total: usize = batches.iter().map(Vec::len).sum();
        assert_eq!(total, 45);
        assert!(batches[..batches.len() - 1].iter().all(|b| b.len() == 10));

        drop(handle);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn failing_sink_does_not_stop_worker() {
        let (handle, worker) = spawn(BatchBuffer::new(Arc::new(FailingSink), 2));

        for i in 0..5 {
            handle.submit(record(i)).await.unwrap();
        }
        let outcome = handle.flush().await.unwrap();
        assert!(matches!(outcome, FlushOutcome::Failed { records: 1, .. }));

        drop(handle);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_flushes_and_stops_worker() {
        let sink = Arc::new(RecordingSink::default());
        let (handle, worker) = spawn(BatchBuffer::new(sink.clone(), 1000));
        let producer = handle.clone();

        for i in 0..3 {
            producer.submit(record(i)).await.unwrap();
        }
        let outcome = handle.shutdown().await.unwrap();
        assert!(matches!(outcome, FlushOutcome::Written { records: 3, .. }));

        worker.await.unwrap();
        assert!(producer.submit(record(3)).await.is_err());
        assert_eq!(sink.batches().len(), 1);
    }

    #[tokio::test]
    async fn submit_after_worker_stops_is_an_error() {
        let (handle, worker) = spawn(BatchBuffer::new(Arc::new(RecordingSink::default()), 10));
        worker.abort();
        let _ = worker.await;

        assert!(handle.submit(record(0)).await.is_err());
        assert!(handle.flush().await.is_err());
    }
}
