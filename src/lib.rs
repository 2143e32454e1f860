// Traffic collector - passive HTTP capture server
//
// Accepts any request on any path, answers 200 with an empty body, and
// batches what it saw into JSON documents written to a local file or an
// S3 bucket.
//
// Features:
// - Axum HTTP server (HTTP/1.1, HTTP/2)
// - Size-triggered batch flushes through a single worker task
// - Final flush of the partial batch on shutdown
// - Structured logging with tracing
// - Graceful shutdown on Ctrl+C or SIGTERM

use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use traffic_collector_config::RuntimeConfig;
use traffic_collector_writer::{Sink, SinkTarget};

pub mod batch;

mod handlers;
mod init;

use batch::{BatchBuffer, BufferHandle, FlushOutcome};
use handlers::capture;
pub use init::init_tracing;
use init::init_sink;

/// Application state shared across all requests
#[derive(Clone)]
pub(crate) struct AppState {
    pub buffer: BufferHandle,
    pub max_body_bytes: usize,
}

/// Error type that implements IntoResponse
///
/// Capture failures are reported with a status and an empty body; the
/// collector never echoes anything back to the client.
pub(crate) struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        warn!(status = self.status.as_u16(), "Request rejected: {:?}", self.error);
        self.status.into_response()
    }
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self { status, error }
    }

    pub fn bad_request<E>(error: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
        }
    }
}

/// A running batch worker plus the settings the HTTP layer needs.
pub struct Collector {
    buffer: BufferHandle,
    worker: JoinHandle<()>,
    max_body_bytes: usize,
    drain_timeout: Duration,
}

impl Collector {
    /// Spawn the batch worker draining into `sink`. Must be called inside a
    /// tokio runtime.
    pub fn start(sink: Arc<dyn Sink>, config: &RuntimeConfig) -> Self {
        let buffer = BatchBuffer::new(sink, config.batch.max_records);
        let (buffer, worker) = batch::spawn(buffer);
        Self {
            buffer,
            worker,
            max_body_bytes: config.request.max_body_bytes,
            drain_timeout: config.request.timeout(),
        }
    }

    /// Router that captures every method on every path.
    pub fn router(&self) -> Router {
        let state = AppState {
            buffer: self.buffer.clone(),
            max_body_bytes: self.max_body_bytes,
        };

        Router::new()
            .fallback(capture)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    pub fn handle(&self) -> BufferHandle {
        self.buffer.clone()
    }

    /// Flush the partial batch and wait for the worker to stop.
    pub async fn shutdown(self) -> Result<FlushOutcome> {
        let outcome = self
            .buffer
            .shutdown()
            .await
            .context("Batch worker stopped before the final flush")?;
        drop(self.buffer);
        self.worker.await.context("Batch worker panicked")?;
        Ok(outcome)
    }
}

/// Graceful shutdown handler
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}

/// Serve `collector` on `listener` until `shutdown` resolves, then flush
/// whatever is still pending.
///
/// Open connections get the request timeout to finish. Connections still
/// running after that are abandoned and the final flush happens anyway.
pub async fn serve<F>(listener: TcpListener, collector: Collector, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = collector.router();
    let (drain_tx, drain_rx) = oneshot::channel::<()>();

    let mut server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = drain_rx.await;
            })
            .into_future(),
    );

    let served = tokio::select! {
        result = &mut server => Some(result),
        _ = shutdown => None,
    };

    let served = match served {
        Some(result) => result,
        None => {
            let _ = drain_tx.send(());
            match tokio::time::timeout(collector.drain_timeout, &mut server).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        grace_secs = collector.drain_timeout.as_secs(),
                        "Open connections did not finish in time, abandoning them"
                    );
                    server.abort();
                    Ok(Ok(()))
                }
            }
        }
    };

    match collector.shutdown().await? {
        FlushOutcome::Empty => info!("No pending records at shutdown"),
        FlushOutcome::Written { location, records } => {
            info!(location = %location, records, "Flushed pending records before shutdown")
        }
        FlushOutcome::Failed { records, error } => {
            warn!(records, error = %error, "Final flush failed, pending records lost")
        }
    }

    served
        .context("Server task panicked")?
        .context("Server error")?;

    Ok(())
}

/// Entry point (loads config automatically)
pub async fn run() -> Result<()> {
    let config = RuntimeConfig::load().context("Failed to load configuration")?;
    run_with_config(config).await
}

/// Entry point with pre-loaded configuration (for CLI usage)
pub async fn run_with_config(config: RuntimeConfig) -> Result<()> {
    init_tracing(&config);

    let sink = init_sink(&SinkTarget::from_config(&config.storage))?;

    info!(
        "Batching up to {} records per flush, max body {} bytes",
        config.batch.max_records, config.request.max_body_bytes
    );

    let addr = config.server.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind to {}", addr))?;

    info!("Capturing HTTP traffic on http://{}", addr);
    info!("Press Ctrl+C or send SIGTERM to stop");

    let collector = Collector::start(sink, &config);
    serve(listener, collector, shutdown_signal()).await?;

    info!("Collector shutdown complete");

    Ok(())
}
