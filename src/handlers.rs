// HTTP capture handler
//
// Every method and path lands here. The request is reduced to a
// RecordedRequest and handed to the batch worker; the response is always an
// empty 200 unless the request itself could not be read.

use axum::{
    extract::{Request, State},
    http::{header::CONTENT_LENGTH, HeaderMap, StatusCode},
};
use http_body_util::LengthLimitError;
use metrics::counter;
use std::error::Error as _;
use tracing::debug;
use traffic_collector_core::RecordedRequest;

use crate::{AppError, AppState};

/// Fallback handler: record the request and acknowledge it.
pub(crate) async fn capture(
    State(state): State<AppState>,
    request: Request,
) -> Result<StatusCode, AppError> {
    let max_body = state.max_body_bytes;

    if let Some(declared) = declared_length(request.headers()) {
        if declared > max_body {
            counter!("collector.requests.rejected", 1);
            return Err(AppError::with_status(
                StatusCode::PAYLOAD_TOO_LARGE,
                anyhow::anyhow!("body of {} bytes exceeds limit {}", declared, max_body),
            ));
        }
    }

    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, max_body).await.map_err(|e| {
        counter!("collector.requests.rejected", 1);
        if exceeds_limit(&e) {
            AppError::with_status(
                StatusCode::PAYLOAD_TOO_LARGE,
                anyhow::anyhow!("streamed body exceeds limit {}", max_body),
            )
        } else {
            AppError::bad_request(anyhow::anyhow!("failed to read request body: {}", e))
        }
    })?;

    let record = RecordedRequest::capture(&parts, &body);
    debug!(
        method = record.method(),
        path = record.path(),
        host = record.host(),
        body_bytes = body.len(),
        "Captured request"
    );

    state.buffer.submit(record).await.map_err(|e| {
        AppError::with_status(StatusCode::SERVICE_UNAVAILABLE, anyhow::Error::new(e))
    })?;
    counter!("collector.requests.captured", 1);

    Ok(StatusCode::OK)
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// True when reading stopped because the body outgrew the limit.
fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source = err.source();
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}
