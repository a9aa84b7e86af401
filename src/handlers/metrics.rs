//! Metrics endpoint handler for Prometheus scraping.
//!
//! This module provides the `/metrics` endpoint handler that renders the
//! registry in Prometheus text format. Rendering holds the cache lock, so a
//! scrape issued during a refresh waits for the cycle to finish.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use prometheus::{Encoder, TextEncoder};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::{AppState, SharedState};

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 16 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, MetricsError> {
    let body = render_metrics(&state).await?;
    let encoder = TextEncoder::new();
    Ok((
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        body,
    ))
}

/// Gathers and encodes all registered series under the cache lock.
pub async fn render_metrics(state: &AppState) -> Result<String, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");

    let lock_wait_start = Instant::now();
    let cache = state.cache.lock().await;
    debug!(
        "Cache lock acquired after {:.3}ms",
        lock_wait_start.elapsed().as_secs_f64() * 1000.0
    );

    let families = state.registry.gather();
    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    let encoder = TextEncoder::new();

    if let Err(e) = encoder.encode(&families, &mut buffer) {
        error!("Failed to encode Prometheus metrics: {}", e);
        return Err(MetricsError::EncodingFailed);
    }

    // Reported on the next scrape.
    state
        .metrics
        .scrape_duration
        .set(start.elapsed().as_secs_f64());

    debug!(
        "Metrics request completed: {} sessions, {} bytes, {:.3}ms (last refresh took {:.3}s)",
        cache.users.len(),
        buffer.len(),
        start.elapsed().as_secs_f64() * 1000.0,
        cache.update_duration_seconds
    );

    String::from_utf8(buffer).map_err(|_| MetricsError::EncodingFailed)
}
