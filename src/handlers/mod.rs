//! HTTP endpoint handlers for the exporter.
//!
//! The exporter serves a single endpoint:
//! - `/metrics`: Prometheus metrics endpoint

pub mod metrics;

use axum::{routing::get, Router};

use crate::state::SharedState;

// Re-export handlers
pub use metrics::{metrics_handler, render_metrics, MetricsError};

/// Builds the HTTP router with all routes bound to the shared state.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
