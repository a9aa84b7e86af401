//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and used by the background refresh task.

use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::cache::MetricsCache;
use crate::metrics::VpnMetrics;
use crate::occtl::Client;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests and background tasks.
pub struct AppState {
    pub registry: Registry,
    pub metrics: VpnMetrics,
    pub client: Client,
    /// Held for a whole refresh cycle and for a whole `/metrics` render, so a
    /// scrape never sees a half-applied refresh.
    pub cache: Mutex<MetricsCache>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Creates a fresh registry, registers all series and wraps everything
    /// into shareable state.
    pub fn new(client: Client) -> Result<SharedState, prometheus::Error> {
        let registry = Registry::new();
        let metrics = VpnMetrics::new(&registry)?;

        Ok(Arc::new(Self {
            registry,
            metrics,
            client,
            cache: Mutex::new(MetricsCache::default()),
            start_time: Instant::now(),
        }))
    }
}
