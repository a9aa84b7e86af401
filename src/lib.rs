//! ocserv Prometheus Exporter Library
//!
//! This library polls the OpenConnect VPN server through `occtl`, keeps the
//! last decoded status and session list in memory and publishes them as
//! Prometheus series.
//!
//! # Features
//!
//! - **Tolerant Decoding**: Unknown occtl fields are ignored, counters may be quoted
//! - **Bounded Polling**: Every occtl call runs under a timeout
//! - **Consistent Scrapes**: Refresh and render share one lock, so a scrape never
//!   observes a half-applied refresh
//! - **Replace-All Sessions**: Per-session series are rebuilt every cycle
//!
//! # Usage
//!
//! ```no_run
//! use ocserv_exporter::occtl::{Client, OcctlCommander, DEFAULT_COMMAND_TIMEOUT};
//! use ocserv_exporter::state::AppState;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let commander = OcctlCommander::locate("occtl", DEFAULT_COMMAND_TIMEOUT)?;
//! let state = AppState::new(Client::new(Arc::new(commander)))?;
//!
//! ocserv_exporter::cache_updater::update_cache(&state).await;
//! let body = ocserv_exporter::handlers::render_metrics(&state).await;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cache_updater;
pub mod cli;
pub mod commands;
pub mod config;
pub mod handlers;
pub mod metrics;
pub mod occtl;
pub mod startup_checks;
pub mod state;

// Re-export main types for convenience
pub use cache::MetricsCache;
pub use metrics::VpnMetrics;
pub use occtl::{Client, Commander, OcctlCommander, OcctlError};
pub use state::{AppState, SharedState};
