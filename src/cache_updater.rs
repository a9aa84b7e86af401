//! Refresh logic for the occtl snapshot.
//!
//! `update_cache` runs one full cycle (status, users, series update) while
//! holding the cache lock. It is called once synchronously at startup and
//! then by the background task started with `spawn_refresh_loop`.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use crate::cache::MetricsCache;
use crate::state::{AppState, SharedState};

/// Runs one refresh cycle. Failures are logged and counted, never returned.
#[instrument(skip(state))]
pub async fn update_cache(state: &AppState) {
    let start = Instant::now();
    let mut cache = state.cache.lock().await;
    debug!("Cache locked for refresh");

    update_status(state, &mut cache).await;
    update_users(state, &mut cache).await;

    let duration = start.elapsed().as_secs_f64();
    cache.last_updated = Some(Instant::now());
    cache.update_duration_seconds = duration;
    state.metrics.refresh_duration.set(duration);
    if let Ok(now) = SystemTime::now().duration_since(UNIX_EPOCH) {
        state.metrics.last_refresh_timestamp.set(now.as_secs_f64());
    }

    info!(
        "Refresh completed in {:.3}s: status={}, users={} ({} sessions)",
        duration,
        if cache.status_success { "ok" } else { "failed" },
        if cache.users_success { "ok" } else { "failed" },
        cache.users.len()
    );
}

async fn update_status(state: &AppState, cache: &mut MetricsCache) {
    match state.client.show_status().await {
        Ok(status) => {
            state.metrics.observe_status(&status);
            cache.status = Some(status);
            cache.status_success = true;
        }
        Err(e) => {
            error!("Failed to get server status: {}", e);
            state.metrics.occtl_status_scrape_error.inc();
            state.metrics.clear_live_status();
            cache.status_success = false;
        }
    }
}

async fn update_users(state: &AppState, cache: &mut MetricsCache) {
    match state.client.show_users().await {
        Ok(users) => {
            cache.users = users;
            cache.users_success = true;
        }
        Err(e) => {
            error!("Failed to get users details: {}", e);
            state.metrics.occtl_users_scrape_error.inc();
            cache.users_success = false;
        }
    }

    // Rebuilt from whatever set is current so ended sessions never linger.
    state.metrics.publish_users(&cache.users);
}

/// Starts the periodic refresh task. The first tick fires one `period` from
/// now; the initial refresh is expected to have been run by the caller.
pub fn spawn_refresh_loop(state: SharedState, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            update_cache(&state).await;
        }
    })
}
