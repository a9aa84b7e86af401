//! Prometheus metrics definitions for ocserv-exporter.
//!
//! All series are created and registered once at startup. The only series
//! created afterwards are the per-session label combinations, which are
//! cleared and rewritten on every refresh cycle.

use prometheus::{Gauge, GaugeVec, IntCounter, Opts, Registry};

use crate::occtl::{StatusMessage, UsersMessage};

/// Label names of the per-session series.
pub const USER_LABELS: [&str; 6] = [
    "username",
    "remote_ip",
    "mtu",
    "vpn_ipv4",
    "vpn_ipv6",
    "device",
];

const NO_LABELS: &[&str] = &[];

/// Label-less vector for a status series. It stays out of the output until
/// the first successful `show status`.
fn status_gauge(name: &str, help: &str) -> Result<GaugeVec, prometheus::Error> {
    GaugeVec::new(Opts::new(name, help), NO_LABELS)
}

/// Collection of all exported series.
#[derive(Clone)]
pub struct VpnMetrics {
    // ========== occtl Errors ==========
    pub occtl_status_scrape_error: IntCounter,
    pub occtl_users_scrape_error: IntCounter,

    // Status series are label-less vectors: absent until the first
    // successful poll, and the live ones can be dropped again on failure.

    // ========== Live Server State ==========
    pub vpn_active_sessions: GaugeVec,
    pub vpn_handled_sessions: GaugeVec,
    pub vpn_ips_banned: GaugeVec,

    // ========== Server Lifetime ==========
    pub vpn_start_time: GaugeVec,
    pub vpn_uptime: GaugeVec,
    pub vpn_total_authentication_failures: GaugeVec,

    // ========== Since Last Stats Reset ==========
    pub vpn_last_stats_reset: GaugeVec,
    pub vpn_sessions_handled: GaugeVec,
    pub vpn_timed_out_sessions: GaugeVec,
    pub vpn_timed_out_idle_sessions: GaugeVec,
    pub vpn_closed_error_sessions: GaugeVec,
    pub vpn_authentication_failures: GaugeVec,
    pub vpn_average_auth_time: GaugeVec,
    pub vpn_max_auth_time: GaugeVec,
    pub vpn_average_session_time: GaugeVec,
    pub vpn_max_session_time: GaugeVec,
    pub vpn_tx: GaugeVec,
    pub vpn_rx: GaugeVec,

    // ========== Per Session ==========
    pub vpn_user_tx: GaugeVec, // labels: USER_LABELS
    pub vpn_user_rx: GaugeVec, // labels: USER_LABELS
    pub vpn_user_start_time: GaugeVec, // labels: USER_LABELS

    // ========== Exporter Telemetry ==========
    pub refresh_duration: Gauge,
    pub last_refresh_timestamp: Gauge,
    pub scrape_duration: Gauge,
}

impl VpnMetrics {
    /// Creates and registers all metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let occtl_status_scrape_error = IntCounter::new(
            "occtl_status_scrape_error_total",
            "Total number of errors that occurred when calling occtl show status.",
        )?;
        let occtl_users_scrape_error = IntCounter::new(
            "occtl_users_scrape_error_total",
            "Total number of errors that occurred when calling occtl show users.",
        )?;

        let vpn_active_sessions = GaugeVec::new(
            Opts::new("vpn_active_sessions", "Current number of users connected."),
            NO_LABELS,
        )?;
        let vpn_handled_sessions = GaugeVec::new(
            Opts::new(
                "vpn_handled_sessions",
                "Total number of sessions handled since server is up.",
            ),
            NO_LABELS,
        )?;
        let vpn_ips_banned = GaugeVec::new(
            Opts::new("vpn_ips_banned", "Total number of IPs banned."),
            NO_LABELS,
        )?;

        let vpn_start_time = status_gauge(
            "vpn_start_time_seconds",
            "Start time of ocserv since unix epoch in seconds.",
        )?;
        let vpn_uptime = status_gauge("vpn_uptime_seconds", "Uptime of ocserv in seconds.")?;
        let vpn_total_authentication_failures = status_gauge(
            "vpn_total_authentication_failures",
            "Total number of authentication failures since server is up.",
        )?;

        let vpn_last_stats_reset = status_gauge(
            "vpn_last_stats_reset_seconds",
            "Time of the last ocserv stats reset since unix epoch in seconds.",
        )?;
        let vpn_sessions_handled = status_gauge(
            "vpn_sessions_handled",
            "Total number of sessions handled since last stats reset.",
        )?;
        let vpn_timed_out_sessions = status_gauge(
            "vpn_timed_out_sessions",
            "Total number of timed out sessions since last stats reset.",
        )?;
        let vpn_timed_out_idle_sessions = status_gauge(
            "vpn_timed_out_idle_sessions",
            "Total number of sessions timed out (idle) since last stats reset.",
        )?;
        let vpn_closed_error_sessions = status_gauge(
            "vpn_closed_error_sessions",
            "Total number of sessions closed due to error since last stats reset.",
        )?;
        let vpn_authentication_failures = status_gauge(
            "vpn_authentication_failures",
            "Total number of authentication failures since last stats reset.",
        )?;
        let vpn_average_auth_time = status_gauge(
            "vpn_average_auth_time_seconds",
            "Average time in seconds spent to authenticate users since last stats reset.",
        )?;
        let vpn_max_auth_time = status_gauge(
            "vpn_max_auth_time_seconds",
            "Maximum time in seconds spent to authenticate users since last stats reset.",
        )?;
        let vpn_average_session_time = status_gauge(
            "vpn_average_session_time_seconds",
            "Average session time in seconds since last stats reset.",
        )?;
        let vpn_max_session_time = status_gauge(
            "vpn_max_session_time_seconds",
            "Max session time in seconds since last stats reset.",
        )?;
        let vpn_tx = status_gauge(
            "vpn_tx_bytes",
            "Total TX usage in bytes since last stats reset.",
        )?;
        let vpn_rx = status_gauge(
            "vpn_rx_bytes",
            "Total RX usage in bytes since last stats reset.",
        )?;

        let vpn_user_tx = GaugeVec::new(
            Opts::new("vpn_user_tx_bytes", "Total TX usage in bytes of a user."),
            &USER_LABELS,
        )?;
        let vpn_user_rx = GaugeVec::new(
            Opts::new("vpn_user_rx_bytes", "Total RX usage in bytes of a user."),
            &USER_LABELS,
        )?;
        let vpn_user_start_time = GaugeVec::new(
            Opts::new(
                "vpn_user_start_time_seconds",
                "Start time of user session since unix epoch in seconds.",
            ),
            &USER_LABELS,
        )?;

        let refresh_duration = Gauge::new(
            "ocserv_exporter_refresh_duration_seconds",
            "Time spent in the last occtl refresh cycle",
        )?;
        let last_refresh_timestamp = Gauge::new(
            "ocserv_exporter_last_refresh_timestamp_seconds",
            "Unix time at which the last occtl refresh cycle finished",
        )?;
        let scrape_duration = Gauge::new(
            "ocserv_exporter_scrape_duration_seconds",
            "Time spent rendering the previous /metrics response",
        )?;

        registry.register(Box::new(occtl_status_scrape_error.clone()))?;
        registry.register(Box::new(occtl_users_scrape_error.clone()))?;
        registry.register(Box::new(vpn_active_sessions.clone()))?;
        registry.register(Box::new(vpn_handled_sessions.clone()))?;
        registry.register(Box::new(vpn_ips_banned.clone()))?;
        registry.register(Box::new(vpn_start_time.clone()))?;
        registry.register(Box::new(vpn_uptime.clone()))?;
        registry.register(Box::new(vpn_total_authentication_failures.clone()))?;
        registry.register(Box::new(vpn_last_stats_reset.clone()))?;
        registry.register(Box::new(vpn_sessions_handled.clone()))?;
        registry.register(Box::new(vpn_timed_out_sessions.clone()))?;
        registry.register(Box::new(vpn_timed_out_idle_sessions.clone()))?;
        registry.register(Box::new(vpn_closed_error_sessions.clone()))?;
        registry.register(Box::new(vpn_authentication_failures.clone()))?;
        registry.register(Box::new(vpn_average_auth_time.clone()))?;
        registry.register(Box::new(vpn_max_auth_time.clone()))?;
        registry.register(Box::new(vpn_average_session_time.clone()))?;
        registry.register(Box::new(vpn_max_session_time.clone()))?;
        registry.register(Box::new(vpn_tx.clone()))?;
        registry.register(Box::new(vpn_rx.clone()))?;
        registry.register(Box::new(vpn_user_tx.clone()))?;
        registry.register(Box::new(vpn_user_rx.clone()))?;
        registry.register(Box::new(vpn_user_start_time.clone()))?;
        registry.register(Box::new(refresh_duration.clone()))?;
        registry.register(Box::new(last_refresh_timestamp.clone()))?;
        registry.register(Box::new(scrape_duration.clone()))?;

        Ok(Self {
            occtl_status_scrape_error,
            occtl_users_scrape_error,
            vpn_active_sessions,
            vpn_handled_sessions,
            vpn_ips_banned,
            vpn_start_time,
            vpn_uptime,
            vpn_total_authentication_failures,
            vpn_last_stats_reset,
            vpn_sessions_handled,
            vpn_timed_out_sessions,
            vpn_timed_out_idle_sessions,
            vpn_closed_error_sessions,
            vpn_authentication_failures,
            vpn_average_auth_time,
            vpn_max_auth_time,
            vpn_average_session_time,
            vpn_max_session_time,
            vpn_tx,
            vpn_rx,
            vpn_user_tx,
            vpn_user_rx,
            vpn_user_start_time,
            refresh_duration,
            last_refresh_timestamp,
            scrape_duration,
        })
    }

    /// Publishes every status-derived series.
    pub fn observe_status(&self, status: &StatusMessage) {
        let series = [
            (&self.vpn_active_sessions, status.active_sessions),
            (&self.vpn_handled_sessions, status.handled_sessions),
            (&self.vpn_ips_banned, status.ips_banned),
            (&self.vpn_start_time, status.raw_up_since),
            (&self.vpn_uptime, status.uptime),
            (
                &self.vpn_total_authentication_failures,
                status.total_authentication_failures,
            ),
            (&self.vpn_last_stats_reset, status.raw_last_stats_reset),
            (&self.vpn_sessions_handled, status.sessions_handled),
            (&self.vpn_timed_out_sessions, status.timed_out_sessions),
            (&self.vpn_timed_out_idle_sessions, status.timed_out_idle_sessions),
            (&self.vpn_closed_error_sessions, status.closed_due_to_error_sessions),
            (&self.vpn_authentication_failures, status.authentication_failures),
            (&self.vpn_average_auth_time, status.raw_avg_auth_time),
            (&self.vpn_max_auth_time, status.raw_max_auth_time),
            (&self.vpn_average_session_time, status.raw_avg_session_time),
            (&self.vpn_max_session_time, status.raw_max_session_time),
            (&self.vpn_tx, status.raw_tx),
            (&self.vpn_rx, status.raw_rx),
        ];

        for (gauge, value) in series {
            gauge.with_label_values(NO_LABELS).set(value as f64);
        }
    }

    /// Drops the series describing the current server state. Lifetime and
    /// since-reset totals keep their last value.
    pub fn clear_live_status(&self) {
        self.vpn_active_sessions.reset();
        self.vpn_handled_sessions.reset();
        self.vpn_ips_banned.reset();
    }

    /// Replaces all per-session series with the given sessions.
    pub fn publish_users(&self, users: &[UsersMessage]) {
        self.vpn_user_tx.reset();
        self.vpn_user_rx.reset();
        self.vpn_user_start_time.reset();

        for user in users {
            let labels = user.label_values();
            self.vpn_user_tx
                .with_label_values(&labels)
                .set(user.raw_tx as f64);
            self.vpn_user_rx
                .with_label_values(&labels)
                .set(user.raw_rx as f64);
            if user.raw_connected_at > 0 {
                self.vpn_user_start_time
                    .with_label_values(&labels)
                    .set(user.raw_connected_at as f64);
            }
        }
    }
}
