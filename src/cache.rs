//! Snapshot of the last successful occtl queries.
//!
//! `MetricsCache` holds the decoded status and session list between refresh
//! cycles, along with metadata about the last cycle. The status and the
//! session list are replaced independently: a failed query leaves the
//! matching component as it was.

use std::time::Instant;

use crate::occtl::{StatusMessage, UsersMessage};

#[derive(Debug, Clone, Default)]
pub struct MetricsCache {
    /// Last successfully decoded `show status`, `None` until the first success.
    pub status: Option<StatusMessage>,
    /// Sessions from the last successful `show users`.
    pub users: Vec<UsersMessage>,
    pub last_updated: Option<Instant>,
    pub update_duration_seconds: f64,
    pub status_success: bool,
    pub users_success: bool,
}

impl MetricsCache {
    /// Whether the last cycle refreshed both components.
    pub fn is_fresh(&self) -> bool {
        self.status_success && self.users_success
    }
}
