//! Startup requirement validation for ocserv-exporter.
//!
//! This module validates that occtl can be found and warns about privilege
//! problems before the exporter starts polling.

use nix::unistd::geteuid;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::occtl::{OcctlCommander, OcctlError};

/// Validate all runtime requirements and return the located occtl commander.
pub fn validate_requirements(
    occtl_path: &str,
    timeout: Duration,
) -> Result<OcctlCommander, ValidationError> {
    info!("🔍 Validating runtime requirements...");

    check_user_privileges();
    let commander = locate_occtl(occtl_path, timeout)?;

    info!("✅ All runtime requirements validated");
    Ok(commander)
}

/// occtl talks to ocserv over a root-owned unix socket.
fn check_user_privileges() {
    if !geteuid().is_root() {
        warn!("⚠️  Not running as root - occtl may be denied access to the ocserv socket");
        warn!("   Recommendation: run as root or grant access to the occtl socket");
    } else {
        info!("✅ Running as root (uid=0)");
    }
}

fn locate_occtl(occtl_path: &str, timeout: Duration) -> Result<OcctlCommander, ValidationError> {
    match OcctlCommander::locate(occtl_path, timeout) {
        Ok(commander) => {
            info!(
                "✅ occtl found at {} (timeout {:?})",
                commander.path().display(),
                commander.timeout()
            );
            Ok(commander)
        }
        Err(e) => {
            error!("❌ {}", e);
            error!("   Install ocserv or pass --occtl-path with the full path to occtl");
            Err(ValidationError::OcctlUnavailable(e))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("occtl unavailable: {0}")]
    OcctlUnavailable(#[source] OcctlError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_occtl_is_fatal() {
        let err = validate_requirements("/nonexistent/bin/occtl", Duration::from_secs(5))
            .unwrap_err();
        let ValidationError::OcctlUnavailable(inner) = err;
        assert!(matches!(inner, OcctlError::ToolUnavailable(_)));
    }
}
