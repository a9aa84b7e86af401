//! Check command implementation.
//!
//! Validates configuration, occtl availability and that both occtl queries
//! return decodable output.

use nix::unistd::geteuid;
use std::sync::Arc;

use crate::config::{validate_effective_config, Config};
use crate::occtl::{Client, OcctlCommander};

/// Validates configuration and occtl access.
pub async fn command_check(config: &Config) -> anyhow::Result<()> {
    println!("🔍 ocserv-exporter - System Check");
    println!("=================================");

    let mut all_ok = true;

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n👤 Checking privileges...");
    if geteuid().is_root() {
        println!("   ✅ Running as root");
    } else {
        println!("   ⚠️  Not running as root - occtl may be denied access to ocserv");
    }

    println!("\n🔧 Checking occtl...");
    let timeout = config
        .command_timeout()
        .unwrap_or(crate::occtl::DEFAULT_COMMAND_TIMEOUT);
    match OcctlCommander::locate(config.occtl_path(), timeout) {
        Ok(commander) => {
            println!("   ✅ occtl found at {}", commander.path().display());
            let client = Client::new(Arc::new(commander));

            match client.show_status().await {
                Ok(status) => println!(
                    "   ✅ show status: {} ({} active sessions)",
                    if status.status.is_empty() { "unknown" } else { status.status.as_str() },
                    status.active_sessions
                ),
                Err(e) => {
                    println!("   ❌ show status failed: {}", e);
                    all_ok = false;
                }
            }

            match client.show_users().await {
                Ok(users) => println!("   ✅ show users: {} sessions", users.len()),
                Err(e) => {
                    println!("   ❌ show users failed: {}", e);
                    all_ok = false;
                }
            }
        }
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - exporter is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review the output above");
        anyhow::bail!("system check failed")
    }
}
