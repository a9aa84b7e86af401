//! Test command implementation.
//!
//! Queries occtl and prints the decoded status and session list.

use anyhow::Context;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::occtl::{Client, OcctlCommander, StatusMessage, UsersMessage};

/// Runs `iterations` occtl polls and prints what the exporter would publish.
pub async fn command_test(iterations: usize, verbose: bool, config: &Config) -> anyhow::Result<()> {
    println!("🧪 ocserv-exporter - Test Mode");
    println!("==============================");

    let timeout = config
        .command_timeout()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let commander = OcctlCommander::locate(config.occtl_path(), timeout)
        .context("cannot run test without occtl")?;
    let client = Client::new(Arc::new(commander));

    let mut failures = 0usize;

    for iteration in 1..=iterations {
        println!("\n🔄 Iteration {}/{}:", iteration, iterations);

        let start = Instant::now();
        match client.show_status().await {
            Ok(status) => print_status(&status),
            Err(e) => {
                failures += 1;
                println!("   ❌ show status: {}", e);
            }
        }

        match client.show_users().await {
            Ok(users) => print_users(&users, verbose),
            Err(e) => {
                failures += 1;
                println!("   ❌ show users: {}", e);
            }
        }

        println!(
            "   ⏱️  Poll duration: {:.2}ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
    }

    if failures > 0 {
        anyhow::bail!("{} occtl queries failed", failures);
    }

    println!("\n✅ Test completed successfully");
    Ok(())
}

fn format_timestamp(secs: i64) -> String {
    match Utc.timestamp_opt(secs, 0).single() {
        Some(dt) if secs > 0 => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        _ => "unknown".to_string(),
    }
}

fn print_status(status: &StatusMessage) {
    println!("   📡 Server status: {}", status.status);
    println!("      ├─ Up since: {}", format_timestamp(status.raw_up_since));
    println!("      ├─ Active sessions: {}", status.active_sessions);
    println!("      ├─ Total sessions: {}", status.handled_sessions);
    println!("      ├─ IPs in ban list: {}", status.ips_banned);
    println!(
        "      ├─ Last stats reset: {}",
        format_timestamp(status.raw_last_stats_reset)
    );
    println!(
        "      ├─ Sessions handled since reset: {}",
        status.sessions_handled
    );
    println!("      ├─ RX: {} bytes", status.raw_rx);
    println!("      └─ TX: {} bytes", status.raw_tx);
}

fn print_users(users: &[UsersMessage], verbose: bool) {
    println!("   👥 Connected sessions: {}", users.len());
    if !verbose {
        return;
    }
    for user in users {
        println!("   ├─ {} (ID: {})", user.username, user.id);
        println!("   │  ├─ Remote IP: {}", user.remote_ip);
        println!("   │  ├─ Device: {} (MTU {})", user.device, user.mtu);
        println!("   │  ├─ VPN IPv4/IPv6: {} / {}", user.vpn_ipv4, user.vpn_ipv6);
        if user.raw_connected_at > 0 {
            println!(
                "   │  ├─ Connected at: {}",
                format_timestamp(user.raw_connected_at)
            );
        }
        println!("   │  └─ RX/TX: {} / {} bytes", user.raw_rx, user.raw_tx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(1589316656), "2020-05-12 20:50:56 UTC");
        assert_eq!(format_timestamp(0), "unknown");
    }
}
