//! Access to the ocserv control tool.
//!
//! `occtl` is the only source of data for the exporter. This module locates
//! it, runs it with a bounded timeout and decodes its JSON output:
//! - `OcctlCommander`: spawns the real binary
//! - `Client`: issues `show status` / `show users` and decodes the replies
//! - `messages`: the decoded record types

pub mod messages;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument};

pub use messages::{decode_status, decode_users, StatusMessage, UsersMessage};

/// Binary name looked up on `PATH` when no explicit path is configured.
pub const OCCTL_BINARY: &str = "occtl";

/// Upper bound for a single occtl invocation.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

const SHOW_STATUS_ARGS: [&str; 4] = ["--json", "-n", "show", "status"];
const SHOW_USERS_ARGS: [&str; 4] = ["--json", "-n", "show", "users"];

/// Failures while talking to occtl.
#[derive(Debug, thiserror::Error)]
pub enum OcctlError {
    #[error("occtl tool not available on this server: {0}")]
    ToolUnavailable(String),

    #[error("occtl {args} timed out after {timeout:?}")]
    CommandTimeout { args: String, timeout: Duration },

    #[error("error while running occtl {args}: {reason}")]
    CommandFailed { args: String, reason: String },

    #[error("error while decoding json: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Runs occtl with the given arguments and returns its standard output.
#[async_trait]
pub trait Commander: Send + Sync {
    async fn run_command(&self, args: &[&str]) -> Result<Vec<u8>, OcctlError>;
}

/// Commander backed by the occtl binary found at startup.
#[derive(Debug, Clone)]
pub struct OcctlCommander {
    path: PathBuf,
    timeout: Duration,
}

impl OcctlCommander {
    /// Resolves `binary` on `PATH` (or as a path) and fails with
    /// `ToolUnavailable` if it cannot be found.
    pub fn locate(binary: impl AsRef<Path>, timeout: Duration) -> Result<Self, OcctlError> {
        let binary = binary.as_ref();
        let path = which::which(binary).map_err(|e| {
            OcctlError::ToolUnavailable(format!("{}: {}", binary.display(), e))
        })?;
        debug!("Resolved occtl binary to {}", path.display());
        Ok(Self { path, timeout })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Commander for OcctlCommander {
    #[instrument(skip(self), fields(binary = %self.path.display()))]
    async fn run_command(&self, args: &[&str]) -> Result<Vec<u8>, OcctlError> {
        let joined = args.join(" ");
        let child = Command::new(&self.path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        // Dropping the pending future on timeout kills the child.
        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(result) => result.map_err(|e| OcctlError::CommandFailed {
                args: joined.clone(),
                reason: e.to_string(),
            })?,
            Err(_) => {
                return Err(OcctlError::CommandTimeout {
                    args: joined,
                    timeout: self.timeout,
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let reason = if stderr.is_empty() {
                output.status.to_string()
            } else {
                format!("{}: {}", output.status, stderr)
            };
            return Err(OcctlError::CommandFailed {
                args: joined,
                reason,
            });
        }

        debug!("occtl {} returned {} bytes", joined, output.stdout.len());
        Ok(output.stdout)
    }
}

/// Helper client issuing the two occtl queries the exporter needs.
#[derive(Clone)]
pub struct Client {
    cmd: Arc<dyn Commander>,
}

impl Client {
    pub fn new(cmd: Arc<dyn Commander>) -> Self {
        Self { cmd }
    }

    /// Runs and decodes `occtl --json -n show status`.
    pub async fn show_status(&self) -> Result<StatusMessage, OcctlError> {
        let out = self.cmd.run_command(&SHOW_STATUS_ARGS).await?;
        decode_status(&out)
    }

    /// Runs and decodes `occtl --json -n show users`.
    pub async fn show_users(&self) -> Result<Vec<UsersMessage>, OcctlError> {
        let out = self.cmd.run_command(&SHOW_USERS_ARGS).await?;
        decode_users(&out)
    }
}
