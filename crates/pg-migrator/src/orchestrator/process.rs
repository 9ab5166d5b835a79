//! Child process execution for pg_dump / pg_restore.
//!
//! Stderr is drained by a spawned task while the caller waits for exit. Both
//! must run at once: a child that fills the stderr pipe blocks until someone
//! reads it, and would never exit.

use crate::error::{MigrateError, Result};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Exit status and captured diagnostics of a finished tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Exit code, `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Everything the child wrote to stderr, verbatim.
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Run `command` to completion, or kill it when `cancel` fires.
///
/// Returns `Cancelled` without spawning if the token is already cancelled.
pub async fn run_tool(
    tool: &str,
    mut command: Command,
    cancel: &CancellationToken,
) -> Result<ToolOutput> {
    if cancel.is_cancelled() {
        return Err(MigrateError::Cancelled);
    }

    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|source| MigrateError::ToolUnavailable {
            tool: tool.to_string(),
            source,
        })?;

    let stderr = child.stderr.take().ok_or_else(|| {
        MigrateError::Io(std::io::Error::other(format!(
            "{} stderr was not captured",
            tool
        )))
    })?;
    let drain = tokio::spawn(drain_stderr(tool.to_string(), stderr));

    let status = tokio::select! {
        status = child.wait() => status?,
        _ = cancel.cancelled() => {
            warn!("Cancellation requested, terminating {}", tool);
            if let Err(e) = child.kill().await {
                warn!("Failed to kill {}: {}", tool, e);
            }
            drain.abort();
            return Err(MigrateError::Cancelled);
        }
    };

    let stderr = drain
        .await
        .map_err(|e| MigrateError::Io(std::io::Error::other(e)))?;

    Ok(ToolOutput {
        exit_code: status.code(),
        stderr,
    })
}

/// Read stderr to EOF, echoing each line at debug level.
async fn drain_stderr(tool: String, stderr: ChildStderr) -> String {
    let mut reader = BufReader::new(stderr);
    let mut captured = Vec::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                debug!("{}: {}", tool, String::from_utf8_lossy(&line).trim_end());
                captured.extend_from_slice(&line);
            }
            Err(e) => {
                warn!("Error reading {} stderr: {}", tool, e);
                break;
            }
        }
    }

    String::from_utf8_lossy(&captured).into_owned()
}
