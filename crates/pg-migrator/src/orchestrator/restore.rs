//! pg_restore invocation against the target.
//!
//! pg_restore exits 1 both for fatal errors and for a run that completed
//! with non-fatal errors; only the presence of `--exit-on-error` tells the
//! two apart. The resulting policy:
//!
//! | strict mode | exit code        | result                    |
//! |-------------|------------------|---------------------------|
//! | any         | 0                | `Clean`                   |
//! | off         | 1                | `CompletedWithWarnings`   |
//! | on          | 1                | `RestoreFailed`           |
//! | any         | other / signaled | `RestoreFailed`           |

use super::archive::ArchiveHandle;
use super::process::run_tool;
use crate::config::connection::{password_from_url, strip_password};
use crate::config::MigrationPolicy;
use crate::error::{MigrateError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const TOOL: &str = "pg_restore";

/// How a restore that did not fail finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Clean,
    /// Exit code 1 outside strict mode; stderr holds the tolerated errors.
    CompletedWithWarnings { stderr: String },
}

impl RestoreOutcome {
    pub fn warnings(&self) -> Option<&str> {
        match self {
            RestoreOutcome::Clean => None,
            RestoreOutcome::CompletedWithWarnings { stderr } => Some(stderr),
        }
    }
}

/// Runs pg_restore for one migration policy.
pub struct Restorer {
    policy: MigrationPolicy,
    program: PathBuf,
}

impl Restorer {
    pub fn new(policy: MigrationPolicy, program: impl Into<PathBuf>) -> Self {
        Self {
            policy,
            program: program.into(),
        }
    }

    /// Restore `archive` into the target. The archive is consumed.
    pub async fn restore(
        &self,
        archive: ArchiveHandle,
        cancel: &CancellationToken,
    ) -> Result<RestoreOutcome> {
        info!(
            "Running pg_restore with {} parallel job(s)...",
            self.policy.parallelism()
        );

        let mut command = Command::new(&self.program);
        command.args(build_restore_args(&self.policy, archive.path()));
        if let Some(password) = password_from_url(self.policy.target_url()) {
            command.env("PGPASSWORD", password);
        }

        let output = run_tool(TOOL, command, cancel).await?;
        let outcome = classify_restore_exit(&self.policy, output.exit_code, output.stderr)?;

        match &outcome {
            RestoreOutcome::Clean => info!("Restore completed successfully"),
            RestoreOutcome::CompletedWithWarnings { stderr } => {
                warn!("pg_restore completed with warnings (non-fatal):\n{}", stderr);
            }
        }

        Ok(outcome)
    }
}

/// Arguments for pg_restore, archive path last. The password never appears here.
pub fn build_restore_args(policy: &MigrationPolicy, archive: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        format!("--dbname={}", strip_password(policy.target_url())).into(),
        "--verbose".into(),
    ];

    if policy.strict_restore() {
        args.push("--exit-on-error".into());
    } else {
        args.push("--no-owner".into());
    }
    if !policy.preserve_acl() {
        args.push("--no-acl".into());
    }
    if policy.parallelism() > 1 {
        args.push(format!("--jobs={}", policy.parallelism()).into());
    }

    args.push(archive.as_os_str().to_os_string());
    args
}

/// Apply the exit-code policy to a finished pg_restore.
pub fn classify_restore_exit(
    policy: &MigrationPolicy,
    exit_code: Option<i32>,
    stderr: String,
) -> Result<RestoreOutcome> {
    match exit_code {
        Some(0) => Ok(RestoreOutcome::Clean),
        Some(1) if !policy.strict_restore() => {
            Ok(RestoreOutcome::CompletedWithWarnings { stderr })
        }
        _ => Err(MigrateError::RestoreFailed { exit_code, stderr }),
    }
}
