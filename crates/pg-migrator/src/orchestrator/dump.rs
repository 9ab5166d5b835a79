//! pg_dump invocation against the source.

use super::process::run_tool;
use crate::config::connection::{password_from_url, strip_password};
use crate::config::MigrationPolicy;
use crate::error::{MigrateError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::info;

const TOOL: &str = "pg_dump";

/// Runs pg_dump for one migration policy.
pub struct Dumper {
    policy: MigrationPolicy,
    program: PathBuf,
}

impl Dumper {
    pub fn new(policy: MigrationPolicy, program: impl Into<PathBuf>) -> Self {
        Self {
            policy,
            program: program.into(),
        }
    }

    /// Dump the source into a custom-format archive at `path`.
    pub async fn dump(&self, path: &Path, cancel: &CancellationToken) -> Result<()> {
        info!("Running pg_dump...");

        let mut command = Command::new(&self.program);
        command.args(build_dump_args(&self.policy, path));
        if let Some(password) = password_from_url(self.policy.source_url()) {
            command.env("PGPASSWORD", password);
        }

        let output = run_tool(TOOL, command, cancel).await?;
        if !output.success() {
            return Err(MigrateError::DumpFailed {
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        info!("Dump completed successfully");
        Ok(())
    }
}

/// Arguments for pg_dump. The password never appears here.
pub fn build_dump_args(policy: &MigrationPolicy, path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        format!("--dbname={}", strip_password(policy.source_url())).into(),
        "--format=custom".into(),
    ];

    let mut file = OsString::from("--file=");
    file.push(path.as_os_str());
    args.push(file);
    args.push("--verbose".into());

    if !policy.preserve_ownership() {
        args.push("--no-owner".into());
    }
    if !policy.preserve_acl() {
        args.push("--no-acl".into());
    }

    args
}
