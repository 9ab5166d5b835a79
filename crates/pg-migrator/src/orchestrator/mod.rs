//! Migration coordinator: preflight, dump, restore.

mod archive;
mod dump;
mod process;
mod restore;

pub use archive::{ArchiveHandle, ArchiveWorkspace};
pub use dump::{build_dump_args, Dumper};
pub use process::{run_tool, ToolOutput};
pub use restore::{build_restore_args, classify_restore_exit, RestoreOutcome, Restorer};

use crate::config::{Config, MigrationPolicy, ToolsConfig};
use crate::error::{MigrateError, Result};
use crate::preflight::{ConnectionPreflight, PreflightCheck, PreflightReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationPhase {
    Idle,
    Preflighting,
    Dumping,
    Restoring,
    Done,
    Failed,
}

impl MigrationPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, MigrationPhase::Done | MigrationPhase::Failed)
    }

    /// Legal edges of the coordinator state machine.
    pub fn can_transition_to(self, next: MigrationPhase) -> bool {
        use MigrationPhase::*;
        match (self, next) {
            (Idle, Preflighting)
            | (Preflighting, Dumping)
            | (Dumping, Restoring)
            | (Restoring, Done) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationPhase::Idle => "idle",
            MigrationPhase::Preflighting => "preflight",
            MigrationPhase::Dumping => "dump",
            MigrationPhase::Restoring => "restore",
            MigrationPhase::Done => "done",
            MigrationPhase::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Final status of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Completed,
    CompletedWithWarnings,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    pub status: MigrationStatus,

    /// Always `Done` for a returned result.
    pub phase: MigrationPhase,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    pub source_version: String,
    pub target_version: String,

    /// Size of the dump archive in bytes.
    pub archive_bytes: u64,

    pub dump_seconds: f64,
    pub restore_seconds: f64,

    /// Restore parallelism used.
    pub parallel_jobs: usize,

    /// pg_restore stderr for a run tolerated under the exit-code policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restore_warnings: Option<String>,
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

struct StageReport {
    preflight: PreflightReport,
    archive_bytes: u64,
    dump_seconds: f64,
    restore_seconds: f64,
    outcome: RestoreOutcome,
}

/// Migration orchestrator.
pub struct Orchestrator {
    policy: MigrationPolicy,
    preflight: Arc<dyn PreflightCheck>,
    tools: ToolsConfig,
    workspace_dir: Option<PathBuf>,
    phase: MigrationPhase,
}

impl Orchestrator {
    /// Create an orchestrator that preflights against the live endpoints.
    pub fn new(policy: MigrationPolicy, config: &Config) -> Self {
        Self {
            policy,
            preflight: Arc::new(ConnectionPreflight::new(config.connect_options())),
            tools: config.tools.clone(),
            workspace_dir: None,
            phase: MigrationPhase::Idle,
        }
    }

    /// Replace the preflight gate.
    pub fn with_preflight(mut self, preflight: Arc<dyn PreflightCheck>) -> Self {
        self.preflight = preflight;
        self
    }

    /// Create the temporary workspace under `dir` instead of the system temp dir.
    pub fn with_workspace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace_dir = Some(dir.into());
        self
    }

    pub fn phase(&self) -> MigrationPhase {
        self.phase
    }

    /// Run the migration.
    ///
    /// The workspace is removed on every exit path. Cancelling the token
    /// kills a running tool and keeps later stages from starting. A repeated
    /// run starts again from `Idle` and goes through preflight like the first.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting migration run: {}", run_id);
        info!("{:?}", self.policy);

        if self.phase.is_terminal() {
            self.phase = MigrationPhase::Idle;
        }
        self.transition(MigrationPhase::Preflighting);

        let workspace = match self.create_workspace() {
            Ok(workspace) => workspace,
            Err(e) => return Err(self.fail(e)),
        };

        let stages = self.execute(&workspace, &cancel).await;
        workspace.cleanup();

        let stages = match stages {
            Ok(stages) => stages,
            Err(e) => return Err(self.fail(e)),
        };
        self.transition(MigrationPhase::Done);

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let restore_warnings = stages.outcome.warnings().map(str::to_string);
        let status = if restore_warnings.is_some() {
            MigrationStatus::CompletedWithWarnings
        } else {
            MigrationStatus::Completed
        };

        let result = MigrationResult {
            run_id,
            status,
            phase: self.phase,
            started_at,
            completed_at,
            duration_seconds: duration,
            source_version: stages.preflight.source_version.raw,
            target_version: stages.preflight.target_version.raw,
            archive_bytes: stages.archive_bytes,
            dump_seconds: stages.dump_seconds,
            restore_seconds: stages.restore_seconds,
            parallel_jobs: self.policy.parallelism(),
            restore_warnings,
        };

        info!(
            "Migration {}: {} byte archive in {:.1}s (dump {:.1}s, restore {:.1}s)",
            match result.status {
                MigrationStatus::Completed => "completed",
                MigrationStatus::CompletedWithWarnings => "completed with warnings",
            },
            result.archive_bytes,
            result.duration_seconds,
            result.dump_seconds,
            result.restore_seconds
        );

        Ok(result)
    }

    async fn execute(
        &mut self,
        workspace: &ArchiveWorkspace,
        cancel: &CancellationToken,
    ) -> Result<StageReport> {
        // Phase 1: Preflight
        info!("Phase 1: Preflight checks");
        let preflight = self.preflight.clone();
        let report = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MigrateError::Cancelled),
            report = preflight.check(&self.policy) => report?,
        };
        info!("Preflight passed");

        // Phase 2: Dump
        self.transition(MigrationPhase::Dumping);
        info!("Phase 2: Dumping source database");
        let dump_start = Instant::now();
        Dumper::new(self.policy.clone(), &self.tools.pg_dump)
            .dump(&workspace.archive_path(), cancel)
            .await?;
        let archive = workspace.seal()?;
        let dump_seconds = dump_start.elapsed().as_secs_f64();
        let archive_bytes = archive.size();
        info!("Archive written: {} bytes", archive_bytes);

        if cancel.is_cancelled() {
            info!("Cancellation requested, skipping restore");
            return Err(MigrateError::Cancelled);
        }

        // Phase 3: Restore
        self.transition(MigrationPhase::Restoring);
        info!("Phase 3: Restoring into target database");
        let restore_start = Instant::now();
        let outcome = Restorer::new(self.policy.clone(), &self.tools.pg_restore)
            .restore(archive, cancel)
            .await?;
        let restore_seconds = restore_start.elapsed().as_secs_f64();

        Ok(StageReport {
            preflight: report,
            archive_bytes,
            dump_seconds,
            restore_seconds,
            outcome,
        })
    }

    fn create_workspace(&self) -> Result<ArchiveWorkspace> {
        match &self.workspace_dir {
            Some(dir) => ArchiveWorkspace::create_in(dir),
            None => ArchiveWorkspace::create(),
        }
    }

    fn transition(&mut self, next: MigrationPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal phase transition {} -> {}",
            self.phase,
            next
        );
        self.phase = next;
    }

    fn fail(&mut self, err: MigrateError) -> MigrateError {
        if err.is_cancelled() {
            info!("Migration cancelled during {}", self.phase);
        } else {
            error!("Migration failed during {}: {}", self.phase, err);
        }
        self.transition(MigrationPhase::Failed);
        err
    }
}
