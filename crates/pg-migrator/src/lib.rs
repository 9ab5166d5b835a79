//! # pg-migrator
//!
//! PostgreSQL to PostgreSQL migration library.
//!
//! A migration runs `pg_dump` against the source and `pg_restore` against the
//! target, guarded by preflight checks and optionally followed by validation:
//!
//! - **Preflight**: both endpoints reachable, same major version, empty target
//! - **Dump/restore** as child processes with cancellation and an explicit
//!   restore exit-code policy
//! - **Validation**: schema, counts, ranges, aggregates and an optional
//!   full-table checksum compared between source and target
//!
//! ## Example
//!
//! ```rust,no_run
//! use pg_migrator::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> pg_migrator::Result<()> {
//!     let config = Config::load("config.yaml")?.apply_env()?;
//!     config.validate()?;
//!     let mut orchestrator = Orchestrator::new(config.policy()?, &config);
//!     let result = orchestrator.run(CancellationToken::new()).await?;
//!     println!("Restored a {} byte archive", result.archive_bytes);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod orchestrator;
pub mod preflight;
pub mod verify;

// Re-exports for convenient access
pub use config::{Config, MigrationPolicy, ValidationConfig};
pub use db::{ConnectOptions, PgSession, Side};
pub use error::{MigrateError, Result};
pub use orchestrator::{MigrationPhase, MigrationResult, MigrationStatus, Orchestrator, RestoreOutcome};
pub use preflight::{health_check, ConnectionPreflight, HealthCheckResult, PreflightCheck, PreflightReport, VersionInfo};
pub use verify::{CatalogReader, CheckKind, TableReport, ValidationPipeline, ValidationProfile, ValidationReport};
