//! Error types for the migration library.

use crate::db::Side;
use crate::verify::CheckKind;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for migration and validation operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (missing URLs, invalid values, bad YAML content).
    #[error("Configuration error: {0}")]
    Config(String),

    /// An endpoint could not be reached, queried, or did not answer in time.
    #[error("{side} database connectivity error: {message}")]
    Connectivity { side: Side, message: String },

    /// Source and target report different major server versions.
    #[error(
        "major version mismatch: source is PostgreSQL {source_major}, target is PostgreSQL {target_major} (must be same major version)"
    )]
    VersionMismatch { source_major: u32, target_major: u32 },

    /// Target public schema already contains tables.
    #[error("target database is not clean: {tables} table(s) already exist in public schema")]
    TargetNotClean { tables: i64 },

    /// External tool could not be started.
    #[error("{tool} could not be started: {source}")]
    ToolUnavailable {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// pg_dump exited with a nonzero status.
    #[error("pg_dump failed (exit code {}):\n{stderr}", display_code(.exit_code))]
    DumpFailed { exit_code: Option<i32>, stderr: String },

    /// pg_dump reported success but produced no archive.
    #[error("pg_dump exited successfully but archive {path:?} does not exist")]
    ArchiveMissing { path: PathBuf },

    /// pg_restore exited with a status not covered by the warning tolerance.
    #[error("pg_restore failed (exit code {}):\n{stderr}", display_code(.exit_code))]
    RestoreFailed { exit_code: Option<i32>, stderr: String },

    /// Operation was cancelled (SIGINT, SIGTERM).
    #[error("Migration cancelled")]
    Cancelled,

    /// A validation check found a difference between source and target.
    #[error("validation failed for table {table}: {check} check failed: {detail}")]
    ValidationMismatch {
        table: String,
        check: CheckKind,
        detail: String,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none, terminated by signal".to_string(),
    }
}

impl MigrateError {
    /// Create a Connectivity error for one side.
    pub fn connectivity(side: Side, message: impl Into<String>) -> Self {
        MigrateError::Connectivity {
            side,
            message: message.into(),
        }
    }

    /// Create a Connectivity error from a failed query, keeping the query context.
    pub fn query(side: Side, context: &str, err: tokio_postgres::Error) -> Self {
        MigrateError::Connectivity {
            side,
            message: format!("{} failed: {}", context, err),
        }
    }

    /// Create a ValidationMismatch error.
    pub fn mismatch(table: impl Into<String>, check: CheckKind, detail: impl Into<String>) -> Self {
        MigrateError::ValidationMismatch {
            table: table.into(),
            check,
            detail: detail.into(),
        }
    }

    /// True for operator-requested aborts, which are not defects.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MigrateError::Cancelled)
    }

    /// Process exit code for this error. Every failure, cancellation included, exits 1.
    pub fn exit_code(&self) -> u8 {
        1
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_failed_keeps_stderr_verbatim() {
        let err = MigrateError::DumpFailed {
            exit_code: Some(1),
            stderr: "pg_dump: error: connection to server failed\nFATAL: password authentication failed".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("exit code 1"));
        assert!(msg.contains("FATAL: password authentication failed"));
    }

    #[test]
    fn test_restore_failed_without_exit_code() {
        let err = MigrateError::RestoreFailed {
            exit_code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn test_connectivity_names_side() {
        let err = MigrateError::connectivity(Side::Target, "connection refused");
        assert_eq!(
            err.to_string(),
            "target database connectivity error: connection refused"
        );
    }

    #[test]
    fn test_version_mismatch_message() {
        let err = MigrateError::VersionMismatch {
            source_major: 15,
            target_major: 16,
        };
        let msg = err.to_string();
        assert!(msg.contains("source is PostgreSQL 15"));
        assert!(msg.contains("target is PostgreSQL 16"));
    }

    #[test]
    fn test_format_detailed_includes_cause_chain() {
        let err = MigrateError::ToolUnavailable {
            tool: "pg_dump".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
        };
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: pg_dump could not be started"));
        assert!(detailed.contains("Caused by:\n  1: No such file or directory"));
    }

    #[test]
    fn test_cancelled_is_not_a_mismatch() {
        assert!(MigrateError::Cancelled.is_cancelled());
        assert!(!MigrateError::Config("x".into()).is_cancelled());
        assert_eq!(MigrateError::Cancelled.exit_code(), 1);
    }
}
