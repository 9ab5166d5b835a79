//! Configuration type definitions.

use super::connection::redact_password;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Source database (the one being dumped).
    #[serde(default)]
    pub source: DatabaseConfig,

    /// Target database (the one being restored into).
    #[serde(default)]
    pub target: DatabaseConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,

    /// Locations of the external dump/restore tools.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Post-migration validation configuration.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// TLS behavior for library connections.
    #[serde(default)]
    pub tls: TlsConfig,
}

/// A single database endpoint.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string, either `postgres://` URI or libpq key=value form.
    #[serde(default)]
    pub url: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &redact_password(&self.url))
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Parallel jobs for pg_restore (default: 1, dump is always sequential).
    #[serde(default = "default_parallel_jobs")]
    pub parallel_jobs: usize,

    /// Keep object ownership from the source (default: false).
    #[serde(default)]
    pub preserve_ownership: bool,

    /// Keep GRANT/REVOKE privileges from the source (default: false).
    #[serde(default)]
    pub preserve_acl: bool,

    /// Validate every table after a successful restore (default: false).
    #[serde(default)]
    pub validate_after: bool,

    /// Deadline in seconds for preflight and connection setup (default: 10).
    #[serde(default = "default_preflight_timeout")]
    pub preflight_timeout_secs: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            parallel_jobs: default_parallel_jobs(),
            preserve_ownership: false,
            preserve_acl: false,
            validate_after: false,
            preflight_timeout_secs: default_preflight_timeout(),
        }
    }
}

/// Paths of the external PostgreSQL client tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// pg_dump executable (default: looked up in PATH).
    #[serde(default = "default_pg_dump")]
    pub pg_dump: PathBuf,

    /// pg_restore executable (default: looked up in PATH).
    #[serde(default = "default_pg_restore")]
    pub pg_restore: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            pg_dump: default_pg_dump(),
            pg_restore: default_pg_restore(),
        }
    }
}

/// Columns and options used by the validation pipeline.
///
/// The content checks (ID range, aggregates, timestamps, checksum) look at a
/// fixed set of well-known columns. Columns missing from a table are left out
/// of the corresponding check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Schema holding the tables to validate (default: "public").
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Run the full-table checksum when validating a single table (default: false).
    #[serde(default)]
    pub checksum: bool,

    /// Unique row identifier used for ID range and checksum ordering (default: "id").
    #[serde(default = "default_id_column")]
    pub id_column: String,

    /// Numeric columns compared by SUM (default: age, salary).
    #[serde(default = "default_sum_columns")]
    pub sum_columns: Vec<String>,

    /// Text columns compared by COUNT(DISTINCT) (default: name, email).
    #[serde(default = "default_distinct_columns")]
    pub distinct_columns: Vec<String>,

    /// Timestamp column compared by MIN/MAX (default: created_at).
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,

    /// Columns concatenated into the per-row checksum input.
    #[serde(default = "default_checksum_columns")]
    pub checksum_columns: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            checksum: false,
            id_column: default_id_column(),
            sum_columns: default_sum_columns(),
            distinct_columns: default_distinct_columns(),
            timestamp_column: default_timestamp_column(),
            checksum_columns: default_checksum_columns(),
        }
    }
}

/// TLS settings. The `sslmode` in each URL decides whether TLS is used at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Verify the server certificate against the bundled web PKI roots (default: false).
    #[serde(default)]
    pub verify_server: bool,
}

fn default_parallel_jobs() -> usize {
    1
}

fn default_preflight_timeout() -> u64 {
    10
}

fn default_pg_dump() -> PathBuf {
    PathBuf::from("pg_dump")
}

fn default_pg_restore() -> PathBuf {
    PathBuf::from("pg_restore")
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_id_column() -> String {
    "id".to_string()
}

fn default_sum_columns() -> Vec<String> {
    vec!["age".to_string(), "salary".to_string()]
}

fn default_distinct_columns() -> Vec<String> {
    vec!["name".to_string(), "email".to_string()]
}

fn default_timestamp_column() -> String {
    "created_at".to_string()
}

fn default_checksum_columns() -> Vec<String> {
    ["name", "email", "age", "salary", "created_at"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}
