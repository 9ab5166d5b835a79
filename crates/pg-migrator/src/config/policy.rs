//! Immutable migration policy handed to the orchestrator.

use super::connection::redact_password;
use crate::error::{MigrateError, Result};
use std::fmt;

/// Validated migration inputs.
///
/// Fields are private so a policy cannot change once constructed.
#[derive(Clone, PartialEq, Eq)]
pub struct MigrationPolicy {
    source_url: String,
    target_url: String,
    parallelism: usize,
    preserve_ownership: bool,
    preserve_acl: bool,
}

impl MigrationPolicy {
    /// Build a policy, rejecting empty endpoints and zero parallelism.
    pub fn new(
        source_url: impl Into<String>,
        target_url: impl Into<String>,
        parallelism: usize,
        preserve_ownership: bool,
        preserve_acl: bool,
    ) -> Result<Self> {
        let source_url = source_url.into();
        let target_url = target_url.into();

        if source_url.trim().is_empty() {
            return Err(MigrateError::Config("source database URL is required".into()));
        }
        if target_url.trim().is_empty() {
            return Err(MigrateError::Config("target database URL is required".into()));
        }
        if parallelism < 1 {
            return Err(MigrateError::Config(format!(
                "parallel jobs must be at least 1, got: {}",
                parallelism
            )));
        }

        Ok(Self {
            source_url,
            target_url,
            parallelism,
            preserve_ownership,
            preserve_acl,
        })
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    /// Number of parallel pg_restore jobs.
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn preserve_ownership(&self) -> bool {
        self.preserve_ownership
    }

    pub fn preserve_acl(&self) -> bool {
        self.preserve_acl
    }

    /// Strict restore mode: abort on the first error. Requested exactly when
    /// ownership is preserved.
    pub fn strict_restore(&self) -> bool {
        self.preserve_ownership
    }
}

impl fmt::Debug for MigrationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationPolicy")
            .field("source_url", &redact_password(&self.source_url))
            .field("target_url", &redact_password(&self.target_url))
            .field("parallelism", &self.parallelism)
            .field("preserve_ownership", &self.preserve_ownership)
            .field("preserve_acl", &self.preserve_acl)
            .finish()
    }
}
