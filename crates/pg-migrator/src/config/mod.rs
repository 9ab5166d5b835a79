//! Configuration loading and validation.
//!
//! Values are merged from a YAML file, then the environment, then CLI flags.

pub mod connection;
mod policy;
mod types;
mod validation;

pub use policy::MigrationPolicy;
pub use types::*;

use crate::db::ConnectOptions;
use crate::error::{MigrateError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    ///
    /// Validation is deferred until environment and CLI overrides are applied.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Build configuration from the process environment only.
    pub fn from_env() -> Result<Self> {
        Config::default().apply_env()
    }

    /// Overlay process environment variables on this configuration.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay variables from `lookup` on this configuration.
    ///
    /// Recognized keys: `SOURCE_DATABASE_URL`, `TARGET_DATABASE_URL`,
    /// `PARALLEL_JOBS`, `NO_OWNER`, `NO_ACL`, `VALIDATE_AFTER`,
    /// `PG_DUMP_PATH`, `PG_RESTORE_PATH`.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(url) = get("SOURCE_DATABASE_URL") {
            self.source.url = url;
        }
        if let Some(url) = get("TARGET_DATABASE_URL") {
            self.target.url = url;
        }
        if let Some(jobs) = get("PARALLEL_JOBS") {
            self.migration.parallel_jobs = jobs.trim().parse().map_err(|_| {
                MigrateError::Config(format!(
                    "PARALLEL_JOBS must be a positive integer, got: {}",
                    jobs
                ))
            })?;
        }
        // NO_OWNER / NO_ACL: anything but exactly "false" keeps the restore from
        // reproducing ownership and privileges.
        if let Some(no_owner) = get("NO_OWNER") {
            self.migration.preserve_ownership = no_owner == "false";
        }
        if let Some(no_acl) = get("NO_ACL") {
            self.migration.preserve_acl = no_acl == "false";
        }
        if let Some(validate) = get("VALIDATE_AFTER") {
            self.migration.validate_after = parse_bool("VALIDATE_AFTER", &validate)?;
        }
        if let Some(path) = get("PG_DUMP_PATH") {
            self.tools.pg_dump = PathBuf::from(path);
        }
        if let Some(path) = get("PG_RESTORE_PATH") {
            self.tools.pg_restore = PathBuf::from(path);
        }

        Ok(self)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Build the immutable migration policy from this configuration.
    pub fn policy(&self) -> Result<MigrationPolicy> {
        MigrationPolicy::new(
            self.source.url.clone(),
            self.target.url.clone(),
            self.migration.parallel_jobs,
            self.migration.preserve_ownership,
            self.migration.preserve_acl,
        )
    }

    /// Connection options shared by preflight and validation sessions.
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            timeout: Duration::from_secs(self.migration.preflight_timeout_secs),
            verify_tls: self.tls.verify_server,
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        other => Err(MigrateError::Config(format!(
            "{} must be true or false, got: {}",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn from_vars(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars = env(pairs);
        Config::default().apply_env_from(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
source:
  url: postgres://app:pw@source:5432/app
target:
  url: postgres://app:pw@target:5432/app
migration:
  parallel_jobs: 4
  preserve_ownership: true
tools:
  pg_dump: /usr/lib/postgresql/16/bin/pg_dump
validation:
  checksum: true
  sum_columns: [amount]
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.migration.parallel_jobs, 4);
        assert!(config.migration.preserve_ownership);
        assert!(!config.migration.preserve_acl);
        assert_eq!(config.migration.preflight_timeout_secs, 10);
        assert_eq!(
            config.tools.pg_dump,
            PathBuf::from("/usr/lib/postgresql/16/bin/pg_dump")
        );
        assert_eq!(config.tools.pg_restore, PathBuf::from("pg_restore"));
        assert!(config.validation.checksum);
        assert_eq!(config.validation.sum_columns, vec!["amount".to_string()]);
        assert_eq!(config.validation.id_column, "id");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            Config::from_yaml("source: [unterminated"),
            Err(MigrateError::Yaml(_))
        ));
    }

    #[test]
    fn test_env_defaults_do_not_preserve() {
        let config = from_vars(&[
            ("SOURCE_DATABASE_URL", "postgres://localhost/source"),
            ("TARGET_DATABASE_URL", "postgres://localhost/target"),
        ])
        .unwrap();
        assert_eq!(config.migration.parallel_jobs, 1);
        assert!(!config.migration.preserve_ownership);
        assert!(!config.migration.preserve_acl);
        assert!(!config.migration.validate_after);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_no_owner_false_preserves_ownership() {
        let config = from_vars(&[("NO_OWNER", "false"), ("NO_ACL", "false")]).unwrap();
        assert!(config.migration.preserve_ownership);
        assert!(config.migration.preserve_acl);

        let config = from_vars(&[("NO_OWNER", "true"), ("NO_ACL", "anything")]).unwrap();
        assert!(!config.migration.preserve_ownership);
        assert!(!config.migration.preserve_acl);
    }

    #[test]
    fn test_env_no_owner_is_case_sensitive() {
        let config = from_vars(&[("NO_OWNER", "FALSE"), ("NO_ACL", "False")]).unwrap();
        assert!(!config.migration.preserve_ownership);
        assert!(!config.migration.preserve_acl);
    }

    #[test]
    fn test_env_parallel_jobs() {
        let config = from_vars(&[("PARALLEL_JOBS", "8")]).unwrap();
        assert_eq!(config.migration.parallel_jobs, 8);

        let err = from_vars(&[("PARALLEL_JOBS", "many")]).unwrap_err();
        assert!(err.to_string().contains("PARALLEL_JOBS"));
    }

    #[test]
    fn test_env_overrides_yaml() {
        let yaml = "source:\n  url: postgres://localhost/from_yaml\n";
        let vars = env(&[("SOURCE_DATABASE_URL", "postgres://localhost/from_env")]);
        let config = Config::from_yaml(yaml)
            .unwrap()
            .apply_env_from(|key| vars.get(key).cloned())
            .unwrap();
        assert_eq!(config.source.url, "postgres://localhost/from_env");
    }

    #[test]
    fn test_env_validate_after() {
        let config = from_vars(&[("VALIDATE_AFTER", "yes")]).unwrap();
        assert!(config.migration.validate_after);
        assert!(from_vars(&[("VALIDATE_AFTER", "maybe")]).is_err());
    }

    #[test]
    fn test_missing_urls_fail_validation() {
        let config = from_vars(&[]).unwrap();
        assert!(matches!(config.validate(), Err(MigrateError::Config(_))));
    }

    #[test]
    fn test_policy_from_config() {
        let config = from_vars(&[
            ("SOURCE_DATABASE_URL", "postgres://localhost/source"),
            ("TARGET_DATABASE_URL", "postgres://localhost/target"),
            ("PARALLEL_JOBS", "3"),
            ("NO_OWNER", "false"),
        ])
        .unwrap();
        let policy = config.policy().unwrap();
        assert_eq!(policy.parallelism(), 3);
        assert!(policy.preserve_ownership());
        assert!(!policy.preserve_acl());
    }

    #[test]
    fn test_connect_options() {
        let mut config = Config::default();
        config.migration.preflight_timeout_secs = 3;
        config.tls.verify_server = true;
        let options = config.connect_options();
        assert_eq!(options.timeout, Duration::from_secs(3));
        assert!(options.verify_tls);
    }
}
