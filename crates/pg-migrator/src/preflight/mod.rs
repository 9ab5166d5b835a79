//! Safety and compatibility checks run before any destructive action.
//!
//! Preflight confirms that both endpoints answer a trivial query, that they
//! run the same major PostgreSQL version (dump archives are only guaranteed to
//! restore within a major version), and that the target's public schema is
//! empty (restore is not idempotent, partial overwrite silently corrupts).

use crate::config::MigrationPolicy;
use crate::db::{self, ConnectOptions, PgSession, Side};
use crate::error::{MigrateError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::info;

const PING_QUERY: &str = "SELECT 1";
const VERSION_QUERY: &str = "SELECT current_setting('server_version')";
const PUBLIC_TABLE_COUNT_QUERY: &str =
    "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = 'public'";

/// Server version as reported by `server_version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Full version string, e.g. `16.2 (Debian 16.2-1.pgdg120+2)`.
    pub raw: String,
    /// Leading integer component.
    pub major: u32,
}

impl VersionInfo {
    /// Extract the major version from a server version string.
    ///
    /// Returns `None` when the string does not start with a number.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
        let major = digits.parse().ok()?;
        Some(Self {
            raw: trimmed.to_string(),
            major,
        })
    }
}

/// Outcome of a passed preflight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightReport {
    pub source_version: VersionInfo,
    pub target_version: VersionInfo,
}

/// Gate that must pass before the dump starts.
#[async_trait]
pub trait PreflightCheck: Send + Sync {
    async fn check(&self, policy: &MigrationPolicy) -> Result<PreflightReport>;
}

/// Preflight against live servers.
pub struct ConnectionPreflight {
    options: ConnectOptions,
}

impl ConnectionPreflight {
    pub fn new(options: ConnectOptions) -> Self {
        Self { options }
    }

    /// Connect to one side and confirm it answers, returning its version.
    async fn probe(&self, url: &str, side: Side) -> Result<(PgSession, VersionInfo)> {
        info!("Validating {} database connection...", side);
        let session = db::connect(url, side, &self.options).await?;
        ping(&session).await?;
        let version = server_version(&session).await?;
        info!("{} database: PostgreSQL {}", capitalize(side), version.raw);
        Ok((session, version))
    }

    async fn run(&self, policy: &MigrationPolicy) -> Result<PreflightReport> {
        let deadline = tokio::time::Instant::now() + self.options.timeout;

        let (source, source_version) = within(
            deadline,
            Side::Source,
            self.probe(policy.source_url(), Side::Source),
        )
        .await?;
        drop(source);

        let (target, target_version) = within(
            deadline,
            Side::Target,
            self.probe(policy.target_url(), Side::Target),
        )
        .await?;
        let tables = within(deadline, Side::Target, public_table_count(&target)).await?;
        drop(target);

        evaluate(&source_version, &target_version, tables)?;

        Ok(PreflightReport {
            source_version,
            target_version,
        })
    }
}

#[async_trait]
impl PreflightCheck for ConnectionPreflight {
    async fn check(&self, policy: &MigrationPolicy) -> Result<PreflightReport> {
        self.run(policy).await
    }
}

/// Bound one preflight step by the shared deadline.
async fn within<T, F>(deadline: tokio::time::Instant, side: Side, step: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout_at(deadline, step)
        .await
        .map_err(|_| MigrateError::connectivity(side, "preflight deadline exceeded"))?
}

/// Decide whether a migration may proceed given both versions and the
/// target's table count.
pub fn evaluate(source: &VersionInfo, target: &VersionInfo, target_tables: i64) -> Result<()> {
    if source.major != target.major {
        return Err(MigrateError::VersionMismatch {
            source_major: source.major,
            target_major: target.major,
        });
    }
    info!(
        "Version check passed: both databases are PostgreSQL {}",
        source.major
    );

    if target_tables > 0 {
        return Err(MigrateError::TargetNotClean {
            tables: target_tables,
        });
    }

    Ok(())
}

async fn ping(session: &PgSession) -> Result<()> {
    let side = session.side();
    let row = session
        .client()
        .query_one(PING_QUERY, &[])
        .await
        .map_err(|e| MigrateError::query(side, "connectivity probe", e))?;
    let value: i32 = row
        .try_get(0)
        .map_err(|e| MigrateError::query(side, "connectivity probe", e))?;
    if value != 1 {
        return Err(MigrateError::connectivity(
            side,
            format!("unexpected probe result: got {}, expected 1", value),
        ));
    }
    Ok(())
}

async fn server_version(session: &PgSession) -> Result<VersionInfo> {
    let side = session.side();
    let row = session
        .client()
        .query_one(VERSION_QUERY, &[])
        .await
        .map_err(|e| MigrateError::query(side, "version query", e))?;
    let raw: String = row
        .try_get(0)
        .map_err(|e| MigrateError::query(side, "version query", e))?;
    VersionInfo::parse(&raw).ok_or_else(|| {
        MigrateError::connectivity(side, format!("unable to parse server version '{}'", raw))
    })
}

async fn public_table_count(session: &PgSession) -> Result<i64> {
    let side = session.side();
    let row = session
        .client()
        .query_one(PUBLIC_TABLE_COUNT_QUERY, &[])
        .await
        .map_err(|e| MigrateError::query(side, "checking for existing tables", e))?;
    row.try_get(0)
        .map_err(|e| MigrateError::query(side, "checking for existing tables", e))
}

fn capitalize(side: Side) -> &'static str {
    match side {
        Side::Source => "Source",
        Side::Target => "Target",
    }
}

/// Connectivity summary for one side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointHealth {
    pub connected: bool,
    pub latency_ms: u64,
    pub version: Option<String>,
    pub error: Option<String>,
}

/// Result of `health_check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source: EndpointHealth,
    pub target: EndpointHealth,
    /// Both connected and share a major version.
    pub healthy: bool,
}

impl HealthCheckResult {
    /// The error an unhealthy result stands for: the first unreachable side,
    /// otherwise the version mismatch.
    pub fn failure(&self) -> Option<MigrateError> {
        if self.healthy {
            return None;
        }
        for (side, health) in [(Side::Source, &self.source), (Side::Target, &self.target)] {
            if !health.connected {
                let reason = health.error.as_deref().unwrap_or("not reachable");
                return Some(MigrateError::connectivity(
                    side,
                    format!("health check failed: {}", reason),
                ));
            }
        }
        let major = |health: &EndpointHealth| {
            health
                .version
                .as_deref()
                .and_then(VersionInfo::parse)
                .map(|v| v.major)
                .unwrap_or_default()
        };
        Some(MigrateError::VersionMismatch {
            source_major: major(&self.source),
            target_major: major(&self.target),
        })
    }
}

/// Probe both endpoints concurrently without enforcing migration invariants.
pub async fn health_check(
    source_url: &str,
    target_url: &str,
    options: &ConnectOptions,
) -> HealthCheckResult {
    let (source, target) = tokio::join!(
        probe_health(source_url, Side::Source, options),
        probe_health(target_url, Side::Target, options)
    );

    let same_major = match (&source.version, &target.version) {
        (Some(s), Some(t)) => {
            VersionInfo::parse(s).map(|v| v.major) == VersionInfo::parse(t).map(|v| v.major)
        }
        _ => false,
    };

    HealthCheckResult {
        healthy: source.connected && target.connected && same_major,
        source,
        target,
    }
}

async fn probe_health(url: &str, side: Side, options: &ConnectOptions) -> EndpointHealth {
    let start = Instant::now();
    let attempt = async {
        let session = db::connect(url, side, options).await?;
        ping(&session).await?;
        server_version(&session).await
    };

    let bound = options.timeout + Duration::from_secs(1);
    let outcome = match tokio::time::timeout(bound, attempt).await {
        Ok(result) => result,
        Err(_) => Err(MigrateError::connectivity(side, "health check timed out")),
    };
    let latency_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(version) => EndpointHealth {
            connected: true,
            latency_ms,
            version: Some(version.raw),
            error: None,
        },
        Err(e) => EndpointHealth {
            connected: false,
            latency_ms,
            version: None,
            error: Some(match e {
                MigrateError::Connectivity { message, .. } => message,
                other => other.to_string(),
            }),
        },
    }
}
