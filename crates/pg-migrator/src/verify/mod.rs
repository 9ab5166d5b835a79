//! Post-migration validation.
//!
//! Each table goes through an ordered, fail-fast sequence of checks that
//! escalate in cost:
//!
//! 1. schema columns
//! 2. schema constraints
//! 3. row count
//! 4. ID range (min, max, distinct count)
//! 5. aggregate statistics (sums and distinct counts)
//! 6. timestamp range
//! 7. data checksum (opt-in, full scan and sort on both sides)
//!
//! The first failing check aborts the table with `ValidationMismatch`.
//! Every query pair races the cancellation token; a cancelled run drops the
//! in-flight queries and returns `Cancelled`.

pub mod checks;
pub mod queries;
mod reader;
pub mod types;

pub use reader::CatalogReader;
pub use types::{
    AggregateStats, CheckKind, CheckOutcome, CheckStatus, ColumnDefinition, ColumnSum,
    ConstraintKind, ConstraintSummary, DistinctCount, IdRange, TableReport, TimestampRange,
    ValidationProfile, ValidationReport,
};

use crate::db::{self, ConnectOptions, PgSession, Side};
use crate::error::{MigrateError, Result};
use std::collections::HashSet;
use std::future::Future;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Runs the check sequence against a source and a target reader.
pub struct ValidationPipeline<R> {
    source: R,
    target: R,
    profile: ValidationProfile,
}

impl ValidationPipeline<PgSession> {
    /// Open one session per side.
    pub async fn connect(
        source_url: &str,
        target_url: &str,
        profile: ValidationProfile,
        options: &ConnectOptions,
    ) -> Result<Self> {
        let (source, target) = tokio::try_join!(
            db::connect(source_url, Side::Source, options),
            db::connect(target_url, Side::Target, options)
        )?;
        Ok(Self::new(source, target, profile))
    }
}

impl<R: CatalogReader> ValidationPipeline<R> {
    pub fn new(source: R, target: R, profile: ValidationProfile) -> Self {
        Self {
            source,
            target,
            profile,
        }
    }

    pub fn profile(&self) -> &ValidationProfile {
        &self.profile
    }

    /// Validate every table of the target schema, alphabetically, without
    /// the checksum. Stops at the first failing table.
    pub async fn validate_all(&self, cancel: &CancellationToken) -> Result<ValidationReport> {
        let tables = self.target.list_tables(&self.profile.schema).await?;
        if tables.is_empty() {
            info!("No tables found in {} schema", self.profile.schema);
            return Ok(ValidationReport::default());
        }

        info!("Found {} tables to validate", tables.len());
        let mut report = ValidationReport::default();
        for table in &tables {
            if cancel.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }
            report.tables.push(self.validate_table(table, false, cancel).await?);
        }

        info!("All {} tables validated successfully", report.tables_validated());
        Ok(report)
    }

    /// Run the check sequence for one table.
    ///
    /// An explicit checksum request is never skipped: without the configured
    /// checksum columns it hashes every column, and without an id column it
    /// fails with a configuration error.
    pub async fn validate_table(
        &self,
        table: &str,
        with_checksum: bool,
        cancel: &CancellationToken,
    ) -> Result<TableReport> {
        let start = Instant::now();
        let schema = self.profile.schema.as_str();
        let mut checks = Vec::with_capacity(7);
        info!("Validating table: {}", table);

        // 1. Schema columns
        let (source_columns, target_columns) = until_cancelled(cancel, async {
            tokio::join!(
                self.source.columns(schema, table),
                self.target.columns(schema, table)
            )
        })
        .await?;
        let (source_columns, target_columns) = (source_columns?, target_columns?);
        if source_columns.is_empty() && target_columns.is_empty() {
            return Err(MigrateError::mismatch(
                table,
                CheckKind::SchemaColumns,
                format!("table not found in schema {} on either side", schema),
            ));
        }
        checks::compare_columns(table, &source_columns, &target_columns)?;
        checks.push(self.passed(table, CheckKind::SchemaColumns));

        let present: HashSet<&str> = source_columns.iter().map(|c| c.name.as_str()).collect();
        let has_id = present.contains(self.profile.id_column.as_str());
        let available = |columns: &[String]| -> Vec<String> {
            columns
                .iter()
                .filter(|c| present.contains(c.as_str()))
                .cloned()
                .collect()
        };

        // 2. Schema constraints
        let (source_constraints, target_constraints) = until_cancelled(cancel, async {
            tokio::join!(
                self.source.constraints(schema, table),
                self.target.constraints(schema, table)
            )
        })
        .await?;
        checks::compare_constraints(table, &source_constraints?, &target_constraints?)?;
        checks.push(self.passed(table, CheckKind::SchemaConstraints));

        // 3. Row count
        let (source_count, target_count) = until_cancelled(cancel, async {
            tokio::join!(
                self.source.row_count(schema, table),
                self.target.row_count(schema, table)
            )
        })
        .await?;
        let row_count = checks::compare_row_counts(table, source_count?, target_count?)?;
        checks.push(self.passed(table, CheckKind::RowCount));

        // 4. ID range
        if has_id {
            let id = self.profile.id_column.as_str();
            let (source_range, target_range) = until_cancelled(cancel, async {
                tokio::join!(
                    self.source.id_range(schema, table, id),
                    self.target.id_range(schema, table, id)
                )
            })
            .await?;
            checks::compare_id_ranges(table, &source_range?, &target_range?)?;
            checks.push(self.passed(table, CheckKind::IdRange));
        } else {
            checks.push(self.no_id_column(table, CheckKind::IdRange));
        }

        // 5. Aggregate statistics
        let sum_columns = available(&self.profile.sum_columns);
        let distinct_columns = available(&self.profile.distinct_columns);
        if sum_columns.is_empty() && distinct_columns.is_empty() {
            checks.push(self.skipped(
                table,
                CheckKind::AggregateStats,
                "none of the configured statistic columns exist".to_string(),
            ));
        } else {
            let (source_stats, target_stats) = until_cancelled(cancel, async {
                tokio::join!(
                    self.source
                        .aggregate_stats(schema, table, &sum_columns, &distinct_columns),
                    self.target
                        .aggregate_stats(schema, table, &sum_columns, &distinct_columns)
                )
            })
            .await?;
            checks::compare_aggregates(table, &source_stats?, &target_stats?)?;
            checks.push(self.passed(table, CheckKind::AggregateStats));
        }

        // 6. Timestamp range
        match self
            .profile
            .timestamp_column
            .as_deref()
            .filter(|c| present.contains(c))
        {
            Some(column) => {
                let (source_range, target_range) = until_cancelled(cancel, async {
                    tokio::join!(
                        self.source.timestamp_range(schema, table, column),
                        self.target.timestamp_range(schema, table, column)
                    )
                })
                .await?;
                checks::compare_timestamp_ranges(table, &source_range?, &target_range?)?;
                checks.push(self.passed(table, CheckKind::TimestampRange));
            }
            None => checks.push(self.skipped(
                table,
                CheckKind::TimestampRange,
                "timestamp column not present".to_string(),
            )),
        }

        // 7. Data checksum
        let mut checksum = None;
        if with_checksum {
            if !has_id {
                return Err(MigrateError::Config(format!(
                    "data checksum for {} needs an ordering column, but {} has no {} column",
                    table, table, self.profile.id_column
                )));
            }
            let mut columns = available(&self.profile.checksum_columns);
            if columns.is_empty() {
                info!(
                    "{}: no configured checksum columns present, hashing all {} columns",
                    table,
                    source_columns.len()
                );
                columns = source_columns.iter().map(|c| c.name.clone()).collect();
            }
            info!("Validating data checksum for {} (this may take a while on large tables)", table);
            let id = self.profile.id_column.as_str();
            let (source_sum, target_sum) = until_cancelled(cancel, async {
                tokio::join!(
                    self.source.data_checksum(schema, table, id, &columns),
                    self.target.data_checksum(schema, table, id, &columns)
                )
            })
            .await?;
            checksum = checks::compare_checksums(table, source_sum?, target_sum?)?;
            checks.push(self.passed(table, CheckKind::DataChecksum));
        }

        info!(
            "Table {} validated: {} rows in {}ms",
            table,
            row_count,
            start.elapsed().as_millis()
        );

        Ok(TableReport {
            table: table.to_string(),
            row_count,
            checksum,
            checks,
        })
    }

    fn passed(&self, table: &str, check: CheckKind) -> CheckOutcome {
        info!("{}: {} check passed", table, check);
        CheckOutcome::passed(check)
    }

    fn skipped(&self, table: &str, check: CheckKind, reason: String) -> CheckOutcome {
        info!("{}: {} check skipped ({})", table, check, reason);
        CheckOutcome::skipped(check, reason)
    }

    fn no_id_column(&self, table: &str, check: CheckKind) -> CheckOutcome {
        self.skipped(
            table,
            check,
            format!("no {} column", self.profile.id_column),
        )
    }
}

/// Resolve `work` unless `cancel` fires first.
async fn until_cancelled<F: Future>(cancel: &CancellationToken, work: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MigrateError::Cancelled),
        output = work => Ok(output),
    }
}
