//! Comparison of source and target results, one function per check.
//!
//! Each function returns `ValidationMismatch` naming the table, the check and
//! the values that disagreed.

use super::types::{
    AggregateStats, CheckKind, ColumnDefinition, ConstraintSummary, IdRange, TimestampRange,
};
use crate::error::{MigrateError, Result};

fn show(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("NULL")
}

pub fn compare_columns(
    table: &str,
    source: &[ColumnDefinition],
    target: &[ColumnDefinition],
) -> Result<()> {
    let check = CheckKind::SchemaColumns;
    if source.len() != target.len() {
        return Err(MigrateError::mismatch(
            table,
            check,
            format!(
                "column count mismatch: source={}, target={}",
                source.len(),
                target.len()
            ),
        ));
    }

    for (position, (s, t)) in source.iter().zip(target).enumerate() {
        if let Some(field) = s.first_difference(t) {
            return Err(MigrateError::mismatch(
                table,
                check,
                format!(
                    "column definition mismatch at position {} ({}): source=[{}], target=[{}]",
                    position + 1,
                    field,
                    s,
                    t
                ),
            ));
        }
    }
    Ok(())
}

pub fn compare_constraints(
    table: &str,
    source: &ConstraintSummary,
    target: &ConstraintSummary,
) -> Result<()> {
    let check = CheckKind::SchemaConstraints;
    if source.len() != target.len() {
        return Err(MigrateError::mismatch(
            table,
            check,
            format!("constraint count mismatch: source={}, target={}", source, target),
        ));
    }

    for (position, (s, t)) in source.kinds().iter().zip(target.kinds()).enumerate() {
        if s != t {
            return Err(MigrateError::mismatch(
                table,
                check,
                format!(
                    "constraint mismatch at position {}: source={}, target={}",
                    position + 1,
                    s,
                    t
                ),
            ));
        }
    }
    Ok(())
}

/// Returns the matched count.
pub fn compare_row_counts(table: &str, source: i64, target: i64) -> Result<i64> {
    if source != target {
        return Err(MigrateError::mismatch(
            table,
            CheckKind::RowCount,
            format!(
                "row count mismatch: source={}, target={} (difference {})",
                source,
                target,
                source - target
            ),
        ));
    }
    Ok(source)
}

pub fn compare_id_ranges(table: &str, source: &IdRange, target: &IdRange) -> Result<()> {
    let check = CheckKind::IdRange;
    if source.min != target.min {
        return Err(MigrateError::mismatch(
            table,
            check,
            format!(
                "min ID mismatch: source={}, target={}",
                show(&source.min),
                show(&target.min)
            ),
        ));
    }
    if source.max != target.max {
        return Err(MigrateError::mismatch(
            table,
            check,
            format!(
                "max ID mismatch: source={}, target={}",
                show(&source.max),
                show(&target.max)
            ),
        ));
    }
    if source.unique != target.unique {
        return Err(MigrateError::mismatch(
            table,
            check,
            format!(
                "unique ID count mismatch: source={}, target={}",
                source.unique, target.unique
            ),
        ));
    }
    Ok(())
}

/// Sums must both be NULL or both equal; distinct counts must be equal.
pub fn compare_aggregates(
    table: &str,
    source: &AggregateStats,
    target: &AggregateStats,
) -> Result<()> {
    let check = CheckKind::AggregateStats;

    for (s, t) in source.sums.iter().zip(&target.sums) {
        if s.sum != t.sum {
            return Err(MigrateError::mismatch(
                table,
                check,
                format!(
                    "sum of {} mismatch: source={}, target={}",
                    s.column,
                    show(&s.sum),
                    show(&t.sum)
                ),
            ));
        }
    }

    for (s, t) in source.distinct_counts.iter().zip(&target.distinct_counts) {
        if s.count != t.count {
            return Err(MigrateError::mismatch(
                table,
                check,
                format!(
                    "distinct {} count mismatch: source={}, target={}",
                    s.column, s.count, t.count
                ),
            ));
        }
    }

    if source.sums.len() != target.sums.len()
        || source.distinct_counts.len() != target.distinct_counts.len()
    {
        return Err(MigrateError::mismatch(
            table,
            check,
            "sides reported different statistic sets",
        ));
    }
    Ok(())
}

pub fn compare_timestamp_ranges(
    table: &str,
    source: &TimestampRange,
    target: &TimestampRange,
) -> Result<()> {
    let check = CheckKind::TimestampRange;
    if source.earliest != target.earliest {
        return Err(MigrateError::mismatch(
            table,
            check,
            format!(
                "earliest timestamp mismatch: source={}, target={}",
                show(&source.earliest),
                show(&target.earliest)
            ),
        ));
    }
    if source.latest != target.latest {
        return Err(MigrateError::mismatch(
            table,
            check,
            format!(
                "latest timestamp mismatch: source={}, target={}",
                show(&source.latest),
                show(&target.latest)
            ),
        ));
    }
    Ok(())
}

/// Returns the matched checksum.
pub fn compare_checksums(
    table: &str,
    source: Option<String>,
    target: Option<String>,
) -> Result<Option<String>> {
    if source != target {
        return Err(MigrateError::mismatch(
            table,
            CheckKind::DataChecksum,
            format!(
                "data checksums mismatch: source={}, target={}",
                show(&source),
                show(&target)
            ),
        ));
    }
    Ok(source)
}
