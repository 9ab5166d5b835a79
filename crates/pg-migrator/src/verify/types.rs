//! Type definitions for source/target validation.

use crate::config::ValidationConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The ordered validation checks, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    SchemaColumns,
    SchemaConstraints,
    RowCount,
    IdRange,
    AggregateStats,
    TimestampRange,
    DataChecksum,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckKind::SchemaColumns => "schema columns",
            CheckKind::SchemaConstraints => "schema constraints",
            CheckKind::RowCount => "row count",
            CheckKind::IdRange => "ID range",
            CheckKind::AggregateStats => "aggregate statistics",
            CheckKind::TimestampRange => "timestamp range",
            CheckKind::DataChecksum => "data checksum",
        };
        write!(f, "{}", name)
    }
}

/// One column as reported by `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub default: Option<String>,
}

impl ColumnDefinition {
    /// Name of the first field that differs from `other`, if any.
    pub fn first_difference(&self, other: &ColumnDefinition) -> Option<&'static str> {
        if self.name != other.name {
            return Some("name");
        }
        if self.data_type != other.data_type {
            return Some("data type");
        }
        if self.is_nullable != other.is_nullable {
            return Some("nullability");
        }
        if self.default != other.default {
            return Some("default");
        }
        None
    }
}

impl fmt::Display for ColumnDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.data_type)?;
        if !self.is_nullable {
            write!(f, " NOT NULL")?;
        }
        if let Some(default) = &self.default {
            write!(f, " DEFAULT {}", default)?;
        }
        Ok(())
    }
}

/// Constraint types compared by the schema constraints check.
///
/// Variant order matches the alphabetical order of the SQL names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    ForeignKey,
    PrimaryKey,
    Unique,
}

impl ConstraintKind {
    /// Parse an `information_schema.table_constraints.constraint_type` value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "FOREIGN KEY" => Some(ConstraintKind::ForeignKey),
            "PRIMARY KEY" => Some(ConstraintKind::PrimaryKey),
            "UNIQUE" => Some(ConstraintKind::Unique),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            ConstraintKind::ForeignKey => "FOREIGN KEY",
            ConstraintKind::PrimaryKey => "PRIMARY KEY",
            ConstraintKind::Unique => "UNIQUE",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Constraint types of one table, sorted, duplicates kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSummary(Vec<ConstraintKind>);

impl ConstraintSummary {
    pub fn new(mut kinds: Vec<ConstraintKind>) -> Self {
        kinds.sort();
        Self(kinds)
    }

    pub fn kinds(&self) -> &[ConstraintKind] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ConstraintSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(|k| k.as_sql()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// `MIN(id)`, `MAX(id)` (as text) and `COUNT(DISTINCT id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    pub min: Option<String>,
    pub max: Option<String>,
    pub unique: i64,
}

/// Sum of one numeric column, as text; `None` when every value is NULL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSum {
    pub column: String,
    pub sum: Option<String>,
}

/// Distinct non-NULL values of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistinctCount {
    pub column: String,
    pub count: i64,
}

/// Cheap statistical fingerprint of a table's content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub sums: Vec<ColumnSum>,
    pub distinct_counts: Vec<DistinctCount>,
}

/// Earliest and latest timestamp, as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampRange {
    pub earliest: Option<String>,
    pub latest: Option<String>,
}

/// Status of a check that did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub check: CheckKind,
    #[serde(flatten)]
    pub status: CheckStatus,
}

impl CheckOutcome {
    pub fn passed(check: CheckKind) -> Self {
        Self {
            check,
            status: CheckStatus::Passed,
        }
    }

    pub fn skipped(check: CheckKind, reason: impl Into<String>) -> Self {
        Self {
            check,
            status: CheckStatus::Skipped {
                reason: reason.into(),
            },
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == CheckStatus::Passed
    }
}

/// Checks that passed or were skipped for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub row_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub checks: Vec<CheckOutcome>,
}

impl TableReport {
    pub fn outcome(&self, check: CheckKind) -> Option<&CheckOutcome> {
        self.checks.iter().find(|o| o.check == check)
    }
}

/// Result of a successful validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub tables: Vec<TableReport>,
}

impl ValidationReport {
    pub fn tables_validated(&self) -> usize {
        self.tables.len()
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Columns used by the content checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationProfile {
    pub schema: String,
    pub id_column: String,
    pub sum_columns: Vec<String>,
    pub distinct_columns: Vec<String>,
    pub timestamp_column: Option<String>,
    pub checksum_columns: Vec<String>,
}

impl From<&ValidationConfig> for ValidationProfile {
    fn from(config: &ValidationConfig) -> Self {
        let timestamp = config.timestamp_column.trim();
        Self {
            schema: config.schema.clone(),
            id_column: config.id_column.clone(),
            sum_columns: config.sum_columns.clone(),
            distinct_columns: config.distinct_columns.clone(),
            timestamp_column: (!timestamp.is_empty()).then(|| timestamp.to_string()),
            checksum_columns: config.checksum_columns.clone(),
        }
    }
}

impl Default for ValidationProfile {
    fn default() -> Self {
        Self::from(&ValidationConfig::default())
    }
}
