//! Read-only catalog and data access used by the validation pipeline.

use super::queries::{
    aggregate_query, checksum_query, id_range_query, row_count_query, timestamp_range_query,
    COLUMNS_QUERY, CONSTRAINTS_QUERY, LIST_TABLES_QUERY,
};
use super::types::{
    AggregateStats, ColumnDefinition, ColumnSum, ConstraintKind, ConstraintSummary,
    DistinctCount, IdRange, TimestampRange,
};
use crate::db::{PgSession, Side};
use crate::error::{MigrateError, Result};
use async_trait::async_trait;
use tokio_postgres::Row;
use tracing::debug;

/// Queries one side of a migration for validation.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    fn side(&self) -> Side;

    /// Base tables in `schema`, alphabetical.
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>>;

    /// Column definitions in declaration order. Empty if the table does not exist.
    async fn columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnDefinition>>;

    async fn constraints(&self, schema: &str, table: &str) -> Result<ConstraintSummary>;

    async fn row_count(&self, schema: &str, table: &str) -> Result<i64>;

    async fn id_range(&self, schema: &str, table: &str, id_column: &str) -> Result<IdRange>;

    async fn aggregate_stats(
        &self,
        schema: &str,
        table: &str,
        sum_columns: &[String],
        distinct_columns: &[String],
    ) -> Result<AggregateStats>;

    async fn timestamp_range(
        &self,
        schema: &str,
        table: &str,
        column: &str,
    ) -> Result<TimestampRange>;

    /// Order-sensitive content hash; `None` for an empty table.
    async fn data_checksum(
        &self,
        schema: &str,
        table: &str,
        id_column: &str,
        columns: &[String],
    ) -> Result<Option<String>>;
}

impl PgSession {
    async fn query_rows(&self, context: &str, sql: &str, params: &[&str]) -> Result<Vec<Row>> {
        debug!("{} query: {}", self.side(), sql);
        let params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = params
            .iter()
            .map(|p| p as &(dyn tokio_postgres::types::ToSql + Sync))
            .collect();
        self.client()
            .query(sql, &params)
            .await
            .map_err(|e| MigrateError::query(self.side(), context, e))
    }

    async fn query_single(&self, context: &str, sql: &str) -> Result<Row> {
        debug!("{} query: {}", self.side(), sql);
        self.client()
            .query_one(sql, &[])
            .await
            .map_err(|e| MigrateError::query(self.side(), context, e))
    }

    fn read<'a, T>(&self, context: &str, row: &'a Row, idx: usize) -> Result<T>
    where
        T: tokio_postgres::types::FromSql<'a>,
    {
        row.try_get(idx)
            .map_err(|e| MigrateError::query(self.side(), context, e))
    }
}

#[async_trait]
impl CatalogReader for PgSession {
    fn side(&self) -> Side {
        PgSession::side(self)
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        let context = "listing tables";
        let rows = self.query_rows(context, LIST_TABLES_QUERY, &[schema]).await?;
        rows.iter().map(|row| self.read(context, row, 0)).collect()
    }

    async fn columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnDefinition>> {
        let context = "reading column definitions";
        let rows = self
            .query_rows(context, COLUMNS_QUERY, &[schema, table])
            .await?;
        rows.iter()
            .map(|row| {
                let is_nullable: String = self.read(context, row, 2)?;
                Ok(ColumnDefinition {
                    name: self.read(context, row, 0)?,
                    data_type: self.read(context, row, 1)?,
                    is_nullable: is_nullable == "YES",
                    default: self.read(context, row, 3)?,
                })
            })
            .collect()
    }

    async fn constraints(&self, schema: &str, table: &str) -> Result<ConstraintSummary> {
        let context = "reading constraints";
        let rows = self
            .query_rows(context, CONSTRAINTS_QUERY, &[schema, table])
            .await?;
        let mut kinds = Vec::with_capacity(rows.len());
        for row in &rows {
            let value: String = self.read(context, row, 0)?;
            let kind = ConstraintKind::parse(&value).ok_or_else(|| {
                MigrateError::connectivity(
                    self.side(),
                    format!("unexpected constraint type '{}'", value),
                )
            })?;
            kinds.push(kind);
        }
        Ok(ConstraintSummary::new(kinds))
    }

    async fn row_count(&self, schema: &str, table: &str) -> Result<i64> {
        let context = "counting rows";
        let row = self
            .query_single(context, &row_count_query(schema, table))
            .await?;
        self.read(context, &row, 0)
    }

    async fn id_range(&self, schema: &str, table: &str, id_column: &str) -> Result<IdRange> {
        let context = "reading ID range";
        let row = self
            .query_single(context, &id_range_query(schema, table, id_column))
            .await?;
        Ok(IdRange {
            min: self.read(context, &row, 0)?,
            max: self.read(context, &row, 1)?,
            unique: self.read(context, &row, 2)?,
        })
    }

    async fn aggregate_stats(
        &self,
        schema: &str,
        table: &str,
        sum_columns: &[String],
        distinct_columns: &[String],
    ) -> Result<AggregateStats> {
        if sum_columns.is_empty() && distinct_columns.is_empty() {
            return Ok(AggregateStats::default());
        }

        let context = "reading aggregate statistics";
        let sql = aggregate_query(schema, table, sum_columns, distinct_columns);
        let row = self.query_single(context, &sql).await?;

        let mut stats = AggregateStats::default();
        for (idx, column) in sum_columns.iter().enumerate() {
            stats.sums.push(ColumnSum {
                column: column.clone(),
                sum: self.read(context, &row, idx)?,
            });
        }
        for (offset, column) in distinct_columns.iter().enumerate() {
            stats.distinct_counts.push(DistinctCount {
                column: column.clone(),
                count: self.read(context, &row, sum_columns.len() + offset)?,
            });
        }
        Ok(stats)
    }

    async fn timestamp_range(
        &self,
        schema: &str,
        table: &str,
        column: &str,
    ) -> Result<TimestampRange> {
        let context = "reading timestamp range";
        let row = self
            .query_single(context, &timestamp_range_query(schema, table, column))
            .await?;
        Ok(TimestampRange {
            earliest: self.read(context, &row, 0)?,
            latest: self.read(context, &row, 1)?,
        })
    }

    async fn data_checksum(
        &self,
        schema: &str,
        table: &str,
        id_column: &str,
        columns: &[String],
    ) -> Result<Option<String>> {
        let context = "computing data checksum";
        let row = self
            .query_single(context, &checksum_query(schema, table, id_column, columns))
            .await?;
        self.read(context, &row, 0)
    }
}
