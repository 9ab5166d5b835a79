//! SQL generation for the validation checks.
//!
//! Values whose type varies per table (ids, sums, timestamps) are cast to
//! text so both sides decode them the same way and compare exactly.

/// Catalog query for ordered column definitions. Params: schema, table.
pub const COLUMNS_QUERY: &str = r#"SELECT
    column_name::text,
    data_type::text,
    is_nullable::text,
    column_default::text
FROM information_schema.columns
WHERE table_schema = $1 AND table_name = $2
ORDER BY ordinal_position"#;

/// Catalog query for constraint types. Params: schema, table.
pub const CONSTRAINTS_QUERY: &str = r#"SELECT constraint_type::text
FROM information_schema.table_constraints
WHERE table_schema = $1 AND table_name = $2
  AND constraint_type IN ('PRIMARY KEY', 'FOREIGN KEY', 'UNIQUE')
ORDER BY constraint_type"#;

/// Table listing, alphabetical. Params: schema.
pub const LIST_TABLES_QUERY: &str =
    "SELECT tablename::text FROM pg_tables WHERE schemaname = $1 ORDER BY tablename";

/// Quote a PostgreSQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

pub fn row_count_query(schema: &str, table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", qualified(schema, table))
}

pub fn id_range_query(schema: &str, table: &str, id_column: &str) -> String {
    let id = quote_ident(id_column);
    format!(
        "SELECT MIN({id})::text, MAX({id})::text, COUNT(DISTINCT {id}) FROM {table}",
        id = id,
        table = qualified(schema, table),
    )
}

/// One row: the sums (as text) followed by the distinct counts.
pub fn aggregate_query(
    schema: &str,
    table: &str,
    sum_columns: &[String],
    distinct_columns: &[String],
) -> String {
    let exprs: Vec<String> = sum_columns
        .iter()
        .map(|c| format!("SUM({})::text", quote_ident(c)))
        .chain(
            distinct_columns
                .iter()
                .map(|c| format!("COUNT(DISTINCT {})", quote_ident(c))),
        )
        .collect();
    format!(
        "SELECT {} FROM {}",
        exprs.join(", "),
        qualified(schema, table)
    )
}

pub fn timestamp_range_query(schema: &str, table: &str, column: &str) -> String {
    let col = quote_ident(column);
    format!(
        "SELECT MIN({col})::text, MAX({col})::text FROM {table}",
        col = col,
        table = qualified(schema, table),
    )
}

/// MD5 over every row's columns joined by `|`, rows joined by `|` in id
/// order. NULL columns contribute an empty string; an empty table yields NULL.
pub fn checksum_query(schema: &str, table: &str, id_column: &str, columns: &[String]) -> String {
    let row_expr: Vec<String> = columns
        .iter()
        .map(|c| format!("COALESCE({}::text, '')", quote_ident(c)))
        .collect();
    format!(
        "SELECT MD5(STRING_AGG({row}, '|' ORDER BY {id})) FROM {table}",
        row = row_expr.join(" || '|' || "),
        id = quote_ident(id_column),
        table = qualified(schema, table),
    )
}
