//! SQL statement builders for the bulk pipeline.
//!
//! Statements are built as strings with positional placeholders; values are bound separately by
//! the dialect. On PostgreSQL every placeholder is cast to the destination column's base type so
//! that loosely typed values (text UUIDs, 64-bit integers for `integer` columns, untyped nulls)
//! are accepted. The cast leaves out length modifiers: an explicit cast to `varchar(5)` silently
//! truncates, while assignment into the column rejects over-long values.

use crate::dialect::Dialect;
use crate::options::TableHint;
use crate::schema::{TableColumn, TableName, quote_ident};

/// Column added to staging tables to remember each row's position in the source.
pub const ORDER_COLUMN: &str = "__bulkops_order";
/// Alias of the identity column in `RETURNING` and identity lookups.
pub const IDENTITY_ALIAS: &str = "__bulkops_identity";

const TARGET: &str = "\"__target\"";
const STAGING: &str = "\"__staging\"";

/// Staging column definition for the order column.
pub fn order_column() -> TableColumn {
    TableColumn {
        name: ORDER_COLUMN.to_string(),
        data_type: "bigint".to_string(),
        cast_type: "bigint".to_string(),
        nullable: false,
        primary_key: false,
        identity: false,
    }
}

/// Rows per statement, bounded by the dialect's parameter limit.
pub fn chunk_size(max_parameters: usize, columns: usize, batch_size: usize) -> usize {
    let by_parameters = max_parameters / columns.max(1);
    batch_size.min(by_parameters).max(1)
}

fn placeholder(dialect: Dialect, index: usize, column: &TableColumn) -> String {
    match dialect {
        Dialect::Postgres if column.cast_type.is_empty() => format!("${index}"),
        Dialect::Postgres => format!("CAST(${index} AS {})", column.cast_type),
        Dialect::Sqlite => format!("?{index}"),
    }
}

fn column_list(columns: &[&TableColumn], prefix: Option<&str>) -> String {
    columns
        .iter()
        .map(|c| match prefix {
            Some(prefix) => format!("{prefix}.{}", quote_ident(&c.name)),
            None => quote_ident(&c.name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn match_condition(qualifiers: &[&TableColumn]) -> String {
    qualifiers
        .iter()
        .map(|q| {
            let column = quote_ident(&q.name);
            format!("{TARGET}.{column} = {STAGING}.{column}")
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn returning(identity: Option<&TableColumn>) -> String {
    match identity {
        Some(identity) => format!(" RETURNING CAST({} AS BIGINT) AS {}", quote_ident(&identity.name), quote_ident(IDENTITY_ALIAS)),
        None => String::new(),
    }
}

/// `INSERT INTO table (columns) VALUES (...), (...) [RETURNING identity]`
pub fn insert_values(dialect: Dialect, table: &TableName, columns: &[&TableColumn], rows: usize, identity: Option<&TableColumn>) -> String {
    let mut sql = format!("INSERT INTO {} ({}) VALUES ", table.quoted(), column_list(columns, None));
    for row in 0..rows {
        if row > 0 {
            sql.push_str(", ");
        }
        let values = columns
            .iter()
            .enumerate()
            .map(|(i, column)| placeholder(dialect, row * columns.len() + i + 1, column))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push('(');
        sql.push_str(&values);
        sql.push(')');
    }
    sql.push_str(&returning(identity));
    sql
}

/// Create an empty staging table shaped like `columns` of `table`, plus the order column.
pub fn create_staging(dialect: Dialect, temporary: bool, staging: &TableName, table: &TableName, columns: &[&TableColumn]) -> String {
    let kind = match (temporary, dialect) {
        (false, _) => "TABLE",
        (true, Dialect::Postgres) => "TEMPORARY TABLE",
        (true, Dialect::Sqlite) => "TEMP TABLE",
    };
    format!(
        "CREATE {kind} {} AS SELECT {}, CAST(0 AS BIGINT) AS {} FROM {} WHERE 1 = 0",
        staging.quoted(),
        column_list(columns, None),
        quote_ident(ORDER_COLUMN),
        table.quoted()
    )
}

pub fn drop_staging(staging: &TableName) -> String {
    format!("DROP TABLE IF EXISTS {}", staging.quoted())
}

/// Update rows of `table` that match a staged row on all qualifiers.
pub fn update_from_staging(table: &TableName, staging: &TableName, set_columns: &[&TableColumn], qualifiers: &[&TableColumn]) -> String {
    let assignments = set_columns
        .iter()
        .map(|c| {
            let column = quote_ident(&c.name);
            format!("{column} = {STAGING}.{column}")
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} AS {TARGET} SET {assignments} FROM {} AS {STAGING} WHERE {}",
        table.quoted(),
        staging.quoted(),
        match_condition(qualifiers)
    )
}

/// Insert staged rows that match no existing row, in source order.
pub fn insert_from_staging(
    table: &TableName,
    staging: &TableName,
    columns: &[&TableColumn],
    qualifiers: &[&TableColumn],
    identity: Option<&TableColumn>,
) -> String {
    format!(
        "INSERT INTO {table} ({}) SELECT {} FROM {staging} AS {STAGING} WHERE NOT EXISTS (SELECT 1 FROM {table} AS {TARGET} WHERE {}) ORDER BY {STAGING}.{}{}",
        column_list(columns, None),
        column_list(columns, Some(STAGING)),
        match_condition(qualifiers),
        quote_ident(ORDER_COLUMN),
        returning(identity),
        table = table.quoted(),
        staging = staging.quoted(),
    )
}

/// Order and identity of every staged row that matches an existing row.
pub fn matched_identities(table: &TableName, staging: &TableName, identity: &TableColumn, qualifiers: &[&TableColumn]) -> String {
    format!(
        "SELECT {STAGING}.{order} AS {order}, CAST({TARGET}.{} AS BIGINT) AS {} FROM {} AS {STAGING} JOIN {} AS {TARGET} ON {} ORDER BY {STAGING}.{order}",
        quote_ident(&identity.name),
        quote_ident(IDENTITY_ALIAS),
        staging.quoted(),
        table.quoted(),
        match_condition(qualifiers),
        order = quote_ident(ORDER_COLUMN),
    )
}

/// Order of every staged row that matches no existing row.
pub fn unmatched_orders(table: &TableName, staging: &TableName, qualifiers: &[&TableColumn]) -> String {
    format!(
        "SELECT {STAGING}.{order} AS {order} FROM {} AS {STAGING} WHERE NOT EXISTS (SELECT 1 FROM {} AS {TARGET} WHERE {}) ORDER BY {STAGING}.{order}",
        staging.quoted(),
        table.quoted(),
        match_condition(qualifiers),
        order = quote_ident(ORDER_COLUMN),
    )
}

/// Move the sequence behind a serial or identity column past the highest stored value.
///
/// Binds the quoted table name as `$1` and the raw column name as `$2`. A column without a
/// sequence, or an empty table, leaves everything as it was since `setval` ignores nulls.
pub fn sync_identity_sequence(table: &TableName, identity: &TableColumn) -> String {
    format!(
        "SELECT setval(CAST(pg_get_serial_sequence($1, $2) AS regclass), MAX({})) FROM {}",
        quote_ident(&identity.name),
        table.quoted()
    )
}

pub fn lock_table(table: &TableName, hint: TableHint) -> String {
    format!("LOCK TABLE {} IN {} MODE", table.quoted(), hint.lock_mode())
}
