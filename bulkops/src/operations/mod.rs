//! The bulk pipeline shared by every source shape.
//!
//! Each operation resolves the destination table, opens a transaction (a savepoint if the caller
//! already holds one), optionally locks the table, writes the rows and commits. Any error, or a
//! timeout, drops the transaction and rolls everything back, staging tables included.

use std::future::Future;
use std::time::Duration;

use sqlx::Connection;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::dialect::{BulkDatabase, Dialect};
use crate::error::{BulkError, Result};
use crate::mapping::{MappedColumn, resolve_columns};
use crate::options::{BulkOptions, PseudoTableType};
use crate::reader::DataReader;
use crate::schema::{TableColumn, TableName, TableSchema};
use crate::sql;
use crate::value::{Record, Value};

pub mod insert;
pub mod merge;
pub mod source;
pub mod update;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Merge,
    Update,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Merge => "merge",
            Operation::Update => "update",
        }
    }
}

/// Rows with a shared column list, plus where each row came from in the caller's source.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Index into the caller's source for each row.
    pub positions: Vec<usize>,
}

impl Batch {
    /// Align records on the columns of the first record; missing cells become `Null`.
    pub fn from_records(records: Vec<Record>) -> Self {
        let columns: Vec<String> = records.first().map(|r| r.columns().map(str::to_string).collect()).unwrap_or_default();
        let positions = (0..records.len()).collect();
        let rows = records
            .iter()
            .map(|record| columns.iter().map(|c| record.get(c).cloned().unwrap_or(Value::Null)).collect())
            .collect();
        Self { columns, rows, positions }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Identity generated or matched for one batch row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// Row index within the batch.
    pub row: usize,
    pub value: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub affected: u64,
    pub identities: Vec<Identity>,
    /// Destination identity column, when identities were collected.
    pub identity_column: Option<String>,
}

async fn with_timeout<T>(timeout: Option<Duration>, operation: impl Future<Output = Result<T>>) -> Result<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, operation).await.map_err(|_| BulkError::Timeout(limit))?,
        None => operation.await,
    }
}

fn record_metrics(operation: Operation, dialect: Dialect, affected: u64) {
    metrics::counter!("bulkops_operations_total", "operation" => operation.as_str(), "dialect" => dialect.as_str()).increment(1);
    metrics::counter!("bulkops_rows_total", "operation" => operation.as_str(), "dialect" => dialect.as_str()).increment(affected);
}

async fn lock_table<DB: BulkDatabase>(conn: &mut DB::Connection, schema: &TableSchema, options: &BulkOptions) -> Result<()> {
    let Some(hint) = options.hints else {
        return Ok(());
    };
    match DB::DIALECT {
        Dialect::Postgres => {
            DB::execute(conn, &sql::lock_table(&schema.name, hint), &[]).await?;
        }
        Dialect::Sqlite => debug!(?hint, "SQLite has no table locks, ignoring hint"),
    }
    Ok(())
}

/// Write one batch inside an open transaction.
async fn write_batch<DB: BulkDatabase>(
    conn: &mut DB::Connection,
    operation: Operation,
    schema: &TableSchema,
    batch: &Batch,
    options: &BulkOptions,
) -> Result<Outcome> {
    let mapped = resolve_columns(&batch.columns, schema, &options.mappings)?;
    let outcome = match operation {
        Operation::Insert => insert::write::<DB>(conn, schema, &mapped, batch, options).await?,
        Operation::Merge => merge::write::<DB>(conn, schema, &mapped, batch, options).await?,
        Operation::Update => update::write::<DB>(conn, schema, &mapped, batch, options).await?,
    };
    if options.keep_identity && operation != Operation::Update {
        sync_identity::<DB>(conn, schema, &mapped).await?;
    }
    Ok(outcome)
}

/// After identity values were written explicitly, move PostgreSQL's sequence past them so later
/// generated values do not collide. SQLite derives new rowids from the table itself.
async fn sync_identity<DB: BulkDatabase>(conn: &mut DB::Connection, schema: &TableSchema, mapped: &[MappedColumn]) -> Result<()> {
    if DB::DIALECT != Dialect::Postgres {
        return Ok(());
    }
    let Some(identity) = mapped.iter().map(|m| &m.column).find(|c| c.identity) else {
        return Ok(());
    };
    let params = [Value::Text(schema.name.quoted()), Value::Text(identity.name.clone())];
    DB::execute(conn, &sql::sync_identity_sequence(&schema.name, identity), &params).await?;
    debug!(table = %schema.name, column = %identity.name, "Synchronized identity sequence");
    Ok(())
}

/// Run an operation over rows that are already in memory.
#[instrument(skip(conn, batch, options), fields(dialect = DB::DIALECT.as_str(), rows = batch.len()))]
pub async fn execute_batch<DB: BulkDatabase>(
    conn: &mut DB::Connection,
    operation: Operation,
    table: &str,
    batch: &Batch,
    options: &BulkOptions,
) -> Result<Outcome> {
    let name = TableName::parse(table)?;
    let outcome = with_timeout(options.timeout, async {
        let mut tx = conn.begin().await?;
        let schema = DB::describe_table(&mut *tx, &name).await?;
        if batch.is_empty() {
            tx.commit().await?;
            return Ok(Outcome::default());
        }
        lock_table::<DB>(&mut *tx, &schema, options).await?;
        let outcome = write_batch::<DB>(&mut *tx, operation, &schema, batch, options).await?;
        tx.commit().await?;
        Ok(outcome)
    })
    .await?;

    record_metrics(operation, DB::DIALECT, outcome.affected);
    info!(affected = outcome.affected, "Bulk {} completed", operation.as_str());
    Ok(outcome)
}

/// Run an operation over a reader, one batch of `options.batch_size` rows at a time.
///
/// All batches share one transaction. Identities are not propagated since reader rows cannot be
/// written back.
#[instrument(skip(conn, reader, options), fields(dialect = DB::DIALECT.as_str()))]
pub async fn execute_reader<DB: BulkDatabase>(
    conn: &mut DB::Connection,
    operation: Operation,
    table: &str,
    mut reader: DataReader<'_>,
    options: &BulkOptions,
) -> Result<u64> {
    let name = TableName::parse(table)?;
    let options = BulkOptions {
        return_identity: false,
        ..options.clone()
    };
    let affected = with_timeout(options.timeout, async {
        let mut tx = conn.begin().await?;
        let schema = DB::describe_table(&mut *tx, &name).await?;
        let mut affected = 0;
        let mut first = true;
        loop {
            let records = reader.next_batch(options.batch_size.max(1)).await?;
            if records.is_empty() {
                break;
            }
            if first {
                if records[0].is_empty() {
                    return Err(BulkError::NullArgument { argument: "reader" });
                }
                lock_table::<DB>(&mut *tx, &schema, &options).await?;
                first = false;
            }
            let batch = Batch::from_records(records);
            debug!(rows = batch.len(), "Writing reader batch");
            affected += write_batch::<DB>(&mut *tx, operation, &schema, &batch, &options).await?.affected;
        }
        tx.commit().await?;
        Ok(affected)
    })
    .await?;

    record_metrics(operation, DB::DIALECT, affected);
    info!(affected, "Bulk {} from reader completed", operation.as_str());
    Ok(affected)
}

/// Column values of `rows` for `columns`, flattened row by row.
pub(crate) fn row_params(rows: &[Vec<Value>], columns: &[&MappedColumn]) -> Vec<Value> {
    let mut params = Vec::with_capacity(rows.len() * columns.len());
    for row in rows {
        for column in columns {
            params.push(row.get(column.source_index).cloned().unwrap_or(Value::Null));
        }
    }
    params
}

/// A pseudo-temp table holding one batch, keyed by source order.
pub(crate) struct Staging {
    pub name: TableName,
}

impl Staging {
    /// Create the staging table and load `batch` into it.
    pub async fn load<DB: BulkDatabase>(
        conn: &mut DB::Connection,
        schema: &TableSchema,
        mapped: &[MappedColumn],
        batch: &Batch,
        options: &BulkOptions,
    ) -> Result<Self> {
        let name = TableName {
            schema: None,
            name: format!("_bulkops_{}", Uuid::new_v4().simple()),
        };
        let temporary = options.pseudo_table == PseudoTableType::Temporary;
        let columns: Vec<&TableColumn> = mapped.iter().map(|m| &m.column).collect();
        DB::execute(conn, &sql::create_staging(DB::DIALECT, temporary, &name, &schema.name, &columns), &[]).await?;

        let order = sql::order_column();
        let mut staged_columns = columns.clone();
        staged_columns.push(&order);
        let chunk = sql::chunk_size(DB::MAX_PARAMETERS, staged_columns.len(), options.batch_size);

        for (index, rows) in batch.rows.chunks(chunk).enumerate() {
            let offset = index * chunk;
            let mut params = Vec::with_capacity(rows.len() * staged_columns.len());
            for (i, row) in rows.iter().enumerate() {
                params.extend(mapped.iter().map(|m| row.get(m.source_index).cloned().unwrap_or(Value::Null)));
                params.push(Value::Int64((offset + i) as i64));
            }
            let statement = sql::insert_values(DB::DIALECT, &name, &staged_columns, rows.len(), None);
            DB::execute(conn, &statement, &params).await?;
        }

        debug!(staging = %name, rows = batch.len(), temporary, "Loaded staging table");
        Ok(Self { name })
    }

    pub async fn remove<DB: BulkDatabase>(self, conn: &mut DB::Connection) -> Result<()> {
        DB::execute(conn, &sql::drop_staging(&self.name), &[]).await?;
        Ok(())
    }
}

/// Read `(order, identity)` pairs produced by [`sql::matched_identities`].
pub(crate) fn identities_from_records(records: &[Record]) -> Result<Vec<Identity>> {
    records
        .iter()
        .map(|record| {
            let row: i64 = record.get_as(sql::ORDER_COLUMN)?;
            Ok(Identity {
                row: row as usize,
                value: record.get_as(sql::IDENTITY_ALIAS)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_aligns_records_on_first_columns() {
        let batch = Batch::from_records(vec![
            Record::new().with("a", 1i64).with("b", "x"),
            Record::new().with("B", "y").with("c", 3i64),
        ]);
        assert_eq!(batch.columns, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(batch.rows[1], vec![Value::Null, Value::Text("y".into())]);
        assert_eq!(batch.positions, vec![0, 1]);
    }

    #[test]
    fn identities_are_read_by_alias() {
        let records = vec![Record::new().with(sql::ORDER_COLUMN, 2i64).with(sql::IDENTITY_ALIAS, 40i64)];
        assert_eq!(identities_from_records(&records).unwrap(), vec![Identity { row: 2, value: 40 }]);
    }

    #[tokio::test]
    async fn timeout_is_reported() {
        let result: Result<()> = with_timeout(Some(Duration::from_millis(10)), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(BulkError::Timeout(_))));
    }
}
