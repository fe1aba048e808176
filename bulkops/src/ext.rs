//! Bulk operations as methods on sqlx connections.

use std::future::Future;

use serde_json::{Map, Value as JsonValue};

use crate::dialect::BulkDatabase;
use crate::entity::Entity;
use crate::error::Result;
use crate::operations::{self, Operation, source};
use crate::options::BulkOptions;
use crate::reader::DataReader;
use crate::table::DataTable;

/// Bulk insert, merge and update for any connection whose database implements [`BulkDatabase`].
///
/// Each method runs in a single transaction on `self` and returns the number of affected rows.
/// With [`BulkOptions::return_identity`], identities are written back into the source rows
/// (entities, maps and data tables; reader rows are not written back).
///
/// # Errors
/// - `MissingFields` - the table does not exist, or no source column matches it
/// - `NullArgument` - the source has no columns
/// - `InvalidOperation` - a mapping or qualifier names an unknown column
/// - `MissingQualifiers` - merge/update on a table without key, identity or qualifiers
pub trait BulkOperationsExt {
    fn bulk_insert<E: Entity + Send>(&mut self, entities: &mut [E], options: &BulkOptions) -> impl Future<Output = Result<u64>> + Send;

    fn bulk_insert_dynamic(
        &mut self,
        table: &str,
        rows: &mut [Map<String, JsonValue>],
        options: &BulkOptions,
    ) -> impl Future<Output = Result<u64>> + Send;

    fn bulk_insert_reader(&mut self, table: &str, reader: DataReader<'_>, options: &BulkOptions) -> impl Future<Output = Result<u64>> + Send;

    /// `table` overrides the data table's own name.
    fn bulk_insert_table(&mut self, table: Option<&str>, data: &mut DataTable, options: &BulkOptions) -> impl Future<Output = Result<u64>> + Send;

    fn bulk_merge<E: Entity + Send>(&mut self, entities: &mut [E], options: &BulkOptions) -> impl Future<Output = Result<u64>> + Send;

    fn bulk_merge_dynamic(
        &mut self,
        table: &str,
        rows: &mut [Map<String, JsonValue>],
        options: &BulkOptions,
    ) -> impl Future<Output = Result<u64>> + Send;

    fn bulk_merge_reader(&mut self, table: &str, reader: DataReader<'_>, options: &BulkOptions) -> impl Future<Output = Result<u64>> + Send;

    fn bulk_merge_table(&mut self, table: Option<&str>, data: &mut DataTable, options: &BulkOptions) -> impl Future<Output = Result<u64>> + Send;

    fn bulk_update<E: Entity + Send>(&mut self, entities: &mut [E], options: &BulkOptions) -> impl Future<Output = Result<u64>> + Send;

    fn bulk_update_dynamic(
        &mut self,
        table: &str,
        rows: &mut [Map<String, JsonValue>],
        options: &BulkOptions,
    ) -> impl Future<Output = Result<u64>> + Send;

    fn bulk_update_reader(&mut self, table: &str, reader: DataReader<'_>, options: &BulkOptions) -> impl Future<Output = Result<u64>> + Send;

    fn bulk_update_table(&mut self, table: Option<&str>, data: &mut DataTable, options: &BulkOptions) -> impl Future<Output = Result<u64>> + Send;
}

pub(crate) async fn run_entities<DB: BulkDatabase, E: Entity + Send>(
    conn: &mut DB::Connection,
    operation: Operation,
    entities: &mut [E],
    options: &BulkOptions,
) -> Result<u64> {
    let batch = source::from_entities(entities)?;
    let outcome = operations::execute_batch::<DB>(conn, operation, E::table_name(), &batch, options).await?;
    source::write_back_entities(entities, &batch, &outcome)?;
    Ok(outcome.affected)
}

pub(crate) async fn run_dynamic<DB: BulkDatabase>(
    conn: &mut DB::Connection,
    operation: Operation,
    table: &str,
    rows: &mut [Map<String, JsonValue>],
    options: &BulkOptions,
) -> Result<u64> {
    let batch = source::from_maps(rows)?;
    let outcome = operations::execute_batch::<DB>(conn, operation, table, &batch, options).await?;
    source::write_back_maps(rows, &batch, &outcome, options);
    Ok(outcome.affected)
}

pub(crate) async fn run_table<DB: BulkDatabase>(
    conn: &mut DB::Connection,
    operation: Operation,
    table: Option<&str>,
    data: &mut DataTable,
    options: &BulkOptions,
) -> Result<u64> {
    let name = table.map_or_else(|| data.name.clone(), str::to_string);
    let batch = source::from_table(data, options)?;
    let outcome = operations::execute_batch::<DB>(conn, operation, &name, &batch, options).await?;
    source::write_back_table(data, &batch, &outcome, options);
    Ok(outcome.affected)
}

impl<C> BulkOperationsExt for C
where
    C: sqlx::Connection,
    C::Database: BulkDatabase<Connection = C>,
{
    async fn bulk_insert<E: Entity + Send>(&mut self, entities: &mut [E], options: &BulkOptions) -> Result<u64> {
        run_entities::<C::Database, E>(self, Operation::Insert, entities, options).await
    }

    async fn bulk_insert_dynamic(&mut self, table: &str, rows: &mut [Map<String, JsonValue>], options: &BulkOptions) -> Result<u64> {
        run_dynamic::<C::Database>(self, Operation::Insert, table, rows, options).await
    }

    async fn bulk_insert_reader(&mut self, table: &str, reader: DataReader<'_>, options: &BulkOptions) -> Result<u64> {
        operations::execute_reader::<C::Database>(self, Operation::Insert, table, reader, options).await
    }

    async fn bulk_insert_table(&mut self, table: Option<&str>, data: &mut DataTable, options: &BulkOptions) -> Result<u64> {
        run_table::<C::Database>(self, Operation::Insert, table, data, options).await
    }

    async fn bulk_merge<E: Entity + Send>(&mut self, entities: &mut [E], options: &BulkOptions) -> Result<u64> {
        run_entities::<C::Database, E>(self, Operation::Merge, entities, options).await
    }

    async fn bulk_merge_dynamic(&mut self, table: &str, rows: &mut [Map<String, JsonValue>], options: &BulkOptions) -> Result<u64> {
        run_dynamic::<C::Database>(self, Operation::Merge, table, rows, options).await
    }

    async fn bulk_merge_reader(&mut self, table: &str, reader: DataReader<'_>, options: &BulkOptions) -> Result<u64> {
        operations::execute_reader::<C::Database>(self, Operation::Merge, table, reader, options).await
    }

    async fn bulk_merge_table(&mut self, table: Option<&str>, data: &mut DataTable, options: &BulkOptions) -> Result<u64> {
        run_table::<C::Database>(self, Operation::Merge, table, data, options).await
    }

    async fn bulk_update<E: Entity + Send>(&mut self, entities: &mut [E], options: &BulkOptions) -> Result<u64> {
        run_entities::<C::Database, E>(self, Operation::Update, entities, options).await
    }

    async fn bulk_update_dynamic(&mut self, table: &str, rows: &mut [Map<String, JsonValue>], options: &BulkOptions) -> Result<u64> {
        run_dynamic::<C::Database>(self, Operation::Update, table, rows, options).await
    }

    async fn bulk_update_reader(&mut self, table: &str, reader: DataReader<'_>, options: &BulkOptions) -> Result<u64> {
        operations::execute_reader::<C::Database>(self, Operation::Update, table, reader, options).await
    }

    async fn bulk_update_table(&mut self, table: Option<&str>, data: &mut DataTable, options: &BulkOptions) -> Result<u64> {
        run_table::<C::Database>(self, Operation::Update, table, data, options).await
    }
}
