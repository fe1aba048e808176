use std::future::Future;

use futures::stream::BoxStream;

use crate::error::Result;
use crate::schema::{TableName, TableSchema};
use crate::sql::IDENTITY_ALIAS;
use crate::value::{Record, Value};

pub mod postgres;
pub mod sqlite;

/// SQL flavour of a [`BulkDatabase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }
}

/// A sqlx database the bulk operations can run against.
///
/// Implementations own everything that differs between backends: catalog lookups, value
/// binding and row decoding. Statement shapes live in [`crate::sql`].
pub trait BulkDatabase: sqlx::Database {
    const DIALECT: Dialect;

    /// Maximum bind parameters in a single statement.
    const MAX_PARAMETERS: usize;

    /// Look up the columns of `table`.
    ///
    /// # Errors
    /// - `MissingFields` - if the table does not exist
    fn describe_table(conn: &mut Self::Connection, table: &TableName) -> impl Future<Output = Result<TableSchema>> + Send;

    /// Run a statement, returning the number of affected rows.
    fn execute(conn: &mut Self::Connection, sql: &str, params: &[Value]) -> impl Future<Output = Result<u64>> + Send;

    /// Run a query and decode every row.
    fn fetch_records(conn: &mut Self::Connection, sql: &str, params: &[Value]) -> impl Future<Output = Result<Vec<Record>>> + Send;

    /// Run a statement whose `RETURNING` clause yields [`IDENTITY_ALIAS`], in returned order.
    fn fetch_identities(conn: &mut Self::Connection, sql: &str, params: &[Value]) -> impl Future<Output = Result<Vec<i64>>> + Send {
        async move {
            let records = Self::fetch_records(conn, sql, params).await?;
            records.iter().map(|record| record.get_as::<i64>(IDENTITY_ALIAS)).collect::<Result<Vec<_>>>()
        }
    }

    /// Run a query and decode rows as they arrive.
    fn stream_records<'c>(conn: &'c mut Self::Connection, sql: &'c str) -> BoxStream<'c, Result<Record>>;
}
