//! Synchronous bulk operations.
//!
//! [`BulkConnection`] owns a current-thread tokio runtime next to its connection and blocks on
//! the asynchronous implementation. Errors are the same [`BulkError`](crate::BulkError) variants
//! the async API returns. Must not be used from inside another tokio runtime.

use serde_json::{Map, Value as JsonValue};
use sqlx::Connection;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use crate::dialect::BulkDatabase;
use crate::entity::{Entity, FromRecord};
use crate::error::Result;
use crate::ext::{run_dynamic, run_entities, run_table};
use crate::operations::{self, Operation};
use crate::options::BulkOptions;
use crate::reader::DataReader;
use crate::table::DataTable;
use crate::value::{Record, Value};

pub struct BulkConnection<DB: BulkDatabase> {
    runtime: Runtime,
    conn: DB::Connection,
}

impl<DB: BulkDatabase> BulkConnection<DB> {
    pub fn connect(url: &str) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build().map_err(sqlx::Error::Io)?;
        let conn = runtime.block_on(DB::Connection::connect(url))?;
        debug!(dialect = DB::DIALECT.as_str(), "Opened blocking connection");
        Ok(Self { runtime, conn })
    }

    /// Run a statement, returning the number of affected rows.
    pub fn execute(&mut self, sql: &str) -> Result<u64> {
        self.runtime.block_on(DB::execute(&mut self.conn, sql, &[]))
    }

    pub fn execute_with(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.runtime.block_on(DB::execute(&mut self.conn, sql, params))
    }

    pub fn fetch_records(&mut self, sql: &str) -> Result<Vec<Record>> {
        self.runtime.block_on(DB::fetch_records(&mut self.conn, sql, &[]))
    }

    pub fn fetch_all<T: FromRecord>(&mut self, sql: &str) -> Result<Vec<T>> {
        self.fetch_records(sql)?.iter().map(T::from_record).collect()
    }

    /// Open a reader over `sql`. Rows are fetched up front so the reader can be handed to a
    /// connection on another runtime.
    pub fn read(&mut self, sql: &str) -> Result<DataReader<'static>> {
        Ok(DataReader::from_records(self.fetch_records(sql)?))
    }

    pub fn bulk_insert<E: Entity + Send>(&mut self, entities: &mut [E], options: &BulkOptions) -> Result<u64> {
        self.runtime.block_on(run_entities::<DB, E>(&mut self.conn, Operation::Insert, entities, options))
    }

    pub fn bulk_insert_dynamic(&mut self, table: &str, rows: &mut [Map<String, JsonValue>], options: &BulkOptions) -> Result<u64> {
        self.runtime.block_on(run_dynamic::<DB>(&mut self.conn, Operation::Insert, table, rows, options))
    }

    pub fn bulk_insert_reader(&mut self, table: &str, reader: DataReader<'_>, options: &BulkOptions) -> Result<u64> {
        self.runtime
            .block_on(operations::execute_reader::<DB>(&mut self.conn, Operation::Insert, table, reader, options))
    }

    pub fn bulk_insert_table(&mut self, table: Option<&str>, data: &mut DataTable, options: &BulkOptions) -> Result<u64> {
        self.runtime.block_on(run_table::<DB>(&mut self.conn, Operation::Insert, table, data, options))
    }

    pub fn bulk_merge<E: Entity + Send>(&mut self, entities: &mut [E], options: &BulkOptions) -> Result<u64> {
        self.runtime.block_on(run_entities::<DB, E>(&mut self.conn, Operation::Merge, entities, options))
    }

    pub fn bulk_merge_dynamic(&mut self, table: &str, rows: &mut [Map<String, JsonValue>], options: &BulkOptions) -> Result<u64> {
        self.runtime.block_on(run_dynamic::<DB>(&mut self.conn, Operation::Merge, table, rows, options))
    }

    pub fn bulk_merge_reader(&mut self, table: &str, reader: DataReader<'_>, options: &BulkOptions) -> Result<u64> {
        self.runtime
            .block_on(operations::execute_reader::<DB>(&mut self.conn, Operation::Merge, table, reader, options))
    }

    pub fn bulk_merge_table(&mut self, table: Option<&str>, data: &mut DataTable, options: &BulkOptions) -> Result<u64> {
        self.runtime.block_on(run_table::<DB>(&mut self.conn, Operation::Merge, table, data, options))
    }

    pub fn bulk_update<E: Entity + Send>(&mut self, entities: &mut [E], options: &BulkOptions) -> Result<u64> {
        self.runtime.block_on(run_entities::<DB, E>(&mut self.conn, Operation::Update, entities, options))
    }

    pub fn bulk_update_dynamic(&mut self, table: &str, rows: &mut [Map<String, JsonValue>], options: &BulkOptions) -> Result<u64> {
        self.runtime.block_on(run_dynamic::<DB>(&mut self.conn, Operation::Update, table, rows, options))
    }

    pub fn bulk_update_reader(&mut self, table: &str, reader: DataReader<'_>, options: &BulkOptions) -> Result<u64> {
        self.runtime
            .block_on(operations::execute_reader::<DB>(&mut self.conn, Operation::Update, table, reader, options))
    }

    pub fn bulk_update_table(&mut self, table: Option<&str>, data: &mut DataTable, options: &BulkOptions) -> Result<u64> {
        self.runtime.block_on(run_table::<DB>(&mut self.conn, Operation::Update, table, data, options))
    }

    pub fn close(self) -> Result<()> {
        let Self { runtime, conn } = self;
        runtime.block_on(conn.close())?;
        Ok(())
    }
}
