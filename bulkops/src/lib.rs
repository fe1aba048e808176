//! Bulk insert, merge and update for [`sqlx`] connections.
//!
//! Rows can come from typed entities ([`Entity`]), dynamic JSON objects, a [`DataReader`] opened
//! on another connection, or an in-memory [`DataTable`]. Every operation runs in one transaction:
//!
//! - **insert** writes rows with multi-row `INSERT` statements and can return the generated
//!   identities into the source rows.
//! - **merge** stages rows in a pseudo-temp table, updates the rows that match on the qualifier
//!   columns (primary key by default) and inserts the rest.
//! - **update** stages rows the same way and only updates matching rows.
//!
//! ```no_run
//! use bulkops::{BulkOperationsExt, BulkOptions};
//! use serde_json::{Map, Value, json};
//! use sqlx::{Connection, SqliteConnection};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let mut conn = SqliteConnection::connect("sqlite::memory:").await?;
//! sqlx::query("CREATE TABLE customer (id INTEGER PRIMARY KEY, name TEXT)").execute(&mut conn).await?;
//!
//! let mut rows: Vec<Map<String, Value>> = vec![
//!     json!({ "name": "Ada" }).as_object().cloned().unwrap_or_default(),
//!     json!({ "name": "Grace" }).as_object().cloned().unwrap_or_default(),
//! ];
//! let options = BulkOptions::new().with_return_identity(true);
//! let inserted = conn.bulk_insert_dynamic("customer", &mut rows, &options).await?;
//! assert_eq!(inserted, 2);
//! assert_eq!(rows[1]["id"], json!(2));
//! # Ok(())
//! # }
//! ```
//!
//! PostgreSQL and SQLite are supported through [`BulkDatabase`]. The [`blocking`] module offers
//! the same operations without an async runtime.

pub mod blocking;
pub mod config;
pub mod dialect;
pub mod entity;
pub mod error;
pub mod ext;
pub mod mapping;
mod operations;
pub mod options;
pub mod reader;
pub mod schema;
pub mod sql;
pub mod table;
pub mod telemetry;
pub mod value;

pub use config::BulkConfig;
pub use dialect::{BulkDatabase, Dialect};
pub use entity::{Entity, FromRecord};
pub use error::{BulkError, Result};
pub use ext::BulkOperationsExt;
pub use mapping::ColumnMapping;
pub use options::{BulkOptions, PseudoTableType, TableHint};
pub use reader::DataReader;
pub use schema::{TableName, TableSchema};
pub use table::{DataColumn, DataRow, DataTable, RowState};
pub use value::{FromValue, Record, Value};
