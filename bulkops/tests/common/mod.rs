#![allow(dead_code)]

use bulkops::{BulkDatabase, DataTable, Entity, FromRecord, Record, Result, Value};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::{Map, Value as JsonValue, json};
use sqlx::{Connection, Sqlite, SqliteConnection};
use uuid::Uuid;

pub const IDENTITY_TABLE_DDL: &str = r#"
    CREATE TABLE identity_table (
        id INTEGER PRIMARY KEY,
        column_guid TEXT NOT NULL,
        column_bit BOOLEAN NOT NULL,
        column_datetime TEXT,
        column_decimal TEXT,
        column_float REAL,
        column_int INTEGER,
        column_nvarchar TEXT
    )
"#;

pub const NO_KEY_TABLE_DDL: &str = "CREATE TABLE no_key_table (column_int INTEGER, column_nvarchar TEXT)";

/// Row of `identity_table`.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityTable {
    pub id: i64,
    pub column_guid: Uuid,
    pub column_bit: bool,
    pub column_datetime: Option<NaiveDateTime>,
    pub column_decimal: Option<Decimal>,
    pub column_float: Option<f64>,
    pub column_int: Option<i32>,
    pub column_nvarchar: Option<String>,
}

impl Entity for IdentityTable {
    fn table_name() -> &'static str {
        "identity_table"
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("id", self.id)
            .with("column_guid", self.column_guid)
            .with("column_bit", self.column_bit)
            .with("column_datetime", self.column_datetime)
            .with("column_decimal", self.column_decimal)
            .with("column_float", self.column_float)
            .with("column_int", self.column_int)
            .with("column_nvarchar", self.column_nvarchar.clone())
    }

    fn set_identity(&mut self, value: &Value) -> Result<()> {
        self.id = value.get()?;
        Ok(())
    }
}

impl FromRecord for IdentityTable {
    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.get_as("id")?,
            column_guid: record.get_as("column_guid")?,
            column_bit: record.get_as("column_bit")?,
            column_datetime: record.get_as("column_datetime")?,
            column_decimal: record.get_as("column_decimal")?,
            column_float: record.get_as("column_float")?,
            column_int: record.get_as("column_int")?,
            column_nvarchar: record.get_as("column_nvarchar")?,
        })
    }
}

/// A typed row whose record carries no columns.
pub struct Shapeless;

impl Entity for Shapeless {
    fn table_name() -> &'static str {
        "identity_table"
    }

    fn to_record(&self) -> Record {
        Record::new()
    }
}

/// A typed row for a table that does not exist.
pub struct Missing {
    pub column_int: i32,
}

impl Entity for Missing {
    fn table_name() -> &'static str {
        "missing_table"
    }

    fn to_record(&self) -> Record {
        Record::new().with("column_int", self.column_int)
    }
}

fn sample_datetime(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1 + (i % 28) as u32)
        .and_then(|d| d.and_hms_opt(10, (i % 60) as u32, 30))
        .unwrap()
}

/// `count` new rows (id 0) with distinct values in every column.
pub fn sample_rows(count: usize) -> Vec<IdentityTable> {
    (0..count)
        .map(|i| IdentityTable {
            id: 0,
            column_guid: Uuid::new_v4(),
            column_bit: i % 2 == 0,
            column_datetime: Some(sample_datetime(i)),
            column_decimal: Some(Decimal::new(1000 + i as i64, 2)),
            column_float: Some(i as f64 + 0.5),
            column_int: Some(i as i32),
            column_nvarchar: Some(format!("row {i}")),
        })
        .collect()
}

/// `count` new rows as JSON objects, without an `id` key.
pub fn sample_maps(count: usize) -> Vec<Map<String, JsonValue>> {
    (0..count)
        .map(|i| {
            let row = json!({
                "column_guid": Uuid::new_v4().to_string(),
                "column_bit": i % 2 == 0,
                "column_datetime": sample_datetime(i).format("%Y-%m-%d %H:%M:%S").to_string(),
                "column_decimal": format!("{}.25", i),
                "column_float": i as f64 + 0.5,
                "column_int": i,
                "column_nvarchar": format!("dynamic {i}"),
            });
            row.as_object().cloned().unwrap()
        })
        .collect()
}

/// `sample_rows(count)` as a data table named `identity_table`, every row `Added`.
pub fn sample_table(count: usize) -> DataTable {
    let records: Vec<Record> = sample_rows(count)
        .iter()
        .map(|row| {
            let mut record = row.to_record();
            record.set("id", Value::Null);
            record
        })
        .collect();
    DataTable::from_records("identity_table", &records)
}

/// In-memory SQLite database with `identity_table` and `no_key_table`.
pub async fn connect() -> SqliteConnection {
    let mut conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();
    sqlx::query(IDENTITY_TABLE_DDL).execute(&mut conn).await.unwrap();
    sqlx::query(NO_KEY_TABLE_DDL).execute(&mut conn).await.unwrap();
    conn
}

pub async fn fetch_rows(conn: &mut SqliteConnection) -> Vec<IdentityTable> {
    Sqlite::fetch_records(conn, "SELECT * FROM identity_table ORDER BY id", &[])
        .await
        .unwrap()
        .iter()
        .map(|record| IdentityTable::from_record(record).unwrap())
        .collect()
}

pub async fn count_rows(conn: &mut SqliteConnection, table: &str) -> i64 {
    let records = Sqlite::fetch_records(conn, &format!("SELECT COUNT(*) AS n FROM {table}"), &[]).await.unwrap();
    records[0].get_as("n").unwrap()
}

/// Insert `rows` with identity return and hand them back with their generated ids.
pub async fn seed(conn: &mut SqliteConnection, count: usize) -> Vec<IdentityTable> {
    use bulkops::{BulkOperationsExt, BulkOptions};

    let mut rows = sample_rows(count);
    let inserted = conn
        .bulk_insert(&mut rows, &BulkOptions::new().with_return_identity(true))
        .await
        .unwrap();
    assert_eq!(inserted, count as u64);
    rows
}
