//! SQLite backend.
//!
//! SQLite has no native UUID, decimal or timestamp storage, so those values are written as text
//! and read back by storage class; [`crate::value::FromValue`] converts them to typed values
//! again. A single `INTEGER PRIMARY KEY` column aliases the rowid and is treated as the identity.

use futures::stream::{BoxStream, StreamExt};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnection, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};
use tracing::trace;

use crate::dialect::{BulkDatabase, Dialect};
use crate::error::Result;
use crate::schema::{TableColumn, TableName, TableSchema};
use crate::value::{DATE_FORMAT, DATETIME_FORMAT, Record, TIME_FORMAT, Value};

fn bind<'q>(query: Query<'q, Sqlite, SqliteArguments<'q>>, value: &Value) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int16(i) => query.bind(i64::from(*i)),
        Value::Int32(i) => query.bind(i64::from(*i)),
        Value::Int64(i) => query.bind(*i),
        Value::Float32(f) => query.bind(f64::from(*f)),
        Value::Float64(f) => query.bind(*f),
        Value::Decimal(d) => query.bind(d.to_string()),
        Value::Text(s) => query.bind(s.clone()),
        Value::Uuid(u) => query.bind(u.to_string()),
        Value::Date(d) => query.bind(d.format(DATE_FORMAT).to_string()),
        Value::Time(t) => query.bind(t.format(TIME_FORMAT).to_string()),
        Value::DateTime(dt) => query.bind(dt.format(DATETIME_FORMAT).to_string()),
        Value::DateTimeTz(dt) => query.bind(dt.to_rfc3339()),
        Value::Bytes(b) => query.bind(b.clone()),
        Value::Json(j) => query.bind(j.to_string()),
    }
}

fn build<'q>(sql: &'q str, params: &[Value]) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    params.iter().fold(sqlx::query(sql), bind)
}

fn decode_row(row: &SqliteRow) -> Result<Record> {
    let mut record = Record::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            // Storage class of this value, not the declared column type
            match raw.type_info().name() {
                "INTEGER" => Value::Int64(row.try_get(i)?),
                "REAL" => Value::Float64(row.try_get(i)?),
                "BLOB" => Value::Bytes(row.try_get(i)?),
                _ => Value::Text(row.try_get(i)?),
            }
        };
        record.push(column.name(), value);
    }
    Ok(record)
}

impl BulkDatabase for Sqlite {
    const DIALECT: Dialect = Dialect::Sqlite;
    const MAX_PARAMETERS: usize = 32766;

    async fn describe_table(conn: &mut SqliteConnection, table: &TableName) -> Result<TableSchema> {
        let query = match &table.schema {
            Some(schema) => sqlx::query(r#"SELECT name, type, "notnull", pk FROM pragma_table_info(?1, ?2)"#)
                .bind(table.name.clone())
                .bind(schema.clone()),
            None => sqlx::query(r#"SELECT name, type, "notnull", pk FROM pragma_table_info(?1)"#).bind(table.name.clone()),
        };
        let rows = query.fetch_all(&mut *conn).await?;

        let key_count = rows
            .iter()
            .filter(|row| row.try_get::<i64, _>("pk").map(|pk| pk > 0).unwrap_or(false))
            .count();

        let columns = rows
            .iter()
            .map(|row| -> Result<TableColumn> {
                let data_type: String = row.try_get("type")?;
                let primary_key = row.try_get::<i64, _>("pk")? > 0;
                Ok(TableColumn {
                    name: row.try_get("name")?,
                    identity: primary_key && key_count == 1 && data_type.eq_ignore_ascii_case("INTEGER"),
                    cast_type: data_type.clone(),
                    data_type,
                    nullable: row.try_get::<i64, _>("notnull")? == 0,
                    primary_key,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        trace!(table = %table, columns = columns.len(), "Described table");
        TableSchema::new(table.clone(), columns)
    }

    async fn execute(conn: &mut SqliteConnection, sql: &str, params: &[Value]) -> Result<u64> {
        let result = build(sql, params).execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    async fn fetch_records(conn: &mut SqliteConnection, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        let rows = build(sql, params).fetch_all(&mut *conn).await?;
        rows.iter().map(decode_row).collect()
    }

    fn stream_records<'c>(conn: &'c mut SqliteConnection, sql: &'c str) -> BoxStream<'c, Result<Record>> {
        sqlx::query(sql)
            .fetch(conn)
            .map(|row| -> Result<Record> { decode_row(&row?) })
            .boxed()
    }
}
