//! PostgreSQL backend.
//!
//! Table metadata comes from `pg_catalog`, resolved through `to_regclass` so the connection's
//! `search_path` applies to unqualified names. Serial and `GENERATED ... AS IDENTITY` columns are
//! both reported as identity columns.

use futures::stream::{BoxStream, StreamExt};
use serde_json::Value as JsonValue;
use sqlx::postgres::types::{PgInterval, PgMoney};
use sqlx::postgres::{PgArguments, PgConnection, PgRow, PgTypeKind};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo, ValueRef};
use tracing::trace;

use crate::dialect::{BulkDatabase, Dialect};
use crate::error::Result;
use crate::schema::{TableColumn, TableName, TableSchema};
use crate::value::{Record, Value};

const DESCRIBE_TABLE: &str = r#"
    SELECT
        a.attname::text AS name,
        format_type(a.atttypid, a.atttypmod) AS data_type,
        format_type(a.atttypid, -1) AS cast_type,
        NOT a.attnotnull AS nullable,
        COALESCE(i.indisprimary, false) AS primary_key,
        (a.attidentity <> '' OR COALESCE(pg_get_expr(d.adbin, d.adrelid), '') LIKE 'nextval(%') AS is_identity
    FROM pg_attribute a
    LEFT JOIN pg_index i
        ON i.indrelid = a.attrelid AND i.indisprimary AND a.attnum = ANY(i.indkey)
    LEFT JOIN pg_attrdef d
        ON d.adrelid = a.attrelid AND d.adnum = a.attnum
    WHERE a.attrelid = to_regclass($1)
        AND a.attnum > 0
        AND NOT a.attisdropped
    ORDER BY a.attnum
"#;

fn bind<'q>(query: Query<'q, Postgres, PgArguments>, value: &Value) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int16(i) => query.bind(*i),
        Value::Int32(i) => query.bind(*i),
        Value::Int64(i) => query.bind(*i),
        Value::Float32(f) => query.bind(*f),
        Value::Float64(f) => query.bind(*f),
        Value::Decimal(d) => query.bind(*d),
        Value::Text(s) => query.bind(s.clone()),
        Value::Uuid(u) => query.bind(*u),
        Value::Date(d) => query.bind(*d),
        Value::Time(t) => query.bind(*t),
        Value::DateTime(dt) => query.bind(*dt),
        Value::DateTimeTz(dt) => query.bind(*dt),
        Value::Bytes(b) => query.bind(b.clone()),
        Value::Json(j) => query.bind(j.clone()),
    }
}

fn build<'q>(sql: &'q str, params: &[Value]) -> Query<'q, Postgres, PgArguments> {
    params.iter().fold(sqlx::query(sql), bind)
}

/// ISO 8601 duration, which PostgreSQL accepts back as interval input.
fn interval_text(interval: &PgInterval) -> String {
    let sign = if interval.microseconds < 0 { "-" } else { "" };
    let micros = interval.microseconds.unsigned_abs();
    let (seconds, fraction) = (micros / 1_000_000, micros % 1_000_000);
    if fraction == 0 {
        format!("P{}M{}DT{sign}{seconds}S", interval.months, interval.days)
    } else {
        format!("P{}M{}DT{sign}{seconds}.{fraction:06}S", interval.months, interval.days)
    }
}

/// Arrays of the common element types, as JSON arrays.
fn decode_array(row: &PgRow, i: usize, type_name: &str) -> Result<Option<JsonValue>> {
    let value = match type_name {
        "BOOL[]" => JsonValue::from(row.try_get::<Vec<Option<bool>>, _>(i)?),
        "INT2[]" => JsonValue::from(row.try_get::<Vec<Option<i16>>, _>(i)?),
        "INT4[]" => JsonValue::from(row.try_get::<Vec<Option<i32>>, _>(i)?),
        "INT8[]" => JsonValue::from(row.try_get::<Vec<Option<i64>>, _>(i)?),
        "FLOAT4[]" => JsonValue::from(row.try_get::<Vec<Option<f32>>, _>(i)?),
        "FLOAT8[]" => JsonValue::from(row.try_get::<Vec<Option<f64>>, _>(i)?),
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => JsonValue::from(row.try_get::<Vec<Option<String>>, _>(i)?),
        "UUID[]" => JsonValue::from(
            row.try_get::<Vec<Option<uuid::Uuid>>, _>(i)?
                .into_iter()
                .map(|u| u.map(|u| u.to_string()))
                .collect::<Vec<_>>(),
        ),
        "NUMERIC[]" => JsonValue::from(
            row.try_get::<Vec<Option<rust_decimal::Decimal>>, _>(i)?
                .into_iter()
                .map(|d| d.map(|d| d.to_string()))
                .collect::<Vec<_>>(),
        ),
        "JSONB[]" => JsonValue::from(row.try_get::<Vec<JsonValue>, _>(i)?),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// Types without a dedicated `Value` variant: enums and text-like types decode as text, anything
/// else keeps its raw bytes.
fn decode_fallback(row: &PgRow, i: usize, kind: &PgTypeKind) -> Result<Value> {
    if matches!(kind, PgTypeKind::Enum(_)) {
        return Ok(Value::Text(row.try_get_unchecked(i)?));
    }
    match row.try_get::<String, _>(i) {
        Ok(text) => Ok(Value::Text(text)),
        Err(_) => Ok(Value::Bytes(row.try_get_unchecked(i)?)),
    }
}

fn decode_row(row: &PgRow) -> Result<Record> {
    let mut record = Record::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        if row.try_get_raw(i)?.is_null() {
            record.push(column.name(), Value::Null);
            continue;
        }
        let type_info = column.type_info();
        let value = match type_info.name() {
            "BOOL" => Value::Bool(row.try_get(i)?),
            "INT2" => Value::Int16(row.try_get(i)?),
            "INT4" => Value::Int32(row.try_get(i)?),
            "INT8" => Value::Int64(row.try_get(i)?),
            "FLOAT4" => Value::Float32(row.try_get(i)?),
            "FLOAT8" => Value::Float64(row.try_get(i)?),
            "NUMERIC" => Value::Decimal(row.try_get(i)?),
            "MONEY" => Value::Decimal(row.try_get::<PgMoney, _>(i)?.to_decimal(2)),
            "UUID" => Value::Uuid(row.try_get(i)?),
            "DATE" => Value::Date(row.try_get(i)?),
            "TIME" => Value::Time(row.try_get(i)?),
            "TIMESTAMP" => Value::DateTime(row.try_get(i)?),
            "TIMESTAMPTZ" => Value::DateTimeTz(row.try_get(i)?),
            "INTERVAL" => Value::Text(interval_text(&row.try_get(i)?)),
            "BYTEA" => Value::Bytes(row.try_get(i)?),
            "JSON" | "JSONB" => Value::Json(row.try_get(i)?),
            name => match decode_array(row, i, name)? {
                Some(array) => Value::Json(array),
                None => decode_fallback(row, i, type_info.kind())?,
            },
        };
        record.push(column.name(), value);
    }
    Ok(record)
}

impl BulkDatabase for Postgres {
    const DIALECT: Dialect = Dialect::Postgres;
    const MAX_PARAMETERS: usize = 65535;

    async fn describe_table(conn: &mut PgConnection, table: &TableName) -> Result<TableSchema> {
        let rows = sqlx::query(DESCRIBE_TABLE).bind(table.quoted()).fetch_all(&mut *conn).await?;

        let columns = rows
            .iter()
            .map(|row| -> Result<TableColumn> {
                Ok(TableColumn {
                    name: row.try_get("name")?,
                    data_type: row.try_get("data_type")?,
                    cast_type: row.try_get("cast_type")?,
                    nullable: row.try_get("nullable")?,
                    primary_key: row.try_get("primary_key")?,
                    identity: row.try_get("is_identity")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        trace!(table = %table, columns = columns.len(), "Described table");
        TableSchema::new(table.clone(), columns)
    }

    async fn execute(conn: &mut PgConnection, sql: &str, params: &[Value]) -> Result<u64> {
        let result = build(sql, params).execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    async fn fetch_records(conn: &mut PgConnection, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        let rows = build(sql, params).fetch_all(&mut *conn).await?;
        rows.iter().map(decode_row).collect()
    }

    fn stream_records<'c>(conn: &'c mut PgConnection, sql: &'c str) -> BoxStream<'c, Result<Record>> {
        sqlx::query(sql)
            .fetch(conn)
            .map(|row| -> Result<Record> { decode_row(&row?) })
            .boxed()
    }
}
