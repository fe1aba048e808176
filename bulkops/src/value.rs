//! Scalar cell values and ordered records.
//!
//! Every source shape (typed entities, dynamic maps, readers, data tables) is flattened into
//! [`Record`]s of [`Value`]s before it reaches the database layer. Conversions back to Rust types
//! are deliberately lenient so a row read from SQLite (which stores UUIDs, decimals and
//! timestamps as text) converts to the same typed entity as a row read from PostgreSQL.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Map, Number};
use uuid::Uuid;

use crate::error::{BulkError, Result};

pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Decimal(Decimal),
    Text(String),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeTz(DateTime<Utc>),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in logs and conversion errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::Uuid(_) => "uuid",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::DateTime(_) => "datetime",
            Value::DateTimeTz(_) => "datetimetz",
            Value::Bytes(_) => "bytes",
            Value::Json(_) => "json",
        }
    }

    /// Convert into a Rust type, coercing between compatible representations.
    pub fn get<T: FromValue>(&self) -> Result<T> {
        T::from_value(self)
    }

    /// Build a value from a JSON scalar. Arrays and objects are kept as JSON.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int64(i)
                } else {
                    Value::Float64(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Json(other),
        }
    }

    /// Render the value as JSON, e.g. to write an identity back into a dynamic row.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int16(i) => serde_json::Value::from(*i),
            Value::Int32(i) => serde_json::Value::from(*i),
            Value::Int64(i) => serde_json::Value::from(*i),
            Value::Float32(f) => Number::from_f64(f64::from(*f)).map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Float64(f) => Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Decimal(d) => serde_json::Value::String(d.to_string()),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Uuid(u) => serde_json::Value::String(u.to_string()),
            Value::Date(d) => serde_json::Value::String(d.format(DATE_FORMAT).to_string()),
            Value::Time(t) => serde_json::Value::String(t.format(TIME_FORMAT).to_string()),
            Value::DateTime(dt) => serde_json::Value::String(dt.format(DATETIME_FORMAT).to_string()),
            Value::DateTimeTz(dt) => serde_json::Value::String(dt.to_rfc3339()),
            Value::Bytes(b) => serde_json::Value::Array(b.iter().map(|x| serde_json::Value::from(*x)).collect()),
            Value::Json(j) => j.clone(),
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Int16(i) => Some(i64::from(*i)),
            Value::Int32(i) => Some(i64::from(*i)),
            Value::Int64(i) => Some(*i),
            Value::Float32(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Float64(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from_for_value! {
    bool => Bool,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    Decimal => Decimal,
    String => Text,
    Uuid => Uuid,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    DateTime<Utc> => DateTimeTz,
    Vec<u8> => Bytes,
    serde_json::Value => Json,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Lenient conversion from a [`Value`] into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_i64().ok_or_else(|| BulkError::conversion(value, "i64"))
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .ok_or_else(|| BulkError::conversion(value, "i32"))
    }
}

impl FromValue for i16 {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_i64()
            .and_then(|i| i16::try_from(i).ok())
            .ok_or_else(|| BulkError::conversion(value, "i16"))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float32(f) => Ok(f64::from(*f)),
            Value::Float64(f) => Ok(*f),
            Value::Int16(i) => Ok(f64::from(*i)),
            Value::Int32(i) => Ok(f64::from(*i)),
            Value::Int64(i) => Ok(*i as f64),
            Value::Decimal(d) => d.to_f64().ok_or_else(|| BulkError::conversion(value, "f64")),
            Value::Text(s) => s.trim().parse().map_err(|_| BulkError::conversion(value, "f64")),
            _ => Err(BulkError::conversion(value, "f64")),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float32(f) => Ok(*f),
            other => f64::from_value(other).map(|f| f as f32),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                _ => Err(BulkError::conversion(value, "bool")),
            },
            other => other.as_i64().map(|i| i != 0).ok_or_else(|| BulkError::conversion(value, "bool")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Json(serde_json::Value::String(s)) => Ok(s.clone()),
            _ => Err(BulkError::conversion(value, "String")),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::Text(s) => Uuid::parse_str(s.trim()).map_err(|_| BulkError::conversion(value, "Uuid")),
            Value::Bytes(b) => Uuid::from_slice(b).map_err(|_| BulkError::conversion(value, "Uuid")),
            _ => Err(BulkError::conversion(value, "Uuid")),
        }
    }
}

impl FromValue for Decimal {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Decimal(d) => Ok(*d),
            Value::Int16(i) => Ok(Decimal::from(*i)),
            Value::Int32(i) => Ok(Decimal::from(*i)),
            Value::Int64(i) => Ok(Decimal::from(*i)),
            Value::Float32(f) => Decimal::try_from(*f).map_err(|_| BulkError::conversion(value, "Decimal")),
            Value::Float64(f) => Decimal::try_from(*f).map_err(|_| BulkError::conversion(value, "Decimal")),
            Value::Text(s) => Decimal::from_str(s.trim()).map_err(|_| BulkError::conversion(value, "Decimal")),
            _ => Err(BulkError::conversion(value, "Decimal")),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::DateTime(dt) => Ok(dt.date()),
            Value::DateTimeTz(dt) => Ok(dt.date_naive()),
            Value::Text(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                .or_else(|_| parse_naive_datetime(s).map(|dt| dt.date()))
                .map_err(|_| BulkError::conversion(value, "NaiveDate")),
            _ => Err(BulkError::conversion(value, "NaiveDate")),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Time(t) => Ok(*t),
            Value::Text(s) => NaiveTime::parse_from_str(s.trim(), TIME_FORMAT).map_err(|_| BulkError::conversion(value, "NaiveTime")),
            _ => Err(BulkError::conversion(value, "NaiveTime")),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::DateTimeTz(dt) => Ok(dt.naive_utc()),
            Value::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
            Value::Text(s) => parse_naive_datetime(s).map_err(|_| BulkError::conversion(value, "NaiveDateTime")),
            _ => Err(BulkError::conversion(value, "NaiveDateTime")),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::DateTimeTz(dt) => Ok(*dt),
            Value::DateTime(dt) => Ok(dt.and_utc()),
            Value::Text(s) => DateTime::parse_from_rfc3339(s.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .or_else(|_| parse_naive_datetime(s).map(|dt| dt.and_utc()))
                .map_err(|_| BulkError::conversion(value, "DateTime<Utc>")),
            _ => Err(BulkError::conversion(value, "DateTime<Utc>")),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            _ => Err(BulkError::conversion(value, "Vec<u8>")),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Json(j) => Ok(j.clone()),
            Value::Text(s) => serde_json::from_str(s).map_err(|_| BulkError::conversion(value, "serde_json::Value")),
            other => Ok(other.to_json()),
        }
    }
}

fn parse_naive_datetime(s: &str) -> std::result::Result<NaiveDateTime, chrono::ParseError> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
}

/// An ordered row of named values.
///
/// Column lookups are case-insensitive, matching how SQL identifiers are compared when source
/// columns are mapped onto a table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Append a column. Builder-style so entities can write `Record::new().with("id", self.id)`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.position(name).map(|i| &self.fields[i].1)
    }

    /// Typed lookup; a missing column converts like `Value::Null`.
    pub fn get_as<T: FromValue>(&self, name: &str) -> Result<T> {
        T::from_value(self.get(name).unwrap_or(&Value::Null))
    }

    /// Replace the value of an existing column, or append it.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.position(name) {
            Some(i) => self.fields[i].1 = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn into_parts(self) -> Vec<(String, Value)> {
        self.fields
    }

    /// Build a record from a JSON object. Fields follow the map's iteration order, which is sorted by
    /// key.
    pub fn from_json_map(map: &Map<String, serde_json::Value>) -> Self {
        Self {
            fields: map.iter().map(|(k, v)| (k.clone(), Value::from_json(v.clone()))).collect(),
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
