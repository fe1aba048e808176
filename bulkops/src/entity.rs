use crate::error::Result;
use crate::value::{Record, Value};

/// A typed row that can be bulk-written to its table.
///
/// # Example
/// ```
/// use bulkops::{Entity, Record, Result, Value};
///
/// struct Customer {
///     id: i64,
///     name: String,
/// }
///
/// impl Entity for Customer {
///     fn table_name() -> &'static str {
///         "customer"
///     }
///
///     fn to_record(&self) -> Record {
///         Record::new().with("id", self.id).with("name", self.name.clone())
///     }
///
///     fn set_identity(&mut self, value: &Value) -> Result<()> {
///         self.id = value.get()?;
///         Ok(())
///     }
/// }
/// ```
pub trait Entity {
    /// Destination table, optionally schema-qualified (`"sales.customer"`).
    fn table_name() -> &'static str;

    /// Column values of this row.
    fn to_record(&self) -> Record;

    /// Receives the database-generated identity when identity return is enabled.
    fn set_identity(&mut self, _value: &Value) -> Result<()> {
        Ok(())
    }
}

/// Builds a typed row from a fetched [`Record`].
pub trait FromRecord: Sized {
    fn from_record(record: &Record) -> Result<Self>;
}

impl FromRecord for Record {
    fn from_record(record: &Record) -> Result<Self> {
        Ok(record.clone())
    }
}
