use std::time::Duration;

use thiserror::Error;

/// Result type for bulk operations.
pub type Result<T> = std::result::Result<T, BulkError>;

/// Errors that can occur while running a bulk operation.
#[derive(Debug, Error)]
pub enum BulkError {
    /// The operation cannot be carried out with the given mappings, qualifiers or columns.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A required source was missing or carried no column schema at all.
    #[error("Argument '{argument}' is null or has no columns")]
    NullArgument { argument: &'static str },

    /// The destination table could not be resolved, or none of its fields match the source.
    #[error("Missing fields for table '{table}': {message}")]
    MissingFields { table: String, message: String },

    /// Merge or update was requested but no column could be used to match rows.
    #[error("No qualifiers, primary key or identity column found for table '{table}'")]
    MissingQualifiers { table: String },

    /// The operation did not complete in time and was rolled back.
    #[error("Bulk operation timed out after {0:?}")]
    Timeout(Duration),

    /// A value could not be converted to the requested type.
    #[error("Cannot convert {value} to {target}")]
    Conversion { value: String, target: &'static str },

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl BulkError {
    pub(crate) fn missing_fields(table: impl Into<String>, message: impl Into<String>) -> Self {
        BulkError::MissingFields {
            table: table.into(),
            message: message.into(),
        }
    }

    pub(crate) fn conversion(value: impl std::fmt::Debug, target: &'static str) -> Self {
        BulkError::Conversion {
            value: format!("{value:?}"),
            target,
        }
    }
}
