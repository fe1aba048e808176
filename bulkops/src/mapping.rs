//! Column mapping between a source and a destination table.

use serde::{Deserialize, Serialize};

use crate::error::{BulkError, Result};
use crate::schema::{TableColumn, TableSchema};

/// Maps one source column onto one destination column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source: String,
    pub destination: String,
}

impl ColumnMapping {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

impl std::str::FromStr for ColumnMapping {
    type Err = String;

    /// Parses `source=destination`, or a bare `name` mapping a column onto itself.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (source, destination) = s.split_once('=').unwrap_or((s, s));
        let (source, destination) = (source.trim(), destination.trim());
        if source.is_empty() || destination.is_empty() {
            return Err(format!("invalid column mapping '{s}', expected SOURCE=DESTINATION"));
        }
        Ok(Self::new(source, destination))
    }
}

/// A source column bound to the destination column it is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedColumn {
    pub source: String,
    /// Position of the source column in the source column list.
    pub source_index: usize,
    pub column: TableColumn,
}

/// Resolve which source columns are written to which destination columns.
///
/// Without explicit mappings, source columns are matched to table columns by case-insensitive
/// name and unmatched source columns are ignored. With mappings, every mapping must name an
/// existing source column and an existing destination column.
pub fn resolve_columns(source_columns: &[String], table: &TableSchema, mappings: &[ColumnMapping]) -> Result<Vec<MappedColumn>> {
    let source_index = |name: &str| source_columns.iter().position(|c| c.eq_ignore_ascii_case(name));

    let mapped: Vec<MappedColumn> = if mappings.is_empty() {
        source_columns
            .iter()
            .enumerate()
            .filter_map(|(i, name)| {
                table.column(name).map(|column| MappedColumn {
                    source: name.clone(),
                    source_index: i,
                    column: column.clone(),
                })
            })
            .collect()
    } else {
        let mut mapped = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            let index = source_index(&mapping.source).ok_or_else(|| {
                BulkError::InvalidOperation(format!("mapping source column '{}' does not exist in the source", mapping.source))
            })?;
            let column = table.column(&mapping.destination).ok_or_else(|| {
                BulkError::InvalidOperation(format!(
                    "mapping destination column '{}' does not exist in table '{}'",
                    mapping.destination, table.name
                ))
            })?;
            if mapped.iter().any(|m: &MappedColumn| m.column.name == column.name) {
                return Err(BulkError::InvalidOperation(format!(
                    "destination column '{}' is mapped more than once",
                    column.name
                )));
            }
            mapped.push(MappedColumn {
                source: source_columns[index].clone(),
                source_index: index,
                column: column.clone(),
            });
        }
        mapped
    };

    if mapped.is_empty() {
        return Err(BulkError::missing_fields(
            table.name.to_string(),
            "none of the source columns match a column of the table",
        ));
    }
    Ok(mapped)
}

/// Pick the columns used to match source rows against existing rows.
///
/// Returns indexes into `mapped`. Explicit qualifiers win, then the primary key, then the
/// identity column.
pub fn resolve_qualifiers(mapped: &[MappedColumn], table: &TableSchema, qualifiers: &[String]) -> Result<Vec<usize>> {
    let find = |name: &str| {
        mapped
            .iter()
            .position(|m| m.column.name.eq_ignore_ascii_case(name) || m.source.eq_ignore_ascii_case(name))
    };

    if !qualifiers.is_empty() {
        return qualifiers
            .iter()
            .map(|q| {
                find(q).ok_or_else(|| BulkError::InvalidOperation(format!("qualifier '{q}' is not among the mapped columns")))
            })
            .collect();
    }

    let keys: Vec<&TableColumn> = table.primary_keys().collect();
    let keys = if keys.is_empty() { table.identity().into_iter().collect() } else { keys };
    if keys.is_empty() {
        return Err(BulkError::MissingQualifiers {
            table: table.name.to_string(),
        });
    }

    keys.iter()
        .map(|key| {
            find(&key.name).ok_or_else(|| BulkError::InvalidOperation(format!("key column '{}' is not among the mapped columns", key.name)))
        })
        .collect()
}
