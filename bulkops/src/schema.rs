//! Destination table names and the column metadata discovered for them.

use std::fmt;

use crate::error::{BulkError, Result};

/// Quote an identifier for PostgreSQL and SQLite, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// A possibly schema-qualified table name.
///
/// Accepts `name`, `schema.name`, `"Quoted"."Names"` and `[bracketed].[names]`. Double-quoted
/// parts keep their case; bare and bracketed parts are folded to lower case, which is how
/// PostgreSQL resolves unquoted identifiers (SQLite compares identifiers case-insensitively
/// either way).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    pub fn parse(raw: &str) -> Result<Self> {
        let parts = split_parts(raw).ok_or_else(|| BulkError::missing_fields(raw, "malformed table name"))?;
        let mut parts = parts.into_iter();
        let (schema, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, None) => (None, name),
            (Some(schema), Some(name), None) => (Some(schema), name),
            _ => return Err(BulkError::missing_fields(raw, "expected [schema.]table")),
        };
        if name.is_empty() || schema.as_deref() == Some("") {
            return Err(BulkError::missing_fields(raw, "table name is empty"));
        }
        Ok(Self { schema, name })
    }

    /// `"schema"."name"`, ready to embed in SQL.
    pub fn quoted(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&self.name)),
            None => quote_ident(&self.name),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

fn split_parts(raw: &str) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut chars = raw.trim().chars().peekable();
    loop {
        let part = match chars.peek() {
            Some('"') => {
                chars.next();
                let mut part = String::new();
                loop {
                    match chars.next()? {
                        '"' if chars.peek() == Some(&'"') => {
                            chars.next();
                            part.push('"');
                        }
                        '"' => break,
                        c => part.push(c),
                    }
                }
                part
            }
            Some('[') => {
                chars.next();
                let mut part = String::new();
                loop {
                    match chars.next()? {
                        ']' => break,
                        c => part.push(c),
                    }
                }
                part.trim().to_lowercase()
            }
            _ => {
                let mut part = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '.' {
                        break;
                    }
                    part.push(c);
                    chars.next();
                }
                part.trim().to_lowercase()
            }
        };
        parts.push(part);
        match chars.next() {
            Some('.') => continue,
            None => return Some(parts),
            Some(_) => return None,
        }
    }
}

/// A destination column as reported by the database catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    /// Catalog type name (`integer`, `uuid`, `numeric(18,2)`, ...).
    pub data_type: String,
    /// `data_type` without its length or precision modifier; placeholders are cast to it on
    /// PostgreSQL so the column itself enforces the modifier.
    pub cast_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    /// Database-generated column (serial/identity on PostgreSQL, rowid alias on SQLite).
    pub identity: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: TableName,
    pub columns: Vec<TableColumn>,
}

impl TableSchema {
    /// Wrap catalog columns; no columns means the table could not be resolved.
    pub fn new(name: TableName, columns: Vec<TableColumn>) -> Result<Self> {
        if columns.is_empty() {
            return Err(BulkError::missing_fields(name.to_string(), "table does not exist or has no columns"));
        }
        Ok(Self { name, columns })
    }

    pub fn column(&self, name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &TableColumn> {
        self.columns.iter().filter(|c| c.primary_key)
    }

    pub fn identity(&self) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_qualified_names() {
        assert_eq!(
            TableName::parse("IdentityTable").unwrap(),
            TableName {
                schema: None,
                name: "identitytable".into()
            }
        );
        assert_eq!(
            TableName::parse("[dbo].[IdentityTable]").unwrap(),
            TableName {
                schema: Some("dbo".into()),
                name: "identitytable".into()
            }
        );
        assert_eq!(
            TableName::parse(r#"public."Mixed""Case""#).unwrap(),
            TableName {
                schema: Some("public".into()),
                name: "Mixed\"Case".into()
            }
        );
    }

    #[test]
    fn quoting_doubles_embedded_quotes() {
        let name = TableName::parse(r#"public."Mixed""Case""#).unwrap();
        assert_eq!(name.quoted(), r#""public"."Mixed""Case""#);
    }

    #[test]
    fn rejects_unresolvable_names() {
        for raw in ["", "   ", "a.b.c", "[unterminated", "\"open", "[a]x", "a."] {
            let err = TableName::parse(raw).unwrap_err();
            assert!(matches!(err, BulkError::MissingFields { .. }), "{raw:?} gave {err:?}");
        }
    }

    #[test]
    fn empty_column_list_means_missing_table() {
        let err = TableSchema::new(TableName::parse("nope").unwrap(), Vec::new()).unwrap_err();
        assert!(matches!(err, BulkError::MissingFields { ref table, .. } if table == "nope"));
    }
}
