//! In-memory tabular data.
//!
//! A [`DataTable`] is the tabular source shape: named columns, rows of positional values, and a
//! [`RowState`] per row so callers can write only the rows they added or changed.

use serde::{Deserialize, Serialize};

use crate::value::{Record, Value};

/// Change state of a [`DataRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowState {
    Added,
    Modified,
    Unchanged,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataColumn {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    pub values: Vec<Value>,
    pub state: RowState,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    pub name: String,
    pub columns: Vec<DataColumn>,
    pub rows: Vec<DataRow>,
}

impl DataTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Add a column. Existing rows get a `Null` cell for it.
    pub fn add_column(&mut self, name: impl Into<String>) -> &mut Self {
        self.columns.push(DataColumn { name: name.into() });
        for row in &mut self.rows {
            row.values.push(Value::Null);
        }
        self
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Add a row in the `Added` state.
    pub fn add_row(&mut self, values: Vec<Value>) -> &mut Self {
        self.add_row_with_state(values, RowState::Added)
    }

    /// Add a row; missing trailing cells are padded with `Null`, extra cells are dropped.
    pub fn add_row_with_state(&mut self, mut values: Vec<Value>, state: RowState) -> &mut Self {
        values.resize(self.columns.len(), Value::Null);
        self.rows.push(DataRow { values, state });
        self
    }

    pub fn rows_with_state(&self, state: RowState) -> impl Iterator<Item = &DataRow> {
        self.rows.iter().filter(move |row| row.state == state)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.values.get(index))
    }

    /// Set a cell, returning false when the row or column does not exist.
    pub fn set_value(&mut self, row: usize, column: &str, value: impl Into<Value>) -> bool {
        let Some(index) = self.column_index(column) else {
            return false;
        };
        match self.rows.get_mut(row).and_then(|r| r.values.get_mut(index)) {
            Some(cell) => {
                *cell = value.into();
                true
            }
            None => false,
        }
    }

    pub fn record(&self, row: usize) -> Option<Record> {
        self.rows.get(row).map(|r| {
            self.columns
                .iter()
                .zip(&r.values)
                .map(|(c, v)| (c.name.clone(), v.clone()))
                .collect()
        })
    }

    /// Build a table from records; the first record defines the columns.
    pub fn from_records(name: impl Into<String>, records: &[Record]) -> Self {
        let mut table = DataTable::new(name);
        if let Some(first) = records.first() {
            for column in first.columns() {
                table.add_column(column);
            }
        }
        for record in records {
            let values = table
                .columns
                .iter()
                .map(|c| record.get(&c.name).cloned().unwrap_or(Value::Null))
                .collect();
            table.add_row(values);
        }
        table
    }
}
