use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::BulkConfig;
use crate::mapping::ColumnMapping;
use crate::table::RowState;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Where merge and update stage their rows before touching the destination table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PseudoTableType {
    /// Session-scoped temporary table.
    #[default]
    Temporary,
    /// Regular table with a unique name, dropped when the operation finishes.
    Physical,
}

/// Lock taken on the destination table for the duration of the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableHint {
    /// Blocks concurrent writers but not readers.
    TableLock,
    /// Blocks concurrent writers and `SELECT ... FOR UPDATE`.
    Exclusive,
    /// Blocks everything, including plain reads.
    AccessExclusive,
}

impl TableHint {
    /// PostgreSQL lock mode for `LOCK TABLE ... IN <mode> MODE`.
    pub fn lock_mode(self) -> &'static str {
        match self {
            TableHint::TableLock => "SHARE ROW EXCLUSIVE",
            TableHint::Exclusive => "EXCLUSIVE",
            TableHint::AccessExclusive => "ACCESS EXCLUSIVE",
        }
    }
}

/// Options shared by insert, merge and update.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOptions {
    /// Explicit source-to-destination column mappings. Empty means match by name.
    pub mappings: Vec<ColumnMapping>,
    /// Columns used to match rows on merge and update. Empty means the primary key.
    pub qualifiers: Vec<String>,
    pub hints: Option<TableHint>,
    /// Write database-generated identities back into the source rows.
    pub return_identity: bool,
    /// Write source values into the identity column instead of letting the database generate them.
    pub keep_identity: bool,
    /// Maximum rows per statement.
    pub batch_size: usize,
    pub pseudo_table: PseudoTableType,
    /// Only write data-table rows in this state.
    pub row_state: Option<RowState>,
    pub timeout: Option<Duration>,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            mappings: Vec::new(),
            qualifiers: Vec::new(),
            hints: None,
            return_identity: false,
            keep_identity: false,
            batch_size: DEFAULT_BATCH_SIZE,
            pseudo_table: PseudoTableType::default(),
            row_state: None,
            timeout: None,
        }
    }
}

impl BulkOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from configured defaults.
    pub fn from_config(config: &BulkConfig) -> Self {
        Self {
            return_identity: config.return_identity,
            batch_size: config.batch_size.max(1),
            pseudo_table: config.pseudo_table,
            timeout: config.timeout,
            ..Self::default()
        }
    }

    pub fn with_mappings(mut self, mappings: impl IntoIterator<Item = ColumnMapping>) -> Self {
        self.mappings = mappings.into_iter().collect();
        self
    }

    pub fn with_qualifiers<S: Into<String>>(mut self, qualifiers: impl IntoIterator<Item = S>) -> Self {
        self.qualifiers = qualifiers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_hints(mut self, hints: TableHint) -> Self {
        self.hints = Some(hints);
        self
    }

    pub fn with_return_identity(mut self, return_identity: bool) -> Self {
        self.return_identity = return_identity;
        self
    }

    pub fn with_keep_identity(mut self, keep_identity: bool) -> Self {
        self.keep_identity = keep_identity;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_pseudo_table(mut self, pseudo_table: PseudoTableType) -> Self {
        self.pseudo_table = pseudo_table;
        self
    }

    pub fn with_row_state(mut self, row_state: RowState) -> Self {
        self.row_state = Some(row_state);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
