use tracing::debug;

use crate::dialect::BulkDatabase;
use crate::error::{BulkError, Result};
use crate::mapping::{MappedColumn, resolve_qualifiers};
use crate::operations::{Batch, Outcome, Staging, identities_from_records};
use crate::options::BulkOptions;
use crate::schema::{TableColumn, TableSchema};
use crate::sql;

/// Update rows that match a staged row on the qualifiers. Unmatched rows are ignored.
pub(crate) async fn write<DB: BulkDatabase>(
    conn: &mut DB::Connection,
    schema: &TableSchema,
    mapped: &[MappedColumn],
    batch: &Batch,
    options: &BulkOptions,
) -> Result<Outcome> {
    let qualifier_indexes = resolve_qualifiers(mapped, schema, &options.qualifiers)?;
    let qualifiers: Vec<&TableColumn> = qualifier_indexes.iter().map(|&i| &mapped[i].column).collect();
    let set_columns: Vec<&TableColumn> = mapped
        .iter()
        .enumerate()
        .filter(|(i, m)| !qualifier_indexes.contains(i) && !m.column.identity)
        .map(|(_, m)| &m.column)
        .collect();
    if set_columns.is_empty() {
        return Err(BulkError::InvalidOperation(format!(
            "nothing to update in table '{}': every mapped column is a qualifier or the identity",
            schema.name
        )));
    }
    let identity = if options.return_identity { schema.identity() } else { None };

    let staging = Staging::load::<DB>(conn, schema, mapped, batch, options).await?;
    let mut outcome = Outcome {
        identity_column: identity.map(|c| c.name.clone()),
        ..Outcome::default()
    };
    if let Some(identity) = identity {
        let matched = DB::fetch_records(conn, &sql::matched_identities(&schema.name, &staging.name, identity, &qualifiers), &[]).await?;
        outcome.identities = identities_from_records(&matched)?;
    }

    outcome.affected = DB::execute(conn, &sql::update_from_staging(&schema.name, &staging.name, &set_columns, &qualifiers), &[]).await?;
    staging.remove::<DB>(conn).await?;

    debug!(table = %schema.name, updated = outcome.affected, "Updated rows");
    Ok(outcome)
}
