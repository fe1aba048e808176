use tracing::debug;

use crate::dialect::BulkDatabase;
use crate::error::Result;
use crate::mapping::{MappedColumn, resolve_qualifiers};
use crate::operations::{Batch, Identity, Outcome, Staging, identities_from_records};
use crate::options::BulkOptions;
use crate::schema::{TableColumn, TableSchema};
use crate::sql;

/// Update rows that match a staged row on the qualifiers and insert the rest.
///
/// Matched identities are read before the update so that a qualifier column being rewritten
/// cannot change which rows are considered matched.
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
    let insert_columns: Vec<&TableColumn> = mapped
        .iter()
        .filter(|m| options.keep_identity || !m.column.identity)
        .map(|m| &m.column)
        .collect();
    let identity = if options.return_identity { schema.identity() } else { None };

    let staging = Staging::load::<DB>(conn, schema, mapped, batch, options).await?;
    let mut outcome = Outcome {
        identity_column: identity.map(|c| c.name.clone()),
        ..Outcome::default()
    };

    let mut unmatched = Vec::new();
    if let Some(identity) = identity {
        let matched = DB::fetch_records(conn, &sql::matched_identities(&schema.name, &staging.name, identity, &qualifiers), &[]).await?;
        outcome.identities = identities_from_records(&matched)?;
        unmatched = DB::fetch_records(conn, &sql::unmatched_orders(&schema.name, &staging.name, &qualifiers), &[])
            .await?
            .iter()
            .map(|record| record.get_as::<i64>(sql::ORDER_COLUMN))
            .collect::<Result<Vec<_>>>()?;
    }

    let updated = if set_columns.is_empty() {
        0
    } else {
        DB::execute(conn, &sql::update_from_staging(&schema.name, &staging.name, &set_columns, &qualifiers), &[]).await?
    };

    let inserted = if insert_columns.is_empty() {
        0
    } else {
        let statement = sql::insert_from_staging(&schema.name, &staging.name, &insert_columns, &qualifiers, identity);
        if identity.is_some() {
            let returned = DB::fetch_identities(conn, &statement, &[]).await?;
            let inserted = returned.len() as u64;
            outcome.identities.extend(
                unmatched
                    .iter()
                    .zip(returned)
                    .map(|(&order, value)| Identity { row: order as usize, value }),
            );
            inserted
        } else {
            DB::execute(conn, &statement, &[]).await?
        }
    };

    staging.remove::<DB>(conn).await?;
    outcome.affected = updated + inserted;
    debug!(table = %schema.name, updated, inserted, "Merged rows");
    Ok(outcome)
}
