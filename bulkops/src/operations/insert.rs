use tracing::{debug, trace};

use crate::dialect::BulkDatabase;
use crate::error::{BulkError, Result};
use crate::mapping::MappedColumn;
use crate::operations::{Batch, Identity, Outcome, row_params};
use crate::options::BulkOptions;
use crate::schema::{TableColumn, TableSchema};
use crate::sql;

/// Insert every batch row with multi-row `INSERT ... VALUES` statements.
pub(crate) async fn write<DB: BulkDatabase>(
    conn: &mut DB::Connection,
    schema: &TableSchema,
    mapped: &[MappedColumn],
    batch: &Batch,
    options: &BulkOptions,
) -> Result<Outcome> {
    let columns: Vec<&MappedColumn> = mapped.iter().filter(|m| options.keep_identity || !m.column.identity).collect();
    if columns.is_empty() {
        return Err(BulkError::missing_fields(
            schema.name.to_string(),
            "only the identity column is mapped and identity values are not kept",
        ));
    }
    let table_columns: Vec<&TableColumn> = columns.iter().map(|m| &m.column).collect();
    let identity = if options.return_identity { schema.identity() } else { None };

    let chunk = sql::chunk_size(DB::MAX_PARAMETERS, columns.len(), options.batch_size);
    let mut outcome = Outcome {
        identity_column: identity.map(|c| c.name.clone()),
        ..Outcome::default()
    };

    for (index, rows) in batch.rows.chunks(chunk).enumerate() {
        let offset = index * chunk;
        let statement = sql::insert_values(DB::DIALECT, &schema.name, &table_columns, rows.len(), identity);
        let params = row_params(rows, &columns);
        trace!(rows = rows.len(), params = params.len(), "Inserting chunk");

        if identity.is_some() {
            let returned = DB::fetch_identities(conn, &statement, &params).await?;
            outcome.affected += returned.len() as u64;
            outcome
                .identities
                .extend(returned.into_iter().enumerate().map(|(i, value)| Identity { row: offset + i, value }));
        } else {
            outcome.affected += DB::execute(conn, &statement, &params).await?;
        }
    }

    debug!(table = %schema.name, inserted = outcome.affected, "Inserted rows");
    Ok(outcome)
}
