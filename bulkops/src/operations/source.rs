//! Conversions between caller-owned sources and [`Batch`]es, and identity write-back.

use serde_json::{Map, Value as JsonValue};

use crate::entity::Entity;
use crate::error::{BulkError, Result};
use crate::operations::{Batch, Outcome};
use crate::options::BulkOptions;
use crate::table::DataTable;
use crate::value::{Record, Value};

pub(crate) fn from_entities<E: Entity>(entities: &[E]) -> Result<Batch> {
    let records: Vec<Record> = entities.iter().map(Entity::to_record).collect();
    if records.first().is_some_and(Record::is_empty) {
        return Err(BulkError::NullArgument { argument: "entities" });
    }
    Ok(Batch::from_records(records))
}

pub(crate) fn from_maps(maps: &[Map<String, JsonValue>]) -> Result<Batch> {
    if maps.first().is_some_and(Map::is_empty) {
        return Err(BulkError::NullArgument { argument: "entities" });
    }
    Ok(Batch::from_records(maps.iter().map(Record::from_json_map).collect()))
}

/// Rows of `table`, limited to `options.row_state` when set.
pub(crate) fn from_table(table: &DataTable, options: &BulkOptions) -> Result<Batch> {
    if table.columns.is_empty() {
        return Err(BulkError::NullArgument { argument: "table" });
    }
    let mut batch = Batch {
        columns: table.columns.iter().map(|c| c.name.clone()).collect(),
        ..Batch::default()
    };
    for (position, row) in table.rows.iter().enumerate() {
        if options.row_state.is_some_and(|state| state != row.state) {
            continue;
        }
        batch.rows.push(row.values.clone());
        batch.positions.push(position);
    }
    Ok(batch)
}

/// Source column that receives identities: the one mapped onto the identity column, else the
/// identity column's own name as spelled in the source.
fn identity_source(batch: &Batch, identity: &str, options: &BulkOptions) -> String {
    options
        .mappings
        .iter()
        .find(|m| m.destination.eq_ignore_ascii_case(identity))
        .map(|m| m.source.clone())
        .or_else(|| batch.columns.iter().find(|c| c.eq_ignore_ascii_case(identity)).cloned())
        .unwrap_or_else(|| identity.to_string())
}

pub(crate) fn write_back_entities<E: Entity>(entities: &mut [E], batch: &Batch, outcome: &Outcome) -> Result<()> {
    for identity in &outcome.identities {
        if let Some(entity) = batch.positions.get(identity.row).and_then(|&p| entities.get_mut(p)) {
            entity.set_identity(&Value::Int64(identity.value))?;
        }
    }
    Ok(())
}

pub(crate) fn write_back_maps(maps: &mut [Map<String, JsonValue>], batch: &Batch, outcome: &Outcome, options: &BulkOptions) {
    let Some(column) = &outcome.identity_column else {
        return;
    };
    let key = identity_source(batch, column, options);
    for identity in &outcome.identities {
        if let Some(map) = batch.positions.get(identity.row).and_then(|&p| maps.get_mut(p)) {
            map.insert(key.clone(), JsonValue::from(identity.value));
        }
    }
}

pub(crate) fn write_back_table(table: &mut DataTable, batch: &Batch, outcome: &Outcome, options: &BulkOptions) {
    let Some(column) = &outcome.identity_column else {
        return;
    };
    let key = identity_source(batch, column, options);
    if table.column_index(&key).is_none() {
        table.add_column(key.clone());
    }
    for identity in &outcome.identities {
        if let Some(&position) = batch.positions.get(identity.row) {
            table.set_value(position, &key, identity.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::ColumnMapping;
    use crate::operations::Identity;
    use crate::table::RowState;

    fn outcome(identities: &[(usize, i64)]) -> Outcome {
        Outcome {
            affected: identities.len() as u64,
            identities: identities.iter().map(|&(row, value)| Identity { row, value }).collect(),
            identity_column: Some("id".into()),
        }
    }

    #[test]
    fn table_rows_are_filtered_by_state() {
        let mut table = DataTable::new("t");
        table.add_column("id").add_column("name");
        table
            .add_row_with_state(vec![Value::Null, "a".into()], RowState::Added)
            .add_row_with_state(vec![Value::Null, "b".into()], RowState::Unchanged)
            .add_row_with_state(vec![Value::Null, "c".into()], RowState::Added);

        let batch = from_table(&table, &BulkOptions::new().with_row_state(RowState::Added)).unwrap();
        assert_eq!(batch.positions, vec![0, 2]);

        write_back_table(&mut table, &batch, &outcome(&[(0, 10), (1, 11)]), &BulkOptions::new());
        assert_eq!(table.get(0, "id"), Some(&Value::Int64(10)));
        assert_eq!(table.get(1, "id"), Some(&Value::Null));
        assert_eq!(table.get(2, "id"), Some(&Value::Int64(11)));
    }

    #[test]
    fn table_without_columns_is_a_null_argument() {
        let err = from_table(&DataTable::new("t"), &BulkOptions::new()).unwrap_err();
        assert!(matches!(err, BulkError::NullArgument { argument: "table" }));
    }

    #[test]
    fn identities_follow_the_mapped_source_key() {
        let mut maps = vec![Map::new(), Map::new()];
        maps[0].insert("Key".into(), JsonValue::Null);
        maps[1].insert("Key".into(), JsonValue::Null);
        let batch = from_maps(&maps).unwrap();
        let options = BulkOptions::new().with_mappings([ColumnMapping::new("Key", "id")]);

        write_back_maps(&mut maps, &batch, &outcome(&[(1, 7)]), &options);
        assert_eq!(maps[0]["Key"], JsonValue::Null);
        assert_eq!(maps[1]["Key"], JsonValue::from(7));
    }

    #[test]
    fn empty_first_map_is_a_null_argument() {
        let err = from_maps(&[Map::new()]).unwrap_err();
        assert!(matches!(err, BulkError::NullArgument { argument: "entities" }));
        assert!(from_maps(&[]).unwrap().is_empty());
    }
}
