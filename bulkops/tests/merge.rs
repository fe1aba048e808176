mod common;

use bulkops::{BulkError, BulkOperationsExt, BulkOptions, DataReader, PseudoTableType, RowState, TableHint, Value};
use common::{connect, count_rows, fetch_rows, sample_maps, sample_rows, seed};
use rstest::rstest;
use serde_json::json;

#[rstest]
#[case::temporary(PseudoTableType::Temporary)]
#[case::physical(PseudoTableType::Physical)]
#[test_log::test(tokio::test)]
async fn merge_updates_existing_rows_and_inserts_new_ones(#[case] pseudo_table: PseudoTableType) {
    let mut conn = connect().await;
    let mut rows = seed(&mut conn, 5).await;

    for row in rows.iter_mut().take(2) {
        row.column_nvarchar = Some("merged".into());
        row.column_int = Some(-1);
    }
    rows.extend(sample_rows(3));

    let options = BulkOptions::new().with_return_identity(true).with_pseudo_table(pseudo_table);
    let affected = conn.bulk_merge(&mut rows, &options).await.unwrap();

    // Every existing row matches on the key, so all five are rewritten
    assert_eq!(affected, 8);
    assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5, 6, 7, 8]);

    let stored = fetch_rows(&mut conn).await;
    assert_eq!(stored, rows);

    let leftovers = count_rows(&mut conn, "sqlite_master WHERE name LIKE '\\_bulkops\\_%' ESCAPE '\\'").await;
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn merge_matches_on_qualifiers() {
    let mut conn = connect().await;
    let seeded = seed(&mut conn, 3).await;

    let mut rows = sample_rows(2);
    rows[0].column_guid = seeded[1].column_guid;
    rows[0].column_nvarchar = Some("by guid".into());

    let options = BulkOptions::new().with_qualifiers(["column_guid"]).with_return_identity(true);
    let affected = conn.bulk_merge(&mut rows, &options).await.unwrap();

    assert_eq!(affected, 2);
    assert_eq!(rows[0].id, seeded[1].id);
    assert_eq!(rows[1].id, 4);

    let stored = fetch_rows(&mut conn).await;
    assert_eq!(stored.len(), 4);
    assert_eq!(stored[1].column_nvarchar.as_deref(), Some("by guid"));
}

#[tokio::test]
async fn merge_dynamic_writes_identities_for_matched_and_inserted_rows() {
    let mut conn = connect().await;
    seed(&mut conn, 2).await;

    let mut rows = sample_maps(3);
    rows[0].insert("id".into(), json!(2));
    rows[1].insert("id".into(), json!(null));
    rows[2].insert("id".into(), json!(null));

    let options = BulkOptions::new().with_return_identity(true);
    let affected = conn.bulk_merge_dynamic("identity_table", &mut rows, &options).await.unwrap();

    assert_eq!(affected, 3);
    assert_eq!(rows[0]["id"], json!(2));
    assert_eq!(rows[1]["id"], json!(3));
    assert_eq!(rows[2]["id"], json!(4));
    assert_eq!(fetch_rows(&mut conn).await[1].column_nvarchar.as_deref(), Some("dynamic 0"));
}

#[tokio::test]
async fn merge_from_reader_upserts_into_destination() {
    let mut source = connect().await;
    seed(&mut source, 6).await;
    sqlx::query("UPDATE identity_table SET column_nvarchar = 'from source'")
        .execute(&mut source)
        .await
        .unwrap();

    let mut destination = connect().await;
    seed(&mut destination, 4).await;

    let reader = DataReader::query::<sqlx::Sqlite>(&mut source, "SELECT * FROM identity_table ORDER BY id");
    let options = BulkOptions::new().with_batch_size(4).with_keep_identity(true);
    let affected = destination.bulk_merge_reader("identity_table", reader, &options).await.unwrap();

    assert_eq!(affected, 6);
    let stored = fetch_rows(&mut destination).await;
    assert_eq!(stored.len(), 6);
    assert!(stored.iter().all(|r| r.column_nvarchar.as_deref() == Some("from source")));
}

#[tokio::test]
async fn merge_data_table_respects_row_state() {
    let mut conn = connect().await;
    let seeded = seed(&mut conn, 2).await;

    let mut table = bulkops::DataTable::new("identity_table");
    table.add_column("id").add_column("column_guid").add_column("column_bit").add_column("column_int");
    table
        .add_row_with_state(vec![Value::Int64(1), seeded[0].column_guid.into(), true.into(), 41i64.into()], RowState::Modified)
        .add_row_with_state(vec![Value::Int64(2), seeded[1].column_guid.into(), true.into(), 42i64.into()], RowState::Unchanged)
        .add_row_with_state(vec![Value::Null, uuid::Uuid::new_v4().into(), false.into(), 43i64.into()], RowState::Modified);

    let options = BulkOptions::new().with_row_state(RowState::Modified).with_return_identity(true);
    let affected = conn.bulk_merge_table(None, &mut table, &options).await.unwrap();

    assert_eq!(affected, 2);
    assert_eq!(table.get(2, "id"), Some(&Value::Int64(3)));

    let ints: Vec<Option<i32>> = fetch_rows(&mut conn).await.iter().map(|r| r.column_int).collect();
    assert_eq!(ints, vec![Some(41), seeded[1].column_int, Some(43)]);
}

#[tokio::test]
async fn merge_with_table_hint_on_sqlite() {
    let mut conn = connect().await;
    let mut rows = sample_rows(3);

    let options = BulkOptions::new().with_hints(TableHint::TableLock);
    assert_eq!(conn.bulk_merge(&mut rows, &options).await.unwrap(), 3);
}

#[tokio::test]
async fn merge_without_any_key_needs_qualifiers() {
    let mut conn = connect().await;
    let mut rows = vec![
        serde_json::Map::from_iter([("column_int".to_string(), json!(1)), ("column_nvarchar".to_string(), json!("a"))]),
    ];

    let err = conn
        .bulk_merge_dynamic("no_key_table", &mut rows, &BulkOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BulkError::MissingQualifiers { .. }));

    let options = BulkOptions::new().with_qualifiers(["column_int"]);
    assert_eq!(conn.bulk_merge_dynamic("no_key_table", &mut rows, &options).await.unwrap(), 1);
    assert_eq!(conn.bulk_merge_dynamic("no_key_table", &mut rows, &options).await.unwrap(), 1);
    assert_eq!(count_rows(&mut conn, "no_key_table").await, 1);
}

#[tokio::test]
async fn merge_keeps_source_identities_for_inserted_rows() {
    let mut conn = connect().await;
    let mut rows = seed(&mut conn, 2).await;

    rows[1].column_nvarchar = Some("merged".into());
    let mut new_rows = sample_rows(2);
    new_rows[0].id = 50;
    new_rows[1].id = 51;
    rows.extend(new_rows);

    let affected = conn.bulk_merge(&mut rows, &BulkOptions::new().with_keep_identity(true)).await.unwrap();
    assert_eq!(affected, 4);
    assert_eq!(fetch_rows(&mut conn).await, rows);

    let mut generated = sample_rows(1);
    conn.bulk_insert(&mut generated, &BulkOptions::new().with_return_identity(true))
        .await
        .unwrap();
    assert_eq!(generated[0].id, 52);
}

