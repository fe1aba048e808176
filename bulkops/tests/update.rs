mod common;

use bulkops::{BulkError, BulkOperationsExt, BulkOptions, DataReader, RowState, Value};
use common::{connect, count_rows, fetch_rows, sample_maps, sample_rows, sample_table, seed};
use serde_json::json;

#[test_log::test(tokio::test)]
async fn update_rewrites_matched_rows_only() {
    let mut conn = connect().await;
    let mut rows = seed(&mut conn, 4).await;
    for row in &mut rows {
        row.column_float = Some(99.5);
    }
    let mut unmatched = sample_rows(1);
    unmatched[0].id = 1000;
    rows.extend(unmatched);

    let affected = conn.bulk_update(&mut rows, &BulkOptions::new()).await.unwrap();

    assert_eq!(affected, 4);
    let stored = fetch_rows(&mut conn).await;
    assert_eq!(stored.len(), 4);
    assert!(stored.iter().all(|r| r.column_float == Some(99.5)));
    assert_eq!(stored.as_slice(), &rows[..4]);
}

#[tokio::test]
async fn update_matches_on_qualifiers() {
    let mut conn = connect().await;
    let seeded = seed(&mut conn, 3).await;

    let mut rows = vec![
        serde_json::Map::from_iter([
            ("column_guid".to_string(), json!(seeded[2].column_guid.to_string())),
            ("column_nvarchar".to_string(), json!("by guid")),
        ]),
    ];
    let options = BulkOptions::new().with_qualifiers(["column_guid"]).with_return_identity(true);
    let affected = conn.bulk_update_dynamic("identity_table", &mut rows, &options).await.unwrap();

    assert_eq!(affected, 1);
    assert_eq!(rows[0]["id"], json!(3));
    let stored = fetch_rows(&mut conn).await;
    assert_eq!(stored[2].column_nvarchar.as_deref(), Some("by guid"));
    assert_eq!(stored[0].column_nvarchar, seeded[0].column_nvarchar);
}

#[tokio::test]
async fn update_from_reader() {
    let mut source = connect().await;
    seed(&mut source, 3).await;
    sqlx::query("UPDATE identity_table SET column_int = column_int + 100")
        .execute(&mut source)
        .await
        .unwrap();

    let mut destination = connect().await;
    seed(&mut destination, 5).await;

    let reader = DataReader::query::<sqlx::Sqlite>(&mut source, "SELECT id, column_int FROM identity_table");
    let affected = destination
        .bulk_update_reader("identity_table", reader, &BulkOptions::new())
        .await
        .unwrap();

    assert_eq!(affected, 3);
    let ints: Vec<Option<i32>> = fetch_rows(&mut destination).await.iter().map(|r| r.column_int).collect();
    assert_eq!(ints, vec![Some(100), Some(101), Some(102), Some(3), Some(4)]);
}

#[tokio::test]
async fn update_data_table_rows_in_one_state() {
    let mut conn = connect().await;
    let mut table = sample_table(3);
    conn.bulk_insert_table(None, &mut table, &BulkOptions::new().with_return_identity(true))
        .await
        .unwrap();

    for row in 0..3 {
        table.set_value(row, "column_nvarchar", "changed");
        table.rows[row].state = if row == 1 { RowState::Modified } else { RowState::Unchanged };
    }

    let options = BulkOptions::new().with_row_state(RowState::Modified);
    let affected = conn.bulk_update_table(None, &mut table, &options).await.unwrap();

    assert_eq!(affected, 1);
    let stored = fetch_rows(&mut conn).await;
    assert_eq!(stored[0].column_nvarchar.as_deref(), Some("row 0"));
    assert_eq!(stored[1].column_nvarchar.as_deref(), Some("changed"));
    assert_eq!(table.get(1, "id"), Some(&Value::Int64(2)));
}

#[tokio::test]
async fn update_with_only_key_columns_is_invalid() {
    let mut conn = connect().await;
    seed(&mut conn, 1).await;

    let mut rows = vec![serde_json::Map::from_iter([("id".to_string(), json!(1))])];
    let err = conn
        .bulk_update_dynamic("identity_table", &mut rows, &BulkOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BulkError::InvalidOperation(_)));
}

#[tokio::test]
async fn update_of_unknown_rows_changes_nothing() {
    let mut conn = connect().await;
    seed(&mut conn, 2).await;

    let mut rows = sample_maps(2);
    for (i, row) in rows.iter_mut().enumerate() {
        row.insert("id".into(), json!(500 + i));
    }
    let affected = conn
        .bulk_update_dynamic("identity_table", &mut rows, &BulkOptions::new())
        .await
        .unwrap();

    assert_eq!(affected, 0);
    assert_eq!(count_rows(&mut conn, "identity_table").await, 2);
}
