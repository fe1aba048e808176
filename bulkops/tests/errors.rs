mod common;

use bulkops::{BulkError, BulkOperationsExt, BulkOptions, ColumnMapping, DataReader, DataTable, Record};
use common::{Missing, Shapeless, connect, count_rows, sample_maps, sample_rows};
use rstest::rstest;
use serde_json::Map;

#[tokio::test]
async fn entities_without_columns_are_a_null_argument() {
    let mut conn = connect().await;
    let mut rows = vec![Shapeless, Shapeless];

    let err = conn.bulk_insert(&mut rows, &BulkOptions::new()).await.unwrap_err();
    assert!(matches!(err, BulkError::NullArgument { argument: "entities" }));
}

#[tokio::test]
async fn empty_dynamic_row_is_a_null_argument() {
    let mut conn = connect().await;
    let mut rows = vec![Map::new()];

    let err = conn
        .bulk_merge_dynamic("identity_table", &mut rows, &BulkOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BulkError::NullArgument { .. }));
}

#[tokio::test]
async fn reader_without_columns_is_a_null_argument() {
    let mut conn = connect().await;
    let reader = DataReader::from_records(vec![Record::new()]);

    let err = conn
        .bulk_insert_reader("identity_table", reader, &BulkOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BulkError::NullArgument { argument: "reader" }));
}

#[tokio::test]
async fn data_table_without_columns_is_a_null_argument() {
    let mut conn = connect().await;
    let mut table = DataTable::new("identity_table");

    let err = conn.bulk_update_table(None, &mut table, &BulkOptions::new()).await.unwrap_err();
    assert!(matches!(err, BulkError::NullArgument { argument: "table" }));
}

#[rstest]
#[case::unknown_table("missing_table")]
#[case::empty_name("")]
#[tokio::test]
async fn unresolvable_destination_is_missing_fields(#[case] table: &str) {
    let mut conn = connect().await;
    let mut rows = sample_maps(1);

    let err = conn.bulk_insert_dynamic(table, &mut rows, &BulkOptions::new()).await.unwrap_err();
    assert!(matches!(err, BulkError::MissingFields { .. }), "{err:?}");
}

#[tokio::test]
async fn entity_for_missing_table_is_missing_fields() {
    let mut conn = connect().await;
    let mut rows = vec![Missing { column_int: 1 }];

    let err = conn.bulk_merge(&mut rows, &BulkOptions::new()).await.unwrap_err();
    assert!(matches!(err, BulkError::MissingFields { .. }));

    let mut none: Vec<Missing> = Vec::new();
    let err = conn.bulk_insert(&mut none, &BulkOptions::new()).await.unwrap_err();
    assert!(matches!(err, BulkError::MissingFields { .. }));
}

#[tokio::test]
async fn source_matching_no_column_is_missing_fields() {
    let mut conn = connect().await;
    let mut rows = vec![Map::from_iter([("unrelated".to_string(), serde_json::json!(1))])];

    let err = conn
        .bulk_insert_dynamic("identity_table", &mut rows, &BulkOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BulkError::MissingFields { .. }));
}

#[rstest]
#[case::unknown_source(ColumnMapping::new("no_such_source", "column_int"))]
#[case::unknown_destination(ColumnMapping::new("column_int", "no_such_destination"))]
#[tokio::test]
async fn bad_mapping_is_an_invalid_operation(#[case] mapping: ColumnMapping) {
    let mut conn = connect().await;
    let mut rows = sample_rows(2);

    let options = BulkOptions::new().with_mappings([ColumnMapping::new("column_guid", "column_guid"), mapping]);
    let err = conn.bulk_insert(&mut rows, &options).await.unwrap_err();

    assert!(matches!(err, BulkError::InvalidOperation(_)));
    assert_eq!(count_rows(&mut conn, "identity_table").await, 0);
}

#[tokio::test]
async fn unknown_qualifier_is_an_invalid_operation() {
    let mut conn = connect().await;
    let mut rows = sample_rows(1);

    let options = BulkOptions::new().with_qualifiers(["no_such_column"]);
    let err = conn.bulk_merge(&mut rows, &options).await.unwrap_err();
    assert!(matches!(err, BulkError::InvalidOperation(_)));
}
