use frostline_db::{CopyRequest, RowCopier, RowExporter, StagingCatalog};
use frostline_protocol::{ColumnBounds, StagingTarget};
use frostline_test_utils::{row, Event, FailPoint, Journal, MemRow, MemoryWarehouse};

fn orders(count: u32) -> Vec<MemRow> {
    (1..=count)
        .map(|i| row(&[Some(i.to_string().as_str()), Some(if i % 2 == 0 { "eu" } else { "us" })]))
        .collect()
}

fn setup(count: u32) -> (MemoryWarehouse, StagingTarget) {
    let warehouse = MemoryWarehouse::new(Journal::new());
    warehouse.create_live_table("shop", "orders", &["id", "region"]);
    warehouse.insert_live("shop", "orders", orders(count));
    (warehouse, StagingTarget::for_table("shop", "orders"))
}

fn request(where_clause: &str, batch_size: u64) -> CopyRequest<'_> {
    CopyRequest {
        where_clause,
        index_hint: None,
        optimize: false,
        batch_size,
    }
}

#[tokio::test]
async fn create_twice_reports_duplicate_table() {
    let (warehouse, target) = setup(0);
    warehouse.ensure_archive_database(&target).await.unwrap();
    warehouse.create_staging_table(&target).await.unwrap();

    let err = warehouse.create_staging_table(&target).await.unwrap_err();
    assert!(err.is_duplicate_table());
    assert_eq!(
        warehouse
            .journal()
            .count(|e| matches!(e, Event::StagingConflict { .. })),
        1
    );
}

#[tokio::test]
async fn copy_moves_rows_in_batches_and_honors_filter() {
    let (warehouse, target) = setup(2_500);
    warehouse.register_filter("region = 'us'", |table, row| {
        table.value(row, "region") == Some("us")
    });
    warehouse.ensure_archive_database(&target).await.unwrap();
    warehouse.create_staging_table(&target).await.unwrap();

    let report = warehouse
        .copy_rows(&target, &request("region = 'us'", 1_000))
        .await
        .unwrap();
    assert_eq!(report.batches(), &[1_000, 250]);
    assert_eq!(warehouse.staging_rows(&target).unwrap().len(), 1_250);
    assert_eq!(warehouse.live_rows("shop", "orders").len(), 1_250);
    assert_eq!(warehouse.journal().copy_batches("orders"), vec![1_000, 250]);
}

#[tokio::test]
async fn copy_only_mode_leaves_live_rows() {
    let (warehouse, target) = setup(30);
    let warehouse = warehouse.with_delete_from_source(false);
    warehouse.ensure_archive_database(&target).await.unwrap();
    warehouse.create_staging_table(&target).await.unwrap();

    let report = warehouse.copy_rows(&target, &request("1 = 1", 20)).await.unwrap();
    assert_eq!(report.batches(), &[20, 10]);
    assert_eq!(warehouse.live_rows("shop", "orders").len(), 30);
    assert_eq!(warehouse.staging_rows(&target).unwrap().len(), 30);
}

#[tokio::test]
async fn copy_rejects_unsafe_where_clause() {
    let (warehouse, target) = setup(5);
    warehouse.ensure_archive_database(&target).await.unwrap();
    warehouse.create_staging_table(&target).await.unwrap();

    let err = warehouse
        .copy_rows(&target, &request("1 = 1; DROP TABLE orders", 10))
        .await
        .unwrap_err();
    assert!(matches!(err, frostline_db::DbError::UnsafeSql(_)));
    assert_eq!(warehouse.live_rows("shop", "orders").len(), 5);
}

#[tokio::test]
async fn bounds_compare_numerically() {
    let (warehouse, target) = setup(0);
    warehouse.seed_staging(
        &target,
        vec![
            row(&[Some("999"), Some("us")]),
            row(&[Some("1000"), None]),
            row(&[None, Some("eu")]),
        ],
    );
    let bounds = warehouse.log_column_bounds(&target, "id").await.unwrap();
    assert_eq!(bounds, Some(ColumnBounds::new("999", "1000")));
}

#[tokio::test]
async fn export_writes_tsv_and_fail_point_fires_once() {
    let (warehouse, target) = setup(0);
    warehouse.seed_staging(&target, vec![row(&[Some("1"), Some("a\tb")]), row(&[Some("2"), None])]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.tsv");

    warehouse.fail_next(FailPoint::Export);
    assert!(warehouse.export_rows(&target, 1, &path).await.is_err());

    let report = warehouse.export_rows(&target, 1, &path).await.unwrap();
    assert_eq!(report.batches(), &[1, 1]);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "1\ta\\tb\n2\t\\N\n");
}
