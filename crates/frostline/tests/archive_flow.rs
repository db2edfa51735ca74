//! End-to-end archive cycles against the in-memory collaborators.

use async_trait::async_trait;
use frostline::{ArchiveContext, ArchiveError, Archiver, DrainOutcome, Runner, TracingReporter};
use frostline_db::{DbError, StagingCatalog};
use frostline_protocol::{where_descriptor, ArchiveJob, ColumnBounds, RetryPolicy, StagingTarget};
use frostline_test_utils::{row, Event, FailPoint, Journal, MemRow, MemoryWarehouse, RecordingStore};
use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    journal: Journal,
    warehouse: Arc<MemoryWarehouse>,
    store: Arc<RecordingStore>,
    work: TempDir,
    ctx: ArchiveContext,
}

fn harness() -> Harness {
    let journal = Journal::new();
    let warehouse = Arc::new(MemoryWarehouse::new(journal.clone()));
    warehouse.create_live_table("shop", "orders", &["id", "created_at"]);
    warehouse.register_filter("id > 1000", |table, row| {
        table
            .value(row, "id")
            .and_then(|v| v.parse::<i64>().ok())
            .map_or(false, |id| id > 1000)
    });
    let store = Arc::new(RecordingStore::new(journal.clone()));
    let work = tempfile::tempdir().unwrap();
    let ctx = ArchiveContext::new(warehouse.clone(), store.clone(), "shop")
        .with_work_dir(work.path())
        .with_transaction_size(1_000)
        .with_retry(RetryPolicy::immediate(5));
    Harness {
        journal,
        warehouse,
        store,
        work,
        ctx,
    }
}

fn orders(ids: RangeInclusive<u32>) -> Vec<MemRow> {
    ids.map(|id| row(&[Some(id.to_string().as_str()), Some("2020-01-01 00:00:00")]))
        .collect()
}

fn target() -> StagingTarget {
    StagingTarget::for_table("shop", "orders")
}

fn job() -> ArchiveJob {
    ArchiveJob::new("orders", "id > 1000", "id")
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}

#[tokio::test]
async fn batches_split_at_transaction_size() {
    let h = harness();
    h.warehouse.insert_live("shop", "orders", orders(1_001..=3_500));

    let outcome = Archiver::new(&h.ctx).run_archive(&job()).await.unwrap();

    assert_eq!(outcome.copied.batches(), &[1_000, 1_000, 500]);
    assert_eq!(h.journal.copy_batches("orders"), vec![1_000, 1_000, 500]);
    assert_eq!(outcome.drained.rows(), 2_500);
}

#[tokio::test]
async fn per_job_transaction_size_overrides_default() {
    let h = harness();
    h.warehouse.insert_live("shop", "orders", orders(1_001..=1_025));

    let outcome = Archiver::new(&h.ctx)
        .run_archive(&job().with_transaction_size(10))
        .await
        .unwrap();
    assert_eq!(outcome.copied.batches(), &[10, 10, 5]);
}

#[tokio::test]
async fn archived_object_holds_every_row_and_names_embed_bounds() {
    let h = harness();
    h.warehouse.insert_live("shop", "orders", orders(1..=2_000));

    let outcome = Archiver::new(&h.ctx).run_archive(&job()).await.unwrap();

    let remote_path = match &outcome.drained {
        DrainOutcome::Archived {
            rows, remote_path, ..
        } => {
            assert_eq!(*rows, 1_000);
            remote_path.clone()
        }
        other => panic!("expected an archived drain, got {:?}", other),
    };
    assert!(remote_path.starts_with("shop/orders/orders__"));
    assert!(remote_path.contains(&where_descriptor("id > 1000")));
    assert!(remote_path.ends_with("__id__1001__2000.tsv.gz"));
    assert_eq!(h.store.object_keys(), vec![remote_path.clone()]);

    let text = h.store.object_text(&remote_path).await.unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1_000);
    assert_eq!(lines[0], "1001\t2020-01-01 00:00:00");

    assert_eq!(h.warehouse.live_rows("shop", "orders").len(), 1_000);
    assert!(!h.warehouse.staging_exists(&target()));
    assert!(is_empty_dir(h.work.path()));
}

#[tokio::test]
async fn upload_happens_before_local_cleanup_and_staging_drop() {
    let h = harness();
    h.warehouse.insert_live("shop", "orders", orders(1_001..=1_010));

    Archiver::new(&h.ctx).run_archive(&job()).await.unwrap();

    let events = h.journal.events();
    let (upload, local_files) = events
        .iter()
        .enumerate()
        .find_map(|(i, e)| match e {
            Event::Upload { local_files, .. } => Some((i, local_files.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(local_files.len(), 2);
    assert!(local_files[0].ends_with(".tsv"));
    assert_eq!(local_files[1], format!("{}.gz", local_files[0]));
    assert!(is_empty_dir(h.work.path()));

    let drop = h
        .journal
        .position(|e| matches!(e, Event::DropStaging { .. }))
        .unwrap();
    assert!(upload < drop);
}

#[tokio::test]
async fn equal_bounds_on_a_later_run_never_overwrite_the_earlier_object() {
    let h = harness();
    let job = ArchiveJob::new("orders", "id > 1000", "created_at");
    let archiver = Archiver::new(&h.ctx);

    h.warehouse.insert_live("shop", "orders", orders(1_001..=1_010));
    archiver.run_archive(&job).await.unwrap();
    h.warehouse.insert_live("shop", "orders", orders(1_011..=1_015));
    let second = archiver.run_archive(&job).await.unwrap();

    let keys = h.store.object_keys();
    assert_eq!(keys.len(), 2);
    assert!(keys[0]
        .ends_with("__created_at__2020-01-01_00_00_00__2020-01-01_00_00_00.tsv.gz"));
    let stem = keys[0].trim_end_matches(".tsv.gz");
    assert!(keys[1].starts_with(&format!("{}__", stem)));
    assert!(keys[1].ends_with(".tsv.gz"));
    match &second.drained {
        DrainOutcome::Archived { remote_path, .. } => assert_eq!(remote_path, &keys[1]),
        other => panic!("expected the second run to archive, got {:?}", other),
    }

    assert_eq!(h.store.object_text(&keys[0]).await.unwrap().lines().count(), 10);
    assert_eq!(h.store.object_text(&keys[1]).await.unwrap().lines().count(), 5);
    assert!(h.warehouse.live_rows("shop", "orders").is_empty());
    assert!(is_empty_dir(h.work.path()));
}

#[tokio::test]
async fn zero_rows_short_circuits() {
    let h = harness();
    h.warehouse.insert_live("shop", "orders", orders(1..=50));

    let outcome = Archiver::new(&h.ctx).run_archive(&job()).await.unwrap();

    assert_eq!(outcome.drained, DrainOutcome::Empty);
    assert!(outcome.copied.batches().is_empty());
    assert!(h.store.object_keys().is_empty());
    assert!(!h.warehouse.staging_exists(&target()));
    assert_eq!(h.journal.count(|e| matches!(e, Event::Export { .. })), 0);
    assert!(is_empty_dir(h.work.path()));
}

#[tokio::test]
async fn second_run_without_new_rows_is_a_no_op() {
    let h = harness();
    h.warehouse.insert_live("shop", "orders", orders(1_001..=1_200));
    let archiver = Archiver::new(&h.ctx);

    archiver.run_archive(&job()).await.unwrap();
    let second = archiver.run_archive(&job()).await.unwrap();

    assert_eq!(second.drained, DrainOutcome::Empty);
    assert!(second.recovered.is_empty());
    assert_eq!(h.store.object_keys().len(), 1);
    assert!(!h.warehouse.staging_exists(&target()));
}

#[tokio::test]
async fn failed_upload_keeps_staging_rows_for_retry() {
    let h = harness();
    h.warehouse.insert_live("shop", "orders", orders(1_001..=1_300));
    h.store.fail_next_uploads(1);
    let archiver = Archiver::new(&h.ctx);

    let err = archiver.run_archive(&job()).await.unwrap_err();
    assert!(matches!(err, ArchiveError::Sink(_)));
    assert_eq!(h.warehouse.staging_rows(&target()).unwrap().len(), 300);
    assert_eq!(h.journal.count(|e| matches!(e, Event::DropStaging { .. })), 0);
    assert!(h.store.object_keys().is_empty());
    assert!(is_empty_dir(h.work.path()));

    let retry = archiver.run_archive(&job()).await.unwrap();
    assert_eq!(retry.recovered.len(), 1);
    assert_eq!(retry.recovered[0].rows(), 300);
    assert_eq!(retry.drained, DrainOutcome::Empty);

    let keys = h.store.object_keys();
    assert_eq!(keys, vec!["shop/orders/orders__id__1001__1300.tsv.gz".to_string()]);
    let text = h.store.object_text(&keys[0]).await.unwrap();
    assert_eq!(text.lines().count(), 300);
    assert!(!h.warehouse.staging_exists(&target()));
}

#[tokio::test]
async fn leftover_staging_is_drained_then_fresh_copy_runs() {
    let h = harness();
    h.warehouse.seed_staging(&target(), orders(1..=40));
    h.warehouse.insert_live("shop", "orders", orders(1_001..=1_060));

    let outcome = Archiver::new(&h.ctx).run_archive(&job()).await.unwrap();

    assert_eq!(outcome.cycles, 2);
    assert_eq!(outcome.recovered.len(), 1);
    match &outcome.recovered[0] {
        DrainOutcome::Archived {
            rows, remote_path, ..
        } => {
            assert_eq!(*rows, 40);
            assert_eq!(remote_path, "shop/orders/orders__id__1__40.tsv.gz");
        }
        other => panic!("expected leftover rows to be archived, got {:?}", other),
    }
    match &outcome.drained {
        DrainOutcome::Archived {
            rows, remote_path, ..
        } => {
            assert_eq!(*rows, 60);
            assert!(remote_path.contains(&where_descriptor("id > 1000")));
        }
        other => panic!("expected fresh rows to be archived, got {:?}", other),
    }

    let conflict = h
        .journal
        .position(|e| matches!(e, Event::StagingConflict { .. }))
        .unwrap();
    let created = h
        .journal
        .position(|e| matches!(e, Event::CreateStaging { .. }))
        .unwrap();
    let first_copy = h
        .journal
        .position(|e| matches!(e, Event::CopyBatch { .. }))
        .unwrap();
    assert!(conflict < created && created < first_copy);
    assert_eq!(h.store.object_keys().len(), 2);
}

/// Catalog whose staging table always reappears, as if another process kept recreating it.
struct StuckCatalog(Arc<MemoryWarehouse>);

#[async_trait]
impl StagingCatalog for StuckCatalog {
    async fn ensure_archive_database(&self, target: &StagingTarget) -> frostline_db::Result<()> {
        self.0.ensure_archive_database(target).await
    }

    async fn create_staging_table(&self, target: &StagingTarget) -> frostline_db::Result<()> {
        self.0.seed_staging(target, Vec::new());
        Err(DbError::duplicate_table(
            &target.archive_database,
            &target.archive_table,
        ))
    }

    async fn drop_staging_table(&self, target: &StagingTarget) -> frostline_db::Result<()> {
        self.0.drop_staging_table(target).await
    }

    async fn count_staged_rows(&self, target: &StagingTarget) -> frostline_db::Result<u64> {
        self.0.count_staged_rows(target).await
    }

    async fn log_column_bounds(
        &self,
        target: &StagingTarget,
        column: &str,
    ) -> frostline_db::Result<Option<ColumnBounds>> {
        self.0.log_column_bounds(target, column).await
    }
}

#[tokio::test]
async fn persistent_conflict_hits_cycle_limit() {
    let h = harness();
    let mut ctx = h.ctx.clone().with_retry(RetryPolicy::immediate(3));
    ctx.catalog = Arc::new(StuckCatalog(h.warehouse.clone()));

    let err = Archiver::new(&ctx).run_archive(&job()).await.unwrap_err();

    assert!(matches!(
        err,
        ArchiveError::CycleLimitExceeded { cycles: 3, ref table } if table == "orders"
    ));
    assert_eq!(
        h.journal.count(|e| matches!(e, Event::DropStaging { .. })),
        3
    );
    assert!(h.store.object_keys().is_empty());
}

#[tokio::test]
async fn non_conflict_database_error_is_fatal_without_retry() {
    let h = harness();
    h.warehouse.insert_live("shop", "orders", orders(1_001..=1_010));
    h.warehouse.fail_next(FailPoint::CreateStaging);

    let err = Archiver::new(&h.ctx).run_archive(&job()).await.unwrap_err();

    assert!(matches!(err, ArchiveError::Database(_)));
    assert_eq!(
        h.journal.count(|e| matches!(e, Event::EnsureDatabase { .. })),
        1
    );
    assert_eq!(h.warehouse.live_rows("shop", "orders").len(), 10);
}

#[tokio::test]
async fn runner_validates_before_touching_the_database() {
    let h = harness();
    let runner = Runner::new(h.ctx.clone(), Arc::new(TracingReporter));
    let jobs = vec![job(), ArchiveJob::new("events", "1 = 1", "")];

    let err = runner.run_all(&jobs).await.unwrap_err();

    assert!(matches!(err, ArchiveError::Validation(_)));
    assert!(h.journal.events().is_empty());
}

#[tokio::test]
async fn runner_stops_at_first_failure() {
    let h = harness();
    h.warehouse.create_live_table("shop", "events", &["id"]);
    h.warehouse.insert_live("shop", "orders", orders(1_001..=1_005));
    h.warehouse.fail_next(FailPoint::Export);
    let runner = Runner::new(h.ctx.clone(), Arc::new(TracingReporter));
    let jobs = vec![job(), ArchiveJob::new("events", "1 = 1", "id")];

    assert!(runner.run_all(&jobs).await.is_err());
    assert_eq!(
        h.journal.count(
            |e| matches!(e, Event::CreateStaging { table } if table == "events")
        ),
        0
    );
}

#[tokio::test]
async fn runner_archives_jobs_in_order() {
    let h = harness();
    h.warehouse.create_live_table("shop", "events", &["id"]);
    h.warehouse.insert_live("shop", "orders", orders(1_001..=1_005));
    h.warehouse
        .insert_live("shop", "events", (1..=3).map(|i| row(&[Some(i.to_string().as_str())])));
    let runner = Runner::new(h.ctx.clone(), Arc::new(TracingReporter));

    let summary = runner
        .run_all(&[job(), ArchiveJob::new("events", "1 = 1", "id")])
        .await
        .unwrap();

    let tables: Vec<&str> = summary.outcomes.iter().map(|o| o.table.as_str()).collect();
    assert_eq!(tables, vec!["orders", "events"]);
    assert_eq!(summary.archived_rows(), 8);
}
