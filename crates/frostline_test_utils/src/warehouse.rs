//! In-memory staging catalog, copier, and exporter.
//!
//! Tables are plain vectors of text rows. Where clauses cannot be evaluated without SQL, so a
//! clause selects every row unless a Rust filter has been registered for it with
//! [`MemoryWarehouse::register_filter`].

use crate::journal::{Event, Journal};
use async_trait::async_trait;
use frostline_db::{
    run_batches, tsv, validate_predicate, BatchReport, BatchStep, CopyRequest, DbError, Result,
    RowCopier, RowExporter, StagingCatalog,
};
use frostline_protocol::{ColumnBounds, StagingTarget};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// One row; `None` is SQL NULL.
pub type MemRow = Vec<Option<String>>;

type Filter = Arc<dyn Fn(&MemTable, &MemRow) -> bool + Send + Sync>;
type TableKey = (String, String);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemTable {
    pub columns: Vec<String>,
    pub rows: Vec<MemRow>,
}

impl MemTable {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value of `column` in `row`, if both exist and the value is not NULL.
    pub fn value<'r>(&self, row: &'r MemRow, column: &str) -> Option<&'r str> {
        self.column_index(column)
            .and_then(|idx| row.get(idx))
            .and_then(|v| v.as_deref())
    }
}

/// Operations that can be made to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    EnsureDatabase,
    CreateStaging,
    CopyRows,
    CountStaged,
    Export,
    DropStaging,
}

#[derive(Default)]
struct State {
    live: BTreeMap<TableKey, MemTable>,
    archive_databases: BTreeSet<String>,
    staging: BTreeMap<TableKey, MemTable>,
    filters: HashMap<String, Filter>,
    armed: HashMap<FailPoint, u32>,
}

/// In-memory [`StagingCatalog`] + [`RowCopier`] + [`RowExporter`].
#[derive(Clone)]
pub struct MemoryWarehouse {
    state: Arc<Mutex<State>>,
    journal: Journal,
    delete_from_source: bool,
}

impl std::fmt::Debug for MemoryWarehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryWarehouse")
            .field("delete_from_source", &self.delete_from_source)
            .finish()
    }
}

impl MemoryWarehouse {
    pub fn new(journal: Journal) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            journal,
            delete_from_source: true,
        }
    }

    /// Copy-only mode: rows stay in the live table after they are staged.
    pub fn with_delete_from_source(mut self, delete: bool) -> Self {
        self.delete_from_source = delete;
        self
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn create_live_table(&self, database: &str, table: &str, columns: &[&str]) {
        self.lock()
            .live
            .insert(key(database, table), MemTable::new(columns));
    }

    /// Append rows to a live table created with [`create_live_table`](Self::create_live_table).
    pub fn insert_live(&self, database: &str, table: &str, rows: impl IntoIterator<Item = MemRow>) {
        let mut state = self.lock();
        let live = state
            .live
            .entry(key(database, table))
            .or_insert_with(MemTable::default);
        live.rows.extend(rows);
    }

    /// Leave a populated staging table behind, as an interrupted cycle would.
    pub fn seed_staging(&self, target: &StagingTarget, rows: impl IntoIterator<Item = MemRow>) {
        let mut state = self.lock();
        let columns = state
            .live
            .get(&key(&target.live_database, &target.table))
            .map(|t| t.columns.clone())
            .unwrap_or_default();
        state.archive_databases.insert(target.archive_database.clone());
        let staging = state
            .staging
            .entry(staging_key(target))
            .or_insert_with(|| MemTable {
                columns,
                rows: Vec::new(),
            });
        staging.rows.extend(rows);
    }

    /// Restrict `where_clause` to rows for which `filter` returns true.
    pub fn register_filter<F>(&self, where_clause: &str, filter: F)
    where
        F: Fn(&MemTable, &MemRow) -> bool + Send + Sync + 'static,
    {
        self.lock()
            .filters
            .insert(where_clause.trim().to_string(), Arc::new(filter));
    }

    /// Make the next call through `point` fail with a non-conflict database error.
    pub fn fail_next(&self, point: FailPoint) {
        *self.lock().armed.entry(point).or_insert(0) += 1;
    }

    pub fn live_rows(&self, database: &str, table: &str) -> Vec<MemRow> {
        self.lock()
            .live
            .get(&key(database, table))
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Staged rows, or `None` when the staging table does not exist.
    pub fn staging_rows(&self, target: &StagingTarget) -> Option<Vec<MemRow>> {
        self.lock()
            .staging
            .get(&staging_key(target))
            .map(|t| t.rows.clone())
    }

    pub fn staging_exists(&self, target: &StagingTarget) -> bool {
        self.lock().staging.contains_key(&staging_key(target))
    }

    pub fn archive_database_exists(&self, database: &str) -> bool {
        self.lock().archive_databases.contains(database)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn trip(&self, point: FailPoint) -> Result<()> {
        let mut state = self.lock();
        match state.armed.get_mut(&point) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(DbError::invalid_state(format!("injected failure at {:?}", point)))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl StagingCatalog for MemoryWarehouse {
    async fn ensure_archive_database(&self, target: &StagingTarget) -> Result<()> {
        self.trip(FailPoint::EnsureDatabase)?;
        self.lock()
            .archive_databases
            .insert(target.archive_database.clone());
        self.journal.record(Event::EnsureDatabase {
            database: target.archive_database.clone(),
        });
        Ok(())
    }

    async fn create_staging_table(&self, target: &StagingTarget) -> Result<()> {
        self.trip(FailPoint::CreateStaging)?;
        let mut state = self.lock();
        if !state.archive_databases.contains(&target.archive_database) {
            return Err(DbError::not_found(format!(
                "database {}",
                target.archive_database
            )));
        }
        if state.staging.contains_key(&staging_key(target)) {
            self.journal.record(Event::StagingConflict {
                table: target.table.clone(),
            });
            return Err(DbError::duplicate_table(
                &target.archive_database,
                &target.archive_table,
            ));
        }
        let columns = state
            .live
            .get(&key(&target.live_database, &target.table))
            .map(|t| t.columns.clone())
            .ok_or_else(|| DbError::not_found(format!("table {}", target.live_qualified())))?;
        state.staging.insert(
            staging_key(target),
            MemTable {
                columns,
                rows: Vec::new(),
            },
        );
        self.journal.record(Event::CreateStaging {
            table: target.table.clone(),
        });
        Ok(())
    }

    async fn drop_staging_table(&self, target: &StagingTarget) -> Result<()> {
        self.trip(FailPoint::DropStaging)?;
        self.lock().staging.remove(&staging_key(target));
        self.journal.record(Event::DropStaging {
            table: target.table.clone(),
        });
        Ok(())
    }

    async fn count_staged_rows(&self, target: &StagingTarget) -> Result<u64> {
        self.trip(FailPoint::CountStaged)?;
        self.lock()
            .staging
            .get(&staging_key(target))
            .map(|t| t.rows.len() as u64)
            .ok_or_else(|| DbError::not_found(format!("table {}", target.staging_qualified())))
    }

    async fn log_column_bounds(
        &self,
        target: &StagingTarget,
        column: &str,
    ) -> Result<Option<ColumnBounds>> {
        let state = self.lock();
        let staging = state
            .staging
            .get(&staging_key(target))
            .ok_or_else(|| DbError::not_found(format!("table {}", target.staging_qualified())))?;
        let idx = staging.column_index(column).ok_or_else(|| {
            DbError::not_found(format!("column {} in {}", column, target.staging_qualified()))
        })?;

        let mut values = staging.rows.iter().filter_map(|row| row[idx].as_deref());
        let first = match values.next() {
            Some(v) => v,
            None => return Ok(None),
        };
        let (min, max) = values.fold((first, first), |(min, max), v| {
            (
                if compare_values(v, min) == Ordering::Less { v } else { min },
                if compare_values(v, max) == Ordering::Greater { v } else { max },
            )
        });
        Ok(Some(ColumnBounds::new(min, max)))
    }
}

#[async_trait]
impl RowCopier for MemoryWarehouse {
    async fn copy_rows(
        &self,
        target: &StagingTarget,
        request: &CopyRequest<'_>,
    ) -> Result<BatchReport> {
        validate_predicate(request.where_clause)?;
        self.trip(FailPoint::CopyRows)?;

        let filter = self
            .lock()
            .filters
            .get(request.where_clause.trim())
            .cloned();
        let mut step = MemCopyStep {
            warehouse: self,
            target,
            filter,
            cursor: 0,
        };
        run_batches(&mut step, request.batch_size, &target.table).await
    }
}

struct MemCopyStep<'a> {
    warehouse: &'a MemoryWarehouse,
    target: &'a StagingTarget,
    filter: Option<Filter>,
    /// Next live row to examine in copy-only mode.
    cursor: usize,
}

#[async_trait]
impl BatchStep for MemCopyStep<'_> {
    async fn next_batch(&mut self, limit: u64) -> Result<u64> {
        let mut state = self.warehouse.lock();
        let live_key = key(&self.target.live_database, &self.target.table);
        let live = state
            .live
            .get(&live_key)
            .ok_or_else(|| DbError::not_found(format!("table {}", self.target.live_qualified())))?;

        let mut picked = Vec::new();
        for (idx, row) in live.rows.iter().enumerate().skip(self.cursor) {
            if picked.len() as u64 == limit {
                break;
            }
            if self.filter.as_ref().map_or(true, |f| f(live, row)) {
                picked.push(idx);
            }
        }
        let rows: Vec<MemRow> = picked.iter().map(|&i| live.rows[i].clone()).collect();

        let staging = state
            .staging
            .get_mut(&staging_key(self.target))
            .ok_or_else(|| {
                DbError::not_found(format!("table {}", self.target.staging_qualified()))
            })?;
        staging.rows.extend(rows);

        if self.warehouse.delete_from_source {
            if let Some(live) = state.live.get_mut(&live_key) {
                for &idx in picked.iter().rev() {
                    live.rows.remove(idx);
                }
            }
        } else if let Some(&last) = picked.last() {
            self.cursor = last + 1;
        }

        let moved = picked.len() as u64;
        if moved > 0 {
            self.warehouse.journal.record(Event::CopyBatch {
                table: self.target.table.clone(),
                rows: moved,
            });
        }
        Ok(moved)
    }
}

#[async_trait]
impl RowExporter for MemoryWarehouse {
    async fn export_rows(
        &self,
        target: &StagingTarget,
        batch_size: u64,
        path: &Path,
    ) -> Result<BatchReport> {
        self.trip(FailPoint::Export)?;
        let rows = self
            .staging_rows(target)
            .ok_or_else(|| DbError::not_found(format!("table {}", target.staging_qualified())))?;

        let mut step = MemExportStep {
            rows,
            offset: 0,
            out: BufWriter::new(File::create(path)?),
        };
        let report = run_batches(&mut step, batch_size, &target.archive_table).await?;
        step.out.flush()?;

        self.journal.record(Event::Export {
            table: target.table.clone(),
            rows: report.total_rows(),
        });
        Ok(report)
    }
}

struct MemExportStep {
    rows: Vec<MemRow>,
    offset: usize,
    out: BufWriter<File>,
}

#[async_trait]
impl BatchStep for MemExportStep {
    async fn next_batch(&mut self, limit: u64) -> Result<u64> {
        let end = (self.offset + limit as usize).min(self.rows.len());
        for row in &self.rows[self.offset..end] {
            tsv::write_row(&mut self.out, row)?;
        }
        let moved = (end - self.offset) as u64;
        self.offset = end;
        Ok(moved)
    }
}

/// Numeric comparison when both sides parse as integers, text comparison otherwise.
pub fn compare_values(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Build a row from string literals.
pub fn row(values: &[Option<&str>]) -> MemRow {
    values.iter().map(|v| v.map(str::to_string)).collect()
}

fn key(database: &str, table: &str) -> TableKey {
    (database.to_string(), table.to_string())
}

fn staging_key(target: &StagingTarget) -> TableKey {
    key(&target.archive_database, &target.archive_table)
}
