//! Ordered record of collaborator calls, shared by the in-memory fakes.

use std::sync::{Arc, Mutex, MutexGuard};

/// One observable side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    EnsureDatabase { database: String },
    CreateStaging { table: String },
    /// `create_staging_table` hit an existing table.
    StagingConflict { table: String },
    CopyBatch { table: String, rows: u64 },
    Export { table: String, rows: u64 },
    /// `local_files`: names in the uploaded file's directory at the time of the call, sorted.
    Upload {
        remote_path: String,
        local_files: Vec<String>,
    },
    DropStaging { table: String },
}

/// Shared, append-only event log.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: Event) {
        self.lock().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// Index of the first event matching `pred`.
    pub fn position(&self, pred: impl Fn(&Event) -> bool) -> Option<usize> {
        self.lock().iter().position(pred)
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.lock().iter().filter(|e| pred(e)).count()
    }

    /// Row counts of every `CopyBatch` for `table`, in order.
    pub fn copy_batches(&self, table: &str) -> Vec<u64> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                Event::CopyBatch { table: t, rows } if t == table => Some(*rows),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
