use crate::journal::{Event, Journal};
use anyhow::Result;
use async_trait::async_trait;
use flate2::read::GzDecoder;
use frostline_sinks::{ColdStore, ObjectStoreSink, SinkError, SinkResult, UploadReceipt};
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// [`ColdStore`] over `object_store`'s in-memory backend, with upload failure injection.
#[derive(Debug, Clone)]
pub struct RecordingStore {
    sink: ObjectStoreSink,
    journal: Journal,
    failures: Arc<Mutex<u32>>,
    uploaded: Arc<Mutex<Vec<String>>>,
}

impl RecordingStore {
    pub fn new(journal: Journal) -> Self {
        Self {
            sink: ObjectStoreSink::new(Arc::new(InMemory::new()), ObjectPath::default()),
            journal,
            failures: Arc::new(Mutex::new(0)),
            uploaded: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make the next `count` uploads fail without storing anything.
    pub fn fail_next_uploads(&self, count: u32) {
        *lock(&self.failures) = count;
    }

    /// Keys of every stored object, in upload order.
    pub fn object_keys(&self) -> Vec<String> {
        lock(&self.uploaded).clone()
    }

    /// Raw bytes of a stored object.
    pub async fn object_bytes(&self, key: &str) -> Result<Vec<u8>> {
        let bytes = self
            .sink
            .store()
            .get(&ObjectPath::from(key))
            .await?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }

    /// Decompressed text of a stored `.gz` object.
    pub async fn object_text(&self, key: &str) -> Result<String> {
        let bytes = self.object_bytes(key).await?;
        let mut text = String::new();
        GzDecoder::new(bytes.as_slice()).read_to_string(&mut text)?;
        Ok(text)
    }
}

#[async_trait]
impl ColdStore for RecordingStore {
    async fn upload(&self, local: &Path, remote_path: &str) -> SinkResult<UploadReceipt> {
        let fail = {
            let mut failures = lock(&self.failures);
            let fail = *failures > 0;
            *failures = failures.saturating_sub(1);
            fail
        };
        if fail {
            return Err(SinkError::Upload {
                remote_path: remote_path.to_string(),
                source: object_store::Error::Generic {
                    store: "RecordingStore",
                    source: "injected upload failure".into(),
                },
            });
        }

        let local_files = sibling_files(local);
        let receipt = self.sink.upload(local, remote_path).await?;
        lock(&self.uploaded).push(receipt.location.clone());
        self.journal.record(Event::Upload {
            remote_path: remote_path.to_string(),
            local_files,
        });
        Ok(receipt)
    }
}

fn sibling_files(local: &Path) -> Vec<String> {
    let mut names: Vec<String> = local
        .parent()
        .and_then(|dir| std::fs::read_dir(dir).ok())
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
