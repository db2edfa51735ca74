//! Cold storage upload over `object_store`.
//!
//! The configured URL selects the backend (`s3://`, `gs://`, `az://`, `file://`, `memory:///`) and
//! its path becomes a key prefix, so `s3://bucket/mysql` plus `shop/orders/x.tsv.gz` stores
//! `mysql/shop/orders/x.tsv.gz` in `bucket`.

use crate::error::{SinkError, SinkResult};
use async_trait::async_trait;
use bytes::Bytes;
use frostline_protocol::StorageConfig;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, WriteMultipart};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};
use url::Url;

/// Bytes read from disk per multipart chunk.
const CHUNK_SIZE: usize = 8 * 1024 * 1024;
/// In-flight part uploads before reading more of the file.
const MAX_CONCURRENT_PARTS: usize = 4;

/// Confirmation that an object was durably stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Full object key, including the store prefix.
    pub location: String,
    pub bytes: u64,
    pub e_tag: Option<String>,
}

/// Destination for compressed extracts.
#[async_trait]
pub trait ColdStore: Send + Sync {
    /// Upload the file at `local` to `remote_path`. Returns only once the object is stored.
    ///
    /// Fails with [`SinkError::AlreadyExists`] rather than replace an existing object.
    async fn upload(&self, local: &Path, remote_path: &str) -> SinkResult<UploadReceipt>;
}

/// [`ColdStore`] backed by any `object_store` implementation.
#[derive(Debug, Clone)]
pub struct ObjectStoreSink {
    store: Arc<dyn ObjectStore>,
    prefix: ObjectPath,
}

impl ObjectStoreSink {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: ObjectPath) -> Self {
        Self { store, prefix }
    }

    /// Build from the `[storage]` section.
    pub fn from_config(config: &StorageConfig) -> SinkResult<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| SinkError::invalid_location(format!("{}: {}", config.url, e)))?;

        let (store, prefix) = object_store::parse_url_opts(&url, config.options.iter())
            .map_err(|e| SinkError::invalid_location(format!("{}: {}", config.url, e)))?;
        info!(scheme = url.scheme(), prefix = %prefix, "Cold store configured");
        Ok(Self::new(Arc::from(store), prefix))
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    /// Object key for `remote_path` under this sink's prefix.
    pub fn object_path(&self, remote_path: &str) -> SinkResult<ObjectPath> {
        let relative = ObjectPath::parse(remote_path)
            .map_err(|e| SinkError::invalid_location(format!("{}: {}", remote_path, e)))?;
        Ok(self.prefix.parts().chain(relative.parts()).collect())
    }
}

#[async_trait]
impl ColdStore for ObjectStoreSink {
    async fn upload(&self, local: &Path, remote_path: &str) -> SinkResult<UploadReceipt> {
        let location = self.object_path(remote_path)?;

        match self.store.head(&location).await {
            Ok(_) => {
                return Err(SinkError::AlreadyExists {
                    remote_path: location.to_string(),
                })
            }
            Err(object_store::Error::NotFound { .. }) => {}
            Err(e) => return Err(SinkError::upload(location.as_ref(), e)),
        }

        let mut file = tokio::fs::File::open(local)
            .await
            .map_err(|e| SinkError::io("open", local, e))?;

        let upload = self
            .store
            .put_multipart(&location)
            .await
            .map_err(|e| SinkError::upload(location.as_ref(), e))?;
        let mut writer = WriteMultipart::new_with_chunk_size(upload, CHUNK_SIZE);

        let mut total: u64 = 0;
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let read = match file.read(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    abort(writer, &location).await;
                    return Err(SinkError::io("read", local, e));
                }
            };
            if read == 0 {
                break;
            }
            if let Err(e) = writer.wait_for_capacity(MAX_CONCURRENT_PARTS).await {
                abort(writer, &location).await;
                return Err(SinkError::upload(location.as_ref(), e));
            }
            writer.put(Bytes::copy_from_slice(&buf[..read]));
            total += read as u64;
        }

        let result = writer
            .finish()
            .await
            .map_err(|e| SinkError::upload(location.as_ref(), e))?;

        info!(
            location = %location,
            bytes = total,
            "Upload confirmed"
        );
        Ok(UploadReceipt {
            location: location.to_string(),
            bytes: total,
            e_tag: result.e_tag,
        })
    }
}

async fn abort(writer: WriteMultipart, location: &ObjectPath) {
    if let Err(e) = writer.abort().await {
        warn!(location = %location, error = %e, "Failed to abort multipart upload");
    } else {
        debug!(location = %location, "Multipart upload aborted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use std::collections::BTreeMap;

    fn storage(url: &str) -> StorageConfig {
        StorageConfig {
            url: url.to_string(),
            options: BTreeMap::new(),
            work_dir: None,
        }
    }

    #[test]
    fn test_object_path_joins_prefix() {
        let sink = ObjectStoreSink::new(Arc::new(InMemory::new()), ObjectPath::from("cold/mysql"));
        let path = sink.object_path("shop/orders/orders__id__1__2.tsv.gz").unwrap();
        assert_eq!(path.as_ref(), "cold/mysql/shop/orders/orders__id__1__2.tsv.gz");
    }

    #[test]
    fn test_object_path_rejects_relative_segments() {
        let sink = ObjectStoreSink::new(Arc::new(InMemory::new()), ObjectPath::default());
        assert!(sink.object_path("shop/../orders.tsv.gz").is_err());
    }

    #[test]
    fn test_from_config_rejects_garbage_url() {
        let err = ObjectStoreSink::from_config(&storage("not a url")).unwrap_err();
        assert!(matches!(err, SinkError::InvalidLocation(_)));
    }

    #[test]
    fn test_from_config_file_url_uses_path_as_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("file://{}", dir.path().display());
        let sink = ObjectStoreSink::from_config(&storage(&url)).unwrap();
        let path = sink.object_path("shop/orders/x.tsv.gz").unwrap();
        assert!(path.as_ref().ends_with("shop/orders/x.tsv.gz"));
    }

    #[tokio::test]
    async fn test_upload_to_memory_store() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("x.tsv.gz");
        std::fs::write(&local, b"compressed-bytes").unwrap();

        let sink = ObjectStoreSink::from_config(&storage("memory:///")).unwrap();
        let receipt = sink.upload(&local, "shop/orders/x.tsv.gz").await.unwrap();
        assert_eq!(receipt.location, "shop/orders/x.tsv.gz");
        assert_eq!(receipt.bytes, 16);

        let stored = sink
            .store()
            .get(&ObjectPath::from("shop/orders/x.tsv.gz"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(stored.as_ref(), b"compressed-bytes");
    }

    #[tokio::test]
    async fn test_upload_refuses_to_replace_existing_object() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.gz");
        let second = dir.path().join("second.gz");
        std::fs::write(&first, b"earlier-rows").unwrap();
        std::fs::write(&second, b"later-rows").unwrap();

        let sink = ObjectStoreSink::from_config(&storage("memory:///")).unwrap();
        sink.upload(&first, "shop/orders/x.tsv.gz").await.unwrap();
        let err = sink.upload(&second, "shop/orders/x.tsv.gz").await.unwrap_err();
        assert!(matches!(
            err,
            SinkError::AlreadyExists { ref remote_path } if remote_path == "shop/orders/x.tsv.gz"
        ));

        let stored = sink
            .store()
            .get(&ObjectPath::from("shop/orders/x.tsv.gz"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(stored.as_ref(), b"earlier-rows");
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ObjectStoreSink::from_config(&storage("memory:///")).unwrap();
        let err = sink
            .upload(&dir.path().join("absent.gz"), "a/b.gz")
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Io { .. }));
    }
}
