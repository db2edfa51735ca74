//! Where extracts go after they leave the database.
//!
//! - [`gzip_file`]: streaming gzip of a local extract; [`file_digest`] names it by content
//! - [`ColdStore`] / [`ObjectStoreSink`]: multipart upload to any `object_store` backend
//! - [`LocalArtifacts`]: deletes local extract files when a drain ends, however it ends

mod artifact;
mod compress;
mod error;
mod store;

pub use artifact::LocalArtifacts;
pub use compress::{compressed_path, file_digest, gzip_file};
pub use error::{SinkError, SinkResult};
pub use store::{ColdStore, ObjectStoreSink, UploadReceipt};
