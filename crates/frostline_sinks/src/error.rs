use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by compression and cold-storage upload.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Transport, authentication, or protocol failure while storing an object.
    #[error("upload of {remote_path} failed: {source}")]
    Upload {
        remote_path: String,
        #[source]
        source: object_store::Error,
    },

    /// Stored objects are never replaced.
    #[error("object {remote_path} already exists")]
    AlreadyExists { remote_path: String },

    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid storage location: {0}")]
    InvalidLocation(String),
}

pub type SinkResult<T> = std::result::Result<T, SinkError>;

impl SinkError {
    pub(crate) fn io(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        SinkError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn upload(remote_path: impl Into<String>, source: object_store::Error) -> Self {
        SinkError::Upload {
            remote_path: remote_path.into(),
            source,
        }
    }

    pub(crate) fn invalid_location(message: impl Into<String>) -> Self {
        SinkError::InvalidLocation(message.into())
    }
}
