//! Scoped ownership of local extract files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Local files produced by one drain. Every tracked file is removed when the guard drops.
///
/// ```rust,ignore
/// let mut artifacts = LocalArtifacts::new();
/// let raw = artifacts.track(work_dir.join(&names.local_file_name));
/// exporter.export_rows(&target, batch, &raw).await?;   // early return still cleans up
/// ```
#[derive(Debug, Default)]
pub struct LocalArtifacts {
    paths: Vec<PathBuf>,
}

impl LocalArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `path` and hand back a copy for the caller to write to.
    pub fn track(&mut self, path: impl Into<PathBuf>) -> PathBuf {
        let path = path.into();
        self.paths.push(path.clone());
        path
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Delete every tracked file now. Missing files are not an error.
    pub fn release(&mut self) {
        for path in self.paths.drain(..) {
            remove_quietly(&path);
        }
    }
}

impl Drop for LocalArtifacts {
    fn drop(&mut self) {
        self.release();
    }
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Local artifact deleted"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete local artifact"),
    }
}
