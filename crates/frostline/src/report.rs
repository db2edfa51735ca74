//! Incident reporting at the top-level error boundary.
//!
//! An unrecovered error is handed to an [`IncidentReporter`] and then returned unchanged, so the
//! process still exits with a failure status.

use crate::error::ArchiveError;
use chrono::{DateTime, Utc};
use frostline_protocol::FrostlineConfig;
use serde::Serialize;
use std::error::Error;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, warn};

/// One unrecovered failure.
#[derive(Debug, Clone, Serialize)]
pub struct Incident {
    pub occurred_at: DateTime<Utc>,
    /// Table being archived, when the failure is tied to one.
    pub table: Option<String>,
    pub kind: &'static str,
    pub message: String,
    /// `source()` chain, outermost first.
    pub causes: Vec<String>,
}

impl Incident {
    pub fn from_error(table: Option<&str>, err: &ArchiveError) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            occurred_at: Utc::now(),
            table: table.map(str::to_string),
            kind: err.kind(),
            message: err.to_string(),
            causes,
        }
    }
}

/// Destination for unrecovered failures.
pub trait IncidentReporter: Send + Sync {
    fn report(&self, incident: &Incident);
}

/// Logs incidents at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl IncidentReporter for TracingReporter {
    fn report(&self, incident: &Incident) {
        error!(
            table = incident.table.as_deref().unwrap_or("-"),
            kind = incident.kind,
            causes = ?incident.causes,
            "Archive run failed: {}",
            incident.message
        );
    }
}

/// Appends one JSON object per incident to a file.
#[derive(Debug)]
pub struct JsonlReporter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn append(&self, incident: &Incident) -> std::io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_vec(incident)?;
        line.push(b'\n');
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?
            .write_all(&line)
    }
}

impl IncidentReporter for JsonlReporter {
    fn report(&self, incident: &Incident) {
        if let Err(e) = self.append(incident) {
            warn!(path = %self.path.display(), error = %e, "Failed to record incident");
        }
    }
}

/// Fans an incident out to several reporters.
#[derive(Default, Clone)]
pub struct Reporters {
    inner: Vec<Arc<dyn IncidentReporter>>,
}

impl Reporters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reporter: Arc<dyn IncidentReporter>) -> Self {
        self.inner.push(reporter);
        self
    }
}

impl IncidentReporter for Reporters {
    fn report(&self, incident: &Incident) {
        for reporter in &self.inner {
            reporter.report(incident);
        }
    }
}

/// Report `result`'s error, if any, then hand the result back unchanged.
pub fn capture<T>(
    reporter: &dyn IncidentReporter,
    table: Option<&str>,
    result: Result<T, ArchiveError>,
) -> Result<T, ArchiveError> {
    if let Err(err) = &result {
        reporter.report(&Incident::from_error(table, err));
    }
    result
}

/// Load the config file, reporting a missing or malformed file like any other failed run.
pub fn load_config(
    reporter: &dyn IncidentReporter,
    path: &Path,
) -> Result<FrostlineConfig, ArchiveError> {
    capture(reporter, None, FrostlineConfig::load(path).map_err(ArchiveError::from))
}
