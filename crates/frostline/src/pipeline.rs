//! Export → compress → upload → delete, applied to one populated staging table.
//!
//! The staging table is dropped only after the upload is confirmed. If any step before that
//! fails, the staging rows stay where they are and the next run drains them again; the local
//! extract files are removed on every path by [`LocalArtifacts`].
//!
//! An existing object is never replaced. When the computed key is taken (a later run whose rows
//! have the same log-column bounds), the extract is stored under the key with its content digest
//! appended.

use crate::context::ArchiveContext;
use crate::error::ArchiveError;
use frostline_protocol::{compute_names, ArchiveNames, StagingTarget};
use frostline_sinks::{file_digest, gzip_file, LocalArtifacts, SinkError, UploadReceipt};
use std::path::Path;
use tracing::{debug, info, warn};

/// Result of one drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The staging table held no rows; it was dropped and nothing was written.
    Empty,
    Archived {
        rows: u64,
        /// Object path of the compressed extract, relative to the store prefix.
        remote_path: String,
        /// Compressed size.
        bytes: u64,
    },
}

impl DrainOutcome {
    pub fn rows(&self) -> u64 {
        match self {
            DrainOutcome::Empty => 0,
            DrainOutcome::Archived { rows, .. } => *rows,
        }
    }
}

/// Drains staging tables into cold storage.
pub struct Drainer<'a> {
    ctx: &'a ArchiveContext,
}

impl<'a> Drainer<'a> {
    pub fn new(ctx: &'a ArchiveContext) -> Self {
        Self { ctx }
    }

    /// Move every row of `target`'s staging table to cold storage, then drop the table.
    ///
    /// `where_for_naming` only feeds the artifact names; a recovered staging table passes `""`.
    pub async fn drain(
        &self,
        target: &StagingTarget,
        log_column: &str,
        batch_size: u64,
        where_for_naming: &str,
    ) -> Result<DrainOutcome, ArchiveError> {
        let ctx = self.ctx;

        let staged = ctx.catalog.count_staged_rows(target).await?;
        info!(table = %target.table, phase = "count", rows = staged, "Staging rows counted");
        if staged == 0 {
            ctx.catalog.drop_staging_table(target).await?;
            info!(table = %target.table, phase = "drop_staging", "Empty staging table dropped");
            return Ok(DrainOutcome::Empty);
        }

        let bounds = ctx.catalog.log_column_bounds(target, log_column).await?;
        let names = compute_names(target, log_column, bounds.as_ref(), where_for_naming);

        std::fs::create_dir_all(&ctx.work_dir).map_err(|source| ArchiveError::WorkDir {
            path: ctx.work_dir.clone(),
            source,
        })?;

        let mut artifacts = LocalArtifacts::new();
        let raw = artifacts.track(ctx.work_dir.join(&names.local_file_name));
        let exported = ctx.exporter.export_rows(target, batch_size, &raw).await?;
        info!(
            table = %target.table,
            phase = "export",
            rows = exported.total_rows(),
            batches = exported.batch_count(),
            path = %raw.display(),
            "Staging table exported"
        );
        if exported.total_rows() != staged {
            warn!(
                table = %target.table,
                counted = staged,
                exported = exported.total_rows(),
                "Exported row count differs from staged count"
            );
        }

        let compressed = artifacts.track(gzip_file(&raw)?);
        info!(
            table = %target.table,
            phase = "compress",
            path = %compressed.display(),
            "Extract compressed"
        );

        let (remote_path, receipt) = self
            .upload_without_overwrite(&target.table, &compressed, &names)
            .await?;
        info!(
            table = %target.table,
            phase = "upload",
            path = %receipt.location,
            bytes = receipt.bytes,
            "Extract uploaded"
        );

        artifacts.release();
        debug!(table = %target.table, phase = "delete_local", "Local extract files deleted");

        ctx.catalog.drop_staging_table(target).await?;
        info!(table = %target.table, phase = "drop_staging", "Staging table dropped");

        Ok(DrainOutcome::Archived {
            rows: exported.total_rows(),
            remote_path,
            bytes: receipt.bytes,
        })
    }

    async fn upload_without_overwrite(
        &self,
        table: &str,
        compressed: &Path,
        names: &ArchiveNames,
    ) -> Result<(String, UploadReceipt), ArchiveError> {
        let remote_path = names.compressed_remote_path();
        match self.ctx.store.upload(compressed, &remote_path).await {
            Ok(receipt) => Ok((remote_path, receipt)),
            Err(SinkError::AlreadyExists { .. }) => {
                let digest = file_digest(compressed)?;
                let alternate = names.with_discriminator(&digest).compressed_remote_path();
                warn!(
                    table = %table,
                    taken = %remote_path,
                    path = %alternate,
                    "Object key already used; storing under content digest"
                );
                let receipt = self.ctx.store.upload(compressed, &alternate).await?;
                Ok((alternate, receipt))
            }
            Err(e) => Err(e.into()),
        }
    }
}
