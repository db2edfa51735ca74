//! Database layer for Frostline.
//!
//! This crate owns every statement Frostline sends to a database. The orchestrator talks to it
//! only through the collaborator traits:
//!
//! - [`StagingCatalog`]: archive database and staging table DDL, counts, log-column bounds
//! - [`RowCopier`]: batched copy from the live table into the staging table
//! - [`RowExporter`]: batched export of the staging table to a local TSV extract
//!
//! # Usage
//!
//! ```rust,ignore
//! use frostline_db::{mysql::MySqlWarehouse, StagingCatalog};
//!
//! let warehouse = MySqlWarehouse::connect(&config.database, &config.copy).await?;
//! let target = StagingTarget::for_table("shop", "orders");
//! warehouse.ensure_archive_database(&target).await?;
//! ```

mod error;

pub mod batch;
pub mod sql_guard;
pub mod traits;
pub mod tsv;

#[cfg(feature = "mysql")]
pub mod mysql;

pub use batch::{run_batches, BatchReport, BatchStep};
pub use error::{DbError, Result};
pub use sql_guard::{qualified, quote_ident, validate_predicate, SqlGuardError};
pub use traits::{CopyRequest, RowCopier, RowExporter, StagingCatalog};
