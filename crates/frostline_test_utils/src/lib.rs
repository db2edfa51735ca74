//! Frostline Test Utilities
//!
//! In-memory collaborators for orchestrator tests, plus Docker-based MySQL fixtures.
//!
//! # Features
//!
//! - `docker-tests`: enable [`mysql`] (container lifecycle, [`MySqlTestGuard`])
//!
//! # Usage
//!
//! ```rust,ignore
//! use frostline_test_utils::{row, Journal, MemoryWarehouse, RecordingStore};
//!
//! let journal = Journal::new();
//! let warehouse = MemoryWarehouse::new(journal.clone());
//! warehouse.create_live_table("shop", "orders", &["id", "created_at"]);
//! warehouse.insert_live("shop", "orders", vec![row(&[Some("1"), Some("2024-01-01")])]);
//! let store = RecordingStore::new(journal.clone());
//! ```

pub mod journal;
pub mod store;
pub mod warehouse;

#[cfg(feature = "docker-tests")]
pub mod mysql;

pub use journal::{Event, Journal};
pub use store::RecordingStore;
pub use warehouse::{compare_values, row, FailPoint, MemRow, MemTable, MemoryWarehouse};

#[cfg(feature = "docker-tests")]
pub use mysql::{MySqlTestGuard, TestMySqlConfig, TestMySqlPool};
