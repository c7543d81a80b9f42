//! Durable storage for research report documents.
//!
//! One record type: a JSON document keyed by an opaque report id. The
//! SQLite backend replaces an older flat-file store and imports its snapshot
//! once on first use.

pub mod migrate;
pub mod sqlite;
pub mod traits;

pub use migrate::{backup_path_for, MigrationOutcome};
pub use sqlite::SqliteReportStore;
pub use traits::{document_timestamp, ReportRecord, ReportStore, StoreError};
