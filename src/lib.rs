//! Authentication and report persistence core for the research service.
//!
//! - [`auth`]: signed session tokens, preset credentials, login throttling
//! - [`reports`]: SQLite-backed report documents with legacy snapshot import
//! - [`gateway`]: transport-facing glue (identity, error responses)
//! - [`config`]: TOML + environment configuration

pub mod auth;
pub mod config;
pub mod gateway;
pub mod reports;
pub(crate) mod util;

pub use auth::{AuthError, Session, TokenAuthenticator};
pub use config::Config;
pub use gateway::{ApiError, AppState, Identity};
pub use reports::{ReportRecord, ReportStore, SqliteReportStore, StoreError};
