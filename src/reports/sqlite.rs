//! SQLite-backed report store.
//!
//! Table: `reports(id TEXT PRIMARY KEY, data TEXT, created_at INTEGER,
//! updated_at INTEGER)`, timestamps in epoch milliseconds.
//!
//! ## Concurrency
//! Every operation, reads included, passes through one process-wide async
//! gate and then runs on the blocking pool with the single pooled
//! connection. Operations are therefore totally ordered. Waiting for the gate
//! is bounded by the lock timeout, and the same timeout is SQLite's
//! `busy_timeout` and the pool checkout timeout.
//!
//! The gate guard moves into the blocking task, so an abandoned caller does
//! not release the gate before its in-flight operation finishes.
//!
//! ## Initialization
//! On first use: create the parent directory, open the pool, create the
//! table, and import the legacy snapshot if one is configured. A failed
//! import is logged and does not block startup.

use super::migrate::{migrate_legacy_snapshot, MigrationOutcome};
use super::traits::{document_timestamp, ReportRecord, ReportStore, StoreError};
use crate::config::StorageConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default wait for the store gate and the SQLite write lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

type SqlitePool = Pool<SqliteConnectionManager>;

/// Create the `reports` table and its recency index.
pub(crate) fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS reports (
            id         TEXT PRIMARY KEY,
            data       TEXT NOT NULL,
            created_at INTEGER NOT NULL DEFAULT (strftime('%s','now') * 1000),
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s','now') * 1000)
        );
        CREATE INDEX IF NOT EXISTS idx_reports_updated_at ON reports(updated_at);",
    )
}

struct StoreInner {
    db_path: PathBuf,
    legacy_path: Option<PathBuf>,
    lock_timeout: Duration,
    pool: Mutex<Option<SqlitePool>>,
}

impl StoreInner {
    /// The initialized pool, opening it on first call. Only ever called
    /// while holding the store gate.
    fn pool(&self) -> Result<SqlitePool, StoreError> {
        let mut slot = self.pool.lock();
        if let Some(pool) = slot.as_ref() {
            return Ok(pool.clone());
        }

        let pool = self.open()?;
        let mut conn = pool.get()?;
        init_schema(&conn)?;
        if let Some(ref legacy) = self.legacy_path {
            if let Err(e) = migrate_legacy_snapshot(&mut conn, legacy) {
                tracing::error!(
                    path = %legacy.display(),
                    "Failed to migrate legacy report snapshot: {e}"
                );
            }
        }
        drop(conn);

        tracing::info!(path = %self.db_path.display(), "Report store initialized");
        *slot = Some(pool.clone());
        Ok(pool)
    }

    fn open(&self) -> Result<SqlitePool, StoreError> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let busy_timeout = self.lock_timeout;
        let manager = SqliteConnectionManager::file(&self.db_path).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous  = NORMAL;
                 PRAGMA foreign_keys = ON;",
            )
        });

        let pool = Pool::builder()
            .max_size(1)
            .connection_timeout(self.lock_timeout)
            .build(manager)?;
        Ok(pool)
    }
}

/// Durable report store on a single SQLite file.
pub struct SqliteReportStore {
    inner: Arc<StoreInner>,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl SqliteReportStore {
    pub fn new(db_path: impl Into<PathBuf>, legacy_path: Option<PathBuf>) -> Self {
        Self::with_lock_timeout(db_path, legacy_path, DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(
        db_path: impl Into<PathBuf>,
        legacy_path: Option<PathBuf>,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                db_path: db_path.into(),
                legacy_path,
                lock_timeout,
                pool: Mutex::new(None),
            }),
            gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        let (db_path, legacy_path) = config.resolved_paths();
        Self::with_lock_timeout(
            db_path,
            legacy_path,
            Duration::from_secs(config.lock_timeout_secs),
        )
    }

    pub fn db_path(&self) -> &Path {
        &self.inner.db_path
    }

    pub fn legacy_path(&self) -> Option<&Path> {
        self.inner.legacy_path.as_deref()
    }

    /// Run initialization now instead of on the first operation.
    pub async fn init(&self) -> Result<(), StoreError> {
        self.with_connection(|_| Ok(())).await
    }

    /// Import an arbitrary legacy snapshot. Unlike the automatic import,
    /// failures are returned to the caller.
    pub async fn import_legacy(
        &self,
        path: impl Into<PathBuf>,
    ) -> Result<Option<MigrationOutcome>, StoreError> {
        let path = path.into();
        self.with_connection(move |conn| migrate_legacy_snapshot(conn, &path))
            .await
    }

    /// Serialize `op` behind the gate and run it on the blocking pool.
    async fn with_connection<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let lock_timeout = self.inner.lock_timeout;
        let guard = tokio::time::timeout(lock_timeout, Arc::clone(&self.gate).lock_owned())
            .await
            .map_err(|_| {
                StoreError::StorageUnavailable(format!(
                    "timed out after {}s waiting for the report store",
                    lock_timeout.as_secs_f64()
                ))
            })?;

        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let pool = inner.pool()?;
            let mut conn = pool.get()?;
            op(&mut *conn)
        })
        .await
        .map_err(|e| StoreError::StorageUnavailable(format!("report store task failed: {e}")))?
    }
}

fn parse_document(data: &str) -> Result<Value, StoreError> {
    Ok(serde_json::from_str(data)?)
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn list(&self, ids: Option<&[String]>) -> Result<Vec<Value>, StoreError> {
        let filter = match ids {
            None => None,
            Some([]) => return Ok(Vec::new()),
            Some(ids) => Some(serde_json::to_string(ids)?),
        };

        self.with_connection(move |conn| {
            let rows: Vec<String> = match filter {
                None => {
                    let mut stmt = conn
                        .prepare("SELECT data FROM reports ORDER BY updated_at DESC, id ASC")?;
                    let rows = stmt
                        .query_map([], |row| row.get(0))?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows
                }
                Some(ids_json) => {
                    let mut stmt = conn.prepare(
                        "SELECT data FROM reports
                         WHERE id IN (SELECT value FROM json_each(?1))
                         ORDER BY updated_at DESC, id ASC",
                    )?;
                    let rows = stmt
                        .query_map(params![ids_json], |row| row.get(0))?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows
                }
            };
            tracing::debug!(count = rows.len(), "Listed reports");
            rows.iter().map(|data| parse_document(data)).collect()
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<Value>, StoreError> {
        let id = id.to_owned();
        self.with_connection(move |conn| {
            let data: Option<String> = conn
                .query_row(
                    "SELECT data FROM reports WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            data.as_deref().map(parse_document).transpose()
        })
        .await
    }

    async fn get_record(&self, id: &str) -> Result<Option<ReportRecord>, StoreError> {
        let id = id.to_owned();
        self.with_connection(move |conn| {
            let row: Option<(String, i64, i64)> = conn
                .query_row(
                    "SELECT data, created_at, updated_at FROM reports WHERE id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
            row.map(|(data, created_at, updated_at)| {
                Ok(ReportRecord {
                    id: id.clone(),
                    data: parse_document(&data)?,
                    created_at,
                    updated_at,
                })
            })
            .transpose()
        })
        .await
    }

    async fn upsert(&self, id: &str, document: &Value) -> Result<(), StoreError> {
        let id = id.to_owned();
        let data = serde_json::to_string(document)?;
        let timestamp = document_timestamp(document);
        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO reports (id, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                    data = excluded.data,
                    updated_at = MAX(excluded.updated_at, reports.created_at)",
                params![id, data, timestamp],
            )?;
            tracing::debug!(report_id = %id, "Upserted report");
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_owned();
        self.with_connection(move |conn| {
            let deleted = conn.execute("DELETE FROM reports WHERE id = ?1", params![id])?;
            tracing::debug!(report_id = %id, deleted, "Deleted report");
            Ok(deleted > 0)
        })
        .await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.with_connection(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM reports", [], |row| row.get(0))?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
        .await
    }
}
