//! One-time import of the legacy flat-file snapshot.
//!
//! The snapshot is a single JSON object mapping report id to document. All
//! rows are inserted with `INSERT OR IGNORE` inside one transaction, and the
//! file is renamed to `<name>.bak` only after that transaction commits. A
//! crash in between leaves the file in place, and the next run resumes
//! without overwriting rows that already made it in.

use super::traits::{document_timestamp, StoreError};
use rusqlite::{params, Connection};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// What a completed import did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutcome {
    /// Entries found in the snapshot.
    pub found: usize,
    /// Rows actually inserted (ids already present are skipped).
    pub inserted: usize,
    /// Where the snapshot was moved.
    pub backup_path: PathBuf,
}

/// `reports.json` → `reports.json.bak`.
pub fn backup_path_for(legacy: &Path) -> PathBuf {
    let mut name = legacy
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".bak");
    legacy.with_file_name(name)
}

/// Import `legacy` into the `reports` table if the file exists.
///
/// Returns `Ok(None)` when there is nothing to import. On error the snapshot
/// is left untouched.
pub fn migrate_legacy_snapshot(
    conn: &mut Connection,
    legacy: &Path,
) -> Result<Option<MigrationOutcome>, StoreError> {
    if !legacy.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(legacy)?;
    let snapshot: Value = serde_json::from_str(&raw)?;

    let (found, inserted) = match snapshot {
        Value::Object(entries) => {
            let tx = conn.transaction()?;
            let mut inserted = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO reports (id, data, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?3)",
                )?;
                for (id, document) in &entries {
                    let data = serde_json::to_string(document)?;
                    let ts = document_timestamp(document);
                    inserted += stmt.execute(params![id, data, ts])?;
                }
            }
            tx.commit()?;
            (entries.len(), inserted)
        }
        _ => {
            tracing::warn!(
                path = %legacy.display(),
                "Legacy report snapshot is not a JSON object; nothing imported"
            );
            (0, 0)
        }
    };

    let backup_path = backup_path_for(legacy);
    std::fs::rename(legacy, &backup_path)?;
    tracing::info!(
        found,
        inserted,
        backup = %backup_path.display(),
        "Migrated legacy report snapshot"
    );

    Ok(Some(MigrationOutcome {
        found,
        inserted,
        backup_path,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::sqlite::init_schema;
    use tempfile::TempDir;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn row(conn: &Connection, id: &str) -> Option<(String, i64, i64)> {
        conn.query_row(
            "SELECT data, created_at, updated_at FROM reports WHERE id = ?1",
            params![id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .ok()
    }

    #[test]
    fn backup_path_appends_suffix() {
        assert_eq!(
            backup_path_for(Path::new("/data/reports.json")),
            PathBuf::from("/data/reports.json.bak")
        );
        assert_eq!(
            backup_path_for(Path::new("snapshot")),
            PathBuf::from("snapshot.bak")
        );
    }

    #[test]
    fn missing_snapshot_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        let mut conn = memory_db();
        let outcome = migrate_legacy_snapshot(&mut conn, &tmp.path().join("none.json")).unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn imports_entries_and_renames_file() {
        let tmp = TempDir::new().unwrap();
        let legacy = tmp.path().join("reports.json");
        std::fs::write(
            &legacy,
            r#"{"r1": {"timestamp": 100, "text": "a"}, "r2": {"timestamp": 200, "text": "b"}}"#,
        )
        .unwrap();

        let mut conn = memory_db();
        let outcome = migrate_legacy_snapshot(&mut conn, &legacy).unwrap().unwrap();
        assert_eq!(outcome.found, 2);
        assert_eq!(outcome.inserted, 2);
        assert!(!legacy.exists());
        assert!(outcome.backup_path.exists());

        let (data, created, updated) = row(&conn, "r2").unwrap();
        let doc: Value = serde_json::from_str(&data).unwrap();
        assert_eq!(doc["text"], "b");
        assert_eq!((created, updated), (200, 200));
    }

    #[test]
    fn existing_rows_are_not_overwritten() {
        let tmp = TempDir::new().unwrap();
        let legacy = tmp.path().join("reports.json");
        std::fs::write(&legacy, r#"{"r1": {"timestamp": 1, "text": "stale"}}"#).unwrap();

        let mut conn = memory_db();
        conn.execute(
            "INSERT INTO reports (id, data, created_at, updated_at) VALUES ('r1', '{\"text\":\"fresh\"}', 5, 9)",
            [],
        )
        .unwrap();

        let outcome = migrate_legacy_snapshot(&mut conn, &legacy).unwrap().unwrap();
        assert_eq!(outcome.inserted, 0);
        let (data, created, updated) = row(&conn, "r1").unwrap();
        assert!(data.contains("fresh"));
        assert_eq!((created, updated), (5, 9));
    }

    #[test]
    fn malformed_snapshot_is_left_in_place() {
        let tmp = TempDir::new().unwrap();
        let legacy = tmp.path().join("reports.json");
        std::fs::write(&legacy, "{ not json").unwrap();

        let mut conn = memory_db();
        let err = migrate_legacy_snapshot(&mut conn, &legacy).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
        assert!(legacy.exists());
        assert!(!backup_path_for(&legacy).exists());
    }

    #[test]
    fn non_object_snapshot_is_retired_without_import() {
        let tmp = TempDir::new().unwrap();
        let legacy = tmp.path().join("reports.json");
        std::fs::write(&legacy, r#"[1, 2, 3]"#).unwrap();

        let mut conn = memory_db();
        let outcome = migrate_legacy_snapshot(&mut conn, &legacy).unwrap().unwrap();
        assert_eq!(outcome.found, 0);
        assert!(!legacy.exists());
        assert!(outcome.backup_path.exists());
    }
}
