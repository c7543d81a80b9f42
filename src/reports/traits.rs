use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A persisted report row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: String,
    /// The report document as stored.
    pub data: Value,
    /// Epoch milliseconds of the first upsert.
    pub created_at: i64,
    /// Epoch milliseconds of the latest upsert; never below `created_at`.
    pub updated_at: i64,
}

/// Report store failures. A missing report is not an error; lookups return
/// `None` and deletes return `false`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Open, lock, or commit failure in the storage engine. Retryable.
    #[error("Report storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Report data is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Report storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_) | Self::Io(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(err: r2d2::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

/// Keyed storage for report documents.
///
/// Every call is committed before it returns. Callers pass and receive
/// independent copies of documents.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Documents ordered by most recently updated first. With `ids`, only
    /// matching documents are returned; unknown ids are skipped silently.
    async fn list(&self, ids: Option<&[String]>) -> Result<Vec<Value>, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Value>, StoreError>;

    /// Full row including timestamps.
    async fn get_record(&self, id: &str) -> Result<Option<ReportRecord>, StoreError>;

    /// Insert or replace the document for `id`, preserving `created_at` of an
    /// existing row.
    async fn upsert(&self, id: &str, document: &Value) -> Result<(), StoreError>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}

/// The document's own `timestamp` field (epoch ms), or 0 when absent or not
/// numeric. Fractional values are truncated.
pub fn document_timestamp(document: &Value) -> i64 {
    match document.get("timestamp") {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|v| i64::try_from(v).unwrap_or(i64::MAX)))
            .or_else(|| n.as_f64().map(|v| v as i64))
            .unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timestamp_from_integer() {
        assert_eq!(
            document_timestamp(&json!({"timestamp": 1_700_000_000_123_i64})),
            1_700_000_000_123
        );
    }

    #[test]
    fn timestamp_from_float_truncates() {
        assert_eq!(document_timestamp(&json!({"timestamp": 42.9})), 42);
    }

    #[test]
    fn timestamp_defaults_to_zero() {
        assert_eq!(document_timestamp(&json!({})), 0);
        assert_eq!(document_timestamp(&json!({"timestamp": "yesterday"})), 0);
        assert_eq!(document_timestamp(&json!(["not", "an", "object"])), 0);
        assert_eq!(document_timestamp(&Value::Null), 0);
    }

    #[test]
    fn storage_errors_are_retryable() {
        assert!(StoreError::StorageUnavailable("locked".into()).is_retryable());
        let bad_json = serde_json::from_str::<Value>("{").unwrap_err();
        assert!(!StoreError::from(bad_json).is_retryable());
    }
}
