//! Record persistence: the [`RecordStore`] seam and its implementations.
//!
//! The pipeline only needs three operations — insert, list, and a status
//! update — so the seam stays that small. [`JsonFileStore`] is the durable
//! default: one JSON file holding every record, rewritten atomically
//! (temp file + rename) so a crash mid-write never leaves a torn store.
//! [`MemoryStore`] backs tests and dry runs.

use crate::error::PipelineError;
use crate::model::{DmsStatus, InvoiceRecord};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Durable home for [`InvoiceRecord`]s.
///
/// Implementations must preserve insertion order in `list()`; the bulk
/// uploader walks records in that order.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append a new record.
    async fn insert(&self, record: InvoiceRecord) -> Result<(), PipelineError>;

    /// All records, in insertion order.
    async fn list(&self) -> Result<Vec<InvoiceRecord>, PipelineError>;

    /// Update one record's DMS status, persisting immediately.
    async fn set_status(&self, id: &str, status: DmsStatus) -> Result<(), PipelineError>;
}

// ── JSON file store ──────────────────────────────────────────────────────

/// File-backed store: the full record list serialised to one JSON file.
pub struct JsonFileStore {
    path: PathBuf,
    records: Mutex<Vec<InvoiceRecord>>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading existing records if the file exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<JsonFileStore, PipelineError> {
        let path = path.as_ref().to_path_buf();

        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| PipelineError::StoreCorrupt {
                    path: path.clone(),
                    detail: e.to_string(),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(PipelineError::Storage {
                    path: path.clone(),
                    source: e,
                })
            }
        };

        debug!(path = %path.display(), records = records.len(), "opened record store");
        Ok(JsonFileStore {
            path,
            records: Mutex::new(records),
        })
    }

    /// Rewrite the store file atomically: write to a temp name, then rename.
    async fn flush(&self, records: &[InvoiceRecord]) -> Result<(), PipelineError> {
        let bytes = serde_json::to_vec_pretty(records)
            .map_err(|e| PipelineError::Internal(format!("serialise records: {e}")))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| PipelineError::Storage {
                        path: parent.to_path_buf(),
                        source: e,
                    })?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| PipelineError::Storage {
                path: tmp_path.clone(),
                source: e,
            })?;

        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| PipelineError::Storage {
                path: self.path.clone(),
                source: e,
            })
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn insert(&self, record: InvoiceRecord) -> Result<(), PipelineError> {
        let mut records = self.records.lock().await;
        records.push(record);
        self.flush(&records).await
    }

    async fn list(&self) -> Result<Vec<InvoiceRecord>, PipelineError> {
        Ok(self.records.lock().await.clone())
    }

    async fn set_status(&self, id: &str, status: DmsStatus) -> Result<(), PipelineError> {
        let mut records = self.records.lock().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| PipelineError::UnknownRecord { id: id.to_string() })?;
        record.dms_status = status;
        self.flush(&records).await
    }
}

// ── In-memory store ──────────────────────────────────────────────────────

/// Volatile store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<InvoiceRecord>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, record: InvoiceRecord) -> Result<(), PipelineError> {
        self.records.lock().await.push(record);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<InvoiceRecord>, PipelineError> {
        Ok(self.records.lock().await.clone())
    }

    async fn set_status(&self, id: &str, status: DmsStatus) -> Result<(), PipelineError> {
        let mut records = self.records.lock().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| PipelineError::UnknownRecord { id: id.to_string() })?;
        record.dms_status = status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldMap, FieldValue};

    fn record(name: &str) -> InvoiceRecord {
        let mut details = FieldMap::new();
        details.insert("Total", FieldValue::Number(10.0));
        InvoiceRecord::new(name, details)
    }

    #[tokio::test]
    async fn file_store_roundtrips_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store.insert(record("a.pdf")).await.unwrap();
            store.insert(record("b.pdf")).await.unwrap();
        }

        let reopened = JsonFileStore::open(&path).await.unwrap();
        let records = reopened.list().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].pdf_filename, "a.pdf");
        assert_eq!(records[1].pdf_filename, "b.pdf");
    }

    #[tokio::test]
    async fn file_store_persists_status_updates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        let id = {
            let store = JsonFileStore::open(&path).await.unwrap();
            let r = record("a.pdf");
            let id = r.id.clone();
            store.insert(r).await.unwrap();
            store.set_status(&id, DmsStatus::Uploaded).await.unwrap();
            id
        };

        let reopened = JsonFileStore::open(&path).await.unwrap();
        let records = reopened.list().await.unwrap();
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].dms_status, DmsStatus::Uploaded);
    }

    #[tokio::test]
    async fn unknown_id_is_an_error() {
        let store = MemoryStore::new();
        let err = store.set_status("nope", DmsStatus::Failed).await;
        assert!(matches!(err, Err(PipelineError::UnknownRecord { .. })));
    }

    #[tokio::test]
    async fn corrupt_store_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        tokio::fs::write(&path, b"not json at all").await.unwrap();

        let err = JsonFileStore::open(&path).await;
        assert!(matches!(err, Err(PipelineError::StoreCorrupt { .. })));
    }

    #[tokio::test]
    async fn missing_file_means_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("fresh.json"))
            .await
            .unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }
}
