//! Progress-callback trait for batch and bulk-push events.
//!
//! Inject an `Arc<dyn BatchProgressCallback>` via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline works through a batch or the bulk
//! uploader walks the record list. Callers can forward events to a terminal
//! progress bar, a WebSocket, or a database row without the library knowing
//! how the host application communicates.
//!
//! All methods have default no-op implementations so callers only override
//! what they care about. The pipeline is strictly sequential, so no method
//! is ever called concurrently; the `Send + Sync` bound exists so the
//! callback can be shared across tasks by the host application.

use std::sync::Arc;

/// Called by the pipeline as it processes documents and pushes records.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after splitting, before any extraction begins.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called just before a split document is sent for extraction.
    ///
    /// `index` is 1-based.
    fn on_document_start(&self, index: usize, total: usize, filename: &str) {
        let _ = (index, total, filename);
    }

    /// Called when a document's fields were extracted successfully.
    fn on_document_extracted(&self, index: usize, total: usize, filename: &str) {
        let _ = (index, total, filename);
    }

    /// Called when a document's extraction failed and the document will be
    /// dropped from the batch.
    fn on_document_failed(&self, index: usize, total: usize, filename: &str, error: &str) {
        let _ = (index, total, filename, error);
    }

    /// Called once after persisting, with the count of persisted records.
    fn on_batch_complete(&self, total_documents: usize, persisted: usize) {
        let _ = (total_documents, persisted);
    }

    /// Called once before the bulk uploader starts walking the record list.
    fn on_push_start(&self, total_records: usize) {
        let _ = total_records;
    }

    /// Called just before a record is uploaded to the DMS. `index` is 1-based.
    fn on_upload_start(&self, index: usize, total: usize, filename: &str) {
        let _ = (index, total, filename);
    }

    /// Called after a record's upload attempt, success or failure.
    fn on_upload_done(&self, index: usize, total: usize, filename: &str, uploaded: bool) {
        let _ = (index, total, filename, uploaded);
    }

    /// Called when a record is skipped because it is already `Uploaded`.
    fn on_upload_skipped(&self, index: usize, total: usize, filename: &str) {
        let _ = (index, total, filename);
    }

    /// Called once after the full record list is exhausted.
    fn on_push_complete(&self, uploaded: usize, failed: usize, skipped: usize) {
        let _ = (uploaded, failed, skipped);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
