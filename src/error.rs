//! Error types for the invoice-batcher library.
//!
//! One enum, two granularities of failure:
//!
//! * **Batch-fatal** variants ([`NoRangesDetected`](PipelineError::NoRangesDetected),
//!   [`AllDocumentsFailed`](PipelineError::AllDocumentsFailed), input,
//!   config, and record-store errors) abort the whole run and are returned
//!   from the top-level entry points.
//!
//! * **Per-document** variants ([`Format`](PipelineError::Format),
//!   [`RateLimitExceeded`](PipelineError::RateLimitExceeded),
//!   [`Api`](PipelineError::Api)) are caught at the document boundary by the
//!   batch persistor: the failing document is logged and dropped while its
//!   siblings continue. The same variants become batch-fatal when they occur
//!   during range identification, before any per-document work exists.
//!
//! [`Storage`](PipelineError::Storage) appears at both granularities: fatal
//! when a split file or the record store cannot be written, per-document when
//! one split file cannot be read back for extraction.
//!
//! [`RateLimited`](PipelineError::RateLimited) is the transient signal a
//! service client raises on HTTP 429; only [`crate::retry::RetryPolicy`]
//! should ever observe it. Everything that escapes the retry loop is final.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the invoice-batcher library.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF structure is corrupt and cannot be parsed.
    #[error("PDF is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { detail: String },

    // ── Document service errors ───────────────────────────────────────────
    /// The service returned HTTP 429 — transient, consumed by the retry loop.
    #[error("Document service rate limited the request: {detail}")]
    RateLimited { detail: String },

    /// The retry budget for rate-limited calls is exhausted.
    #[error("Document service still rate-limited after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    /// The service response could not be parsed as the expected JSON shape.
    ///
    /// Carries the raw response text so operators can see exactly what the
    /// model produced. Never retried — a malformed answer is not transient.
    #[error("Unparseable document service response: {detail}\nRaw response: {raw}")]
    Format { detail: String, raw: String },

    /// The classifier reported an empty range list; the batch cannot proceed.
    #[error("No invoice ranges detected in the source document")]
    NoRangesDetected,

    /// Every split document failed extraction; nothing was persisted.
    ///
    /// Partial work (split files on disk) is not rolled back.
    #[error("All {total} split documents failed extraction")]
    AllDocumentsFailed { total: usize },

    /// Any other service failure (network, 5xx, missing response body).
    /// Surfaced immediately, never retried.
    #[error("Document service error: {message}")]
    Api { message: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// Could not read or write a split file or the record store.
    #[error("Storage failure at '{path}': {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The record store file exists but does not contain valid records.
    #[error("Record store '{path}' is corrupt: {detail}")]
    StoreCorrupt { path: PathBuf, detail: String },

    /// A status update referenced a record id the store has never seen.
    #[error("Unknown record id '{id}'")]
    UnknownRecord { id: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// True for the transient rate-limit signal the retry loop consumes.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, PipelineError::RateLimited { .. })
    }
}
