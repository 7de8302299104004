//! # invoice-batcher
//!
//! Split a combined multi-invoice PDF into individual invoices, extract a
//! configurable field set from each with a document-understanding model, and
//! push the results into a document-management system (DMS).
//!
//! ## Why this crate?
//!
//! Accounting teams receive scanned bundles holding dozens of invoices in one
//! PDF. Splitting them by hand and re-keying vendor, date, and amounts is slow
//! and error-prone. This crate asks a multimodal model where each invoice
//! begins and ends, cuts the bundle losslessly at those boundaries, extracts
//! the fields you name, and files everything in the DMS with searchable
//! metadata.
//!
//! ## Pipeline Overview
//!
//! ```text
//! combined PDF
//!  │
//!  ├─ 1. Segment  classifier reports invoice page ranges (429-aware retry)
//!  ├─ 2. Split    lossless per-range cut via lopdf (spawn_blocking)
//!  ├─ 3. Extract  per-document field extraction, typed and coerced
//!  ├─ 4. Persist  one Pending record per surviving document
//!  └─ 5. Push     throttled bulk upload to the DMS, statuses written back
//! ```
//!
//! Stages 1–4 run under [`process_batch`]; stage 5 is a separate
//! [`push_pending`] call so uploads can be retried independently of
//! processing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice_batcher::{process_batch, BatchConfig, GeminiClient, JsonFileStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BatchConfig::builder()
//!         .fields(["Invoice Number", "Vendor", "Invoice Date", "Total Amount"])
//!         .output_dir("uploads")
//!         .build()?;
//!
//!     let ai = GeminiClient::new(std::env::var("GEMINI_API_KEY")?, &config.model, 120)?;
//!     let store = JsonFileStore::open("records.json").await?;
//!
//!     let output = process_batch("invoices.pdf", &ai, &store, &config).await?;
//!     println!("persisted {} of {} invoices", output.stats.persisted, output.stats.ranges);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice-batcher` binary (clap + anyhow + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! invoice-batcher = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod dms;
pub mod docai;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod retry;
pub mod run;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{BatchConfig, BatchConfigBuilder, DmsConfig};
pub use dms::client::{DmsApi, DmsApiError, DmsUpload, HttpDmsClient};
pub use docai::{DocumentAi, GeminiClient, DEFAULT_GEMINI_MODEL};
pub use error::PipelineError;
pub use model::{
    BatchOutput, BatchStats, BulkSummary, DmsStatus, DocumentOutcome, ExtractionResult,
    FieldMap, FieldSpec, FieldValue, InvoiceRecord, PageRange, SplitDocument, ValueKind,
};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use run::{process_batch, push_pending};
pub use store::{JsonFileStore, MemoryStore, RecordStore};
