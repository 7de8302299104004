//! Top-level entry points: [`process_batch`] and [`push_pending`].
//!
//! Both functions are generic over the service seams ([`DocumentAi`],
//! [`DmsApi`], [`RecordStore`]) so integration tests can drive the full
//! pipeline against scripted services. The CLI wires in the real
//! implementations.

use crate::config::BatchConfig;
use crate::dms::auth::AuthTokenProvider;
use crate::dms::bulk::push_records;
use crate::dms::client::DmsApi;
use crate::dms::upload::DmsUploader;
use crate::docai::DocumentAi;
use crate::error::PipelineError;
use crate::model::{BatchOutput, BatchStats, BulkSummary, DocumentOutcome, FieldSpec};
use crate::pipeline::{extract, persist, segment, split};
use crate::progress::{BatchProgressCallback, NoopProgressCallback};
use crate::store::RecordStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Run the full pipeline over one combined PDF:
/// segment → split → extract → persist.
///
/// Requires at least one configured field; an empty field list is rejected
/// before any service call. Per-document extraction failures are reported in
/// [`BatchOutput::documents`] and do not fail the run unless every document
/// failed.
#[instrument(skip_all, fields(input = %input.as_ref().display()))]
pub async fn process_batch(
    input: impl AsRef<Path>,
    ai: &dyn DocumentAi,
    store: &dyn RecordStore,
    config: &BatchConfig,
) -> Result<BatchOutput, PipelineError> {
    if config.fields.is_empty() {
        return Err(PipelineError::InvalidConfig(
            "at least one extraction field is required".into(),
        ));
    }

    let started = Instant::now();
    let policy = config.retry_policy();
    let sleeper = &*config.sleeper;
    let progress: &dyn BatchProgressCallback = config
        .progress_callback
        .as_deref()
        .unwrap_or(&NoopProgressCallback);

    // ── Step 1: read and validate the source PDF ─────────────────────────
    let pdf = read_pdf(input.as_ref()).await?;
    let total_pages = split::page_count(&pdf)?;
    info!(pages = total_pages, "source PDF loaded");
    let specs = FieldSpec::catalog(&config.fields);

    // ── Step 2: identify invoice page ranges ─────────────────────────────
    let ranges = segment::identify_ranges(ai, &policy, sleeper, &pdf).await?;

    // ── Step 3: cut the source into per-invoice files ────────────────────
    let documents =
        split::split_ranges(pdf, ranges.clone(), config.output_dir.clone()).await?;
    progress.on_batch_start(documents.len());

    // ── Step 4: extract fields from each document ────────────────────────
    let total = documents.len();
    let mut outcomes = Vec::with_capacity(total);
    let mut report = Vec::with_capacity(total);

    for (i, document) in documents.into_iter().enumerate() {
        let index = i + 1;
        progress.on_document_start(index, total, &document.filename);

        let result = match tokio::fs::read(&document.path).await {
            Ok(bytes) => extract::extract_fields(ai, &policy, sleeper, &bytes, &specs).await,
            Err(e) => Err(PipelineError::Storage {
                path: document.path.clone(),
                source: e,
            }),
        };

        match &result {
            Ok(_) => progress.on_document_extracted(index, total, &document.filename),
            Err(e) => {
                warn!(filename = %document.filename, error = %e, "document failed");
                progress.on_document_failed(index, total, &document.filename, &e.to_string());
            }
        }

        report.push(DocumentOutcome {
            filename: document.filename.clone(),
            range: document.range,
            error: result.as_ref().err().map(|e| e.to_string()),
        });
        outcomes.push((document, result));
    }

    // ── Step 5: persist the surviving documents ──────────────────────────
    let records = persist::persist_batch(store, outcomes).await?;
    progress.on_batch_complete(total, records.len());

    let stats = BatchStats {
        ranges: ranges.len(),
        persisted: records.len(),
        failed: total - records.len(),
        total_duration_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        ranges = stats.ranges,
        persisted = stats.persisted,
        failed = stats.failed,
        duration_ms = stats.total_duration_ms,
        "batch complete"
    );

    Ok(BatchOutput {
        records,
        documents: report,
        stats,
    })
}

/// Upload every record not yet marked `Uploaded` to the DMS.
///
/// Requires [`BatchConfig::dms`] to be set; split files are read from
/// [`BatchConfig::output_dir`].
#[instrument(skip_all)]
pub async fn push_pending(
    api: Arc<dyn DmsApi>,
    store: &dyn RecordStore,
    config: &BatchConfig,
) -> Result<BulkSummary, PipelineError> {
    let dms = config.dms.as_ref().ok_or_else(|| {
        PipelineError::InvalidConfig("DMS settings are required for a push".into())
    })?;

    let auth = AuthTokenProvider::new(api.clone(), &dms.username, &dms.password);
    let uploader = DmsUploader::new(api, auth, &dms.doc_type_id, dms.checker_id.clone());
    let progress: &dyn BatchProgressCallback = config
        .progress_callback
        .as_deref()
        .unwrap_or(&NoopProgressCallback);

    push_records(
        &uploader,
        store,
        &config.output_dir,
        config.throttle(),
        &*config.sleeper,
        progress,
    )
    .await
}

/// Read the source file, mapping IO failures to operator-facing errors and
/// rejecting anything without the `%PDF` magic.
async fn read_pdf(path: &Path) -> Result<Vec<u8>, PipelineError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PipelineError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => PipelineError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => PipelineError::Storage {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(PipelineError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }

    Ok(bytes)
}
