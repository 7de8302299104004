//! Bulk push: walk the record store and upload everything still pending.
//!
//! Rules the loop lives by:
//!
//! * records already `Uploaded` are skipped outright — no upload, no status
//!   write, and no throttle pause
//! * every attempted record gets its status written back immediately, so an
//!   interrupted run never re-uploads what already succeeded
//! * a throttle pause follows each attempted record except the last item in
//!   the list, keeping the DMS request rate bounded
//! * one bad record never stops the walk; it is marked `Failed` and the
//!   loop moves on

use crate::dms::upload::DmsUploader;
use crate::error::PipelineError;
use crate::model::{BulkSummary, DmsStatus};
use crate::progress::BatchProgressCallback;
use crate::retry::Sleeper;
use crate::store::RecordStore;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Upload every non-`Uploaded` record, reading each PDF from `output_dir`.
///
/// Store failures propagate; upload failures are absorbed into the summary.
pub async fn push_records(
    uploader: &DmsUploader,
    store: &dyn RecordStore,
    output_dir: &Path,
    throttle: Duration,
    sleeper: &dyn Sleeper,
    progress: &dyn BatchProgressCallback,
) -> Result<BulkSummary, PipelineError> {
    let records = store.list().await?;
    let total = records.len();
    progress.on_push_start(total);

    let mut summary = BulkSummary {
        total,
        ..BulkSummary::default()
    };

    for (i, record) in records.iter().enumerate() {
        let index = i + 1;

        if record.dms_status == DmsStatus::Uploaded {
            summary.skipped += 1;
            progress.on_upload_skipped(index, total, &record.pdf_filename);
            continue;
        }

        progress.on_upload_start(index, total, &record.pdf_filename);

        let uploaded = match tokio::fs::read(output_dir.join(&record.pdf_filename)).await {
            Ok(bytes) => uploader.upload_record(record, bytes).await,
            Err(e) => {
                warn!(
                    filename = %record.pdf_filename,
                    error = %e,
                    "split file missing, marking record failed"
                );
                false
            }
        };

        let status = if uploaded {
            summary.uploaded += 1;
            DmsStatus::Uploaded
        } else {
            summary.failed += 1;
            DmsStatus::Failed
        };
        store.set_status(&record.id, status).await?;
        progress.on_upload_done(index, total, &record.pdf_filename, uploaded);

        if index < total {
            sleeper.sleep(throttle).await;
        }
    }

    progress.on_push_complete(summary.uploaded, summary.failed, summary.skipped);
    info!(
        uploaded = summary.uploaded,
        failed = summary.failed,
        skipped = summary.skipped,
        "bulk push complete"
    );
    Ok(summary)
}
