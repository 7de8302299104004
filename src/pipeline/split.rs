//! PDF splitting: cut the source document into one file per page range.
//!
//! Splitting works on the object level — each output document is a clone of
//! the source with every page outside the range deleted, then pruned of
//! unreachable objects. Page content streams are carried over untouched, so
//! the split never re-renders or degrades the original pages.
//!
//! lopdf is synchronous and CPU-bound, so the whole pass runs inside
//! `spawn_blocking` to keep the async runtime responsive.

use crate::error::PipelineError;
use crate::model::{PageRange, SplitDocument};
use chrono::Utc;
use lopdf::Document;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Number of pages in the document, or `CorruptPdf` when lopdf can't parse it.
pub fn page_count(pdf: &[u8]) -> Result<usize, PipelineError> {
    let doc = load(pdf)?;
    Ok(doc.get_pages().len())
}

/// Split `pdf` into one file per range, written under `output_dir`.
///
/// Ranges are clamped to the document's actual page span before cutting, so
/// an out-of-bounds classifier answer degrades to a smaller document instead
/// of an error. Output files are named `split_<millis>_<index>.pdf` and
/// returned in source order.
pub async fn split_ranges(
    pdf: Vec<u8>,
    ranges: Vec<PageRange>,
    output_dir: PathBuf,
) -> Result<Vec<SplitDocument>, PipelineError> {
    tokio::task::spawn_blocking(move || split_blocking(&pdf, &ranges, &output_dir))
        .await
        .map_err(|e| PipelineError::Internal(format!("split task panicked: {e}")))?
}

fn split_blocking(
    pdf: &[u8],
    ranges: &[PageRange],
    output_dir: &Path,
) -> Result<Vec<SplitDocument>, PipelineError> {
    std::fs::create_dir_all(output_dir).map_err(|e| PipelineError::Storage {
        path: output_dir.to_path_buf(),
        source: e,
    })?;

    let source = load(pdf)?;
    let total_pages = source.get_pages().len();
    if total_pages == 0 {
        return Err(PipelineError::CorruptPdf {
            detail: "document has no pages".into(),
        });
    }
    let stamp = Utc::now().timestamp_millis();

    let mut documents = Vec::with_capacity(ranges.len());
    for (i, range) in ranges.iter().enumerate() {
        let range = range.clamp_to(total_pages);
        debug!(index = i, %range, "cutting range");

        let bytes = cut_range(&source, range, total_pages)?;

        let filename = format!("split_{stamp}_{i}.pdf");
        let path = output_dir.join(&filename);
        std::fs::write(&path, &bytes).map_err(|e| PipelineError::Storage {
            path: path.clone(),
            source: e,
        })?;

        documents.push(SplitDocument {
            filename,
            path,
            range,
            pages: range.page_count(),
        });
    }

    info!(
        documents = documents.len(),
        output_dir = %output_dir.display(),
        "split complete"
    );
    Ok(documents)
}

/// Produce a single-range document by deleting the complement pages.
fn cut_range(
    source: &Document,
    range: PageRange,
    total_pages: usize,
) -> Result<Vec<u8>, PipelineError> {
    let mut doc = source.clone();

    let complement: Vec<u32> = (1..=total_pages)
        .filter(|p| *p < range.start || *p > range.end)
        .map(|p| p as u32)
        .collect();
    if !complement.is_empty() {
        doc.delete_pages(&complement);
    }

    doc.prune_objects();
    doc.renumber_objects();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| PipelineError::Internal(format!("serialise split PDF: {e}")))?;
    Ok(bytes)
}

fn load(pdf: &[u8]) -> Result<Document, PipelineError> {
    Document::load_mem(pdf).map_err(|e| PipelineError::CorruptPdf {
        detail: e.to_string(),
    })
}
