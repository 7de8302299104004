//! Persistence stage: turn per-document extraction outcomes into records.
//!
//! Failure isolation happens here. A document whose extraction failed is
//! logged and dropped; the rest of the batch persists normally. Only when
//! every document failed does the batch itself fail, because a run that
//! produced nothing must not look like success.

use crate::error::PipelineError;
use crate::model::{ExtractionResult, InvoiceRecord, SplitDocument};
use crate::store::RecordStore;
use tracing::{info, warn};

/// Persist one record per successful extraction, in document order.
///
/// Store errors propagate immediately — losing a record silently is worse
/// than aborting. Returns [`PipelineError::AllDocumentsFailed`] when no
/// document survived.
pub async fn persist_batch(
    store: &dyn RecordStore,
    outcomes: Vec<(SplitDocument, Result<ExtractionResult, PipelineError>)>,
) -> Result<Vec<InvoiceRecord>, PipelineError> {
    let total = outcomes.len();
    let mut persisted = Vec::new();

    for (document, outcome) in outcomes {
        match outcome {
            Ok(extraction) => {
                let record = InvoiceRecord::new(&document.filename, extraction.fields);
                store.insert(record.clone()).await?;
                persisted.push(record);
            }
            Err(e) => {
                warn!(
                    filename = %document.filename,
                    range = %document.range,
                    error = %e,
                    "dropping document after extraction failure"
                );
            }
        }
    }

    if persisted.is_empty() {
        return Err(PipelineError::AllDocumentsFailed { total });
    }

    info!(persisted = persisted.len(), total, "batch persisted");
    Ok(persisted)
}
