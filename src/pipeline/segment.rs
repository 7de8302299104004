//! Range identification: ask the classifier where each invoice begins and
//! ends inside the combined PDF.
//!
//! The classifier is a black box consulted, not designed, here: its answer
//! is trusted apart from shape validation (a JSON array of `{start, end}`
//! objects with `1 <= start <= end`) and defensive clamping later in the
//! splitter. A malformed answer is a [`PipelineError::Format`] — not
//! transient, never retried. Only HTTP 429 goes through the shared retry
//! policy.

use crate::docai::{parse_json_reply, DocumentAi};
use crate::error::PipelineError;
use crate::model::PageRange;
use crate::prompts::RANGE_INSTRUCTION;
use crate::retry::{RetryPolicy, Sleeper};
use tracing::{debug, info};

/// Identify invoice page ranges in the source document.
///
/// Returns ranges sorted ascending by `start`. Fails with
/// [`PipelineError::NoRangesDetected`] when the classifier reports an empty
/// array; the caller aborts the whole batch in that case.
pub async fn identify_ranges(
    ai: &dyn DocumentAi,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    pdf: &[u8],
) -> Result<Vec<PageRange>, PipelineError> {
    let raw = policy
        .run(sleeper, || ai.analyze(pdf, RANGE_INSTRUCTION))
        .await?;
    debug!(reply_len = raw.len(), "classifier replied");

    let ranges = parse_ranges(&raw)?;
    if ranges.is_empty() {
        return Err(PipelineError::NoRangesDetected);
    }

    info!(count = ranges.len(), "identified invoice ranges");
    Ok(ranges)
}

/// Parse and validate the classifier reply into sorted ranges.
fn parse_ranges(raw: &str) -> Result<Vec<PageRange>, PipelineError> {
    let value = parse_json_reply(raw)?;

    let items = value.as_array().ok_or_else(|| PipelineError::Format {
        detail: "expected a JSON array of {start, end} objects".into(),
        raw: raw.to_string(),
    })?;

    let mut ranges = Vec::with_capacity(items.len());
    for item in items {
        let range: PageRange =
            serde_json::from_value(item.clone()).map_err(|e| PipelineError::Format {
                detail: format!("bad range object: {e}"),
                raw: raw.to_string(),
            })?;
        if range.start < 1 || range.end < range.start {
            return Err(PipelineError::Format {
                detail: format!(
                    "invalid range: start={} end={} (pages are 1-indexed, start <= end)",
                    range.start, range.end
                ),
                raw: raw.to_string(),
            });
        }
        ranges.push(range);
    }

    ranges.sort_by_key(|r| r.start);
    Ok(ranges)
}
