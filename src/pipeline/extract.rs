//! Field extraction: pull the requested field set out of one split document.
//!
//! The result always contains exactly the requested keys, in request order,
//! whatever the model returned: extra keys are dropped, missing keys filled
//! with the type default ("" or 0), and values coerced to the inferred type.
//! Downstream consumers (store, DMS metadata) can therefore rely on a fixed
//! shape per batch.

use crate::docai::{parse_json_reply, DocumentAi};
use crate::error::PipelineError;
use crate::model::{ExtractionResult, FieldMap, FieldSpec, FieldValue, ValueKind};
use crate::prompts::extraction_instruction;
use crate::retry::{RetryPolicy, Sleeper};
use serde_json::Value;
use tracing::debug;

/// Extract `specs` from a single split PDF.
pub async fn extract_fields(
    ai: &dyn DocumentAi,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    pdf: &[u8],
    specs: &[FieldSpec],
) -> Result<ExtractionResult, PipelineError> {
    let instruction = extraction_instruction(specs);
    let raw = policy
        .run(sleeper, || ai.analyze(pdf, &instruction))
        .await?;
    debug!(reply_len = raw.len(), "extraction reply received");

    let value = parse_json_reply(&raw)?;
    let object = value.as_object().ok_or_else(|| PipelineError::Format {
        detail: "expected a JSON object of field values".into(),
        raw: raw.clone(),
    })?;

    let mut fields = FieldMap::new();
    for spec in specs {
        fields.insert(&spec.name, coerce(object.get(&spec.name), spec.kind));
    }

    Ok(ExtractionResult { fields })
}

/// Coerce one model value to the field's inferred type.
///
/// Missing or null values become the type default. Numeric fields accept
/// strings with currency noise ("$1,234.56"); anything unconvertible
/// degrades to 0 rather than failing the document.
fn coerce(value: Option<&Value>, kind: ValueKind) -> FieldValue {
    let Some(value) = value else {
        return FieldValue::default_for(kind);
    };

    match kind {
        ValueKind::Number => match value {
            Value::Number(n) => FieldValue::Number(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => FieldValue::Number(parse_loose_number(s)),
            _ => FieldValue::Number(0.0),
        },
        ValueKind::Text => match value {
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Number(n) => FieldValue::Text(n.to_string()),
            Value::Bool(b) => FieldValue::Text(b.to_string()),
            _ => FieldValue::Text(String::new()),
        },
    }
}

/// Parse a number out of a string, tolerating currency symbols and
/// thousands separators.
fn parse_loose_number(s: &str) -> f64 {
    if let Ok(n) = s.trim().parse::<f64>() {
        return n;
    }
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse().unwrap_or(0.0)
}
