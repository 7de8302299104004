//! Instruction texts sent to the document-understanding service.
//!
//! Centralising every instruction here keeps a single source of truth for
//! wire-visible behaviour and lets unit tests inspect the exact text without
//! spinning up a real service.

use crate::model::FieldSpec;
use std::fmt::Write;

/// Instruction asking the classifier to report invoice page boundaries.
///
/// The response contract is a bare JSON array of `{"start", "end"}` objects;
/// fenced code blocks are tolerated and stripped by the response parser.
pub const RANGE_INSTRUCTION: &str = "This PDF contains multiple distinct invoices. \
Identify the start and end page numbers for each individual invoice. \
Return the result strictly as a JSON array of objects, e.g., \
[{\"start\": 1, \"end\": 2}, {\"start\": 3, \"end\": 3}]. \
Do not include any markdown formatting or explanations.";

/// Build the extraction instruction for the requested field set.
///
/// Embeds a JSON skeleton listing each field name against its inferred
/// `string`/`number` type so the model returns exactly the requested keys.
pub fn extraction_instruction(fields: &[FieldSpec]) -> String {
    let mut skeleton = String::from("{\n");
    for (i, spec) in fields.iter().enumerate() {
        let _ = write!(skeleton, "  \"{}\": {}", spec.name, spec.kind.schema_name());
        if i + 1 < fields.len() {
            skeleton.push(',');
        }
        skeleton.push('\n');
    }
    skeleton.push('}');

    format!(
        "Extract the following fields from the provided PDF and return them as valid JSON.\n\
         Use \"\" for missing strings, or 0 for missing numbers.\n\
         For fields related to cost, price, or amount, extract only the numeric value \
         without any currency symbol.\n\
         For date fields, use YYYY-MM-DD format if possible.\n\
         \n\
         Return JSON structure:\n\
         {skeleton}"
    )
}
