//! Core data model: page ranges, split documents, field specs, extraction
//! results, and persisted invoice records.
//!
//! The `details` of a record are deliberately **not** a fixed struct: field
//! names are caller-chosen configuration data, so the mapping is modelled as
//! an insertion-ordered [`FieldMap`] of name → tagged [`FieldValue`]. The map
//! serialises as a plain JSON object, which is the shape the out-of-scope
//! CRUD/export layers consume.

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

// ── Page ranges ──────────────────────────────────────────────────────────

/// An inclusive, 1-indexed page range inside the source document.
///
/// Invariant once clamped: `1 <= start <= end <= page_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    /// Number of pages covered by the range (inclusive on both ends).
    pub fn page_count(&self) -> usize {
        self.end - self.start + 1
    }

    /// Clamp the range into `[1, page_count]`.
    ///
    /// Ranges are trusted as produced by the classifier and not re-validated
    /// for overlap, but each one is bounded defensively before slicing.
    pub fn clamp_to(&self, page_count: usize) -> PageRange {
        let start = self.start.clamp(1, page_count);
        let end = self.end.clamp(start, page_count);
        PageRange { start, end }
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pages {}–{}", self.start, self.end)
    }
}

// ── Split documents ──────────────────────────────────────────────────────

/// Descriptor for one single-invoice PDF cut out of the source document.
///
/// The bytes live on disk at `path`; the descriptor is owned exclusively by
/// the pipeline run that created it until handed to the batch persistor.
#[derive(Debug, Clone)]
pub struct SplitDocument {
    /// Collision-resistant generated filename (`split_{epoch_millis}_{i}.pdf`).
    pub filename: String,
    /// Absolute or run-relative location of the written file.
    pub path: PathBuf,
    /// The clamped source range this document was cut from.
    pub range: PageRange,
    /// Page count of the split document (`range.page_count()`).
    pub pages: usize,
}

// ── Field specs ──────────────────────────────────────────────────────────

/// Value kind inferred from a field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Number,
}

impl ValueKind {
    /// Infer the kind from the field name by case-insensitive substring match:
    /// names mentioning `amount`, `total`, or `price` are numeric.
    pub fn infer(name: &str) -> ValueKind {
        let lower = name.to_lowercase();
        if lower.contains("amount") || lower.contains("total") || lower.contains("price") {
            ValueKind::Number
        } else {
            ValueKind::Text
        }
    }

    /// The type name used in the extraction instruction's JSON skeleton.
    pub fn schema_name(&self) -> &'static str {
        match self {
            ValueKind::Text => "string",
            ValueKind::Number => "number",
        }
    }
}

/// A caller-chosen field to extract, with its inferred value kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: ValueKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>) -> FieldSpec {
        let name = name.into();
        let kind = ValueKind::infer(&name);
        FieldSpec { name, kind }
    }

    /// Build the deduplicated, order-preserving spec list for a request.
    pub fn catalog<S: AsRef<str>>(names: &[S]) -> Vec<FieldSpec> {
        let mut specs: Vec<FieldSpec> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            if !specs.iter().any(|s| s.name == name) {
                specs.push(FieldSpec::new(name));
            }
        }
        specs
    }
}

// ── Field values ─────────────────────────────────────────────────────────

/// A tagged extracted value: free text or a bare number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Default value for a field the model omitted: `""` or `0`.
    pub fn default_for(kind: ValueKind) -> FieldValue {
        match kind {
            ValueKind::Text => FieldValue::Text(String::new()),
            ValueKind::Number => FieldValue::Number(0.0),
        }
    }
}

impl fmt::Display for FieldValue {
    /// Render the value the way it goes over the wire to the DMS:
    /// whole numbers without a trailing `.0`, text verbatim.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
        }
    }
}

// ── Field map ────────────────────────────────────────────────────────────

/// An insertion-ordered mapping of field name → [`FieldValue`].
///
/// Serialises as a JSON object whose key order matches insertion order, so
/// persisted `details` always mirror the requested field order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap(Vec<(String, FieldValue)>);

impl FieldMap {
    pub fn new() -> FieldMap {
        FieldMap(Vec::new())
    }

    /// Insert or replace a value. Replacement keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The key set, in insertion order.
    pub fn keys(&self) -> Vec<&str> {
        self.0.iter().map(|(k, _)| k.as_str()).collect()
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<FieldMap, D::Error> {
        struct FieldMapVisitor;

        impl<'de> Visitor<'de> for FieldMapVisitor {
            type Value = FieldMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field name to string or number")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FieldMap, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, FieldValue>()? {
                    entries.push((key, value));
                }
                Ok(FieldMap(entries))
            }
        }

        deserializer.deserialize_map(FieldMapVisitor)
    }
}

impl FromIterator<(String, FieldValue)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> FieldMap {
        let mut map = FieldMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

// ── Extraction results ───────────────────────────────────────────────────

/// A successful extraction for one split document.
///
/// Contract: the key set equals the requested field names exactly, in request
/// order, with defaults filled in where the model omitted a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub fields: FieldMap,
}

// ── Invoice records ──────────────────────────────────────────────────────

/// DMS push status of a persisted record.
///
/// Transitions: `Pending → Uploaded` or `Pending → Failed`. `Uploaded` is
/// terminal and idempotently skipped on re-runs; `Failed` is retried only by
/// re-invoking the bulk uploader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DmsStatus {
    #[default]
    Pending,
    Uploaded,
    Failed,
}

impl fmt::Display for DmsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DmsStatus::Pending => "Pending",
            DmsStatus::Uploaded => "Uploaded",
            DmsStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// A persisted invoice record, created only from a successful extraction.
///
/// Serialises with camelCase keys — the shape the downstream CRUD and export
/// layers read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRecord {
    pub id: String,
    pub pdf_filename: String,
    pub details: FieldMap,
    pub dms_status: DmsStatus,
    pub created_at: DateTime<Utc>,
}

impl InvoiceRecord {
    /// Create a new record in `Pending` state with a fresh uuid.
    pub fn new(pdf_filename: impl Into<String>, details: FieldMap) -> InvoiceRecord {
        InvoiceRecord {
            id: uuid::Uuid::new_v4().to_string(),
            pdf_filename: pdf_filename.into(),
            details,
            dms_status: DmsStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

// ── Batch output ─────────────────────────────────────────────────────────

/// Per-document outcome of the extract stage, success or failure.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    pub filename: String,
    pub range: PageRange,
    /// `None` on success; the extraction error message otherwise.
    pub error: Option<String>,
}

/// Aggregate counters for one `process_batch` run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchStats {
    /// Invoice ranges the classifier reported.
    pub ranges: usize,
    /// Documents successfully extracted and persisted.
    pub persisted: usize,
    /// Documents whose extraction failed and was dropped.
    pub failed: usize,
    /// Wall-clock duration of the whole run.
    pub total_duration_ms: u64,
}

/// Everything a `process_batch` run produced.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutput {
    /// Persisted records, in source order.
    pub records: Vec<InvoiceRecord>,
    /// One outcome per split document, including dropped failures.
    pub documents: Vec<DocumentOutcome>,
    pub stats: BatchStats,
}

/// Aggregate summary of one bulk DMS push.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    pub uploaded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
}
