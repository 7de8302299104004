//! Single-document upload policy.
//!
//! [`DmsUploader`] turns an [`InvoiceRecord`] into the DMS wire shape:
//! extracted fields become a metadata array (machine key, raw value,
//! human display name), date-ish values are normalised to `YYYY-MM-DD`,
//! and every document gets the fixed tag pair.
//!
//! The upload contract is deliberately infallible: one re-authentication
//! retry after a 401, then a plain `true`/`false`. Bulk pushes must keep
//! walking past a bad document, so no error escapes this layer.

use crate::dms::auth::AuthTokenProvider;
use crate::dms::client::{DmsApi, DmsApiError, DmsUpload};
use crate::model::{FieldValue, InvoiceRecord};
use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// Tags attached to every uploaded document.
pub const UPLOAD_TAGS: [&str; 2] = ["InvoiceAI", "Processed"];

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Accepted input date layouts, tried in order.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d.%m.%Y"];

/// Uploads one record at a time, handling token refresh.
pub struct DmsUploader {
    api: Arc<dyn DmsApi>,
    auth: AuthTokenProvider,
    doc_type: String,
    checker: Option<String>,
}

impl DmsUploader {
    pub fn new(
        api: Arc<dyn DmsApi>,
        auth: AuthTokenProvider,
        doc_type: impl Into<String>,
        checker: Option<String>,
    ) -> DmsUploader {
        DmsUploader {
            api,
            auth,
            doc_type: doc_type.into(),
            checker,
        }
    }

    /// Upload one record's PDF with its metadata. Never fails; `false`
    /// means the record should be marked [`DmsStatus::Failed`].
    ///
    /// [`DmsStatus::Failed`]: crate::model::DmsStatus::Failed
    pub async fn upload_record(&self, record: &InvoiceRecord, file: Vec<u8>) -> bool {
        let upload = DmsUpload {
            doc_type: self.doc_type.clone(),
            filename: record.pdf_filename.clone(),
            metas_json: build_metas(record),
            tags_json: json!(UPLOAD_TAGS).to_string(),
            checker: self.checker.clone(),
            file,
        };

        match self.try_upload(upload).await {
            Ok(()) => {
                debug!(filename = %record.pdf_filename, "DMS upload succeeded");
                true
            }
            Err(e) => {
                warn!(filename = %record.pdf_filename, error = %e, "DMS upload failed");
                false
            }
        }
    }

    /// One attempt, plus exactly one retry after a rejected token.
    async fn try_upload(&self, upload: DmsUpload) -> Result<(), DmsApiError> {
        let token = self.auth.get().await?;
        match self.api.upload(&token, upload.clone()).await {
            Err(DmsApiError::Unauthorized) => {
                debug!("token rejected, re-authenticating once");
                self.auth.invalidate().await;
                let token = self.auth.get().await?;
                self.api.upload(&token, upload).await
            }
            other => other,
        }
    }
}

// ── Metadata assembly ────────────────────────────────────────────────────

/// Build the JSON metadata array for one record.
fn build_metas(record: &InvoiceRecord) -> String {
    let metas: Vec<serde_json::Value> = record
        .details
        .iter()
        .map(|(name, value)| {
            let rendered = render_value(name, value);
            json!({
                "name": normalize_key(name),
                "value": rendered,
                "displayname": name,
            })
        })
        .collect();
    json!(metas).to_string()
}

/// Lowercase the field name and collapse whitespace runs to underscores.
fn normalize_key(name: &str) -> String {
    RE_WHITESPACE.replace_all(name.trim(), "_").to_lowercase()
}

/// Render one field value, normalising date-ish fields to `YYYY-MM-DD`.
fn render_value(name: &str, value: &FieldValue) -> String {
    let rendered = value.to_string();
    if name.to_lowercase().contains("date") {
        if let Some(normalised) = normalize_date(&rendered) {
            return normalised;
        }
    }
    rendered
}

/// Parse a date in any accepted layout; unparseable values pass through
/// unchanged rather than being discarded.
fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive().format("%Y-%m-%d").to_string());
    }
    None
}
