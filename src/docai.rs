//! Document-understanding service seam and the Gemini implementation.
//!
//! [`DocumentAi`] is the single trait behind which every model call hides:
//! request = whole-document PDF bytes + instruction text, response = raw
//! text. Retry, fence-stripping, and JSON parsing live on this side of the
//! seam so any backend (or a test mock) gets identical treatment.
//!
//! Models routinely wrap JSON answers in ```` ```json ```` fences despite
//! being told not to; [`strip_code_fences`] removes them before parsing and
//! a parse failure surfaces as [`PipelineError::Format`] carrying the raw
//! text for diagnostics.

use crate::error::PipelineError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// External document-understanding service.
///
/// Implementations map transport-level rate limiting (HTTP 429) to
/// [`PipelineError::RateLimited`] so the shared retry policy can react;
/// every other failure is final.
#[async_trait]
pub trait DocumentAi: Send + Sync {
    /// Send the document and instruction; return the model's raw text reply.
    async fn analyze(&self, pdf: &[u8], instruction: &str) -> Result<String, PipelineError>;
}

// ── Response parsing ─────────────────────────────────────────────────────

static RE_CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?").unwrap());

/// Remove fenced code-block markers and surrounding whitespace.
pub fn strip_code_fences(raw: &str) -> String {
    RE_CODE_FENCE.replace_all(raw, "").trim().to_string()
}

/// Strip fences and parse the reply as JSON.
///
/// The `Format` error keeps the unmodified reply so operators can see what
/// the model actually produced.
pub fn parse_json_reply(raw: &str) -> Result<Value, PipelineError> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(&cleaned).map_err(|e| PipelineError::Format {
        detail: format!("invalid JSON: {e}"),
        raw: raw.to_string(),
    })
}

// ── Gemini client ────────────────────────────────────────────────────────

/// Default Gemini model for both segmentation and extraction.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// [`DocumentAi`] implementation over the Gemini `generateContent` REST API.
///
/// The PDF goes inline as base64 `inline_data` next to the instruction text,
/// the same multimodal request shape for both pipeline stages.
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Create a client for the given API key and model.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<GeminiClient, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PipelineError::Internal(format!("HTTP client: {e}")))?;

        Ok(GeminiClient {
            client,
            base_url: GEMINI_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Point the client at a different host (test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> GeminiClient {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl DocumentAi for GeminiClient {
    async fn analyze(&self, pdf: &[u8], instruction: &str) -> Result<String, PipelineError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let body = json!({
            "contents": [{
                "parts": [
                    {
                        "inline_data": {
                            "mime_type": "application/pdf",
                            "data": BASE64.encode(pdf),
                        }
                    },
                    { "text": instruction },
                ]
            }]
        });

        debug!(model = %self.model, pdf_bytes = pdf.len(), "calling document service");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Api {
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let detail = response.text().await.unwrap_or_default();
            return Err(PipelineError::RateLimited {
                detail: format!("HTTP 429: {}", truncate(&detail, 200)),
            });
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PipelineError::Api {
                message: format!("HTTP {status}: {}", truncate(&detail, 200)),
            });
        }

        let value: Value = response.json().await.map_err(|e| PipelineError::Api {
            message: format!("unreadable response body: {e}"),
        })?;

        extract_reply_text(&value)
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_reply_text(value: &Value) -> Result<String, PipelineError> {
    let parts = value
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array);

    let text: String = match parts {
        Some(parts) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect(),
        None => String::new(),
    };

    if text.is_empty() {
        return Err(PipelineError::Api {
            message: "response contained no candidate text".into(),
        });
    }
    Ok(text)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fences() {
        let raw = "```json\n[{\"start\": 1, \"end\": 2}]\n```";
        assert_eq!(strip_code_fences(raw), "[{\"start\": 1, \"end\": 2}]");
    }

    #[test]
    fn strips_bare_fences_and_whitespace() {
        let raw = "\n```\n{\"a\": 1}\n```\n";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn parse_failure_carries_the_raw_reply() {
        let raw = "Sorry, I cannot find any invoices here.";
        match parse_json_reply(raw) {
            Err(PipelineError::Format { raw: kept, .. }) => assert_eq!(kept, raw),
            other => panic!("expected Format error, got {:?}", other),
        }
    }

    #[test]
    fn parses_fenced_json() {
        let value = parse_json_reply("```json\n{\"Total\": 12.5}\n```").unwrap();
        assert_eq!(value["Total"], 12.5);
    }

    #[test]
    fn reply_text_concatenates_candidate_parts() {
        let value = json!({
            "candidates": [{
                "content": { "parts": [ {"text": "[{\"start\""}, {"text": ": 1}]"} ] }
            }]
        });
        assert_eq!(extract_reply_text(&value).unwrap(), "[{\"start\": 1}]");
    }

    #[test]
    fn empty_reply_is_an_api_error() {
        let value = json!({ "candidates": [] });
        assert!(matches!(
            extract_reply_text(&value),
            Err(PipelineError::Api { .. })
        ));
    }
}
