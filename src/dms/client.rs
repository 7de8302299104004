//! Raw DMS HTTP surface: token exchange and multipart document upload.
//!
//! [`DmsApi`] exists so the upload policy (token refresh, the single 401
//! retry) can be tested against scripted implementations. The error type
//! keeps exactly one distinction the policy layer needs: was the failure an
//! expired/rejected token, or anything else.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failure modes of a raw DMS call.
#[derive(Debug, Error)]
pub enum DmsApiError {
    /// The server rejected the bearer token (HTTP 401).
    #[error("DMS rejected the access token")]
    Unauthorized,

    /// Any other failure: transport, server error, bad response shape.
    #[error("DMS request failed: {detail}")]
    Other { detail: String },
}

/// One document upload request, fully assembled by the policy layer.
#[derive(Debug, Clone)]
pub struct DmsUpload {
    /// DMS document-type identifier.
    pub doc_type: String,
    /// Filename reported for the multipart file part.
    pub filename: String,
    /// JSON-encoded metadata array.
    pub metas_json: String,
    /// JSON-encoded tag array.
    pub tags_json: String,
    /// Optional checker (reviewer) identifier.
    pub checker: Option<String>,
    /// Raw PDF bytes.
    pub file: Vec<u8>,
}

/// Low-level DMS operations.
#[async_trait]
pub trait DmsApi: Send + Sync {
    /// Exchange credentials for an access token.
    async fn authenticate(&self, username: &str, password: &str)
        -> Result<String, DmsApiError>;

    /// Upload one document under the given bearer token.
    async fn upload(&self, token: &str, upload: DmsUpload) -> Result<(), DmsApiError>;
}

// ── HTTP implementation ──────────────────────────────────────────────────

/// [`DmsApi`] over the DMS REST endpoints.
pub struct HttpDmsClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDmsClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<HttpDmsClient, DmsApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DmsApiError::Other {
                detail: format!("HTTP client: {e}"),
            })?;

        Ok(HttpDmsClient {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DmsApi for HttpDmsClient {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<String, DmsApiError> {
        let url = format!("{}/api/token/", self.base_url);
        let form = Form::new()
            .text("username", username.to_string())
            .text("password", password.to_string());

        debug!(%url, "requesting DMS access token");

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DmsApiError::Other {
                detail: format!("token request failed: {e}"),
            })?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(DmsApiError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(DmsApiError::Other {
                detail: format!("token endpoint returned HTTP {}", response.status()),
            });
        }

        let body: serde_json::Value =
            response.json().await.map_err(|e| DmsApiError::Other {
                detail: format!("unreadable token response: {e}"),
            })?;

        body.get("access")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DmsApiError::Other {
                detail: "token response missing \"access\" field".into(),
            })
    }

    async fn upload(&self, token: &str, upload: DmsUpload) -> Result<(), DmsApiError> {
        let url = format!(
            "{}/api/v1/dms/documents/external/upload/",
            self.base_url
        );

        let mut form = Form::new()
            .text("doc_type", upload.doc_type)
            .text("filename", upload.filename.clone())
            .text("metas", upload.metas_json)
            .text("tags", upload.tags_json)
            .part(
                "file",
                Part::bytes(upload.file)
                    .file_name(upload.filename)
                    .mime_str("application/pdf")
                    .map_err(|e| DmsApiError::Other {
                        detail: format!("multipart file part: {e}"),
                    })?,
            );
        if let Some(checker) = upload.checker {
            form = form.text("checker", checker);
        }

        debug!(%url, "uploading document to DMS");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("JWT {token}"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| DmsApiError::Other {
                detail: format!("upload request failed: {e}"),
            })?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED => Err(DmsApiError::Unauthorized),
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(DmsApiError::Other {
                    detail: format!("upload returned HTTP {s}: {}", body.chars().take(200).collect::<String>()),
                })
            }
        }
    }
}
