//! Configuration for batch processing and bulk push.
//!
//! Everything is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. The defaults encode the production timing
//! contract: five rate-limit attempts starting at a 5 s backoff, and a 3 s
//! pause between consecutive DMS uploads.

use crate::error::PipelineError;
use crate::progress::ProgressCallback;
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Connection settings for the document-management system.
#[derive(Debug, Clone)]
pub struct DmsConfig {
    /// Base URL, e.g. `https://dms.example.com`.
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// DMS document-type identifier assigned to every upload.
    pub doc_type_id: String,
    /// Optional reviewer assigned to every upload.
    pub checker_id: Option<String>,
}

/// Configuration for a processing run.
///
/// Built via [`BatchConfig::builder()`]:
///
/// ```rust
/// use invoice_batcher::BatchConfig;
///
/// let config = BatchConfig::builder()
///     .fields(["Invoice Number", "Vendor", "Total Amount"])
///     .output_dir("uploads")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Field names to extract from each invoice, in request order.
    /// A processing run requires at least one; a push-only config needs none.
    pub fields: Vec<String>,

    /// Maximum attempts per model call when rate limited. Default: 5.
    pub max_attempts: u32,

    /// Initial backoff after a 429, doubling per attempt. Default: 5000 ms.
    pub base_delay_ms: u64,

    /// Pause between consecutive DMS upload attempts. Default: 3000 ms.
    pub throttle_ms: u64,

    /// Directory receiving the split PDFs. Default: `uploads`.
    pub output_dir: PathBuf,

    /// Model identifier for the document service.
    /// Default: [`crate::docai::DEFAULT_GEMINI_MODEL`].
    pub model: String,

    /// Per-model-call HTTP timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// DMS connection settings; `None` disables bulk push.
    pub dms: Option<DmsConfig>,

    /// Optional progress event receiver.
    pub progress_callback: Option<ProgressCallback>,

    /// Clock used for backoff and throttle pauses. Tests inject a recording
    /// implementation; production uses [`TokioSleeper`].
    pub sleeper: Arc<dyn Sleeper>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            max_attempts: 5,
            base_delay_ms: 5000,
            throttle_ms: 3000,
            output_dir: PathBuf::from("uploads"),
            model: crate::docai::DEFAULT_GEMINI_MODEL.to_string(),
            api_timeout_secs: 120,
            dms: None,
            progress_callback: None,
            sleeper: Arc::new(TokioSleeper),
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("fields", &self.fields)
            .field("max_attempts", &self.max_attempts)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("throttle_ms", &self.throttle_ms)
            .field("output_dir", &self.output_dir)
            .field("model", &self.model)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("dms", &self.dms.as_ref().map(|d| d.base_url.as_str()))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl BatchConfig {
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }

    /// Retry policy derived from the attempt and delay settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
        }
    }

    /// Upload throttle as a duration.
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

/// Builder for [`BatchConfig`].
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn base_delay_ms(mut self, ms: u64) -> Self {
        self.config.base_delay_ms = ms;
        self
    }

    pub fn throttle_ms(mut self, ms: u64) -> Self {
        self.config.throttle_ms = ms;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn dms(mut self, dms: DmsConfig) -> Self {
        self.config.dms = Some(dms);
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.config.sleeper = sleeper;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, PipelineError> {
        let c = &self.config;
        if c.max_attempts == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if let Some(dms) = &c.dms {
            if dms.base_url.is_empty() {
                return Err(PipelineError::InvalidConfig(
                    "DMS base URL must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_production_timing_contract() {
        let config = BatchConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay_ms, 5000);
        assert_eq!(config.throttle_ms, 3000);
        assert_eq!(config.output_dir, PathBuf::from("uploads"));
    }

    #[test]
    fn builder_sets_fields_in_order() {
        let config = BatchConfig::builder()
            .fields(["Vendor", "Total Amount"])
            .build()
            .unwrap();
        assert_eq!(config.fields, vec!["Vendor", "Total Amount"]);
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let err = BatchConfig::builder().max_attempts(0).build();
        assert!(matches!(err, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn empty_dms_url_is_rejected() {
        let err = BatchConfig::builder()
            .dms(DmsConfig {
                base_url: String::new(),
                username: "u".into(),
                password: "p".into(),
                doc_type_id: "1".into(),
                checker_id: None,
            })
            .build();
        assert!(matches!(err, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn retry_policy_reflects_the_settings() {
        let config = BatchConfig::builder()
            .max_attempts(3)
            .base_delay_ms(100)
            .build()
            .unwrap();
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(100));
    }
}
