//! Client configuration.
//!
//! All knobs that govern how jobs talk to the processing server live in
//! [`ClientConfig`], built via its [`ClientConfigBuilder`]. The job engine
//! only ever reads it; nothing here is mutated once a job exists.

use crate::error::ToolboxError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-file size ceiling enforced before any request is sent: 10 MiB.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Upper bound on a submission or preview round trip, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Configuration for talking to a processing server.
///
/// Built via [`ClientConfig::builder()`] or using [`ClientConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_toolbox::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("https://pdf.example.com")
///     .request_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.api_url("merge"), "https://pdf.example.com/api/merge");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server origin; endpoints live under `{base_url}/api/`. Default: `http://localhost:8000`.
    pub base_url: String,

    /// Upper bound on a job submission in seconds. Default: 60.
    ///
    /// A submission that has not completed by then fails into the job's
    /// error state with [`crate::error::FailureKind::Timeout`].
    pub request_timeout_secs: u64,

    /// Upper bound on a page-preview fetch in seconds. Default: 60.
    pub preview_timeout_secs: u64,

    /// Largest accepted upload, in bytes. Default: 10 MiB.
    pub max_file_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            preview_timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Full URL of an endpoint under `/api/`.
    pub fn api_url(&self, endpoint: &str) -> String {
        format!("{}/api/{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn preview_timeout(&self) -> Duration {
        Duration::from_secs(self.preview_timeout_secs)
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn preview_timeout_secs(mut self, secs: u64) -> Self {
        self.config.preview_timeout_secs = secs;
        self
    }

    pub fn max_file_bytes(mut self, bytes: u64) -> Self {
        self.config.max_file_bytes = bytes;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, ToolboxError> {
        let c = &self.config;
        let url = reqwest::Url::parse(&c.base_url).map_err(|e| {
            ToolboxError::InvalidConfig(format!("base URL '{}' is invalid: {}", c.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ToolboxError::InvalidConfig(format!(
                "base URL must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if c.request_timeout_secs == 0 || c.preview_timeout_secs == 0 {
            return Err(ToolboxError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.max_file_bytes == 0 {
            return Err(ToolboxError::InvalidConfig(
                "Maximum file size must be > 0".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_server_limits() {
        let c = ClientConfig::default();
        assert_eq!(c.max_file_bytes, 10_485_760);
        assert_eq!(c.request_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn api_url_tolerates_trailing_slash() {
        let c = ClientConfig::builder()
            .base_url("http://127.0.0.1:9000/")
            .build()
            .unwrap();
        assert_eq!(c.api_url("preview-pages"), "http://127.0.0.1:9000/api/preview-pages");
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = ClientConfig::builder().base_url("ftp://host").build();
        assert!(matches!(err, Err(ToolboxError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = ClientConfig::builder().request_timeout_secs(0).build();
        assert!(matches!(err, Err(ToolboxError::InvalidConfig(_))));
    }
}
