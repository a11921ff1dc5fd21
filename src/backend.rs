//! Transport to the processing server.
//!
//! [`ProcessingBackend`] is the seam between the job engine and the network.
//! [`HttpBackend`] speaks the real multipart protocol over reqwest; tests
//! inject scripted implementations instead.

use crate::config::ClientConfig;
use crate::error::{FailureKind, ProcessingFailure, ToolboxError, GENERIC_PROCESSING_MESSAGE};
use crate::pipeline::intake::StagedFile;
use crate::pipeline::request::JobRequest;
use crate::pipeline::response::filename_from_content_disposition;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Endpoint that renders page thumbnails.
pub const PREVIEW_ENDPOINT: &str = "preview-pages";

/// Thumbnail listing returned by the preview endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub total_pages: u32,
    pub pages: Vec<RawPagePreview>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPagePreview {
    pub page_number: u32,
    /// Data URI or bare base64.
    pub image_data: String,
}

/// A successful (2xx) processing response.
#[derive(Debug, Clone, Default)]
pub struct BackendResponse {
    pub body: Vec<u8>,
    /// File name declared via `Content-Disposition`, if any.
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

/// Why a backend call failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("server returned HTTP {status}")]
    Status { status: u16, detail: Option<String> },

    #[error("unreadable response: {0}")]
    Decode(String),
}

impl BackendError {
    /// The message shown to the user: server detail where there is one.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Status {
                detail: Some(detail),
                ..
            } if !detail.trim().is_empty() => detail.trim().to_string(),
            _ => GENERIC_PROCESSING_MESSAGE.to_string(),
        }
    }
}

impl From<BackendError> for ProcessingFailure {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Timeout => ProcessingFailure::new(FailureKind::Timeout, None),
            BackendError::Transport(_) => ProcessingFailure::new(FailureKind::Transport, None),
            BackendError::Status { status, detail } => {
                ProcessingFailure::new(FailureKind::Status(status), detail)
            }
            BackendError::Decode(_) => ProcessingFailure::new(FailureKind::MalformedResponse, None),
        }
    }
}

/// Something that can run tool jobs and render page previews.
#[async_trait]
pub trait ProcessingBackend: Send + Sync {
    /// Submit one job and return the raw successful response.
    async fn process(&self, request: &JobRequest) -> Result<BackendResponse, BackendError>;

    /// Ask for page thumbnails of a single document.
    async fn preview_pages(&self, file: &StagedFile) -> Result<PreviewResponse, BackendError>;
}

/// Multipart-over-HTTP backend.
pub struct HttpBackend {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, ToolboxError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pdf-toolbox/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ToolboxError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    async fn post(
        &self,
        endpoint: &str,
        form: Form,
        timeout: Duration,
    ) -> Result<reqwest::Response, BackendError> {
        let url = self.config.api_url(endpoint);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(timeout)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.bytes().await.unwrap_or_default();
        let detail = detail_from_body(&body);
        warn!("POST {} failed with HTTP {}", url, status.as_u16());
        Err(BackendError::Status {
            status: status.as_u16(),
            detail,
        })
    }
}

#[async_trait]
impl ProcessingBackend for HttpBackend {
    async fn process(&self, request: &JobRequest) -> Result<BackendResponse, BackendError> {
        let mut form = Form::new();
        for part in &request.files {
            form = form.part(part.field.clone(), file_part(&part.file)?);
        }
        for (key, value) in &request.fields {
            form = form.text(key.clone(), value.clone());
        }

        let response = self
            .post(request.tool_id, form, self.config.request_timeout())
            .await?;
        let headers = response.headers();
        let filename = headers
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_content_disposition);
        let content_type = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(transport_error)?.to_vec();
        debug!("Received {} bytes from '{}'", body.len(), request.tool_id);

        Ok(BackendResponse {
            body,
            filename,
            content_type,
        })
    }

    async fn preview_pages(&self, file: &StagedFile) -> Result<PreviewResponse, BackendError> {
        let form = Form::new().part("file", file_part(file)?);
        let response = self
            .post(PREVIEW_ENDPOINT, form, self.config.preview_timeout())
            .await?;
        let body = response.bytes().await.map_err(transport_error)?;
        serde_json::from_slice(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

fn file_part(file: &StagedFile) -> Result<Part, BackendError> {
    Part::bytes(file.bytes().to_vec())
        .file_name(file.name().to_string())
        .mime_str(file.mime_type())
        .map_err(|e| BackendError::Transport(e.to_string()))
}

fn transport_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Transport(e.to_string())
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Pull `detail` out of a `{"detail": ...}` error body.
fn detail_from_body(body: &[u8]) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    match parsed.detail {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
        serde_json::Value::Null | serde_json::Value::String(_) => None,
        other => Some(other.to_string()),
    }
}
