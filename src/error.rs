//! Error types for the pdf-toolbox library.
//!
//! Failures fall into the classes a job can actually hit:
//!
//! * [`ValidationError`]: **Local**: bad file type or size, a missing
//!   parameter, an invalid page selection. Detected before any request is
//!   built and never reaches the network.
//!
//! * [`PreviewFailure`]: **Recoverable**: fetching page thumbnails failed.
//!   The job drops back to `Staged`; nothing was processed yet.
//!
//! * [`ProcessingFailure`]: **Terminal**: the submission itself failed
//!   (transport, timeout, non-2xx, unreadable response). Stored in
//!   [`crate::job::JobState::Error`]; only a reset leaves it.
//!
//! * [`ShareError`]: **Non-fatal**: handing the result to a share target
//!   failed or was cancelled. Download stays available.
//!
//! [`ToolboxError`] wraps all of them for the fallible library calls.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Message shown when the server supplied no usable detail.
pub const GENERIC_PROCESSING_MESSAGE: &str = "An error occurred during processing.";

/// All errors returned by the pdf-toolbox library.
#[derive(Debug, Error)]
pub enum ToolboxError {
    // ── Registry ──────────────────────────────────────────────────────────
    /// The tool id does not resolve to a known tool.
    #[error("Tool not found: '{id}'\nRun `pdftool tools` to see the available tools.")]
    UnknownTool { id: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Workflow errors ───────────────────────────────────────────────────
    /// A trigger was pulled while a network operation is in flight.
    #[error("Job is busy ({state}); wait for it to finish or reset")]
    Busy { state: String },

    /// The operation is not valid in the job's current state.
    #[error("Cannot {action} while the job is {state}")]
    InvalidState { action: &'static str, state: String },

    /// Local validation failed; nothing was sent.
    #[error("{0}")]
    Validation(ValidationErrors),

    /// Page previews could not be fetched.
    #[error(transparent)]
    Preview(#[from] PreviewFailure),

    /// The submission failed; the job is now in its error state.
    #[error(transparent)]
    Processing(#[from] ProcessingFailure),

    // ── Result handling ───────────────────────────────────────────────────
    /// The job has no result to present.
    #[error("There is no result to download yet")]
    NothingToDownload,

    /// Sharing failed; downloading is still possible.
    #[error("Sharing failed: {reason}\nUse download instead.")]
    ShareFailed { reason: String },

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationErrors> for ToolboxError {
    fn from(errors: ValidationErrors) -> Self {
        ToolboxError::Validation(errors)
    }
}

impl From<ValidationError> for ToolboxError {
    fn from(error: ValidationError) -> Self {
        ToolboxError::Validation(ValidationErrors(vec![error]))
    }
}

/// A single local validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    /// No file is staged.
    #[error("Please upload a file first.")]
    NoFiles,

    /// A candidate file has an extension the tool does not accept.
    #[error("'{name}' is not a supported file type (expected {accepted})")]
    UnsupportedType { name: String, accepted: String },

    /// A candidate file exceeds the size ceiling.
    #[error("'{name}' is too large ({size} bytes). Maximum size is {limit} bytes.")]
    TooLarge { name: String, size: u64, limit: u64 },

    /// A required parameter was left empty.
    #[error("Please provide {label}.")]
    MissingParameter { key: String, label: String },

    /// An enumerated parameter holds a value outside its option list.
    #[error("'{value}' is not a valid choice for {key} (expected one of: {allowed})")]
    InvalidChoice {
        key: String,
        value: String,
        allowed: String,
    },

    /// A numeric parameter could not be parsed.
    #[error("'{raw}' is not a number for {key}")]
    InvalidNumber { key: String, raw: String },

    /// A conditionally required asset is missing.
    #[error("Please attach {label}.")]
    MissingAsset { key: String, label: String },

    /// The key is not declared by the tool.
    #[error("Tool '{tool}' has no parameter named '{key}'")]
    UnknownParameter { tool: String, key: String },

    /// The value kind does not fit the parameter's declared kind.
    #[error("Parameter '{key}' does not accept this kind of value")]
    WrongValueKind { key: String },

    /// Page thumbnails have not been loaded for a page-selection tool.
    #[error("Page previews are not loaded yet.")]
    PreviewsNotLoaded,

    /// The page selection is empty.
    #[error("Select at least one page.")]
    NoPagesSelected,

    /// Every page is selected; at least one must remain.
    #[error("You cannot remove all {total} pages; at least one page must remain.")]
    AllPagesSelected { total: usize },

    /// A page number outside the previewed document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: u32, total: usize },
}

/// A non-empty list of validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn contains(&self, error: &ValidationError) -> bool {
        self.0.contains(error)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        f.write_str(&messages.join("\n"))
    }
}

/// Why an intake candidate was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionCode {
    UnsupportedType,
    TooLarge,
}

/// A rejected intake candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionReason {
    pub file: String,
    pub code: RejectionCode,
    pub error: ValidationError,
}

/// Page previews could not be fetched. Recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Could not load page previews: {message}")]
pub struct PreviewFailure {
    pub message: String,
}

/// Classification of a failed submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// No response within the configured bound.
    Timeout,
    /// Connection-level failure.
    Transport,
    /// The server answered with a non-success status.
    Status(u16),
    /// A success status whose body did not match the tool's response kind.
    MalformedResponse,
}

/// A failed submission, normalized into one user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ProcessingFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ProcessingFailure {
    /// Build a failure, preferring server-provided detail over the generic message.
    pub fn new(kind: FailureKind, detail: Option<String>) -> Self {
        let message = detail
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| GENERIC_PROCESSING_MESSAGE.to_string());
        Self { kind, message }
    }
}

/// Outcome of a failed share attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShareError {
    /// The user dismissed the share sheet.
    #[error("Share cancelled")]
    Cancelled,

    /// The share target failed.
    #[error("Share failed: {0}")]
    Failed(String),
}
