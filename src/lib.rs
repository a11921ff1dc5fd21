//! # pdf-toolbox
//!
//! Client-side orchestration for a remote document-processing server.
//!
//! ## Why this crate?
//!
//! Each tool the server offers (merge, split, compress, convert, watermark,
//! sign, delete pages, OCR, …) is a thin `POST /api/{tool}` call. What is
//! hard is everything around it: describing very different parameter shapes
//! with one table, validating files before they leave the machine, a page
//! preview round trip that must finish before some tools can submit, and
//! turning the reply into a named file or a block of text. This crate does
//! that once, for every tool, behind a single [`Job`] state machine.
//!
//! ## Pipeline Overview
//!
//! ```text
//! tool id
//!  │
//!  ├─ 1. Registry  resolve the declarative ToolSpec (fails closed)
//!  ├─ 2. Intake    type filter, 10 MiB ceiling, single/multiple arity
//!  ├─ 3. Preview   page thumbnails + selection (page tools only)
//!  ├─ 4. Params    text, password, choice, scaled sliders, assets
//!  ├─ 5. Submit    one multipart request, bounded by a timeout
//!  └─ 6. Result    file (server or derived name) or extracted text
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_toolbox::{CandidateFile, ClientConfig, HttpBackend, Job, JobResult};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder().base_url("http://localhost:8000").build()?;
//!     let backend = Arc::new(HttpBackend::new(&config)?);
//!
//!     let mut job = Job::new("merge", config, backend)?;
//!     job.stage(vec![
//!         CandidateFile::from_path("a.pdf")?,
//!         CandidateFile::from_path("b.pdf")?,
//!     ])?;
//!     if let JobResult::File { filename, .. } = job.submit().await? {
//!         eprintln!("server produced {filename}");
//!     }
//!     let saved = job.presenter()?.download(".").await?;
//!     println!("{}", saved.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdftool` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pdf-toolbox = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod preferences;
pub mod presenter;
pub mod progress;
pub mod registry;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{BackendError, BackendResponse, HttpBackend, ProcessingBackend};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{
    FailureKind, PreviewFailure, ProcessingFailure, RejectionCode, RejectionReason, ShareError,
    ToolboxError, ValidationError, ValidationErrors,
};
pub use job::{Job, JobPhase, JobState, PreviewFetch, Submission};
pub use pipeline::intake::{CandidateFile, IntakeReport, StagedFile};
pub use pipeline::params::{ParamValue, ParameterBag, ParameterInputs, RawValue};
pub use pipeline::preview::{PagePreview, PageSelectionState, Thumbnail};
pub use pipeline::request::JobRequest;
pub use pipeline::response::JobResult;
pub use presenter::{CommandShare, ResultPresenter, ShareOutcome, SharePayload, ShareTarget};
pub use progress::{JobObserver, NoopObserver, Observer};
pub use registry::{Arity, ParamKind, ParameterDescriptor, ResponseKind, ToolSpec};
