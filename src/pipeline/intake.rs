//! File intake: validate candidate files against a tool and stage them.
//!
//! Rules run per candidate, in order:
//! 1. the extension must be one the tool accepts (case-insensitive),
//! 2. the size must not exceed the configured ceiling,
//! 3. single-file tools keep only the first accepted candidate.
//!
//! Sizes come from file metadata, so an oversized or mistyped file is
//! rejected without ever being read into memory.

use crate::error::{RejectionCode, RejectionReason, ToolboxError, ValidationError};
use crate::registry::{has_extension, Arity, ToolSpec};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// A file accepted by intake. Immutable once staged.
#[derive(Clone, PartialEq, Eq)]
pub struct StagedFile {
    name: String,
    bytes: Arc<[u8]>,
}

impl StagedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Declared file name, as the user supplied it.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// File name without its final extension.
    pub fn stem(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }

    /// MIME type derived from the extension.
    pub fn mime_type(&self) -> &'static str {
        mime_for(&self.name)
    }
}

impl fmt::Debug for StagedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedFile")
            .field("name", &self.name)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Where a candidate's bytes come from.
#[derive(Debug, Clone)]
enum Source {
    Memory(Vec<u8>),
    Path(PathBuf),
}

/// A user-selected file that has not been validated yet.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    name: String,
    size: u64,
    source: Source,
}

impl CandidateFile {
    /// A candidate held in memory.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            source: Source::Memory(bytes),
        }
    }

    /// A candidate on disk. Only metadata is read here.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ToolboxError> {
        let path = path.as_ref().to_path_buf();
        let meta = std::fs::metadata(&path).map_err(|e| io_error(&path, e))?;
        if !meta.is_file() {
            return Err(ToolboxError::FileNotFound { path });
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            size: meta.len(),
            source: Source::Path(path),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    fn load(self) -> Result<StagedFile, ToolboxError> {
        let bytes = match self.source {
            Source::Memory(bytes) => bytes,
            Source::Path(path) => std::fs::read(&path).map_err(|e| io_error(&path, e))?,
        };
        Ok(StagedFile::new(self.name, bytes))
    }

    /// Check type then size, returning the first violated rule.
    fn check(&self, extensions: &[&str], accepted_display: &str, max_bytes: u64) -> Result<(), RejectionReason> {
        if !has_extension(&self.name, extensions) {
            return Err(RejectionReason {
                file: self.name.clone(),
                code: RejectionCode::UnsupportedType,
                error: ValidationError::UnsupportedType {
                    name: self.name.clone(),
                    accepted: accepted_display.to_string(),
                },
            });
        }
        if self.size > max_bytes {
            return Err(RejectionReason {
                file: self.name.clone(),
                code: RejectionCode::TooLarge,
                error: ValidationError::TooLarge {
                    name: self.name.clone(),
                    size: self.size,
                    limit: max_bytes,
                },
            });
        }
        Ok(())
    }
}

/// Outcome of one intake (drop) event.
#[derive(Debug, Default)]
pub struct IntakeReport {
    pub accepted: Vec<StagedFile>,
    pub rejected: Vec<RejectionReason>,
    /// Accepted candidates dropped because the tool takes a single file.
    pub ignored: usize,
}

/// Validate `candidates` against `spec` and load the accepted ones.
///
/// Only I/O failures on path-backed candidates are errors; rule violations
/// are reported in [`IntakeReport::rejected`].
pub fn stage(
    spec: &ToolSpec,
    candidates: Vec<CandidateFile>,
    max_bytes: u64,
) -> Result<IntakeReport, ToolboxError> {
    let accepted_display = spec.accepted_display();
    let mut report = IntakeReport::default();

    for candidate in candidates {
        if let Err(rejection) = candidate.check(spec.accepted_extensions, &accepted_display, max_bytes) {
            warn!("Rejected '{}': {:?}", rejection.file, rejection.code);
            report.rejected.push(rejection);
            continue;
        }
        if spec.arity == Arity::Single && !report.accepted.is_empty() {
            debug!("Ignoring extra file '{}' for single-file tool", candidate.name);
            report.ignored += 1;
            continue;
        }
        report.accepted.push(candidate.load()?);
    }

    debug!(
        "Intake for '{}': {} accepted, {} rejected, {} ignored",
        spec.id,
        report.accepted.len(),
        report.rejected.len(),
        report.ignored
    );
    Ok(report)
}

/// Validate and load a file attached as a parameter (e.g. a watermark image).
pub fn stage_asset(
    candidate: CandidateFile,
    extensions: &[&str],
    max_bytes: u64,
) -> Result<StagedFile, ToolboxError> {
    let display = extensions
        .iter()
        .map(|e| format!(".{e}"))
        .collect::<Vec<_>>()
        .join(", ");
    candidate
        .check(extensions, &display, max_bytes)
        .map_err(|r| ToolboxError::from(r.error))?;
    candidate.load()
}

fn io_error(path: &Path, e: std::io::Error) -> ToolboxError {
    match e.kind() {
        std::io::ErrorKind::NotFound => ToolboxError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => ToolboxError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ToolboxError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    }
}

pub(crate) fn mime_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "java" => "text/x-java-source",
        _ => "application/octet-stream",
    }
}
