//! Result presentation: download, share, reset.
//!
//! A [`ResultPresenter`] borrows a finished [`Job`] and never mutates the
//! result it shows. Downloads are local-only and repeatable. Sharing goes
//! through a [`ShareTarget`], which may not exist on every platform.

use crate::error::{ShareError, ToolboxError};
use crate::job::Job;
use crate::pipeline::intake::mime_for;
use crate::pipeline::response::JobResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name used when a text result is saved or shared.
pub const TEXT_RESULT_FILENAME: &str = "extracted.txt";

/// Environment variable naming the program [`CommandShare`] runs.
pub const SHARE_COMMAND_ENV: &str = "PDFTOOL_SHARE_COMMAND";

/// Conventional exit status of a program interrupted by the user (128 + SIGINT).
const EXIT_INTERRUPTED: i32 = 130;

/// What a share target receives.
#[derive(Debug, Clone, Copy)]
pub struct SharePayload<'a> {
    pub filename: &'a str,
    pub mime_type: &'a str,
    pub bytes: &'a [u8],
}

/// A native hand-off capability.
#[async_trait]
pub trait ShareTarget: Send + Sync {
    /// Whether sharing exists in this environment at all.
    fn is_available(&self) -> bool;

    /// Finer-grained check for one specific payload.
    fn can_share(&self, payload: &SharePayload<'_>) -> bool;

    /// Hand the payload off. [`ShareError::Cancelled`] means the user backed out.
    async fn share(&self, payload: &SharePayload<'_>) -> Result<(), ShareError>;
}

/// How a share attempt ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    Shared,
    Cancelled,
}

/// Operations over a job's terminal result.
pub struct ResultPresenter<'j> {
    job: &'j mut Job,
}

impl<'j> ResultPresenter<'j> {
    pub(crate) fn new(job: &'j mut Job) -> Self {
        Self { job }
    }

    pub fn result(&self) -> Option<&JobResult> {
        self.job.result()
    }

    /// Name the result is saved under.
    pub fn filename(&self) -> Option<&str> {
        self.payload().ok().map(|p| p.filename)
    }

    fn payload(&self) -> Result<SharePayload<'_>, ToolboxError> {
        match self.job.result() {
            Some(JobResult::File { bytes, filename }) => Ok(SharePayload {
                filename,
                mime_type: mime_for(filename),
                bytes,
            }),
            Some(JobResult::Text { text, .. }) => Ok(SharePayload {
                filename: TEXT_RESULT_FILENAME,
                mime_type: "text/plain",
                bytes: text.as_bytes(),
            }),
            None => Err(ToolboxError::NothingToDownload),
        }
    }

    /// Write the result into `dir` and return the full path.
    ///
    /// Uses atomic write (temp file + rename) so a partial file is never left
    /// under the final name. Calling it again overwrites the same file.
    pub async fn download(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ToolboxError> {
        let payload = self.payload()?;
        let dir = dir.as_ref();
        let path = dir.join(payload.filename);
        let write_err = |source| ToolboxError::OutputWriteFailed {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(dir).await.map_err(write_err)?;
        let tmp_path = dir.join(format!(".{}.tmp", payload.filename));
        let written = match tokio::fs::write(&tmp_path, payload.bytes).await {
            Ok(()) => tokio::fs::rename(&tmp_path, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tokio::fs::remove_file(&tmp_path).await.ok();
            return Err(write_err(e));
        }

        info!("Saved {} ({} bytes)", path.display(), payload.bytes.len());
        Ok(path)
    }

    /// Whether a share button should be shown at all.
    pub fn can_offer_share(&self, target: &dyn ShareTarget) -> bool {
        target.is_available()
            && self
                .payload()
                .map(|p| target.can_share(&p))
                .unwrap_or(false)
    }

    /// Hand the result to `target`.
    ///
    /// A user cancellation is not an error. Any other failure is returned as
    /// [`ToolboxError::ShareFailed`]; [`Self::download`] still works after it.
    pub async fn share(&self, target: &dyn ShareTarget) -> Result<ShareOutcome, ToolboxError> {
        if !target.is_available() {
            return Err(ToolboxError::ShareFailed {
                reason: "no share target is available".into(),
            });
        }
        let payload = self.payload()?;
        if !target.can_share(&payload) {
            return Err(ToolboxError::ShareFailed {
                reason: format!("'{}' cannot be shared here", payload.filename),
            });
        }
        match target.share(&payload).await {
            Ok(()) => {
                info!("Shared {}", payload.filename);
                Ok(ShareOutcome::Shared)
            }
            Err(ShareError::Cancelled) => {
                debug!("Share of {} cancelled", payload.filename);
                Ok(ShareOutcome::Cancelled)
            }
            Err(ShareError::Failed(reason)) => {
                warn!("Share of {} failed: {}", payload.filename, reason);
                Err(ToolboxError::ShareFailed { reason })
            }
        }
    }

    /// Discard the result and everything staged; the job returns to `Idle`.
    pub fn reset(self) {
        self.job.reset();
    }
}

/// Shares by running a user-configured program with the file path as its
/// last argument, e.g. `PDFTOOL_SHARE_COMMAND="xdg-open"`.
#[derive(Debug, Clone, Default)]
pub struct CommandShare {
    command: Vec<String>,
}

impl CommandShare {
    /// `command` is split on whitespace into program and leading arguments.
    pub fn new(command: &str) -> Self {
        Self {
            command: command.split_whitespace().map(str::to_string).collect(),
        }
    }

    /// Read the command from [`SHARE_COMMAND_ENV`]; unavailable when unset.
    pub fn from_env() -> Self {
        std::env::var(SHARE_COMMAND_ENV)
            .map(|c| Self::new(&c))
            .unwrap_or_default()
    }
}

#[async_trait]
impl ShareTarget for CommandShare {
    fn is_available(&self) -> bool {
        !self.command.is_empty()
    }

    fn can_share(&self, payload: &SharePayload<'_>) -> bool {
        !payload.bytes.is_empty()
    }

    async fn share(&self, payload: &SharePayload<'_>) -> Result<(), ShareError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| ShareError::Failed("no share command configured".into()))?;

        let dir = tempfile::tempdir().map_err(|e| ShareError::Failed(format!("tempdir: {e}")))?;
        let path = dir.path().join(payload.filename);
        tokio::fs::write(&path, payload.bytes)
            .await
            .map_err(|e| ShareError::Failed(format!("staging file: {e}")))?;

        debug!("Running share command '{}' on {}", program, path.display());
        let status = tokio::process::Command::new(program)
            .args(args)
            .arg(&path)
            .status()
            .await
            .map_err(|e| ShareError::Failed(format!("{program}: {e}")))?;

        match status.code() {
            Some(0) => Ok(()),
            Some(EXIT_INTERRUPTED) | None => Err(ShareError::Cancelled),
            Some(code) => Err(ShareError::Failed(format!("{program} exited with status {code}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, BackendResponse, PreviewResponse, ProcessingBackend};
    use crate::config::ClientConfig;
    use crate::job::JobState;
    use crate::pipeline::intake::{CandidateFile, StagedFile};
    use crate::pipeline::request::JobRequest;
    use std::sync::{Arc, Mutex};

    struct Echo(&'static [u8]);

    #[async_trait]
    impl ProcessingBackend for Echo {
        async fn process(&self, _request: &JobRequest) -> Result<BackendResponse, BackendError> {
            Ok(BackendResponse {
                body: self.0.to_vec(),
                ..BackendResponse::default()
            })
        }

        async fn preview_pages(&self, _file: &StagedFile) -> Result<PreviewResponse, BackendError> {
            Err(BackendError::Transport("unused".into()))
        }
    }

    struct FakeShare {
        available: bool,
        answer: Result<(), ShareError>,
        seen: Mutex<Vec<String>>,
    }

    impl FakeShare {
        fn new(available: bool, answer: Result<(), ShareError>) -> Self {
            Self {
                available,
                answer,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ShareTarget for FakeShare {
        fn is_available(&self) -> bool {
            self.available
        }

        fn can_share(&self, payload: &SharePayload<'_>) -> bool {
            payload.mime_type != "application/octet-stream"
        }

        async fn share(&self, payload: &SharePayload<'_>) -> Result<(), ShareError> {
            self.seen.lock().unwrap().push(payload.filename.to_string());
            self.answer.clone()
        }
    }

    async fn finished(tool: &str, body: &'static [u8], file: &str) -> Job {
        let mut job = Job::new(tool, ClientConfig::default(), Arc::new(Echo(body))).unwrap();
        job.stage(vec![CandidateFile::from_bytes(file, b"%PDF".to_vec())])
            .unwrap();
        job.submit().await.unwrap();
        job
    }

    #[tokio::test]
    async fn download_is_repeatable_and_reset_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = finished("word-to-pdf", b"%PDF converted", "Letter.docx").await;

        let presenter = job.presenter().unwrap();
        let first = presenter.download(dir.path()).await.unwrap();
        let second = presenter.download(dir.path()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.file_name().unwrap(), "Letter.pdf");
        assert_eq!(std::fs::read(&first).unwrap(), b"%PDF converted");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        presenter.reset();
        assert_eq!(job.state(), &JobState::Idle);
        assert!(job.staged().is_empty());
        assert!(job.inputs().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_download_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory squatting on the target name makes the rename fail.
        std::fs::create_dir(dir.path().join("output.pdf")).unwrap();
        std::fs::write(dir.path().join("output.pdf/keep"), b"x").unwrap();
        let mut job = finished("compress", b"%PDF small", "a.pdf").await;

        let err = job.presenter().unwrap().download(dir.path()).await.unwrap_err();
        assert!(matches!(err, ToolboxError::OutputWriteFailed { .. }));
        assert!(!dir.path().join(".output.pdf.tmp").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn text_result_downloads_as_txt() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = finished("ocr", br#"{"text":"Hello","pages":1}"#, "scan.pdf").await;
        let path = job.presenter().unwrap().download(dir.path()).await.unwrap();
        assert_eq!(path.file_name().unwrap(), TEXT_RESULT_FILENAME);
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Hello");
    }

    #[tokio::test]
    async fn share_cancel_is_silent_and_failure_is_surfaced() {
        let mut job = finished("compress", b"%PDF", "a.pdf").await;
        let presenter = job.presenter().unwrap();

        let cancelled = FakeShare::new(true, Err(ShareError::Cancelled));
        assert_eq!(presenter.share(&cancelled).await.unwrap(), ShareOutcome::Cancelled);

        let broken = FakeShare::new(true, Err(ShareError::Failed("sheet crashed".into())));
        let err = presenter.share(&broken).await.unwrap_err();
        assert!(matches!(err, ToolboxError::ShareFailed { ref reason } if reason == "sheet crashed"));

        let ok = FakeShare::new(true, Ok(()));
        assert_eq!(presenter.share(&ok).await.unwrap(), ShareOutcome::Shared);
        assert_eq!(*ok.seen.lock().unwrap(), vec!["output.pdf".to_string()]);
    }

    #[tokio::test]
    async fn share_is_not_offered_without_capability() {
        let mut job = finished("compress", b"%PDF", "a.pdf").await;
        let presenter = job.presenter().unwrap();
        let missing = FakeShare::new(false, Ok(()));
        assert!(!presenter.can_offer_share(&missing));
        assert!(presenter.share(&missing).await.is_err());
        assert!(missing.seen.lock().unwrap().is_empty());
        assert!(!presenter.can_offer_share(&CommandShare::default()));
    }

    #[test]
    fn command_share_splits_arguments() {
        let share = CommandShare::new("  open  -a Preview ");
        assert!(share.is_available());
        assert_eq!(share.command, vec!["open", "-a", "Preview"]);
        assert!(!CommandShare::new("   ").is_available());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_share_maps_exit_status() {
        let payload = SharePayload {
            filename: "out.pdf",
            mime_type: "application/pdf",
            bytes: b"%PDF",
        };
        assert_eq!(CommandShare::new("true").share(&payload).await, Ok(()));
        assert!(matches!(
            CommandShare::new("false").share(&payload).await,
            Err(ShareError::Failed(_))
        ));
        // `sh <file>` runs the staged payload itself as a script.
        let interrupted = SharePayload {
            filename: "cancel.sh",
            mime_type: "text/plain",
            bytes: b"exit 130\n",
        };
        assert_eq!(
            CommandShare::new("sh").share(&interrupted).await,
            Err(ShareError::Cancelled)
        );
    }
}
