//! The job orchestrator: one tool, one workflow, one state machine.
//!
//! ```text
//!            stage               begin_preview
//!   Idle ─────────────▶ Staged ◀──────────────▶ Previewing
//!                        │  ▲     finish_preview
//!          start_submission │  │ stage (replaces files)
//!                        ▼  │
//!                    Submitting ──▶ Result | Error
//!
//!   reset: any state ──▶ Idle
//! ```
//!
//! Network work is split into three steps so the caller never has to hold a
//! borrow of the [`Job`] across an `.await`:
//!
//! 1. `start_*` / `begin_*` validate, freeze the inputs and return a ticket,
//! 2. the ticket's `execute()` performs the request,
//! 3. `finish_*` applies the outcome, unless the job was reset meanwhile.
//!
//! [`Job::submit`] and [`Job::load_previews`] chain the three for callers
//! that do not need to interleave anything else.

use crate::backend::ProcessingBackend;
use crate::config::ClientConfig;
use crate::error::{FailureKind, ProcessingFailure, ToolboxError, ValidationError, ValidationErrors};
use crate::pipeline::intake::{self, CandidateFile, IntakeReport, StagedFile};
use crate::pipeline::params::{self, ParameterInputs};
use crate::pipeline::preview::{self, PagePreview, PageSelectionState};
use crate::pipeline::request::{self, JobRequest};
use crate::pipeline::response::{self, JobResult};
use crate::presenter::ResultPresenter;
use crate::progress::{NoopObserver, Observer};
use crate::registry::{self, ToolSpec};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where a job is in its workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Nothing staged.
    Idle,
    /// At least one file staged; parameters may be incomplete.
    Staged,
    /// Page thumbnails are being fetched.
    Previewing,
    /// The request is in flight; inputs are frozen.
    Submitting,
    /// Terminal success.
    Result(JobResult),
    /// Terminal failure; only [`Job::reset`] leaves it.
    Error(ProcessingFailure),
}

impl JobState {
    pub fn phase(&self) -> JobPhase {
        match self {
            JobState::Idle => JobPhase::Idle,
            JobState::Staged => JobPhase::Staged,
            JobState::Previewing => JobPhase::Previewing,
            JobState::Submitting => JobPhase::Submitting,
            JobState::Result(_) => JobPhase::Result,
            JobState::Error(_) => JobPhase::Error,
        }
    }

    /// Whether a network operation is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, JobState::Previewing | JobState::Submitting)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Result(_) | JobState::Error(_))
    }
}

/// Payload-free view of [`JobState`], for observers and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobPhase {
    Idle,
    Staged,
    Previewing,
    Submitting,
    Result,
    Error,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobPhase::Idle => "idle",
            JobPhase::Staged => "staged",
            JobPhase::Previewing => "previewing",
            JobPhase::Submitting => "submitting",
            JobPhase::Result => "finished",
            JobPhase::Error => "failed",
        };
        f.write_str(s)
    }
}

/// A frozen submission, ready to run without borrowing the job.
pub struct Submission {
    generation: u64,
    spec: &'static ToolSpec,
    request: JobRequest,
    staged: Vec<StagedFile>,
    backend: Arc<dyn ProcessingBackend>,
    timeout: Duration,
}

impl Submission {
    pub fn request(&self) -> &JobRequest {
        &self.request
    }

    /// Perform the request, bounded by the configured timeout.
    pub async fn execute(self) -> SubmissionOutcome {
        let call = self.backend.process(&self.request);
        let result = match tokio::time::timeout(self.timeout, call).await {
            Err(_) => Err(ProcessingFailure::new(FailureKind::Timeout, None)),
            Ok(Err(e)) => {
                warn!("'{}' request failed: {}", self.spec.id, e);
                Err(ProcessingFailure::from(e))
            }
            Ok(Ok(resp)) => response::classify(self.spec, resp, &self.staged),
        };
        SubmissionOutcome {
            generation: self.generation,
            result,
        }
    }
}

/// The result of [`Submission::execute`], to be handed back to [`Job::finish_submission`].
#[derive(Debug)]
pub struct SubmissionOutcome {
    generation: u64,
    result: Result<JobResult, ProcessingFailure>,
}

/// A frozen preview fetch for the single staged file.
pub struct PreviewFetch {
    generation: u64,
    file: StagedFile,
    backend: Arc<dyn ProcessingBackend>,
    timeout: Duration,
}

impl PreviewFetch {
    pub async fn execute(self) -> PreviewOutcome {
        let result = preview::fetch_previews(self.backend.as_ref(), &self.file, self.timeout).await;
        PreviewOutcome {
            generation: self.generation,
            result,
        }
    }
}

#[derive(Debug)]
pub struct PreviewOutcome {
    generation: u64,
    result: Result<Vec<PagePreview>, crate::error::PreviewFailure>,
}

/// One tool's workflow.
pub struct Job {
    spec: &'static ToolSpec,
    config: ClientConfig,
    backend: Arc<dyn ProcessingBackend>,
    observer: Observer,
    state: JobState,
    staged: Vec<StagedFile>,
    inputs: ParameterInputs,
    selection: PageSelectionState,
    /// Bumped whenever in-flight work must be disregarded.
    generation: u64,
}

impl Job {
    /// Enter the page for `tool_id`. Fails closed on unknown ids.
    pub fn new(
        tool_id: &str,
        config: ClientConfig,
        backend: Arc<dyn ProcessingBackend>,
    ) -> Result<Self, ToolboxError> {
        let spec = registry::resolve(tool_id)?;
        debug!("Job created for tool '{}'", spec.id);
        Ok(Self {
            spec,
            config,
            backend,
            observer: Arc::new(NoopObserver),
            state: JobState::Idle,
            staged: Vec::new(),
            inputs: ParameterInputs::default(),
            selection: PageSelectionState::default(),
            generation: 0,
        })
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = observer;
        self
    }

    pub fn spec(&self) -> &'static ToolSpec {
        self.spec
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn phase(&self) -> JobPhase {
        self.state.phase()
    }

    pub fn staged(&self) -> &[StagedFile] {
        &self.staged
    }

    pub fn inputs(&self) -> &ParameterInputs {
        &self.inputs
    }

    pub fn selection(&self) -> &PageSelectionState {
        &self.selection
    }

    pub fn result(&self) -> Option<&JobResult> {
        match &self.state {
            JobState::Result(r) => Some(r),
            _ => None,
        }
    }

    // ── Intake ───────────────────────────────────────────────────────────

    /// Validate and stage a drop of files.
    ///
    /// A drop with no accepted file leaves the job untouched. Otherwise the
    /// staged set is replaced, any result or error is cleared, choice
    /// defaults are applied and the job is `Staged`.
    pub fn stage(&mut self, candidates: Vec<CandidateFile>) -> Result<IntakeReport, ToolboxError> {
        self.ensure_not_busy()?;
        let report = intake::stage(self.spec, candidates, self.config.max_file_bytes)?;
        self.observer
            .on_intake(report.accepted.len(), report.rejected.len(), report.ignored);
        if report.accepted.is_empty() {
            return Ok(report);
        }

        self.generation += 1;
        self.staged = report.accepted.clone();
        self.selection = PageSelectionState::default();
        self.inputs.apply_defaults(self.spec);
        info!("Staged {} file(s) for '{}'", self.staged.len(), self.spec.id);
        self.transition(JobState::Staged);
        Ok(report)
    }

    /// Stage files, then fetch previews when the tool needs them.
    ///
    /// A preview failure is returned as an error, but the files stay staged.
    pub async fn stage_and_preview(
        &mut self,
        candidates: Vec<CandidateFile>,
    ) -> Result<IntakeReport, ToolboxError> {
        let report = self.stage(candidates)?;
        if !report.accepted.is_empty() && self.needs_previews() {
            self.load_previews().await?;
        }
        Ok(report)
    }

    // ── Parameters ───────────────────────────────────────────────────────

    /// Mutable access to the raw parameter inputs. Frozen while busy.
    pub fn inputs_mut(&mut self) -> Result<&mut ParameterInputs, ToolboxError> {
        self.ensure_not_busy()?;
        Ok(&mut self.inputs)
    }

    /// Validate and attach a file parameter such as a watermark image.
    pub fn attach_asset(&mut self, key: &str, candidate: CandidateFile) -> Result<(), ToolboxError> {
        self.ensure_not_busy()?;
        let extensions = ParameterInputs::asset_extensions(self.spec, key).ok_or_else(|| {
            ValidationError::UnknownParameter {
                tool: self.spec.id.to_string(),
                key: key.to_string(),
            }
        })?;
        let file = intake::stage_asset(candidate, extensions, self.config.max_file_bytes)?;
        debug!("Attached '{}' as '{}'", file.name(), key);
        self.inputs.attach(key, file);
        Ok(())
    }

    // ── Page selection ───────────────────────────────────────────────────

    /// Whether the tool wants previews and they are not loaded yet.
    pub fn needs_previews(&self) -> bool {
        self.spec.page_selection && self.staged.len() == 1 && !self.selection.is_loaded()
    }

    /// Mutable access to the page selection. Frozen while busy.
    pub fn selection_mut(&mut self) -> Result<&mut PageSelectionState, ToolboxError> {
        self.ensure_not_busy()?;
        Ok(&mut self.selection)
    }

    /// Enter `Previewing` and hand back the fetch to run.
    pub fn begin_preview(&mut self) -> Result<PreviewFetch, ToolboxError> {
        self.ensure_not_busy()?;
        if self.state != JobState::Staged || !self.spec.page_selection {
            return Err(self.invalid("load previews"));
        }
        let file = match self.staged.as_slice() {
            [only] => only.clone(),
            _ => return Err(self.invalid("load previews")),
        };
        self.transition(JobState::Previewing);
        Ok(PreviewFetch {
            generation: self.generation,
            file,
            backend: Arc::clone(&self.backend),
            timeout: self.config.preview_timeout(),
        })
    }

    /// Apply a preview outcome. Returns `Ok(false)` if it was stale.
    ///
    /// Either way the job returns to `Staged`; a failure is reported as
    /// [`ToolboxError::Preview`] and is not terminal.
    pub fn finish_preview(&mut self, outcome: PreviewOutcome) -> Result<bool, ToolboxError> {
        if outcome.generation != self.generation || self.state != JobState::Previewing {
            debug!("Discarding stale preview outcome");
            return Ok(false);
        }
        self.transition(JobState::Staged);
        let previews = outcome.result?;
        self.observer.on_previews_loaded(previews.len());
        info!("Loaded {} page previews", previews.len());
        self.selection.set_previews(previews);
        Ok(true)
    }

    /// Fetch previews for the staged file and wait for them.
    pub async fn load_previews(&mut self) -> Result<usize, ToolboxError> {
        let fetch = self.begin_preview()?;
        let outcome = fetch.execute().await;
        self.finish_preview(outcome)?;
        Ok(self.selection.previews().len())
    }

    // ── Submission ───────────────────────────────────────────────────────

    /// Check everything a submission needs, reporting all problems at once.
    pub fn validate(&self) -> Result<(), ToolboxError> {
        self.prepare().map(|_| ())
    }

    fn prepare(&self) -> Result<JobRequest, ToolboxError> {
        self.ensure_not_busy()?;
        match self.state {
            JobState::Idle => return Err(ValidationError::NoFiles.into()),
            JobState::Staged => {}
            _ => return Err(self.invalid("submit")),
        }

        let mut errors = Vec::new();
        let bag = match params::collect(self.spec, &self.inputs) {
            Ok(bag) => Some(bag),
            Err(ValidationErrors(e)) => {
                errors.extend(e);
                None
            }
        };
        if self.spec.page_selection {
            if let Err(e) = self.selection.validate() {
                errors.push(e);
            }
        }
        match bag {
            Some(bag) if errors.is_empty() => Ok(request::build_request(
                self.spec,
                &self.staged,
                &bag,
                self.spec.page_selection.then_some(&self.selection),
            )),
            _ => Err(ValidationErrors(errors).into()),
        }
    }

    /// Freeze the inputs, enter `Submitting` and hand back the request to run.
    ///
    /// On a validation failure the job stays `Staged`.
    pub fn start_submission(&mut self) -> Result<Submission, ToolboxError> {
        let request = self.prepare()?;
        self.observer.on_submit(self.spec.id, self.staged.len());
        info!("Submitting '{}' with {} file(s)", self.spec.id, self.staged.len());
        debug!(
            "Request fields: {:?}",
            request.fields.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>()
        );
        self.transition(JobState::Submitting);
        Ok(Submission {
            generation: self.generation,
            spec: self.spec,
            request,
            staged: self.staged.clone(),
            backend: Arc::clone(&self.backend),
            timeout: self.config.request_timeout(),
        })
    }

    /// Apply a submission outcome. Returns `false` if it was stale.
    pub fn finish_submission(&mut self, outcome: SubmissionOutcome) -> bool {
        if outcome.generation != self.generation || self.state != JobState::Submitting {
            debug!("Discarding stale submission outcome");
            return false;
        }
        match outcome.result {
            Ok(result) => {
                info!("'{}' finished: {:?}", self.spec.id, result);
                self.transition(JobState::Result(result));
            }
            Err(failure) => {
                warn!("'{}' failed: {}", self.spec.id, failure.message);
                self.observer.on_failure(&failure);
                self.transition(JobState::Error(failure));
            }
        }
        true
    }

    /// Submit and wait for the terminal state.
    pub async fn submit(&mut self) -> Result<&JobResult, ToolboxError> {
        let submission = self.start_submission()?;
        let outcome = submission.execute().await;
        self.finish_submission(outcome);
        match &self.state {
            JobState::Result(result) => Ok(result),
            JobState::Error(failure) => Err(ToolboxError::Processing(failure.clone())),
            other => Err(ToolboxError::Internal(format!(
                "submission ended in unexpected state {}",
                other.phase()
            ))),
        }
    }

    // ── Result ───────────────────────────────────────────────────────────

    /// Presenter over the terminal result.
    pub fn presenter(&mut self) -> Result<ResultPresenter<'_>, ToolboxError> {
        if self.result().is_none() {
            return Err(ToolboxError::NothingToDownload);
        }
        Ok(ResultPresenter::new(self))
    }

    /// Return to the page-entry state. In-flight work becomes stale.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.staged.clear();
        self.inputs = ParameterInputs::default();
        self.selection = PageSelectionState::default();
        debug!("Job for '{}' reset", self.spec.id);
        self.transition(JobState::Idle);
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn transition(&mut self, next: JobState) {
        let from = self.state.phase();
        let to = next.phase();
        self.state = next;
        debug!("Job '{}': {} -> {}", self.spec.id, from, to);
        self.observer.on_transition(from, to);
    }

    fn ensure_not_busy(&self) -> Result<(), ToolboxError> {
        if self.state.is_busy() {
            return Err(ToolboxError::Busy {
                state: self.state.phase().to_string(),
            });
        }
        Ok(())
    }

    fn invalid(&self, action: &'static str) -> ToolboxError {
        ToolboxError::InvalidState {
            action,
            state: self.state.phase().to_string(),
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("tool", &self.spec.id)
            .field("state", &self.state)
            .field("staged", &self.staged)
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, BackendResponse, PreviewResponse, RawPagePreview};
    use crate::error::{PreviewFailure, RejectionCode};
    use crate::progress::JobObserver;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const PNG_B64: &str = "iVBORw0KGgo=";

    /// Scripted backend: returns canned responses and records requests.
    #[derive(Default)]
    struct FakeBackend {
        response: Mutex<Option<Result<BackendResponse, BackendError>>>,
        pages: u32,
        preview_error: bool,
        hang: bool,
        requests: Mutex<Vec<JobRequest>>,
    }

    impl FakeBackend {
        fn returning(response: Result<BackendResponse, BackendError>) -> Self {
            Self {
                response: Mutex::new(Some(response)),
                ..Self::default()
            }
        }

        fn file(body: &[u8], filename: Option<&str>) -> Self {
            Self::returning(Ok(BackendResponse {
                body: body.to_vec(),
                filename: filename.map(str::to_string),
                content_type: None,
            }))
        }
    }

    #[async_trait]
    impl ProcessingBackend for FakeBackend {
        async fn process(&self, request: &JobRequest) -> Result<BackendResponse, BackendError> {
            self.requests.lock().unwrap().push(request.clone());
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.response
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Err(BackendError::Transport("no scripted response".into())))
        }

        async fn preview_pages(&self, _file: &StagedFile) -> Result<PreviewResponse, BackendError> {
            if self.preview_error {
                return Err(BackendError::Status {
                    status: 500,
                    detail: Some("render failed".into()),
                });
            }
            Ok(PreviewResponse {
                total_pages: self.pages,
                pages: (1..=self.pages)
                    .map(|n| RawPagePreview {
                        page_number: n,
                        image_data: format!("data:image/png;base64,{PNG_B64}"),
                    })
                    .collect(),
            })
        }
    }

    #[derive(Default)]
    struct Transitions(Mutex<Vec<(JobPhase, JobPhase)>>);

    impl JobObserver for Transitions {
        fn on_transition(&self, from: JobPhase, to: JobPhase) {
            self.0.lock().unwrap().push((from, to));
        }
    }

    fn job(tool: &str, backend: FakeBackend) -> (Job, Arc<FakeBackend>) {
        let backend = Arc::new(backend);
        let job = Job::new(tool, ClientConfig::default(), backend.clone()).unwrap();
        (job, backend)
    }

    fn pdf(name: &str) -> CandidateFile {
        CandidateFile::from_bytes(name, b"%PDF-1.7".to_vec())
    }

    #[test]
    fn unknown_tool_fails_closed() {
        let err = Job::new("frobnicate", ClientConfig::default(), Arc::new(FakeBackend::default()))
            .unwrap_err();
        assert!(matches!(err, ToolboxError::UnknownTool { ref id } if id == "frobnicate"));
    }

    #[test]
    fn rejected_drop_leaves_state_unchanged() {
        let (mut job, _) = job("compress", FakeBackend::default());
        let report = job
            .stage(vec![CandidateFile::from_bytes("a.txt", vec![1])])
            .unwrap();
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(job.state(), &JobState::Idle);
        assert!(job.staged().is_empty());

        job.stage(vec![pdf("a.pdf")]).unwrap();
        job.stage(vec![CandidateFile::from_bytes("b.txt", vec![1])]).unwrap();
        assert_eq!(job.state(), &JobState::Staged);
        assert_eq!(job.staged()[0].name(), "a.pdf");
    }

    #[test]
    fn staging_applies_choice_defaults() {
        let (mut job, _) = job("rotate", FakeBackend::default());
        job.stage(vec![pdf("a.pdf")]).unwrap();
        assert!(job.validate().is_ok());
    }

    #[test]
    fn idle_submission_is_a_validation_error() {
        let (job, _) = job("merge", FakeBackend::default());
        let err = job.validate().unwrap_err();
        assert!(matches!(err, ToolboxError::Validation(ref v) if v.contains(&ValidationError::NoFiles)));
    }

    #[test]
    fn missing_parameters_keep_job_staged() {
        let (mut job, _) = job("protect", FakeBackend::default());
        job.stage(vec![pdf("a.pdf")]).unwrap();
        let err = job.start_submission().err().unwrap();
        assert!(matches!(err, ToolboxError::Validation(_)));
        assert_eq!(job.state(), &JobState::Staged);
    }

    #[tokio::test]
    async fn merge_round_trip_then_reset() {
        let (mut job, backend) = job("merge", FakeBackend::file(b"%PDF merged", None));
        let transitions = Arc::new(Transitions::default());
        job = job.with_observer(transitions.clone());

        job.stage(vec![pdf("a.pdf"), pdf("b.pdf")]).unwrap();
        let result = job.submit().await.unwrap().clone();
        assert_eq!(
            result,
            JobResult::File {
                bytes: b"%PDF merged".to_vec(),
                filename: "output.pdf".into()
            }
        );

        let sent = backend.requests.lock().unwrap()[0].clone();
        assert_eq!(sent.file_names("files"), vec!["a.pdf", "b.pdf"]);

        job.reset();
        assert_eq!(job.state(), &JobState::Idle);
        assert!(job.staged().is_empty());
        assert!(job.inputs().is_empty());
        assert_eq!(
            *transitions.0.lock().unwrap(),
            vec![
                (JobPhase::Idle, JobPhase::Staged),
                (JobPhase::Staged, JobPhase::Submitting),
                (JobPhase::Submitting, JobPhase::Result),
                (JobPhase::Result, JobPhase::Idle),
            ]
        );
    }

    #[tokio::test]
    async fn server_detail_becomes_error_state() {
        let (mut job, _) = job(
            "unlock",
            FakeBackend::returning(Err(BackendError::Status {
                status: 400,
                detail: Some("Incorrect password".into()),
            })),
        );
        job.stage(vec![pdf("locked.pdf")]).unwrap();
        job.inputs_mut().unwrap().set_text("password", "hunter2");

        let err = job.submit().await.unwrap_err();
        assert_eq!(err.to_string(), "Incorrect password");
        match job.state() {
            JobState::Error(f) => assert_eq!(f.kind, FailureKind::Status(400)),
            other => panic!("expected error state, got {other:?}"),
        }

        // Terminal: no resubmission and no presenter.
        assert!(matches!(job.start_submission(), Err(ToolboxError::InvalidState { .. })));
        assert!(matches!(job.presenter(), Err(ToolboxError::NothingToDownload)));
    }

    fn assert_pristine(job: &Job) {
        assert_eq!(job.state(), &JobState::Idle);
        assert!(job.staged().is_empty());
        assert!(job.inputs().is_empty());
        assert!(!job.selection().is_loaded());
        assert_eq!(job.selection().selected_count(), 0);
    }

    #[tokio::test]
    async fn reset_from_staged_clears_previews_and_inputs() {
        let (mut job, _) = job(
            "delete-pages",
            FakeBackend {
                pages: 3,
                ..FakeBackend::default()
            },
        );
        job.stage(vec![pdf("deck.pdf")]).unwrap();
        job.load_previews().await.unwrap();
        job.selection_mut().unwrap().select(2).unwrap();
        assert_eq!(job.state(), &JobState::Staged);

        job.reset();
        assert_pristine(&job);
    }

    #[tokio::test]
    async fn reset_from_error_returns_to_idle() {
        let (mut job, _) = job(
            "unlock",
            FakeBackend::returning(Err(BackendError::Status {
                status: 400,
                detail: Some("Incorrect password".into()),
            })),
        );
        job.stage(vec![pdf("locked.pdf")]).unwrap();
        job.inputs_mut().unwrap().set_text("password", "hunter2");
        job.submit().await.unwrap_err();
        assert_eq!(job.phase(), JobPhase::Error);

        job.reset();
        assert_pristine(&job);
        job.stage(vec![pdf("again.pdf")]).unwrap();
        assert_eq!(job.state(), &JobState::Staged);
    }

    #[test]
    fn default_ceiling_rejects_files_over_ten_mib() {
        let (mut job, _) = job("compress", FakeBackend::default());
        let big = CandidateFile::from_bytes("big.pdf", vec![0u8; 10 * 1024 * 1024 + 1]);
        let report = job.stage(vec![big]).unwrap();

        assert!(report.accepted.is_empty());
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].code, RejectionCode::TooLarge);
        assert_eq!(job.state(), &JobState::Idle);

        let at_limit = CandidateFile::from_bytes("edge.pdf", vec![0u8; 10 * 1024 * 1024]);
        assert_eq!(job.stage(vec![at_limit]).unwrap().accepted.len(), 1);
    }

    #[tokio::test]
    async fn transport_error_uses_generic_message() {
        let (mut job, _) = job(
            "compress",
            FakeBackend::returning(Err(BackendError::Transport("connection refused".into()))),
        );
        job.stage(vec![pdf("a.pdf")]).unwrap();
        let err = job.submit().await.unwrap_err();
        assert_eq!(err.to_string(), crate::error::GENERIC_PROCESSING_MESSAGE);
    }

    #[tokio::test]
    async fn hung_request_times_out_into_error() {
        let backend = Arc::new(FakeBackend {
            hang: true,
            ..FakeBackend::default()
        });
        let config = ClientConfig::builder().request_timeout_secs(1).build().unwrap();
        let mut job = Job::new("compress", config, backend).unwrap();
        job.stage(vec![pdf("a.pdf")]).unwrap();

        let err = job.submit().await.unwrap_err();
        assert!(matches!(
            err,
            ToolboxError::Processing(ProcessingFailure {
                kind: FailureKind::Timeout,
                ..
            })
        ));
        assert_eq!(job.phase(), JobPhase::Error);
    }

    #[tokio::test]
    async fn triggers_are_disabled_while_submitting() {
        let (mut job, _) = job("compress", FakeBackend::file(b"%PDF", None));
        job.stage(vec![pdf("a.pdf")]).unwrap();
        let submission = job.start_submission().unwrap();

        assert!(matches!(job.stage(vec![pdf("b.pdf")]), Err(ToolboxError::Busy { .. })));
        assert!(matches!(job.start_submission(), Err(ToolboxError::Busy { .. })));
        assert!(matches!(job.inputs_mut(), Err(ToolboxError::Busy { .. })));
        assert_eq!(job.staged()[0].name(), "a.pdf");

        let outcome = submission.execute().await;
        assert!(job.finish_submission(outcome));
        assert_eq!(job.phase(), JobPhase::Result);
    }

    #[tokio::test]
    async fn reset_discards_in_flight_submission() {
        let (mut job, _) = job("compress", FakeBackend::file(b"%PDF", None));
        job.stage(vec![pdf("a.pdf")]).unwrap();
        let submission = job.start_submission().unwrap();
        job.reset();

        let outcome = submission.execute().await;
        assert!(!job.finish_submission(outcome));
        assert_eq!(job.state(), &JobState::Idle);
    }

    #[tokio::test]
    async fn restaging_clears_result() {
        let (mut job, _) = job("compress", FakeBackend::file(b"%PDF", Some("small.pdf")));
        job.stage(vec![pdf("a.pdf")]).unwrap();
        job.submit().await.unwrap();
        assert!(job.result().is_some());

        job.stage(vec![pdf("b.pdf")]).unwrap();
        assert_eq!(job.state(), &JobState::Staged);
        assert!(job.result().is_none());
    }

    #[tokio::test]
    async fn page_selection_flow() {
        let (mut job, backend) = job(
            "delete-pages",
            FakeBackend {
                pages: 4,
                ..FakeBackend::file(b"%PDF trimmed", None)
            },
        );
        job.stage_and_preview(vec![pdf("deck.pdf")]).await.unwrap();
        assert_eq!(job.phase(), JobPhase::Staged);
        assert_eq!(job.selection().previews().len(), 4);

        // Nothing selected, then everything selected: both blocked.
        assert!(job.validate().is_err());
        for page in 1..=4 {
            job.selection_mut().unwrap().select(page).unwrap();
        }
        let err = job.start_submission().err().unwrap();
        assert!(matches!(
            err,
            ToolboxError::Validation(ref v) if v.contains(&ValidationError::AllPagesSelected { total: 4 })
        ));
        assert_eq!(job.phase(), JobPhase::Staged);

        job.selection_mut().unwrap().deselect(1);
        job.selection_mut().unwrap().deselect(3);
        let result = job.submit().await.unwrap().clone();
        assert!(matches!(result, JobResult::File { ref filename, .. } if filename == "output.pdf"));

        let sent = backend.requests.lock().unwrap()[0].clone();
        assert_eq!(sent.field("pages_to_remove"), Some("2,4"));
        assert_eq!(sent.file_names("file"), vec!["deck.pdf"]);
    }

    #[tokio::test]
    async fn preview_failure_returns_to_staged() {
        let (mut job, _) = job(
            "delete-pages",
            FakeBackend {
                preview_error: true,
                ..FakeBackend::default()
            },
        );
        let err = job.stage_and_preview(vec![pdf("deck.pdf")]).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            PreviewFailure {
                message: "render failed".into()
            }
            .to_string()
        );
        assert_eq!(job.phase(), JobPhase::Staged);
        assert_eq!(job.staged().len(), 1);
        assert!(job.needs_previews());
    }

    #[tokio::test]
    async fn reset_discards_in_flight_preview() {
        let (mut job, _) = job(
            "delete-pages",
            FakeBackend {
                pages: 2,
                ..FakeBackend::default()
            },
        );
        job.stage(vec![pdf("deck.pdf")]).unwrap();
        let fetch = job.begin_preview().unwrap();
        assert_eq!(job.phase(), JobPhase::Previewing);
        assert!(matches!(job.stage(vec![pdf("other.pdf")]), Err(ToolboxError::Busy { .. })));

        job.reset();
        let outcome = fetch.execute().await;
        assert!(!job.finish_preview(outcome).unwrap());
        assert_eq!(job.phase(), JobPhase::Idle);
        assert!(!job.selection().is_loaded());
    }

    #[tokio::test]
    async fn ocr_yields_text_result() {
        let (mut job, _) = job("ocr", FakeBackend::file(br#"{"text":"Invoice 42","pages":3}"#, None));
        job.stage(vec![pdf("scan.pdf")]).unwrap();
        let result = job.submit().await.unwrap();
        assert_eq!(
            result,
            &JobResult::Text {
                text: "Invoice 42".into(),
                page_count: 3
            }
        );
    }

    #[test]
    fn watermark_asset_is_validated_on_attach() {
        let (mut job, _) = job("watermark", FakeBackend::default());
        job.stage(vec![pdf("a.pdf")]).unwrap();
        let err = job
            .attach_asset("image", CandidateFile::from_bytes("logo.gif", vec![1]))
            .unwrap_err();
        assert!(matches!(err, ToolboxError::Validation(_)));

        job.attach_asset("image", CandidateFile::from_bytes("logo.PNG", vec![1]))
            .unwrap();
        job.inputs_mut().unwrap().set_text("watermark_type", "image");
        assert!(job.validate().is_ok());

        let err = job
            .attach_asset("password", CandidateFile::from_bytes("x.png", vec![1]))
            .unwrap_err();
        assert!(matches!(err, ToolboxError::Validation(_)));
    }

    #[test]
    fn scaled_defaults_are_submitted() {
        let (mut job, _) = job("watermark", FakeBackend::default());
        job.stage(vec![pdf("a.pdf")]).unwrap();
        job.inputs_mut().unwrap().set_text("text", "DRAFT");
        let submission = job.start_submission().unwrap();
        let req = submission.request();
        assert_eq!(req.field("opacity"), Some("0.3"));
        assert_eq!(req.field("rotation"), Some("0"));
        assert_eq!(req.field("text"), Some("DRAFT"));
    }
}
