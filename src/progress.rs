//! Observer trait for job lifecycle events.
//!
//! Inject an [`Arc<dyn JobObserver>`] via [`crate::job::Job::with_observer`]
//! to follow a job as it moves through its states. The CLI drives its
//! spinner from these events; a GUI would repaint from them.
//!
//! Observers are called synchronously from the task that owns the job, after
//! the state change has been applied. They must not block.
//!
//! # Example
//!
//! ```rust
//! use pdf_toolbox::{JobObserver, JobPhase};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingObserver {
//!     transitions: AtomicUsize,
//! }
//!
//! impl JobObserver for CountingObserver {
//!     fn on_transition(&self, from: JobPhase, to: JobPhase) {
//!         self.transitions.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{from} -> {to}");
//!     }
//! }
//!
//! let observer: Arc<dyn JobObserver> = Arc::new(CountingObserver {
//!     transitions: AtomicUsize::new(0),
//! });
//! observer.on_transition(JobPhase::Idle, JobPhase::Staged);
//! ```

use crate::error::ProcessingFailure;
use crate::job::JobPhase;
use std::sync::Arc;

/// Called by [`crate::job::Job`] as it changes state.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait JobObserver: Send + Sync {
    /// Called after every state change, including resets.
    fn on_transition(&self, from: JobPhase, to: JobPhase) {
        let _ = (from, to);
    }

    /// Called after each intake event.
    fn on_intake(&self, accepted: usize, rejected: usize, ignored: usize) {
        let _ = (accepted, rejected, ignored);
    }

    /// Called when page thumbnails arrived.
    fn on_previews_loaded(&self, pages: usize) {
        let _ = pages;
    }

    /// Called just before the request goes out.
    fn on_submit(&self, tool_id: &str, files: usize) {
        let _ = (tool_id, files);
    }

    /// Called when a submission ends in the error state.
    fn on_failure(&self, failure: &ProcessingFailure) {
        let _ = failure;
    }
}

/// A no-op observer. This is the default when none is configured.
pub struct NoopObserver;

impl JobObserver for NoopObserver {}

/// Convenience alias for the type stored in [`crate::job::Job`].
pub type Observer = Arc<dyn JobObserver>;
