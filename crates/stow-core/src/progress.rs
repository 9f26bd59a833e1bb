//! Shared status and progress protocol for archive jobs
//!
//! Both the archiver and the extractor drive the same tracker: a single
//! background worker writes counters, status and the current item, while the
//! owning thread polls them at any time. Progress percentages are delivered
//! to an optional callback; after cancellation has been requested only the
//! final settling report is delivered.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::{Error, Result};

/// Lifecycle state of a single archive or extract job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// Job constructed, background work not started
    NotStarted,
    /// Background worker is running
    InProgress,
    /// Worker ran to completion
    Finished,
    /// Worker observed a cancellation request at a checkpoint
    Cancelled,
    /// Worker aborted on an error, see the job's last error
    Failed,
}

impl OperationStatus {
    /// Whether the job has settled and will not change state again
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled | Self::Failed)
    }
}

/// Callback receiving a progress percentage in `0..=100`
pub type ProgressFn = Box<dyn Fn(u8) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared state between a job's owner and its background worker.
///
/// The worker is the only writer; the owner polls through the job's
/// accessors. The 100% report fires exactly once per settled job, either
/// from the final increment of a successful walk or from [`finish_report`]
/// in the worker epilogue.
///
/// [`finish_report`]: JobTracker::finish_report
pub(crate) struct JobTracker {
    status: Mutex<OperationStatus>,
    total: AtomicU64,
    processed: AtomicU64,
    current: Mutex<Option<PathBuf>>,
    error: Mutex<Option<Arc<Error>>>,
    cancelled: AtomicBool,
    done_reported: AtomicBool,
    on_progress: Mutex<Option<ProgressFn>>,
}

impl JobTracker {
    pub(crate) fn new() -> Self {
        Self {
            status: Mutex::new(OperationStatus::NotStarted),
            total: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            current: Mutex::new(None),
            error: Mutex::new(None),
            cancelled: AtomicBool::new(false),
            done_reported: AtomicBool::new(false),
            on_progress: Mutex::new(None),
        }
    }

    pub(crate) fn set_progress_fn(&self, callback: ProgressFn) {
        *lock(&self.on_progress) = Some(callback);
    }

    pub(crate) fn status(&self) -> OperationStatus {
        *lock(&self.status)
    }

    pub(crate) fn set_status(&self, status: OperationStatus) {
        *lock(&self.status) = status;
    }

    /// Record the up-front item count and deliver the opening 0% report.
    pub(crate) fn begin(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
        self.report(0);
    }

    pub(crate) fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub(crate) fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub(crate) fn current_item(&self) -> Option<PathBuf> {
        lock(&self.current).clone()
    }

    pub(crate) fn set_current_item(&self, path: &Path) {
        *lock(&self.current) = Some(path.to_path_buf());
    }

    pub(crate) fn last_error(&self) -> Option<Arc<Error>> {
        lock(&self.error).clone()
    }

    /// Store the failure and move to the Failed state.
    pub(crate) fn fail(&self, error: Arc<Error>) {
        *lock(&self.error) = Some(error);
        self.set_status(OperationStatus::Failed);
    }

    pub(crate) fn request_cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            debug!("cancellation requested");
        }
    }

    pub(crate) fn is_cancel_requested(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancellation checkpoint: converts a pending request into the
    /// cooperative abort error that unwinds the walk.
    pub(crate) fn checkpoint(&self) -> Result<()> {
        if self.is_cancel_requested() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Count one processed item and report the resulting percentage.
    pub(crate) fn advance(&self) {
        let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        self.report(percentage(processed, self.total()));
    }

    /// Unconditional settling report: delivers the one 100% that marks the
    /// job as settled, unless an increment already delivered it.
    pub(crate) fn finish_report(&self) {
        if !self.done_reported.swap(true, Ordering::SeqCst) {
            self.emit(100);
        }
    }

    /// Deliver a percentage to the callback. Incremental reports are
    /// suppressed once cancellation has been requested; a 100 latches so the
    /// settling report cannot fire twice.
    fn report(&self, percent: u8) {
        if self.is_cancel_requested() {
            return;
        }
        if percent >= 100 {
            if !self.done_reported.swap(true, Ordering::SeqCst) {
                self.emit(100);
            }
        } else {
            self.emit(percent);
        }
    }

    fn emit(&self, percent: u8) {
        if let Some(callback) = lock(&self.on_progress).as_ref() {
            callback(percent);
        }
    }
}

/// Integer progress percentage, `floor(100 * processed / total)` clamped to
/// 100. A zero-item walk is settled by definition.
fn percentage(processed: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (100 * processed / total).min(100) as u8
}
