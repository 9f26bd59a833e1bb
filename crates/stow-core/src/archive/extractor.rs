//! Background extraction of a zip archive into a directory

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::progress::{JobTracker, OperationStatus};
use crate::{Error, Result};

/// A single-use extraction job, the mirror image of [`Archiver`].
///
/// Entries are materialized under the target directory in the archive's own
/// order. Existing files are never overwritten. Cancelled and failed runs
/// clear everything under the target directory, leaving the directory
/// itself in place.
///
/// [`Archiver`]: crate::archive::Archiver
pub struct Extractor {
    source: PathBuf,
    target_dir: PathBuf,
    tracker: Arc<JobTracker>,
    worker: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl Extractor {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(source: P, target_dir: Q) -> Self {
        Self {
            source: source.into(),
            target_dir: target_dir.into(),
            tracker: Arc::new(JobTracker::new()),
            worker: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Install a progress callback receiving percentages in `0..=100`.
    pub fn with_progress<F>(self, callback: F) -> Self
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        self.tracker.set_progress_fn(Box::new(callback));
        self
    }

    /// Start the extraction job on a background worker.
    ///
    /// Fails synchronously, without spawning a worker or touching the
    /// progress callback, when the target directory already contains any
    /// file or subdirectory, or when this instance was already started.
    pub fn extract(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyStarted);
        }

        if self.target_dir.exists() {
            if !self.target_dir.is_dir() {
                let error = Error::InvalidPath(format!(
                    "{} is not a directory",
                    self.target_dir.display()
                ));
                self.tracker.fail(Arc::new(Error::InvalidPath(format!(
                    "{} is not a directory",
                    self.target_dir.display()
                ))));
                return Err(error);
            }
            match crate::utils::dir_is_empty(&self.target_dir) {
                Ok(true) => {}
                Ok(false) => {
                    let error = Error::TargetNotEmpty(self.target_dir.clone());
                    self.tracker
                        .fail(Arc::new(Error::TargetNotEmpty(self.target_dir.clone())));
                    return Err(error);
                }
                Err(error) => {
                    self.tracker.fail(Arc::new(Error::InvalidPath(format!(
                        "cannot read {}: {}",
                        self.target_dir.display(),
                        error
                    ))));
                    return Err(error);
                }
            }
        }

        self.tracker.set_status(OperationStatus::InProgress);
        info!("Extracting {:?} into {:?}", self.source, self.target_dir);

        let tracker = Arc::clone(&self.tracker);
        let source = self.source.clone();
        let target_dir = self.target_dir.clone();

        let handle = thread::Builder::new()
            .name("stow-extract".to_string())
            .spawn(move || {
                let outcome = run_extract(&source, &target_dir, &tracker);
                match outcome {
                    Ok(()) => {
                        tracker.set_status(OperationStatus::Finished);
                        info!("Successfully extracted into {:?}", target_dir);
                    }
                    Err(Error::Cancelled) => {
                        discard_partial_tree(&target_dir);
                        tracker.set_status(OperationStatus::Cancelled);
                        info!("Extraction of {:?} cancelled", source);
                    }
                    Err(error) => {
                        discard_partial_tree(&target_dir);
                        warn!("Extraction of {:?} failed: {}", source, error);
                        tracker.fail(Arc::new(error));
                    }
                }
                tracker.finish_report();
            })?;

        *self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    /// Request cooperative cancellation of the extraction loop. Idempotent;
    /// observed before each entry.
    pub fn cancel(&self) {
        self.tracker.request_cancel();
    }

    /// Block until the background worker settles and return the terminal
    /// status. Returns the current status when no worker is running.
    pub fn wait(&self) -> OperationStatus {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        self.tracker.status()
    }

    pub fn status(&self) -> OperationStatus {
        self.tracker.status()
    }

    pub fn last_error(&self) -> Option<Arc<Error>> {
        self.tracker.last_error()
    }

    /// Entry count of the archive, fixed before the first entry is read.
    pub fn total_items(&self) -> u64 {
        self.tracker.total()
    }

    pub fn processed_items(&self) -> u64 {
        self.tracker.processed()
    }

    /// Destination path of the entry currently being materialized, if any.
    pub fn current_item(&self) -> Option<PathBuf> {
        self.tracker.current_item()
    }
}

fn run_extract(source: &Path, target_dir: &Path, tracker: &JobTracker) -> Result<()> {
    let file = File::open(source)?;
    let mut archive = ZipArchive::new(file)?;

    tracker.begin(archive.len() as u64);
    fs::create_dir_all(target_dir)?;

    for i in 0..archive.len() {
        tracker.checkpoint()?;

        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| Error::InvalidPath(format!("unsafe entry name: {}", name)))?;
        let dest = target_dir.join(relative);
        tracker.set_current_item(&dest);

        if name.ends_with('/') {
            debug!("Creating directory: {:?}", dest);
            fs::create_dir_all(&dest)?;
            #[cfg(unix)]
            apply_unix_mode(&dest, entry.unix_mode())?;
        } else if dest.exists() {
            debug!("Skipping existing file: {:?}", dest);
        } else {
            debug!("Extracting: {}", name);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&dest)?;
            std::io::copy(&mut entry, &mut out)?;
            #[cfg(unix)]
            apply_unix_mode(&dest, entry.unix_mode())?;
        }

        tracker.advance();
    }

    Ok(())
}

#[cfg(unix)]
fn apply_unix_mode(path: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}

/// Cancelled and failed runs leave nothing under the target directory; the
/// directory itself stays.
fn discard_partial_tree(target_dir: &Path) {
    if !target_dir.exists() {
        return;
    }
    if let Err(error) = crate::utils::clear_dir_contents(target_dir) {
        warn!(
            "Failed to clear partially extracted files under {:?}: {}",
            target_dir, error
        );
    }
}
