//! Background archiving of a file or directory tree into a zip archive

use std::fs::{self, File};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};
use zip::write::FileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

use crate::archive::{CompressionLevel, DirectoryOptions};
use crate::progress::{JobTracker, OperationStatus};
use crate::{Error, Result};

/// A single-use archiving job.
///
/// Construction captures the source, target and options; [`archive`] checks
/// preconditions, then hands the walk to a background worker and returns.
/// The owner polls [`status`]/[`last_error`]/counters at any time, may
/// [`cancel`] cooperatively, and [`wait`]s for the terminal status.
///
/// [`archive`]: Archiver::archive
/// [`status`]: Archiver::status
/// [`last_error`]: Archiver::last_error
/// [`cancel`]: Archiver::cancel
/// [`wait`]: Archiver::wait
pub struct Archiver {
    source: PathBuf,
    target: PathBuf,
    is_dir: bool,
    overwrite: bool,
    options: DirectoryOptions,
    tracker: Arc<JobTracker>,
    worker: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl Archiver {
    /// Job archiving a single file under its base name.
    pub fn file<P: Into<PathBuf>, Q: Into<PathBuf>>(source: P, target: Q) -> Self {
        Self::new(source.into(), target.into(), false, DirectoryOptions::default())
    }

    /// Job archiving a directory tree according to `options`.
    pub fn directory<P: Into<PathBuf>, Q: Into<PathBuf>>(
        source: P,
        target: Q,
        options: DirectoryOptions,
    ) -> Self {
        Self::new(source.into(), target.into(), true, options)
    }

    fn new(source: PathBuf, target: PathBuf, is_dir: bool, options: DirectoryOptions) -> Self {
        Self {
            source,
            target,
            is_dir,
            overwrite: false,
            options,
            tracker: Arc::new(JobTracker::new()),
            worker: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Permit replacing an existing target archive.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Install a progress callback receiving percentages in `0..=100`.
    pub fn with_progress<F>(self, callback: F) -> Self
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        self.tracker.set_progress_fn(Box::new(callback));
        self
    }

    /// Start the archiving job on a background worker.
    ///
    /// Fails synchronously, without spawning a worker or touching the
    /// progress callback, when the target already exists and overwriting is
    /// not enabled, or when this instance was already started.
    pub fn archive(&self, level: CompressionLevel) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyStarted);
        }

        if self.target.exists() {
            if !self.overwrite {
                let error = Error::TargetExists(self.target.clone());
                self.tracker
                    .fail(Arc::new(Error::TargetExists(self.target.clone())));
                return Err(error);
            }
            if let Err(error) = fs::remove_file(&self.target) {
                self.tracker.fail(Arc::new(Error::Io(std::io::Error::new(
                    error.kind(),
                    error.to_string(),
                ))));
                return Err(Error::Io(error));
            }
        }

        self.tracker.set_status(OperationStatus::InProgress);
        info!("Archiving {:?} into {:?}", self.source, self.target);

        let tracker = Arc::clone(&self.tracker);
        let source = self.source.clone();
        let target = self.target.clone();
        let is_dir = self.is_dir;
        let options = self.options;

        let handle = thread::Builder::new()
            .name("stow-archive".to_string())
            .spawn(move || {
                let outcome = run_archive(&source, &target, is_dir, options, level, &tracker);
                match outcome {
                    Ok(()) => {
                        tracker.set_status(OperationStatus::Finished);
                        info!("Successfully archived into {:?}", target);
                    }
                    Err(Error::Cancelled) => {
                        discard_partial_archive(&target);
                        tracker.set_status(OperationStatus::Cancelled);
                        info!("Archiving of {:?} cancelled", source);
                    }
                    Err(error) => {
                        discard_partial_archive(&target);
                        warn!("Archiving of {:?} failed: {}", source, error);
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

    /// Request cooperative cancellation. Idempotent; observed at the
    /// checkpoints before each file and each subdirectory. A single-file job
    /// has no checkpoints, so it always runs to completion.
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

    /// Item count computed before the walk started; stable afterwards.
    pub fn total_items(&self) -> u64 {
        self.tracker.total()
    }

    pub fn processed_items(&self) -> u64 {
        self.tracker.processed()
    }

    /// Path of the item currently being written, if any.
    pub fn current_item(&self) -> Option<PathBuf> {
        self.tracker.current_item()
    }
}

fn run_archive(
    source: &Path,
    target: &Path,
    is_dir: bool,
    options: DirectoryOptions,
    level: CompressionLevel,
    tracker: &JobTracker,
) -> Result<()> {
    // The item count is fixed before the first entry is written.
    let total = if is_dir {
        if !source.is_dir() {
            return Err(Error::InvalidPath(format!(
                "{} is not a directory",
                source.display()
            )));
        }
        let base = u64::from(options.include_base_dir);
        let items = if options.include_subdirs {
            crate::utils::count_tree_items(source)?
        } else {
            crate::utils::count_files(source)?
        };
        base + items
    } else {
        1
    };
    tracker.begin(total);

    let file = File::create(target)?;
    let mut zip = ZipWriter::new(file);

    if is_dir {
        write_dir_entries(&mut zip, source, "", options, level, tracker)?;
    } else {
        let name = source
            .file_name()
            .ok_or_else(|| Error::InvalidPath(format!("{} has no file name", source.display())))?
            .to_string_lossy()
            .into_owned();
        tracker.set_current_item(source);
        write_file_entry(&mut zip, source, &name, level)?;
        tracker.advance();
    }

    zip.finish()?;
    Ok(())
}

/// Write one directory level and, when enabled, recurse into its
/// subdirectories. Recursion always runs with full options: once
/// subdirectory traversal is enabled, subtrees are included whole.
fn write_dir_entries<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    dir: &Path,
    parent_prefix: &str,
    options: DirectoryOptions,
    level: CompressionLevel,
    tracker: &JobTracker,
) -> Result<()> {
    let prefix = if options.include_base_dir {
        let name = dir
            .file_name()
            .ok_or_else(|| Error::InvalidPath(format!("{} has no file name", dir.display())))?;
        format!("{}{}/", parent_prefix, name.to_string_lossy())
    } else {
        String::new()
    };

    if options.include_base_dir {
        debug!("Adding directory marker: {}", prefix);
        let marker =
            FileOptions::<'static, ()>::default().compression_method(CompressionMethod::Stored);
        #[cfg(unix)]
        let marker = {
            use std::os::unix::fs::PermissionsExt;
            marker.unix_permissions(fs::metadata(dir)?.permissions().mode())
        };
        tracker.set_current_item(dir);
        zip.add_directory(prefix.clone(), marker)?;
        tracker.advance();
    }

    let (files, subdirs) = crate::utils::sorted_children(dir)?;

    for path in &files {
        tracker.checkpoint()?;
        let name = format!(
            "{}{}",
            prefix,
            path.file_name().unwrap_or_default().to_string_lossy()
        );
        tracker.set_current_item(path);
        write_file_entry(zip, path, &name, level)?;
        tracker.advance();
    }

    if options.include_subdirs {
        for path in &subdirs {
            tracker.checkpoint()?;
            write_dir_entries(zip, path, &prefix, DirectoryOptions::full(), level, tracker)?;
        }
    }

    Ok(())
}

/// Write a single file entry named `name`.
fn write_file_entry<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    path: &Path,
    name: &str,
    level: CompressionLevel,
) -> Result<()> {
    debug!("Adding file {:?} as {}", path, name);

    let mut file = File::open(path)?;
    let options = level.file_options();

    #[cfg(unix)]
    let options = {
        use std::os::unix::fs::PermissionsExt;
        options.unix_permissions(file.metadata()?.permissions().mode())
    };

    zip.start_file(name, options)?;
    std::io::copy(&mut file, zip)?;

    Ok(())
}

/// Cancelled and failed walks leave no partial archive behind.
fn discard_partial_archive(target: &Path) {
    if target.exists() {
        if let Err(error) = fs::remove_file(target) {
            warn!("Failed to remove partial archive {:?}: {}", target, error);
        }
    }
}
