//! Error types for stow-core

use std::path::PathBuf;
use thiserror::Error;

/// Core error types for the stow library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive container error
    #[error("Zip error: {0}")]
    Zip(String),

    /// Invalid file or directory path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Target archive already exists and overwriting is not permitted
    #[error("Target already exists: {}", .0.display())]
    TargetExists(PathBuf),

    /// Extraction target directory already contains files
    #[error("Target directory is not empty: {}", .0.display())]
    TargetNotEmpty(PathBuf),

    /// A second operation was started on a single-use job instance
    #[error("Operation already started")]
    AlreadyStarted,

    /// Cooperative cancellation marker, not a real failure
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Zip(err.to_string())
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::Io(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
