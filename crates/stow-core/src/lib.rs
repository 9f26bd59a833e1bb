//! Stow - asynchronous, cancellable archiving of filesystem trees
//!
//! This library packs a file or directory tree into a zip archive, and
//! extracts archives back into a directory, off the caller's thread. Each
//! job reports incremental progress, can be cancelled cooperatively at
//! fixed checkpoints, and cleans up partial output when it does not finish.

pub mod archive;
pub mod error;
pub mod progress;
pub mod utils;

pub use error::{Error, Result};

// Re-export commonly used types
pub use archive::{
    inspect, ArchiveEntry, Archiver, CompressionLevel, DirectoryOptions, Extractor,
};
pub use progress::OperationStatus;
