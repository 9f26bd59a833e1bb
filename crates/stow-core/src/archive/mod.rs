//! Archive operations module

pub mod archiver;
pub mod extractor;

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;
use zip::write::FileOptions;
use zip::CompressionMethod;
use zip::ZipArchive;

use crate::Result;

pub use archiver::Archiver;
pub use extractor::Extractor;

/// Which parts of a source directory end up in the archive.
///
/// The default includes only the files directly inside the source directory,
/// with no base-directory prefix. The flags are independent and combinable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectoryOptions {
    /// Prefix entries with the source directory's own name and write a
    /// directory-marker entry for it
    pub include_base_dir: bool,
    /// Descend into subdirectories
    pub include_subdirs: bool,
}

impl DirectoryOptions {
    /// Both flags set. Recursion below the top level always runs with these,
    /// so subdirectory trees are included whole once traversal is enabled.
    pub fn full() -> Self {
        Self {
            include_base_dir: true,
            include_subdirs: true,
        }
    }
}

/// Compression quality/speed tradeoff, passed through to the zip writer
/// and opaque to the traversal logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    /// Store entries without compression
    Store,
    /// Deflate at its fastest setting
    Fastest,
    /// Deflate at the zip writer's default setting
    #[default]
    Balanced,
    /// Deflate at its strongest setting
    Best,
}

impl CompressionLevel {
    pub(crate) fn file_options(self) -> FileOptions<'static, ()> {
        match self {
            CompressionLevel::Store => {
                FileOptions::<'static, ()>::default().compression_method(CompressionMethod::Stored)
            }
            CompressionLevel::Fastest => FileOptions::<'static, ()>::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(1)),
            CompressionLevel::Balanced => FileOptions::<'static, ()>::default()
                .compression_method(CompressionMethod::Deflated),
            CompressionLevel::Best => FileOptions::<'static, ()>::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(9)),
        }
    }
}

impl std::str::FromStr for CompressionLevel {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "store" | "none" => Ok(CompressionLevel::Store),
            "fastest" | "fast" => Ok(CompressionLevel::Fastest),
            "balanced" | "default" => Ok(CompressionLevel::Balanced),
            "best" | "max" => Ok(CompressionLevel::Best),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompressionLevel::Store => write!(f, "store"),
            CompressionLevel::Fastest => write!(f, "fastest"),
            CompressionLevel::Balanced => write!(f, "balanced"),
            CompressionLevel::Best => write!(f, "best"),
        }
    }
}

/// Archive entry information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Path within the archive
    pub path: PathBuf,
    /// Original size in bytes
    pub size: u64,
    /// Compressed size in bytes
    pub compressed_size: u64,
    /// Unix permissions (if available)
    pub mode: Option<u32>,
    /// Modification time (if available)
    pub mtime: Option<i64>,
    /// Whether this is a directory marker
    pub is_dir: bool,
}

/// Inspect archive contents without extracting
pub fn inspect<P: AsRef<Path>>(archive_path: P) -> Result<Vec<ArchiveEntry>> {
    let archive_path = archive_path.as_ref();
    info!("Inspecting archive: {:?}", archive_path);

    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut entries = Vec::new();

    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let path = match entry.enclosed_name() {
            Some(path) => path,
            None => continue,
        };

        entries.push(ArchiveEntry {
            path,
            size: entry.size(),
            compressed_size: entry.compressed_size(),
            mode: entry.unix_mode(),
            mtime: entry.last_modified().map(|dt| dt.timepart() as i64),
            is_dir: entry.is_dir(),
        });
    }

    Ok(entries)
}
