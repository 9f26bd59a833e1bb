//! Filesystem helpers for stow-core

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::Result;

/// Count all files and directories below `dir`, recursively, excluding `dir`
/// itself. Entries that are neither plain files nor directories (e.g.
/// symlinks) are not counted, matching what the archive walk writes.
pub fn count_tree_items(dir: &Path) -> Result<u64> {
    let mut count = 0;
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry?;
        let file_type = entry.file_type();
        if file_type.is_file() || file_type.is_dir() {
            count += 1;
        }
    }
    Ok(count)
}

/// Count the files directly inside `dir`, non-recursively.
pub fn count_files(dir: &Path) -> Result<u64> {
    let (files, _) = sorted_children(dir)?;
    Ok(files.len() as u64)
}

/// List the plain files and directories directly inside `dir`, each sorted
/// by name so the archive walk is deterministic.
pub fn sorted_children(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_file() {
            files.push(entry.path());
        } else if file_type.is_dir() {
            dirs.push(entry.path());
        }
    }
    files.sort();
    dirs.sort();
    Ok((files, dirs))
}

/// Whether `dir` contains no entries at all.
pub fn dir_is_empty(dir: &Path) -> Result<bool> {
    Ok(fs::read_dir(dir)?.next().is_none())
}

/// Remove everything inside `dir`, leaving the directory itself in place.
pub fn clear_dir_contents(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}
