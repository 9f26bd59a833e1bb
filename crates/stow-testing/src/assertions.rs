//! Common assertions for stow testing

use std::path::Path;

use anyhow::Result;
use walkdir::WalkDir;

/// Asserts that two directory structures are identical
pub fn assert_dirs_equal(dir1: &Path, dir2: &Path) -> Result<()> {
    let entries1 = collect_entries(dir1)?;
    let entries2 = collect_entries(dir2)?;

    assert_eq!(
        entries1.len(),
        entries2.len(),
        "Different number of entries: {} vs {}",
        entries1.len(),
        entries2.len()
    );

    for (path1, path2) in entries1.iter().zip(entries2.iter()) {
        assert_eq!(path1.file_name(), path2.file_name(), "Different file names");

        let meta1 = std::fs::metadata(path1)?;
        let meta2 = std::fs::metadata(path2)?;

        assert_eq!(
            meta1.is_file(),
            meta2.is_file(),
            "File type mismatch for {:?}",
            path1.file_name()
        );

        if meta1.is_file() {
            let content1 = std::fs::read(path1)?;
            let content2 = std::fs::read(path2)?;
            assert_eq!(
                content1,
                content2,
                "Content mismatch for {:?}",
                path1.file_name()
            );
        }
    }

    Ok(())
}

/// Asserts that a directory exists and has no entries at all
pub fn assert_dir_empty(dir: &Path) -> Result<()> {
    assert!(dir.is_dir(), "{:?} is not a directory", dir);
    let leftover: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    assert!(leftover.is_empty(), "Directory not empty: {:?}", leftover);
    Ok(())
}

fn collect_entries(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut entries: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.path().to_path_buf())
        .collect();

    entries.sort();
    Ok(entries)
}
