//! Common test fixtures for stow testing

use crate::TestDir;
use anyhow::Result;

/// Creates a small directory tree with top-level files and one subdirectory
pub fn create_sample_tree(test_dir: &TestDir) -> Result<()> {
    test_dir.create_file("file1.txt", b"This is file 1 content.")?;
    test_dir.create_file("file2.txt", b"This is file 2 content.")?;

    test_dir.create_dir("subdir")?;
    test_dir.create_file("subdir/file3.txt", b"This is file 3 in subdir.")?;

    Ok(())
}

/// Creates a deeper tree with nested directories and mixed content
pub fn create_nested_tree(test_dir: &TestDir) -> Result<()> {
    create_sample_tree(test_dir)?;

    test_dir.create_file("README.md", b"# Test Tree\n\nFixture data.")?;
    test_dir.create_dir("src")?;
    test_dir.create_file("src/main.rs", b"fn main() {}")?;
    test_dir.create_dir("src/modules")?;
    test_dir.create_file("src/modules/mod.rs", b"pub mod utils;")?;

    // Binary file (simple image placeholder)
    test_dir.create_file("image.jpg", &[0xFF, 0xD8, 0xFF, 0xE0])?;

    Ok(())
}

/// Creates a tree with enough files that a walk has room to be interrupted
pub fn create_wide_tree(test_dir: &TestDir, files: usize) -> Result<()> {
    for i in 0..files {
        test_dir.create_file(&format!("file{i:03}.txt"), format!("content {i}").as_bytes())?;
    }
    Ok(())
}
