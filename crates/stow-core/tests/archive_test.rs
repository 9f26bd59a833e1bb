use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use stow_core::{
    inspect, Archiver, CompressionLevel, DirectoryOptions, Error, Extractor, OperationStatus,
};
use stow_testing::assertions::assert_dirs_equal;
use stow_testing::fixtures::create_nested_tree;
use stow_testing::TestDir;
use tempfile::TempDir;

fn percent_sink() -> (Arc<Mutex<Vec<u8>>>, impl Fn(u8) + Send + Sync) {
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    (reports, move |p| sink.lock().unwrap().push(p))
}

fn entry_listing(archive: &std::path::Path) -> Vec<(PathBuf, bool)> {
    let mut listing: Vec<_> = inspect(archive)
        .unwrap()
        .into_iter()
        .map(|e| (e.path, e.is_dir))
        .collect();
    listing.sort();
    listing
}

#[test]
fn test_archive_single_file() {
    let temp_dir = TempDir::new().unwrap();
    let source_file = temp_dir.path().join("notes.txt");
    let archive_path = temp_dir.path().join("notes.zip");
    fs::write(&source_file, "single file content").unwrap();

    let (reports, on_progress) = percent_sink();
    let archiver = Archiver::file(&source_file, &archive_path).with_progress(on_progress);
    archiver.archive(CompressionLevel::Balanced).unwrap();

    assert_eq!(archiver.wait(), OperationStatus::Finished);
    assert_eq!(archiver.total_items(), 1);
    assert_eq!(archiver.processed_items(), 1);
    assert!(archiver.last_error().is_none());
    assert_eq!(*reports.lock().unwrap(), vec![0, 100]);

    assert_eq!(
        entry_listing(&archive_path),
        vec![(PathBuf::from("notes.txt"), false)]
    );
}

#[test]
fn test_archive_directory_full_options() {
    // The worked example: root/{a.txt, sub/b.txt} with both flags yields
    // four entries and the 25/50/75/100 percentage ladder.
    let temp_dir = TempDir::new().unwrap();
    let source_dir = temp_dir.path().join("root");
    let archive_path = temp_dir.path().join("root.zip");
    fs::create_dir_all(source_dir.join("sub")).unwrap();
    fs::write(source_dir.join("a.txt"), "a").unwrap();
    fs::write(source_dir.join("sub/b.txt"), "b").unwrap();

    let (reports, on_progress) = percent_sink();
    let archiver = Archiver::directory(&source_dir, &archive_path, DirectoryOptions::full())
        .with_progress(on_progress);
    archiver.archive(CompressionLevel::Balanced).unwrap();

    assert_eq!(archiver.wait(), OperationStatus::Finished);
    assert_eq!(archiver.total_items(), 4);
    assert_eq!(archiver.processed_items(), 4);
    assert_eq!(*reports.lock().unwrap(), vec![0, 25, 50, 75, 100]);

    assert_eq!(
        entry_listing(&archive_path),
        vec![
            (PathBuf::from("root"), true),
            (PathBuf::from("root/a.txt"), false),
            (PathBuf::from("root/sub"), true),
            (PathBuf::from("root/sub/b.txt"), false),
        ]
    );
}

#[test]
fn test_archive_directory_default_options() {
    let temp_dir = TempDir::new().unwrap();
    let source_dir = temp_dir.path().join("root");
    let archive_path = temp_dir.path().join("root.zip");
    fs::create_dir_all(source_dir.join("sub")).unwrap();
    fs::write(source_dir.join("a.txt"), "a").unwrap();
    fs::write(source_dir.join("b.txt"), "b").unwrap();
    fs::write(source_dir.join("sub/c.txt"), "c").unwrap();

    let archiver = Archiver::directory(&source_dir, &archive_path, DirectoryOptions::default());
    archiver.archive(CompressionLevel::Balanced).unwrap();

    assert_eq!(archiver.wait(), OperationStatus::Finished);
    assert_eq!(archiver.total_items(), 2);

    // Top-level files only, no base-directory prefix
    assert_eq!(
        entry_listing(&archive_path),
        vec![
            (PathBuf::from("a.txt"), false),
            (PathBuf::from("b.txt"), false),
        ]
    );
}

#[test]
fn test_archive_directory_base_dir_only() {
    let temp_dir = TempDir::new().unwrap();
    let source_dir = temp_dir.path().join("root");
    let archive_path = temp_dir.path().join("root.zip");
    fs::create_dir_all(source_dir.join("sub")).unwrap();
    fs::write(source_dir.join("a.txt"), "a").unwrap();
    fs::write(source_dir.join("sub/c.txt"), "c").unwrap();

    let options = DirectoryOptions {
        include_base_dir: true,
        include_subdirs: false,
    };
    let archiver = Archiver::directory(&source_dir, &archive_path, options);
    archiver.archive(CompressionLevel::Balanced).unwrap();

    assert_eq!(archiver.wait(), OperationStatus::Finished);
    assert_eq!(archiver.total_items(), 2);
    assert_eq!(
        entry_listing(&archive_path),
        vec![
            (PathBuf::from("root"), true),
            (PathBuf::from("root/a.txt"), false),
        ]
    );
}

#[test]
fn test_archive_directory_subdirs_without_base_dir() {
    // Once subdirectory traversal is enabled, recursion runs with both
    // flags forced on: subtrees get their own markers and prefixes even
    // though the top level has none.
    let temp_dir = TempDir::new().unwrap();
    let source_dir = temp_dir.path().join("root");
    let archive_path = temp_dir.path().join("root.zip");
    fs::create_dir_all(source_dir.join("sub")).unwrap();
    fs::write(source_dir.join("a.txt"), "a").unwrap();
    fs::write(source_dir.join("sub/c.txt"), "c").unwrap();

    let options = DirectoryOptions {
        include_base_dir: false,
        include_subdirs: true,
    };
    let (reports, on_progress) = percent_sink();
    let archiver =
        Archiver::directory(&source_dir, &archive_path, options).with_progress(on_progress);
    archiver.archive(CompressionLevel::Balanced).unwrap();

    assert_eq!(archiver.wait(), OperationStatus::Finished);
    assert_eq!(archiver.total_items(), 3);
    assert_eq!(archiver.processed_items(), 3);
    assert_eq!(*reports.lock().unwrap(), vec![0, 33, 66, 100]);

    assert_eq!(
        entry_listing(&archive_path),
        vec![
            (PathBuf::from("a.txt"), false),
            (PathBuf::from("sub"), true),
            (PathBuf::from("sub/c.txt"), false),
        ]
    );
}

#[test]
fn test_archive_empty_directory_settles_at_100() {
    let temp_dir = TempDir::new().unwrap();
    let source_dir = temp_dir.path().join("empty");
    let archive_path = temp_dir.path().join("empty.zip");
    fs::create_dir_all(&source_dir).unwrap();

    let (reports, on_progress) = percent_sink();
    let archiver = Archiver::directory(&source_dir, &archive_path, DirectoryOptions::default())
        .with_progress(on_progress);
    archiver.archive(CompressionLevel::Balanced).unwrap();

    assert_eq!(archiver.wait(), OperationStatus::Finished);
    assert_eq!(archiver.total_items(), 0);
    assert_eq!(*reports.lock().unwrap(), vec![0, 100]);
    assert!(inspect(&archive_path).unwrap().is_empty());
}

#[test]
fn test_existing_target_without_overwrite_fails_synchronously() {
    let temp_dir = TempDir::new().unwrap();
    let source_file = temp_dir.path().join("notes.txt");
    let archive_path = temp_dir.path().join("notes.zip");
    fs::write(&source_file, "content").unwrap();
    fs::write(&archive_path, "pre-existing").unwrap();

    let (reports, on_progress) = percent_sink();
    let archiver = Archiver::file(&source_file, &archive_path).with_progress(on_progress);
    let result = archiver.archive(CompressionLevel::Balanced);

    assert!(matches!(result, Err(Error::TargetExists(_))));
    assert_eq!(archiver.status(), OperationStatus::Failed);
    assert!(matches!(
        archiver.last_error().as_deref(),
        Some(Error::TargetExists(_))
    ));
    // No worker ever ran: the callback was never invoked
    assert!(reports.lock().unwrap().is_empty());
    // The pre-existing target is untouched
    assert_eq!(fs::read(&archive_path).unwrap(), b"pre-existing");
}

#[test]
fn test_existing_target_with_overwrite_replaces() {
    let temp_dir = TempDir::new().unwrap();
    let source_file = temp_dir.path().join("notes.txt");
    let archive_path = temp_dir.path().join("notes.zip");
    fs::write(&source_file, "fresh content").unwrap();
    fs::write(&archive_path, "stale archive").unwrap();

    let archiver = Archiver::file(&source_file, &archive_path).overwrite(true);
    archiver.archive(CompressionLevel::Balanced).unwrap();

    assert_eq!(archiver.wait(), OperationStatus::Finished);
    assert_eq!(
        entry_listing(&archive_path),
        vec![(PathBuf::from("notes.txt"), false)]
    );
}

#[test]
fn test_second_start_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let source_file = temp_dir.path().join("notes.txt");
    let archive_path = temp_dir.path().join("notes.zip");
    fs::write(&source_file, "content").unwrap();

    let archiver = Archiver::file(&source_file, &archive_path);
    archiver.archive(CompressionLevel::Balanced).unwrap();
    assert_eq!(archiver.wait(), OperationStatus::Finished);

    assert!(matches!(
        archiver.archive(CompressionLevel::Balanced),
        Err(Error::AlreadyStarted)
    ));
    assert_eq!(archiver.status(), OperationStatus::Finished);
}

#[test]
fn test_missing_source_directory_fails() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("out.zip");

    let archiver = Archiver::directory(
        temp_dir.path().join("does-not-exist"),
        &archive_path,
        DirectoryOptions::full(),
    );
    archiver.archive(CompressionLevel::Balanced).unwrap();

    assert_eq!(archiver.wait(), OperationStatus::Failed);
    assert!(archiver.last_error().is_some());
    assert!(!archive_path.exists());
}

#[test]
fn test_roundtrip_single_file() {
    let temp_dir = TempDir::new().unwrap();
    let source_file = temp_dir.path().join("data.bin");
    let archive_path = temp_dir.path().join("data.zip");
    let extract_dir = temp_dir.path().join("extracted");
    fs::write(&source_file, [0u8, 159, 146, 150]).unwrap();

    let archiver = Archiver::file(&source_file, &archive_path);
    archiver.archive(CompressionLevel::Best).unwrap();
    assert_eq!(archiver.wait(), OperationStatus::Finished);

    let extractor = Extractor::new(&archive_path, &extract_dir);
    extractor.extract().unwrap();
    assert_eq!(extractor.wait(), OperationStatus::Finished);

    assert_eq!(
        fs::read(extract_dir.join("data.bin")).unwrap(),
        [0u8, 159, 146, 150]
    );
}

#[test]
fn test_roundtrip_directory_tree() {
    let source = TestDir::new().unwrap();
    create_nested_tree(&source).unwrap();

    let work = TempDir::new().unwrap();
    let archive_path = work.path().join("tree.zip");
    let extract_dir = work.path().join("out");

    let archiver = Archiver::directory(source.path(), &archive_path, DirectoryOptions::full());
    archiver.archive(CompressionLevel::Balanced).unwrap();
    assert_eq!(archiver.wait(), OperationStatus::Finished);

    let extractor = Extractor::new(&archive_path, &extract_dir);
    extractor.extract().unwrap();
    assert_eq!(extractor.wait(), OperationStatus::Finished);

    // The base directory name becomes the top-level extracted folder
    let top_level = extract_dir.join(source.path().file_name().unwrap());
    assert_dirs_equal(source.path(), &top_level).unwrap();
}
