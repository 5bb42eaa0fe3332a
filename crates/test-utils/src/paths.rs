//! Temporary cache directories for tests.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Creates a temporary directory to use as a tile cache root.
///
/// The directory is automatically cleaned up when the returned `TempDir` is dropped.
pub fn temp_cache_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("tile_cache_")
        .tempdir()
        .expect("Failed to create temporary cache directory")
}

/// Every regular file below `root`, sorted.
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// True when nothing has been written below `root`.
pub fn is_empty_dir(root: &Path) -> bool {
    files_under(root).is_empty()
}
