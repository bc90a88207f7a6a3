use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a temporary collection root
pub fn create_test_root() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// Create a file under the root, creating parent directories as needed
pub fn create_test_file(root: &TempDir, filename: &str, content: &str) -> PathBuf {
    let file_path = root.path().join(filename);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&file_path, content).unwrap();
    file_path
}
