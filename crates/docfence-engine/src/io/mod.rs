use relative_path::{RelativePath, RelativePathBuf};
use std::fs;
use std::path::{Path, PathBuf};

/// Directories never descended into while scanning.
const SKIPPED_DIRS: [&str; 6] = ["node_modules", "venv", "build", "dist", "__pycache__", "target"];

/// File suffixes that may contain fences.
pub const CANDIDATE_EXTENSIONS: [&str; 4] = ["py", "md", "mdx", "svx"];

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid collection root: {0}")]
    InvalidRoot(String),
}

pub fn is_candidate(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| CANDIDATE_EXTENSIONS.contains(&ext))
}

/// Path of `path` relative to `root`, with forward slashes.
///
/// Paths outside `root` are returned as given.
pub fn relative_to(path: &Path, root: &Path) -> RelativePathBuf {
    let stripped = path.strip_prefix(root).unwrap_or(path);
    RelativePathBuf::from_path(stripped)
        .unwrap_or_else(|_| RelativePathBuf::from(stripped.to_string_lossy().replace('\\', "/")))
}

/// Find candidate files under `target`, sorted, skipping hidden and build
/// directories and anything `is_excluded` rejects.
///
/// A `target` naming a single file is returned as is, even when its suffix
/// is not a candidate; the caller decides what to do with it.
pub fn scan_candidate_files(
    target: &Path,
    root: &Path,
    is_excluded: &dyn Fn(&RelativePath) -> bool,
) -> Result<Vec<PathBuf>, IoError> {
    if !target.exists() {
        return Err(IoError::NotFound(target.to_path_buf()));
    }
    if target.is_file() {
        return Ok(vec![target.to_path_buf()]);
    }
    if !target.is_dir() {
        return Err(IoError::InvalidRoot(format!(
            "{} is neither a file nor a directory",
            target.display()
        )));
    }

    let mut files = Vec::new();
    scan_directory_recursive(target, root, is_excluded, &mut files)?;
    files.sort();
    Ok(files)
}

fn is_skipped_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.starts_with('.') || SKIPPED_DIRS.contains(&name))
}

fn scan_directory_recursive(
    dir: &Path,
    root: &Path,
    is_excluded: &dyn Fn(&RelativePath) -> bool,
    files: &mut Vec<PathBuf>,
) -> Result<(), IoError> {
    let entries = fs::read_dir(dir).map_err(IoError::Io)?;

    for entry in entries {
        let entry = entry.map_err(IoError::Io)?;
        let path = entry.path();

        if is_excluded(&relative_to(&path, root)) {
            log::debug!("Excluded {}", path.display());
            continue;
        }

        if path.is_dir() {
            if !is_skipped_dir(&path) {
                scan_directory_recursive(&path, root, is_excluded, files)?;
            }
        } else if is_candidate(&path) {
            files.push(path);
        }
    }

    Ok(())
}

pub fn validate_root(path: &Path) -> Result<(), IoError> {
    if !path.exists() || !path.is_dir() {
        return Err(IoError::InvalidRoot(format!(
            "{} is not a directory",
            path.display()
        )));
    }

    Ok(())
}
