//! Read-only filesystem helpers for Capsule.

use std::path::{Path, PathBuf};

use crate::error::UtilError;

/// Collect all regular files under `dir`, recursively, as paths relative to `base`.
///
/// The result is sorted by path so repeated walks over an unchanged tree
/// yield the same order. A `dir` that does not exist, or is not a directory,
/// yields no files. Symlinked directories are not descended; symlinks to
/// files are included.
///
/// # Errors
/// Returns an error if a directory under `dir` exists but cannot be read.
pub fn walk_files(dir: &Path, base: &Path) -> Result<Vec<PathBuf>, UtilError> {
    let mut files = Vec::new();
    if dir.is_dir() {
        walk_files_recursive(dir, base, &mut files)?;
    }
    files.sort();
    Ok(files)
}

fn walk_files_recursive(dir: &Path, base: &Path, out: &mut Vec<PathBuf>) -> Result<(), UtilError> {
    let entries = std::fs::read_dir(dir).map_err(|source| UtilError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| UtilError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|source| UtilError::Io {
            path: path.display().to_string(),
            source,
        })?;

        if file_type.is_dir() {
            walk_files_recursive(&path, base, out)?;
        } else if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
            // Entries come from read_dir under `base`, so the prefix always strips.
            if let Ok(relative) = path.strip_prefix(base) {
                out.push(relative.to_path_buf());
            }
        }
    }

    Ok(())
}
