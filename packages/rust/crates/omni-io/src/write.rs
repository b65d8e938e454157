//! Staged writes and removals.
//!
//! Every write lands in a hidden sibling file first and is renamed into
//! place, so a destination is only ever replaced by fully written content.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::IoError;

const STAGING_PREFIX: &str = ".omni-staged-";

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!("{STAGING_PREFIX}{}-{name}", std::process::id()))
}

fn write_error(path: &Path, source: std::io::Error) -> IoError {
    IoError::Write {
        path: path.to_string_lossy().to_string(),
        source,
    }
}

/// Write `content` to `path` through a temporary sibling and a rename.
///
/// Missing parent directories are created.
///
/// # Errors
/// Returns `IoError::Write` when the parent cannot be created, the staged
/// file cannot be written, or the rename fails. The staged file is removed
/// on failure.
pub fn write_text_staged<P: AsRef<Path>>(path: P, content: &str) -> Result<(), IoError> {
    write_bytes_staged(path, content.as_bytes())
}

/// Byte form of [`write_text_staged`], for non-text assets.
///
/// # Errors
/// Same as [`write_text_staged`].
pub fn write_bytes_staged<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<(), IoError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| write_error(path, err))?;
    }

    let staged = staging_path(path);
    if let Err(err) = fs::write(&staged, content) {
        let _ = fs::remove_file(&staged);
        return Err(write_error(path, err));
    }
    if let Err(err) = fs::rename(&staged, path) {
        let _ = fs::remove_file(&staged);
        return Err(write_error(path, err));
    }
    tracing::debug!(path = %path.display(), bytes = content.len(), "staged write committed");
    Ok(())
}

/// Remove a file, then prune directories left empty up to (not including) `stop_at`.
///
/// # Errors
/// Returns `IoError::Remove` when the file itself cannot be removed.
/// Failing to prune a directory is not an error.
pub fn remove_file_pruning<P: AsRef<Path>>(path: P, stop_at: &Path) -> Result<(), IoError> {
    let path = path.as_ref();
    fs::remove_file(path).map_err(|source| IoError::Remove {
        path: path.to_string_lossy().to_string(),
        source,
    })?;

    let mut cursor = path.parent();
    while let Some(dir) = cursor {
        if dir == stop_at || !dir.starts_with(stop_at) {
            break;
        }
        let is_empty = fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !is_empty || fs::remove_dir(dir).is_err() {
            break;
        }
        tracing::debug!(dir = %dir.display(), "pruned empty directory");
        cursor = dir.parent();
    }
    Ok(())
}
