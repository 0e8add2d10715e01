//! Path validation for user-supplied source directories.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Path validation error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// Path contains null bytes
    #[error("Path contains null byte")]
    ContainsNullByte,
    /// Path is too long
    #[error("Path too long: {0} chars")]
    TooLong(usize),
    /// Path is empty
    #[error("Path is empty")]
    Empty,
    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(String),
    /// Path does not exist or cannot be canonicalized
    #[error("Cannot canonicalize path: {0}")]
    CannotCanonicalize(String),
    /// Path has no usable final component
    #[error("Path has no directory name: {0}")]
    NoBaseName(String),
}

/// Maximum path length in characters.
pub const MAX_PATH_LENGTH: usize = 4096;

fn check_raw(path: &Path) -> Result<(), PathError> {
    let path_str = path.to_string_lossy();

    if path_str.is_empty() {
        return Err(PathError::Empty);
    }

    if path_str.contains('\0') {
        return Err(PathError::ContainsNullByte);
    }

    if path_str.len() > MAX_PATH_LENGTH {
        return Err(PathError::TooLong(path_str.len()));
    }

    Ok(())
}

/// Validate and canonicalize a directory to import from.
///
/// Rejects null bytes and overlong paths, resolves symlinks and `..`
/// through canonicalization, and requires the result to be a directory.
pub fn validate_source_directory(path: &Path) -> Result<PathBuf, PathError> {
    check_raw(path)?;

    let canonical = std::fs::canonicalize(path)
        .map_err(|e| PathError::CannotCanonicalize(e.to_string()))?;

    if !canonical.is_dir() {
        return Err(PathError::NotADirectory(canonical.display().to_string()));
    }

    Ok(canonical)
}

/// Final path component of a validated directory, as UTF-8.
pub fn directory_base_name(path: &Path) -> Result<String, PathError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| PathError::NoBaseName(path.display().to_string()))
}
