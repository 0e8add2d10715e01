//! Platform-specific logging directory resolution and log file access.

use crate::validation::{validate_log_file_name, ValidationError};
use std::path::PathBuf;
use thiserror::Error;

/// Prefix of the daily-rotated log files (`meetgraph.<date>.log`).
pub const LOG_FILE_PREFIX: &str = "meetgraph";

/// Suffix of the daily-rotated log files.
pub const LOG_FILE_SUFFIX: &str = "log";

/// Errors from reading log files back.
#[derive(Debug, Error)]
pub enum LogError {
    #[error(transparent)]
    InvalidName(#[from] ValidationError),
    #[error("Log file not found: {0}")]
    NotFound(String),
    #[error("Failed to read log directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Returns the platform-appropriate directory for log files.
///
/// | Platform | Directory |
/// |----------|-----------|
/// | Linux | `$XDG_STATE_HOME/meetgraph/logs` or `~/.local/state/meetgraph/logs` |
/// | macOS | `~/Library/Logs/meetgraph` |
/// | Windows | `%LOCALAPPDATA%\meetgraph\meetgraph\logs` |
///
/// Falls back to the system temp directory when no home directory is known.
pub fn log_dir() -> PathBuf {
    let Some(base) = directories::ProjectDirs::from("", "", "meetgraph") else {
        return std::env::temp_dir().join("meetgraph").join("logs");
    };

    #[cfg(target_os = "linux")]
    {
        base.state_dir()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| base.data_local_dir().join("state"))
            .join("logs")
    }

    #[cfg(target_os = "macos")]
    {
        // data_local_dir is ~/Library/Application Support/meetgraph
        let library = base
            .data_local_dir()
            .parent()
            .and_then(|p| p.parent())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| base.data_local_dir().to_path_buf());
        library.join("Logs").join("meetgraph")
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        base.data_local_dir().join("logs")
    }
}

/// Ensures the log directory exists, creating it if necessary.
pub fn ensure_log_dir() -> Result<PathBuf, std::io::Error> {
    let dir = log_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Lists log files in `dir`, newest name first.
///
/// A missing directory yields an empty list.
pub fn list_log_files(dir: &std::path::Path) -> Result<Vec<String>, LogError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(dir).map_err(|source| LogError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter(|name| name.starts_with(LOG_FILE_PREFIX))
        .collect();

    // Dated names sort chronologically.
    names.sort();
    names.reverse();
    Ok(names)
}

/// Reads a single log file from `dir` by bare file name.
pub fn read_log_file(dir: &std::path::Path, name: &str) -> Result<String, LogError> {
    validate_log_file_name(name)?;

    let path = dir.join(name);
    if !path.is_file() {
        return Err(LogError::NotFound(name.to_string()));
    }

    std::fs::read_to_string(&path).map_err(|source| LogError::Io {
        path: path.display().to_string(),
        source,
    })
}
