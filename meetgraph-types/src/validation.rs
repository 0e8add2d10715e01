//! Input validation for project names and speaker arguments.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Project names double as directory names: ASCII letters, digits, dash, underscore.
static PROJECT_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("project name pattern is valid"));

/// Log file names produced by the rolling appender.
static LOG_FILE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]{1,128}$").expect("log file pattern is valid"));

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Project name contains characters outside `[A-Za-z0-9_-]` or is empty
    #[error(
        "Invalid project name '{0}': only English letters, numbers, hyphens and underscores are allowed"
    )]
    InvalidProjectName(String),
    /// Speaker names and sample paths do not pair up
    #[error("The number of speaker names ({names}) does not match the number of speaker paths ({paths})")]
    SpeakerCountMismatch { names: usize, paths: usize },
    /// Speaker names were given without any sample paths
    #[error("--speaker-names provided without --speaker-paths")]
    SpeakerNamesWithoutPaths,
    /// A speaker name derived or given is empty
    #[error("Speaker name for '{0}' is empty")]
    EmptySpeakerName(String),
    /// Two speakers share a name
    #[error("Duplicate speaker name: {0}")]
    DuplicateSpeakerName(String),
    /// Log file name is not a plain file name
    #[error("Invalid log file name: {0}")]
    InvalidLogFileName(String),
}

/// Validate a project name.
///
/// Examples: "demo-1", "weekly_sync", "Q3"
pub fn validate_project_name(name: &str) -> Result<(), ValidationError> {
    if !PROJECT_NAME_PATTERN.is_match(name) {
        return Err(ValidationError::InvalidProjectName(name.to_string()));
    }
    Ok(())
}

/// Validate a log file name (no separators, no traversal).
pub fn validate_log_file_name(name: &str) -> Result<(), ValidationError> {
    if !LOG_FILE_PATTERN.is_match(name) || name.starts_with('.') {
        return Err(ValidationError::InvalidLogFileName(name.to_string()));
    }
    Ok(())
}

/// Pair speaker names with their sample paths.
///
/// Names and paths pair up positionally. When only paths are given, each
/// speaker is named after its file stem. Returns `Ok(None)` when neither is
/// given. The returned `bool` is true when names were derived from paths.
/// Names must be unique, since the transcriber receives them as map keys.
pub fn pair_speakers(
    names: &[String],
    paths: &[String],
) -> Result<Option<(Vec<(String, String)>, bool)>, ValidationError> {
    let paired = pair_positionally(names, paths)?;
    if let Some((pairs, _)) = &paired {
        let mut seen = HashSet::with_capacity(pairs.len());
        if let Some((name, _)) = pairs.iter().find(|(name, _)| !seen.insert(name.as_str())) {
            return Err(ValidationError::DuplicateSpeakerName(name.clone()));
        }
    }
    Ok(paired)
}

fn pair_positionally(
    names: &[String],
    paths: &[String],
) -> Result<Option<(Vec<(String, String)>, bool)>, ValidationError> {
    match (names.is_empty(), paths.is_empty()) {
        (true, true) => Ok(None),
        (false, true) => Err(ValidationError::SpeakerNamesWithoutPaths),
        (true, false) => {
            let mut pairs = Vec::with_capacity(paths.len());
            for path in paths {
                let stem = Path::new(path)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
                if stem.is_empty() {
                    return Err(ValidationError::EmptySpeakerName(path.clone()));
                }
                pairs.push((stem, path.clone()));
            }
            Ok(Some((pairs, true)))
        }
        (false, false) => {
            if names.len() != paths.len() {
                return Err(ValidationError::SpeakerCountMismatch {
                    names: names.len(),
                    paths: paths.len(),
                });
            }
            if let Some((_, path)) = names
                .iter()
                .zip(paths)
                .find(|(name, _)| name.trim().is_empty())
            {
                return Err(ValidationError::EmptySpeakerName(path.clone()));
            }
            let pairs = names.iter().cloned().zip(paths.iter().cloned()).collect();
            Ok(Some((pairs, false)))
        }
    }
}
