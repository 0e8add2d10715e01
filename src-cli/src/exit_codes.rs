//! Exit codes for the CLI.
//!
//! These codes enable scripting integration by providing structured
//! feedback about operation results.

use meetgraph_core::{BuildError, RegistryError, SearchError};

/// Exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Operation completed successfully
    Success = 0,
    /// General/unspecified error
    GeneralError = 1,
    /// Invalid command-line arguments (including malformed project names)
    InvalidArguments = 2,
    /// Project missing, already present, busy or unreadable
    ProjectError = 3,
    /// Settings or application config could not be read or written
    ConfigurationError = 4,
    /// A build holds the project's lock marker
    BuildInProgress = 5,
    /// Build failed before or outside indexing
    BuildFailed = 6,
    /// The external indexer exited non-zero
    IndexingFailed = 7,
    /// The external query tool failed
    SearchFailed = 8,
    /// User cancelled (declined confirmation or interrupted)
    UserCancelled = 9,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitCode::Success => write!(f, "success"),
            ExitCode::GeneralError => write!(f, "general error"),
            ExitCode::InvalidArguments => write!(f, "invalid arguments"),
            ExitCode::ProjectError => write!(f, "project error"),
            ExitCode::ConfigurationError => write!(f, "configuration error"),
            ExitCode::BuildInProgress => write!(f, "build in progress"),
            ExitCode::BuildFailed => write!(f, "build failed"),
            ExitCode::IndexingFailed => write!(f, "indexing failed"),
            ExitCode::SearchFailed => write!(f, "search failed"),
            ExitCode::UserCancelled => write!(f, "user cancelled"),
        }
    }
}

impl From<&RegistryError> for ExitCode {
    fn from(err: &RegistryError) -> Self {
        match err {
            RegistryError::InvalidName(_) | RegistryError::InvalidSource(_) => {
                ExitCode::InvalidArguments
            }
            RegistryError::Settings(_) => ExitCode::ConfigurationError,
            RegistryError::AlreadyExists(_)
            | RegistryError::NotFound(_)
            | RegistryError::Busy(_)
            | RegistryError::Io { .. } => ExitCode::ProjectError,
        }
    }
}

impl From<&BuildError> for ExitCode {
    fn from(err: &BuildError) -> Self {
        match err {
            BuildError::InvalidRequest(_) => ExitCode::InvalidArguments,
            BuildError::Registry(e) => e.into(),
            BuildError::Configuration(_) => ExitCode::ConfigurationError,
            BuildError::Intake(_) | BuildError::Spawn { .. } => ExitCode::BuildFailed,
            BuildError::IndexingFailure { .. } => ExitCode::IndexingFailed,
        }
    }
}

impl From<&SearchError> for ExitCode {
    fn from(err: &SearchError) -> Self {
        match err {
            SearchError::Configuration(_) => ExitCode::ConfigurationError,
            SearchError::Registry(e) => e.into(),
            SearchError::Spawn { .. } | SearchError::QueryFailed { .. } => ExitCode::SearchFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meetgraph_core::{ConfigurationError, IntakeError};

    #[test]
    fn test_values() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::BuildInProgress.as_i32(), 5);
        assert_eq!(ExitCode::UserCancelled.as_i32(), 9);
        assert_eq!(ExitCode::IndexingFailed.to_string(), "indexing failed");
    }

    #[test]
    fn test_build_error_mapping() {
        assert_eq!(
            ExitCode::from(&BuildError::IndexingFailure { code: Some(1) }),
            ExitCode::IndexingFailed
        );
        assert_eq!(
            ExitCode::from(&BuildError::InvalidRequest("empty".into())),
            ExitCode::InvalidArguments
        );
        assert_eq!(
            ExitCode::from(&BuildError::Intake(IntakeError::MissingSourceFiles(vec![]))),
            ExitCode::BuildFailed
        );
        assert_eq!(
            ExitCode::from(&BuildError::Configuration(ConfigurationError::MissingApiKey)),
            ExitCode::ConfigurationError
        );
        assert_eq!(
            ExitCode::from(&BuildError::Registry(RegistryError::NotFound("x".into()))),
            ExitCode::ProjectError
        );
    }

    #[test]
    fn test_search_error_mapping() {
        assert_eq!(
            ExitCode::from(&SearchError::QueryFailed {
                code: Some(1),
                stderr: String::new()
            }),
            ExitCode::SearchFailed
        );
    }
}
