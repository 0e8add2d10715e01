//! Error types for registry, settings, intake, build and search operations.

use meetgraph_types::path_validation::PathError;
use meetgraph_types::validation::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

/// Project registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{0}")]
    InvalidName(#[from] ValidationError),

    #[error("Project '{0}' already exists")]
    AlreadyExists(String),

    #[error("Project '{0}' not found")]
    NotFound(String),

    #[error("Project '{0}' has a build in progress")]
    Busy(String),

    #[error("Invalid import source: {0}")]
    InvalidSource(#[from] PathError),

    #[error("Failed to seed project settings: {0}")]
    Settings(#[from] ConfigurationError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RegistryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Settings document errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to write settings {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("Cloud inference mode requires an API key (set --cloud-api-key or GRAPHRAG_API_KEY)")]
    MissingApiKey,
}

/// Source staging and transcription errors.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Missing source files: {}", format_paths(.0))]
    MissingSourceFiles(Vec<PathBuf>),

    #[error("Transcription failed: {message}{}", .hint.as_deref().map(|h| format!("\n{h}")).unwrap_or_default())]
    Transcription {
        message: String,
        hint: Option<String>,
    },

    #[error("Failed to archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors that end a build run.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid build request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Indexing failed with exit code {}", .code.map(|c| c.to_string()).unwrap_or_else(|| "none (terminated by signal)".into()))]
    IndexingFailure { code: Option<i32> },
}

/// Errors from a search run.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Query failed with exit code {code:?}: {stderr}")]
    QueryFailed { code: Option<i32>, stderr: String },
}

/// Renders an error followed by its `source()` chain, one cause per line.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("\n  caused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
