//! meetgraph core library
//!
//! Builds and queries knowledge graphs from meeting recordings and text.
//! The graph indexer, query tool and diarization pipeline run as child
//! processes; this crate owns the project directories, their settings,
//! source staging and the per-project build lock.

pub mod archive;
pub mod config;
pub mod error;
pub mod index;
pub mod inference;
pub mod intake;
pub mod layout;
pub mod lock;
pub mod orchestrator;
pub mod registry;
pub mod runner;
pub mod search;
pub mod settings;
pub mod tool;
pub mod transcribe;

pub use error::{BuildError, ConfigurationError, IntakeError, RegistryError, SearchError};
pub use inference::{resolve_inference, InferenceConfig, InferenceOverrides};
pub use intake::SourceSet;
pub use layout::ProjectLayout;
pub use lock::{BuildGuard, LockContention};
pub use orchestrator::{BuildOutcome, BuildReport, BuildRequest, Orchestrator};
pub use registry::ProjectRegistry;
pub use runner::{TaskEvent, TaskHandle, TaskRunner};
pub use search::{run_search, SearchOutcome, SearchRequest};

use config::AppConfig;
use index::SubprocessIndexer;
use search::SubprocessSearcher;
use std::sync::Arc;
use tool::ToolCommand;
use transcribe::SubprocessTranscriber;

/// Registry configured from the application config, with an optional data root override.
pub fn registry_from_config(config: &AppConfig, data_root: Option<std::path::PathBuf>) -> ProjectRegistry {
    ProjectRegistry::new(data_root.unwrap_or_else(|| config.data_root()))
        .with_prompts_dir(config.prompts_dir())
}

/// Orchestrator wired to the configured Python tools.
pub fn orchestrator_from_config(config: &AppConfig, registry: ProjectRegistry) -> Orchestrator {
    let python = config.python_program();
    let python_path = config.python_path();
    let transcriber = SubprocessTranscriber::new(
        ToolCommand::python_module(python.clone(), &config.tools.transcriber_module),
        python_path.clone(),
    );
    let indexer = SubprocessIndexer::new(
        ToolCommand::python_module(python, &config.tools.indexer_module),
        python_path,
    );
    Orchestrator::new(registry, Arc::new(transcriber), Arc::new(indexer))
        .with_remove_sources(config.intake.remove_sources)
}

/// Searcher wired to the configured query tool.
pub fn searcher_from_config(config: &AppConfig) -> SubprocessSearcher {
    SubprocessSearcher::new(
        ToolCommand::python_module(config.python_program(), &config.tools.query_module),
        config.python_path(),
    )
}
