//! Knowledge-graph indexing through the external indexer.

use crate::error::BuildError;
use crate::tool::{child_env, ToolCommand};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{error, info};

/// Builds or updates the graph for a project root.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// `env` carries the credential entries for the child process.
    async fn index(&self, project_root: &Path, env: &[(String, String)]) -> Result<(), BuildError>;
}

/// Runs `<tool> --root R --reporter rich --emit parquet` with inherited stdio.
#[derive(Debug, Clone)]
pub struct SubprocessIndexer {
    tool: ToolCommand,
    python_path: Vec<PathBuf>,
}

impl SubprocessIndexer {
    pub fn new(tool: ToolCommand, python_path: Vec<PathBuf>) -> Self {
        Self { tool, python_path }
    }
}

#[async_trait]
impl Indexer for SubprocessIndexer {
    async fn index(&self, project_root: &Path, env: &[(String, String)]) -> Result<(), BuildError> {
        let env = child_env(&self.python_path, env);
        let args = [
            "--root".into(),
            project_root.as_os_str().to_owned(),
            "--reporter".into(),
            "rich".into(),
            "--emit".into(),
            "parquet".into(),
        ];

        info!("Indexing {:?}", project_root);
        let status = self
            .tool
            .command(args, &env)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| BuildError::Spawn {
                program: self.tool.program.clone(),
                source,
            })?;

        if status.success() {
            info!("Indexing finished for {:?}", project_root);
            Ok(())
        } else {
            error!("Indexer exited with {}", status);
            Err(BuildError::IndexingFailure {
                code: status.code(),
            })
        }
    }
}
