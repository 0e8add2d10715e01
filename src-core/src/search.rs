//! Lock-aware queries against a built project.

use crate::error::{RegistryError, SearchError};
use crate::inference::InferenceConfig;
use crate::layout::ProjectLayout;
use crate::lock::LockContention;
use crate::settings::materialize;
use crate::tool::{child_env, stderr_tail, ToolCommand};
use async_trait::async_trait;
use meetgraph_types::{AnswerLanguage, SearchMethod};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{error, info, warn};

pub const DEFAULT_COMMUNITY_LEVEL: u32 = 2;
pub const DEFAULT_RESPONSE_TYPE: &str = "multiple paragraphs";

/// Arguments for one query-tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryInvocation {
    pub project_root: PathBuf,
    pub settings_path: PathBuf,
    /// Artifacts of one indexing run; `None` lets the tool pick its default.
    pub data_dir: Option<PathBuf>,
    pub method: SearchMethod,
    pub community_level: u32,
    pub response_type: String,
    pub query: String,
}

impl QueryInvocation {
    /// Arguments after the tool prefix.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--root".into(),
            self.project_root.as_os_str().to_owned(),
            "--config".into(),
            self.settings_path.as_os_str().to_owned(),
        ];
        if let Some(data_dir) = &self.data_dir {
            args.push("--data".into());
            args.push(data_dir.as_os_str().to_owned());
        }
        args.extend([
            "--method".into(),
            self.method.as_str().into(),
            "--community_level".into(),
            self.community_level.to_string().into(),
            "--response_type".into(),
            self.response_type.clone().into(),
            self.query.clone().into(),
        ]);
        args
    }
}

/// Answers a query over an indexed project.
#[async_trait]
pub trait Searcher: Send + Sync {
    async fn query(
        &self,
        invocation: &QueryInvocation,
        env: &[(String, String)],
    ) -> Result<String, SearchError>;
}

/// Runs the query tool and returns its stdout.
#[derive(Debug, Clone)]
pub struct SubprocessSearcher {
    tool: ToolCommand,
    python_path: Vec<PathBuf>,
}

impl SubprocessSearcher {
    pub fn new(tool: ToolCommand, python_path: Vec<PathBuf>) -> Self {
        Self { tool, python_path }
    }
}

#[async_trait]
impl Searcher for SubprocessSearcher {
    async fn query(
        &self,
        invocation: &QueryInvocation,
        env: &[(String, String)],
    ) -> Result<String, SearchError> {
        let env = child_env(&self.python_path, env);
        let output = self
            .tool
            .command(invocation.args(), &env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| SearchError::Spawn {
                program: self.tool.program.clone(),
                source,
            })?;

        if !output.status.success() {
            error!("Query tool exited with {}", output.status);
            return Err(SearchError::QueryFailed {
                code: output.status.code(),
                stderr: stderr_tail(&output.stderr, 20),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// One search of one project.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub project_root: PathBuf,
    pub query: String,
    pub method: SearchMethod,
    pub community_level: u32,
    pub response_type: String,
    pub answer_language: Option<AnswerLanguage>,
    pub inference: InferenceConfig,
}

/// Result of asking for a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Answered(String),
    /// A build holds the project; nothing was queried or written.
    Rejected(LockContention),
}

/// One indexing run under `output/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRun {
    /// Run directory name (the indexer's timestamp).
    pub name: String,
    /// `<run>/artifacts` when present, else the run directory itself.
    pub data_dir: PathBuf,
}

/// Indexing runs of a project, oldest first.
///
/// A missing `output/` yields no runs.
pub fn output_runs(layout: &ProjectLayout) -> std::io::Result<Vec<OutputRun>> {
    let output = layout.output();
    if !output.is_dir() {
        return Ok(Vec::new());
    }

    let mut runs = Vec::new();
    for entry in fs::read_dir(&output)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let artifacts = path.join("artifacts");
        runs.push(OutputRun {
            name: entry.file_name().to_string_lossy().into_owned(),
            data_dir: if artifacts.is_dir() { artifacts } else { path },
        });
    }
    // Timestamped names sort chronologically.
    runs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(runs)
}

/// Join per-run answers, each under its run name.
///
/// A single answer is returned unchanged.
pub fn combine_answers(answers: Vec<(String, String)>) -> String {
    if answers.len() == 1 {
        return answers.into_iter().map(|(_, a)| a).collect();
    }
    answers
        .into_iter()
        .map(|(run, answer)| format!("## {run}\n\n{answer}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Query text with the answer-language instruction appended.
pub fn compose_query(query: &str, language: Option<AnswerLanguage>) -> String {
    match language {
        Some(lang) => format!("{query}\n\n {}", lang.instruction()),
        None => query.to_string(),
    }
}

/// Run a search unless a build holds the project.
///
/// Every indexing run under `output/` is queried, since each build only
/// indexes its own sources. Runs whose query fails are skipped with a
/// warning; the search fails only when no run answered.
pub async fn run_search(
    searcher: &dyn Searcher,
    request: &SearchRequest,
) -> Result<SearchOutcome, SearchError> {
    let layout = ProjectLayout::new(&request.project_root);
    if !layout.exists() {
        return Err(RegistryError::NotFound(display_name(layout.root())).into());
    }
    if layout.lock_present() {
        warn!("Search rejected: build in progress for {:?}", layout.root());
        return Ok(SearchOutcome::Rejected(LockContention::MarkerPresent));
    }

    let materialized = materialize(&layout, &request.inference)?;
    let runs = output_runs(&layout).map_err(|e| RegistryError::io(layout.output(), e))?;
    let targets: Vec<(String, Option<PathBuf>)> = if runs.is_empty() {
        vec![(display_name(layout.root()), None)]
    } else {
        runs.into_iter()
            .map(|run| (run.name, Some(run.data_dir)))
            .collect()
    };

    info!(
        "Searching {:?} ({} run(s)) with {} method at level {}",
        layout.root(),
        targets.len(),
        request.method,
        request.community_level
    );

    let query = compose_query(&request.query, request.answer_language);
    let mut answers = Vec::with_capacity(targets.len());
    let mut last_error = None;
    for (run, data_dir) in targets {
        let invocation = QueryInvocation {
            project_root: layout.root().to_path_buf(),
            settings_path: materialized.path.clone(),
            data_dir,
            method: request.method,
            community_level: request.community_level,
            response_type: request.response_type.clone(),
            query: query.clone(),
        };
        match searcher.query(&invocation, &materialized.env).await {
            Ok(answer) => answers.push((run, answer)),
            Err(e) => {
                warn!("Query over run {} failed: {}", run, e);
                last_error = Some(e);
            }
        }
    }

    match (answers.is_empty(), last_error) {
        (true, Some(e)) => Err(e),
        _ => Ok(SearchOutcome::Answered(combine_answers(answers))),
    }
}

fn display_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}
