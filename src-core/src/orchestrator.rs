//! The build pipeline: lock, settings, transcription, staging, indexing.

use crate::archive::stage_inputs;
use crate::error::{error_chain, BuildError, IntakeError, RegistryError};
use crate::index::Indexer;
use crate::inference::InferenceConfig;
use crate::intake::SourceSet;
use crate::layout::ProjectLayout;
use crate::lock::{BuildGuard, LockContention};
use crate::registry::ProjectRegistry;
use crate::settings::materialize;
use crate::transcribe::{transcript_path, Transcriber};
use meetgraph_types::BuildStage;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Callback type for stage transitions.
pub type ProgressCallback = Arc<dyn Fn(BuildStage) + Send + Sync + 'static>;

/// One build of one project.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Named project, or the default project when `None`.
    pub project: Option<String>,
    pub sources: SourceSet,
    pub inference: InferenceConfig,
}

/// What a finished build produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub project_root: PathBuf,
    pub transcript: Option<PathBuf>,
    pub staged: Vec<PathBuf>,
}

/// Result of asking for a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Completed(BuildReport),
    /// Turned away before anything was changed.
    Rejected(LockContention),
}

/// Runs builds, one at a time per process and per project.
pub struct Orchestrator {
    registry: ProjectRegistry,
    transcriber: Arc<dyn Transcriber>,
    indexer: Arc<dyn Indexer>,
    remove_sources: bool,
    in_flight: Arc<AtomicBool>,
    on_progress: Option<ProgressCallback>,
}

impl Orchestrator {
    pub fn new(
        registry: ProjectRegistry,
        transcriber: Arc<dyn Transcriber>,
        indexer: Arc<dyn Indexer>,
    ) -> Self {
        Self {
            registry,
            transcriber,
            indexer,
            remove_sources: false,
            in_flight: Arc::new(AtomicBool::new(false)),
            on_progress: None,
        }
    }

    /// Move staged sources instead of copying them.
    pub fn with_remove_sources(mut self, remove_sources: bool) -> Self {
        self.remove_sources = remove_sources;
        self
    }

    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn registry(&self) -> &ProjectRegistry {
        &self.registry
    }

    fn stage(&self, stage: BuildStage) {
        info!("Build stage: {}", stage);
        if let Some(cb) = &self.on_progress {
            cb(stage);
        }
    }

    /// Run one build.
    ///
    /// The request is validated before the lock is taken. Once taken, the
    /// lock is released whether the pipeline succeeds, fails or panics.
    pub async fn run(&self, request: BuildRequest) -> Result<BuildOutcome, BuildError> {
        request
            .sources
            .validate_shape()
            .map_err(BuildError::InvalidRequest)?;

        let layout = match request.project.as_deref() {
            None => ProjectLayout::new(self.registry.ensure_default()?),
            Some(name) => {
                let layout = self.registry.layout(Some(name))?;
                if !layout.exists() {
                    return Err(RegistryError::NotFound(name.to_string()).into());
                }
                layout
            }
        };

        self.stage(BuildStage::LockAcquiring);
        let guard = match BuildGuard::acquire(&layout, &self.in_flight) {
            Ok(Ok(guard)) => guard,
            Ok(Err(contention)) => {
                warn!("Build rejected for {:?}: {}", layout.root(), contention);
                self.stage(BuildStage::Idle);
                return Ok(BuildOutcome::Rejected(contention));
            }
            Err(e) => {
                self.stage(BuildStage::Failed);
                self.stage(BuildStage::Idle);
                return Err(RegistryError::io(layout.lock_path(), e).into());
            }
        };

        let result = self.pipeline(&layout, &request).await;
        drop(guard);

        match result {
            Ok(report) => {
                self.stage(BuildStage::Done);
                self.stage(BuildStage::Idle);
                info!("Build finished for {:?}", layout.root());
                Ok(BuildOutcome::Completed(report))
            }
            Err(e) => {
                error!("Build failed for {:?}: {}", layout.root(), error_chain(&e));
                self.stage(BuildStage::Failed);
                self.stage(BuildStage::Idle);
                Err(e)
            }
        }
    }

    async fn pipeline(
        &self,
        layout: &ProjectLayout,
        request: &BuildRequest,
    ) -> Result<BuildReport, BuildError> {
        let materialized = materialize(layout, &request.inference)?;
        request.sources.validate_exist()?;

        let transcript = match &request.sources.dialogue {
            Some(dialogue) => {
                self.stage(BuildStage::Transcribing);
                let output = transcript_path(layout, dialogue);
                fs::create_dir_all(layout.transcripts())
                    .map_err(IntakeError::from)?;
                remove_stale_transcript(&output)?;
                self.transcriber
                    .transcribe(dialogue, &request.sources.speakers, &output)
                    .await?;
                Some(output)
            }
            None => None,
        };

        self.stage(BuildStage::Archiving);
        let files = request.sources.combined(transcript.clone());
        let staged = stage_inputs(layout, &files, self.remove_sources, chrono::Local::now())?;

        self.stage(BuildStage::Indexing);
        self.indexer.index(layout.root(), &materialized.env).await?;

        Ok(BuildReport {
            project_root: layout.root().to_path_buf(),
            transcript,
            staged,
        })
    }
}

/// A transcript left by an earlier build must not pass for this run's output.
fn remove_stale_transcript(output: &Path) -> Result<(), IntakeError> {
    match fs::remove_file(output) {
        Ok(()) => {
            debug!("Removed previous transcript {:?}", output);
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
