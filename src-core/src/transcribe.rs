//! Dialogue transcription through the external diarization pipeline.

use crate::error::IntakeError;
use crate::layout::ProjectLayout;
use crate::tool::{child_env, stderr_tail, ToolCommand};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{error, info};

/// Packages whose absence shows up as a transcription failure.
const OPTIONAL_PACKAGES: [&str; 5] = [
    "modelscope",
    "funasr",
    "torch",
    "transformers",
    "ModuleNotFoundError",
];

/// Converts a dialogue recording into a speaker-labelled transcript.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        dialogue: &Path,
        speakers: &[(String, PathBuf)],
        output: &Path,
    ) -> Result<(), IntakeError>;
}

/// `temp_transcripts/<stem>_transcript.txt` for a dialogue file.
pub fn transcript_path(layout: &ProjectLayout, dialogue: &Path) -> PathBuf {
    let stem = dialogue
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dialogue");
    layout.transcripts().join(format!("{stem}_transcript.txt"))
}

/// Install hint when `stderr` points at a missing optional package.
pub fn missing_package_hint(stderr: &str) -> Option<String> {
    if OPTIONAL_PACKAGES.iter().any(|p| stderr.contains(p)) {
        Some(
            "Audio processing failed due to missing or conflicting packages. \
             Please ensure 'modelscope', 'funasr', 'torch' and 'transformers' are correctly installed."
                .to_string(),
        )
    } else {
        None
    }
}

/// Runs the transcriber as `<tool> --dialogue P --speakers <json> --output O`.
#[derive(Debug, Clone)]
pub struct SubprocessTranscriber {
    tool: ToolCommand,
    python_path: Vec<PathBuf>,
}

impl SubprocessTranscriber {
    pub fn new(tool: ToolCommand, python_path: Vec<PathBuf>) -> Self {
        Self { tool, python_path }
    }
}

#[async_trait]
impl Transcriber for SubprocessTranscriber {
    async fn transcribe(
        &self,
        dialogue: &Path,
        speakers: &[(String, PathBuf)],
        output: &Path,
    ) -> Result<(), IntakeError> {
        let speaker_map: serde_json::Map<String, serde_json::Value> = speakers
            .iter()
            .map(|(name, path)| (name.clone(), path.to_string_lossy().into_owned().into()))
            .collect();
        let speakers_json = serde_json::Value::Object(speaker_map).to_string();

        let env = child_env(&self.python_path, &[]);
        let args = [
            "--dialogue".into(),
            dialogue.as_os_str().to_owned(),
            "--speakers".into(),
            speakers_json.into(),
            "--output".into(),
            output.as_os_str().to_owned(),
        ];

        info!(
            "Transcribing {:?} with {} speaker sample(s)",
            dialogue,
            speakers.len()
        );

        let result = self
            .tool
            .command(args, &env)
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| IntakeError::Transcription {
                message: format!("failed to start {}: {}", self.tool.program, e),
                hint: None,
            })?;

        let stderr = String::from_utf8_lossy(&result.stderr);
        if !result.status.success() {
            error!("Transcriber exited with {}", result.status);
            return Err(IntakeError::Transcription {
                message: format!("exited with {}: {}", result.status, stderr_tail(&result.stderr, 20)),
                hint: missing_package_hint(&stderr),
            });
        }

        if !output.is_file() {
            return Err(IntakeError::Transcription {
                message: format!("no transcript was written to {}", output.display()),
                hint: missing_package_hint(&stderr),
            });
        }

        info!("Transcript saved to {:?}", output);
        Ok(())
    }
}
