//! Source artifacts for a build: dialogue audio, speaker samples and text files.

use crate::error::IntakeError;
use crate::layout::ProjectLayout;
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::debug;

/// Everything a build reads from outside the project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSet {
    pub dialogue: Option<PathBuf>,
    /// Speaker name and sample path, in the order given.
    pub speakers: Vec<(String, PathBuf)>,
    pub text_files: Vec<PathBuf>,
}

impl SourceSet {
    /// Check the request shape: something to index, and speakers for any dialogue.
    ///
    /// Touches nothing on disk.
    pub fn validate_shape(&self) -> Result<(), String> {
        if self.dialogue.is_none() && self.text_files.is_empty() {
            return Err("provide a dialogue recording or at least one text file".to_string());
        }
        if self.dialogue.is_some() && self.speakers.is_empty() {
            return Err("a dialogue recording needs at least one speaker sample".to_string());
        }
        Ok(())
    }

    /// Every referenced file must exist. Missing paths are reported together.
    pub fn validate_exist(&self) -> Result<(), IntakeError> {
        let missing: Vec<PathBuf> = self
            .dialogue
            .iter()
            .chain(self.speakers.iter().map(|(_, p)| p))
            .chain(self.text_files.iter())
            .filter(|p| !p.is_file())
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(IntakeError::MissingSourceFiles(missing))
        }
    }

    /// Files to stage: direct text files first, then the transcript.
    pub fn combined(&self, transcript: Option<PathBuf>) -> Vec<PathBuf> {
        self.text_files.iter().cloned().chain(transcript).collect()
    }
}

/// Newest `.wav` in the project's `meeting_data/`, by modification time.
///
/// `Ok(None)` when the directory is missing or holds no recordings.
pub fn latest_meeting_audio(layout: &ProjectLayout) -> Result<Option<PathBuf>, IntakeError> {
    let dir = layout.meeting_data();
    if !dir.is_dir() {
        debug!("No meeting data directory at {:?}", dir);
        return Ok(None);
    }

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
        if !is_wav || !path.is_file() {
            continue;
        }
        let modified = fs::metadata(&path)?.modified()?;
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_shape_requires_sources() {
        let empty = SourceSet::default();
        assert!(empty.validate_shape().is_err());

        let dialogue_only = SourceSet {
            dialogue: Some("m.wav".into()),
            ..Default::default()
        };
        assert!(dialogue_only.validate_shape().is_err());

        let text_only = SourceSet {
            text_files: vec!["a.txt".into()],
            ..Default::default()
        };
        assert!(text_only.validate_shape().is_ok());

        let full = SourceSet {
            dialogue: Some("m.wav".into()),
            speakers: vec![("Alice".into(), "a.wav".into())],
            text_files: vec![],
        };
        assert!(full.validate_shape().is_ok());
    }

    #[test]
    fn test_validate_exist_names_missing() {
        let dir = tempfile::tempdir().unwrap();
        let meeting = dir.path().join("meeting.wav");
        fs::write(&meeting, b"RIFF").unwrap();
        let sources = SourceSet {
            dialogue: Some(meeting),
            speakers: vec![("Alice".into(), dir.path().join("missing.wav"))],
            text_files: vec![],
        };

        match sources.validate_exist() {
            Err(IntakeError::MissingSourceFiles(missing)) => {
                assert_eq!(missing, vec![dir.path().join("missing.wav")]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_combined_order() {
        let sources = SourceSet {
            text_files: vec!["a.txt".into(), "b.txt".into()],
            ..Default::default()
        };
        assert_eq!(
            sources.combined(Some("t.txt".into())),
            vec![PathBuf::from("a.txt"), "b.txt".into(), "t.txt".into()]
        );
        assert_eq!(sources.combined(None).len(), 2);
    }

    #[test]
    fn test_latest_meeting_audio() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        assert_eq!(latest_meeting_audio(&layout).unwrap(), None);

        fs::create_dir_all(layout.meeting_data()).unwrap();
        let older = layout.meeting_data().join("a.wav");
        let newer = layout.meeting_data().join("b.WAV");
        fs::write(&older, b"1").unwrap();
        fs::write(layout.meeting_data().join("notes.txt"), b"x").unwrap();
        fs::write(&newer, b"2").unwrap();
        fs::File::options()
            .write(true)
            .open(&older)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(120))
            .unwrap();

        assert_eq!(latest_meeting_audio(&layout).unwrap(), Some(newer));
    }
}
