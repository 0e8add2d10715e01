//! Fixed paths inside a project root.

use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "settings.yaml";
pub const LOCK_FILE: &str = ".lock";
pub const INPUT_NEW_DIR: &str = "input_new";
pub const INPUT_ARCHIVE_DIR: &str = "input_archive";
pub const TRANSCRIPTS_DIR: &str = "temp_transcripts";
pub const OUTPUT_DIR: &str = "output";
pub const PROMPTS_DIR: &str = "prompts";
pub const MEETING_DATA_DIR: &str = "meeting_data";

/// Directories created for every new project.
pub const PROJECT_DIRS: [&str; 4] = [INPUT_NEW_DIR, INPUT_ARCHIVE_DIR, OUTPUT_DIR, PROMPTS_DIR];

/// A project root and the well-known paths below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    pub fn input_new(&self) -> PathBuf {
        self.root.join(INPUT_NEW_DIR)
    }

    pub fn input_archive(&self) -> PathBuf {
        self.root.join(INPUT_ARCHIVE_DIR)
    }

    pub fn transcripts(&self) -> PathBuf {
        self.root.join(TRANSCRIPTS_DIR)
    }

    pub fn output(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    pub fn prompts(&self) -> PathBuf {
        self.root.join(PROMPTS_DIR)
    }

    pub fn meeting_data(&self) -> PathBuf {
        self.root.join(MEETING_DATA_DIR)
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Whether a build holds this project's lock marker.
    pub fn lock_present(&self) -> bool {
        self.lock_path().exists()
    }
}
