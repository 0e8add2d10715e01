//! Shared types for project, build and search operations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where chat completions are served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InferenceMode {
    /// A local OpenAI-compatible server (no key)
    #[default]
    Local,
    /// A hosted API reached with a bearer key
    Cloud,
}

impl InferenceMode {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "local" => Some(Self::Local),
            "cloud" => Some(Self::Cloud),
            _ => None,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
        }
    }
}

impl fmt::Display for InferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retrieval strategy passed to the query tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    /// Entity-centric search over the local neighbourhood
    #[default]
    Local,
    /// Community-summary search across the whole graph
    Global,
}

impl SearchMethod {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "local" => Some(Self::Local),
            "global" => Some(Self::Global),
            _ => None,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Global => "global",
        }
    }
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language the answer should be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerLanguage {
    English,
    Chinese,
}

impl AnswerLanguage {
    /// Parse from string (case-insensitive). Accepts `zh`/`en` shorthands.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "english" | "en" => Some(Self::English),
            "chinese" | "zh" => Some(Self::Chinese),
            _ => None,
        }
    }

    /// Instruction appended to a query.
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::English => "Answer in English",
            Self::Chinese => "Answer in Chinese",
        }
    }
}

/// Stage of a build run.
///
/// A run moves `Idle → LockAcquiring → Transcribing? → Archiving → Indexing → Done`,
/// can drop to `Failed` from any stage, and always returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
    Idle,
    LockAcquiring,
    Transcribing,
    Archiving,
    Indexing,
    Done,
    Failed,
}

impl BuildStage {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::LockAcquiring => "lock_acquiring",
            Self::Transcribing => "transcribing",
            Self::Archiving => "archiving",
            Self::Indexing => "indexing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A project as shown in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    /// Project name (directory name under the history root)
    pub name: String,
    /// Absolute path of the project root
    pub path: String,
    /// Whether a build currently holds the project's lock marker
    pub build_in_progress: bool,
}
