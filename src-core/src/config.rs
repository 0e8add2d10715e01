//! Configuration management for meetgraph.
//!
//! Handles loading and saving user configuration to platform-standard config directories:
//! - Linux: `~/.config/meetgraph/config.json`
//! - macOS: `~/Library/Application Support/meetgraph/config.json`
//! - Windows: `%APPDATA%\meetgraph\config.json`

use directories::ProjectDirs;
use meetgraph_types::InferenceMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from saving the application configuration.
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,
    #[error("Failed to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where projects are stored.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Data root holding the default project and `history/`. If None, uses the platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_root: Option<String>,
}

/// Inference defaults applied when the command line does not override them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceDefaults {
    #[serde(default)]
    pub mode: InferenceMode,
    #[serde(default = "default_local_api_base")]
    pub local_api_base: String,
    #[serde(default = "default_local_model")]
    pub local_model: String,
    #[serde(default = "default_cloud_api_base")]
    pub cloud_api_base: String,
    #[serde(default = "default_cloud_model")]
    pub cloud_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_api_base")]
    pub embedding_api_base: String,
}

pub const DEFAULT_LOCAL_API_BASE: &str = "http://localhost:11434/v1/";
pub const DEFAULT_LOCAL_MODEL: &str = "llama3.2";
pub const DEFAULT_CLOUD_API_BASE: &str = "https://api.agicto.cn/v1";
pub const DEFAULT_CLOUD_MODEL: &str = "deepseek-chat";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_EMBEDDING_API_BASE: &str = "http://localhost:11434/api";

fn default_local_api_base() -> String {
    DEFAULT_LOCAL_API_BASE.to_string()
}

fn default_local_model() -> String {
    DEFAULT_LOCAL_MODEL.to_string()
}

fn default_cloud_api_base() -> String {
    DEFAULT_CLOUD_API_BASE.to_string()
}

fn default_cloud_model() -> String {
    DEFAULT_CLOUD_MODEL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_api_base() -> String {
    DEFAULT_EMBEDDING_API_BASE.to_string()
}

impl Default for InferenceDefaults {
    fn default() -> Self {
        Self {
            mode: InferenceMode::Local,
            local_api_base: default_local_api_base(),
            local_model: default_local_model(),
            cloud_api_base: default_cloud_api_base(),
            cloud_model: default_cloud_model(),
            embedding_model: default_embedding_model(),
            embedding_api_base: default_embedding_api_base(),
        }
    }
}

/// External tool locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Python interpreter. If None, `python3` or `python` is looked up on PATH.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python: Option<String>,
    #[serde(default = "default_indexer_module")]
    pub indexer_module: String,
    #[serde(default = "default_query_module")]
    pub query_module: String,
    #[serde(default = "default_transcriber_module")]
    pub transcriber_module: String,
    /// Extra import paths prepended to PYTHONPATH for child processes.
    #[serde(default)]
    pub python_path: Vec<String>,
    /// Prompt templates copied into new projects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts_dir: Option<String>,
}

fn default_indexer_module() -> String {
    "graphrag.index".to_string()
}

fn default_query_module() -> String {
    "graphrag.query".to_string()
}

fn default_transcriber_module() -> String {
    "meeting_transcriber".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            python: None,
            indexer_module: default_indexer_module(),
            query_module: default_query_module(),
            transcriber_module: default_transcriber_module(),
            python_path: Vec::new(),
            prompts_dir: None,
        }
    }
}

/// Source staging behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IntakeConfig {
    /// Move staged files instead of copying them.
    #[serde(default)]
    pub remove_sources: bool,
}

/// A saved cloud model with its own endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloudModelPreset {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// User-added model names.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CustomModels {
    #[serde(default)]
    pub local: Vec<String>,
    #[serde(default)]
    pub cloud: Vec<CloudModelPreset>,
}

impl CustomModels {
    /// Find a cloud preset by model name.
    pub fn cloud_preset(&self, name: &str) -> Option<&CloudModelPreset> {
        self.cloud.iter().find(|p| p.name == name)
    }

    /// Add a local model name. Returns false if it was already present.
    pub fn add_local(&mut self, name: &str) -> bool {
        if self.local.iter().any(|m| m == name) {
            return false;
        }
        self.local.push(name.to_string());
        true
    }

    /// Add or replace a cloud preset. Returns false if an existing entry was replaced.
    pub fn upsert_cloud(&mut self, preset: CloudModelPreset) -> bool {
        match self.cloud.iter_mut().find(|p| p.name == preset.name) {
            Some(existing) => {
                *existing = preset;
                false
            }
            None => {
                self.cloud.push(preset);
                true
            }
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub inference: InferenceDefaults,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub intake: IntakeConfig,
    #[serde(default)]
    pub custom_models: CustomModels,
}

impl AppConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the data root: configured value (tilde-expanded) or the platform data dir.
    pub fn data_root(&self) -> PathBuf {
        match &self.storage.data_root {
            Some(dir) if !dir.is_empty() => expand_path(dir),
            _ => default_data_root(),
        }
    }

    /// Resolve the Python interpreter used for every child process.
    pub fn python_program(&self) -> String {
        if let Some(python) = self.tools.python.as_deref().filter(|p| !p.is_empty()) {
            return expand_path(python).to_string_lossy().into_owned();
        }
        for candidate in ["python3", "python"] {
            if let Ok(path) = which::which(candidate) {
                debug!("Using Python interpreter at {:?}", path);
                return path.to_string_lossy().into_owned();
            }
        }
        warn!("No Python interpreter found on PATH, falling back to 'python3'");
        "python3".to_string()
    }

    /// Extra PYTHONPATH entries, tilde-expanded.
    pub fn python_path(&self) -> Vec<PathBuf> {
        self.tools.python_path.iter().map(|p| expand_path(p)).collect()
    }

    /// Prompt template directory, if configured.
    pub fn prompts_dir(&self) -> Option<PathBuf> {
        self.tools
            .prompts_dir
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(expand_path)
    }
}

/// Expand `~` and environment variables; leaves the input untouched on failure.
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            warn!("Failed to expand path '{}': {}", raw, e);
            PathBuf::from(raw)
        }
    }
}

/// Platform data directory for projects.
pub fn default_data_root() -> PathBuf {
    ProjectDirs::from("", "", "meetgraph")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("meetgraph-data"))
}

/// Get the path to the config file.
pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "meetgraph").map(|dirs| dirs.config_dir().join("config.json"))
}

/// Load configuration from the platform config path.
/// Returns default config if the file doesn't exist or is invalid.
pub fn load_config() -> AppConfig {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => {
            warn!("Could not determine config directory, using defaults");
            AppConfig::default()
        }
    }
}

/// Load configuration from an explicit path.
/// Returns default config if the file doesn't exist or is invalid.
pub fn load_config_from(path: &Path) -> AppConfig {
    if !path.exists() {
        debug!("No config file at {:?}, using defaults", path);
        return AppConfig::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
            Ok(config) => {
                debug!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                warn!("Failed to parse config file {:?}: {}. Using defaults.", path, e);
                AppConfig::default()
            }
        },
        Err(e) => {
            warn!("Failed to read config file {:?}: {}. Using defaults.", path, e);
            AppConfig::default()
        }
    }
}

/// Save configuration to the platform config path.
pub fn save_config(config: &AppConfig) -> Result<PathBuf, AppConfigError> {
    let path = config_path().ok_or(AppConfigError::NoConfigDir)?;
    save_config_to(config, &path)?;
    Ok(path)
}

/// Save configuration to an explicit path.
/// Creates the parent directory if it doesn't exist.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), AppConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| AppConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let json = serde_json::to_string_pretty(config)?;

    fs::write(path, json).map_err(|source| AppConfigError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Saved config to {:?}", path);
    Ok(())
}
