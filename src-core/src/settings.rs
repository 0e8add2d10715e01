//! Per-project `settings.yaml` consumed by the indexer and query tools.
//!
//! Only the keys this crate writes are typed. Every section keeps whatever
//! else it finds in `extra`, so documents generated by the indexer's own
//! initialisation survive a read-modify-write cycle.

use crate::error::ConfigurationError;
use crate::inference::InferenceConfig;
use crate::layout::{ProjectLayout, INPUT_NEW_DIR};
use meetgraph_types::InferenceMode;
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable the settings document refers to for the cloud key.
pub const API_KEY_ENV: &str = "GRAPHRAG_API_KEY";

const ARTIFACTS_DIR: &str = "output/${timestamp}/artifacts";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub llm_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_supports_json: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retry_wait: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrent_requests: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunksSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(flatten)]
    pub extra: Mapping,
}

/// Shared shape of `storage` and `reporting`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseDirSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummarizeSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphml: Option<bool>,
    #[serde(flatten)]
    pub extra: Mapping,
}

/// Shared shape of `local_search` and `global_search`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_top_p: Option<f64>,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingsLlm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingsSection {
    #[serde(default)]
    pub llm: EmbeddingsLlm,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

/// The settings document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub chunks: ChunksSection,
    #[serde(default)]
    pub storage: BaseDirSection,
    #[serde(default)]
    pub reporting: BaseDirSection,
    #[serde(default)]
    pub summarize_descriptions: SummarizeSection,
    #[serde(default)]
    pub snapshots: SnapshotsSection,
    #[serde(default)]
    pub local_search: SearchSection,
    #[serde(default)]
    pub global_search: SearchSection,
    #[serde(default)]
    pub embeddings: EmbeddingsSection,
    #[serde(default)]
    pub input: InputSection,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl ProjectSettings {
    /// Document written into a freshly created project.
    pub fn seed() -> Self {
        let mut settings = Self::default();
        settings.apply_operational_defaults();
        settings.input.base_dir = Some(INPUT_NEW_DIR.to_string());
        settings
    }

    /// Read a document, or start from defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        if !path.exists() {
            debug!("No settings at {:?}, starting from defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&contents).map_err(|source| ConfigurationError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigurationError> {
        let yaml = serde_yaml::to_string(self).map_err(ConfigurationError::Serialize)?;
        fs::write(path, yaml).map_err(|source| ConfigurationError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Fixed tuning values applied on every build.
    pub fn apply_operational_defaults(&mut self) {
        let llm = &mut self.llm;
        llm.model_supports_json = Some(true);
        llm.max_tokens = Some(4096);
        llm.request_timeout = Some(180.0);
        llm.max_retry_wait = Some(20.0);
        llm.concurrent_requests = Some(1);
        llm.temperature = Some(0.6);
        llm.top_p = Some(0.9);

        self.chunks.size = Some(300);
        self.storage.base_dir = Some(ARTIFACTS_DIR.to_string());
        self.reporting.base_dir = Some(ARTIFACTS_DIR.to_string());
        self.summarize_descriptions.max_length = Some(1000);
        self.snapshots.graphml = Some(true);

        for search in [&mut self.local_search, &mut self.global_search] {
            search.llm_temperature = Some(0.6);
            search.llm_top_p = Some(0.9);
        }
    }

    /// Overlay the chat and embedding endpoints for `inference`.
    pub fn apply_inference(&mut self, inference: &InferenceConfig) {
        let llm = &mut self.llm;
        llm.llm_type = Some("openai_chat".to_string());
        llm.api_base = Some(inference.active_api_base().to_string());
        llm.model = Some(inference.active_model().to_string());
        match inference.mode {
            InferenceMode::Local => {
                llm.api_key = Some("local".to_string());
                llm.max_retries = Some(10000);
            }
            InferenceMode::Cloud => {
                llm.api_key = Some(format!("${{{API_KEY_ENV}}}"));
                llm.max_retries = Some(100);
            }
        }

        self.embeddings.llm.model = Some(inference.embedding_model.clone());
        self.embeddings.llm.api_base = Some(inference.embedding_api_base.clone());
        self.input.base_dir = Some(INPUT_NEW_DIR.to_string());
    }
}

/// Result of writing a project's settings.
#[derive(Debug, Clone)]
pub struct MaterializedSettings {
    pub path: PathBuf,
    pub settings: ProjectSettings,
    /// Environment entries for the child process that reads the document.
    pub env: Vec<(String, String)>,
}

/// Write the project's settings for `inference` and return what child
/// processes need to read them.
///
/// In cloud mode the key never enters the document or this process's
/// environment; it is returned as a `GRAPHRAG_API_KEY` entry instead.
pub fn materialize(
    layout: &ProjectLayout,
    inference: &InferenceConfig,
) -> Result<MaterializedSettings, ConfigurationError> {
    let env = match inference.mode {
        InferenceMode::Local => Vec::new(),
        InferenceMode::Cloud => {
            let key = inference
                .cloud_api_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .ok_or(ConfigurationError::MissingApiKey)?;
            vec![(API_KEY_ENV.to_string(), key.to_string())]
        }
    };

    let path = layout.settings_path();
    let mut settings = ProjectSettings::load(&path)?;
    settings.apply_operational_defaults();
    settings.apply_inference(inference);
    settings.save(&path)?;

    info!(
        "Wrote settings for {} mode (model {}) to {:?}",
        inference.mode,
        inference.active_model(),
        path
    );

    Ok(MaterializedSettings {
        path,
        settings,
        env,
    })
}
