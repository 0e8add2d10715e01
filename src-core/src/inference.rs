//! Resolved inference configuration: config defaults merged with command-line overrides.

use crate::config::{CustomModels, InferenceDefaults};
use meetgraph_types::InferenceMode;
use serde::Serialize;
use tracing::debug;

/// Inference settings for one build or search.
#[derive(Clone, PartialEq, Serialize)]
pub struct InferenceConfig {
    pub mode: InferenceMode,
    pub local_api_base: String,
    pub local_model: String,
    pub cloud_api_base: String,
    pub cloud_model: String,
    #[serde(skip)]
    pub cloud_api_key: Option<String>,
    pub embedding_model: String,
    pub embedding_api_base: String,
}

// Keeps the key out of logs.
impl std::fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("mode", &self.mode)
            .field("local_api_base", &self.local_api_base)
            .field("local_model", &self.local_model)
            .field("cloud_api_base", &self.cloud_api_base)
            .field("cloud_model", &self.cloud_model)
            .field(
                "cloud_api_key",
                &self.cloud_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("embedding_model", &self.embedding_model)
            .field("embedding_api_base", &self.embedding_api_base)
            .finish()
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self::from_defaults(&InferenceDefaults::default())
    }
}

impl InferenceConfig {
    /// Configuration taken verbatim from the application defaults.
    pub fn from_defaults(defaults: &InferenceDefaults) -> Self {
        Self {
            mode: defaults.mode,
            local_api_base: defaults.local_api_base.clone(),
            local_model: defaults.local_model.clone(),
            cloud_api_base: defaults.cloud_api_base.clone(),
            cloud_model: defaults.cloud_model.clone(),
            cloud_api_key: None,
            embedding_model: defaults.embedding_model.clone(),
            embedding_api_base: defaults.embedding_api_base.clone(),
        }
    }

    /// Chat model for the active mode.
    pub fn active_model(&self) -> &str {
        match self.mode {
            InferenceMode::Local => &self.local_model,
            InferenceMode::Cloud => &self.cloud_model,
        }
    }

    /// Chat endpoint for the active mode.
    pub fn active_api_base(&self) -> &str {
        match self.mode {
            InferenceMode::Local => &self.local_api_base,
            InferenceMode::Cloud => &self.cloud_api_base,
        }
    }
}

/// Values given on the command line. `None` keeps the configured default.
#[derive(Debug, Clone, Default)]
pub struct InferenceOverrides {
    pub mode: Option<InferenceMode>,
    pub local_api_base: Option<String>,
    pub local_model: Option<String>,
    pub cloud_api_base: Option<String>,
    pub cloud_model: Option<String>,
    pub cloud_api_key: Option<String>,
    pub embedding_model: Option<String>,
    pub embedding_api_base: Option<String>,
}

/// Merge overrides over defaults.
///
/// A cloud model matching a saved preset takes the preset's endpoint and key
/// unless those were given explicitly.
pub fn resolve_inference(
    defaults: &InferenceDefaults,
    custom: &CustomModels,
    overrides: InferenceOverrides,
) -> InferenceConfig {
    let mut config = InferenceConfig::from_defaults(defaults);

    if let Some(mode) = overrides.mode {
        config.mode = mode;
    }
    if let Some(v) = overrides.local_api_base {
        config.local_api_base = v;
    }
    if let Some(v) = overrides.local_model {
        config.local_model = v;
    }
    if let Some(v) = overrides.cloud_model {
        config.cloud_model = v;
    }
    if let Some(v) = overrides.embedding_model {
        config.embedding_model = v;
    }
    if let Some(v) = overrides.embedding_api_base {
        config.embedding_api_base = v;
    }

    let preset = custom.cloud_preset(&config.cloud_model);
    if let Some(preset) = preset {
        debug!("Cloud model '{}' matches a saved preset", preset.name);
    }

    config.cloud_api_base = overrides
        .cloud_api_base
        .or_else(|| preset.and_then(|p| p.api_base.clone()))
        .unwrap_or(config.cloud_api_base);

    config.cloud_api_key = overrides
        .cloud_api_key
        .filter(|k| !k.is_empty())
        .or_else(|| preset.and_then(|p| p.api_key.clone()));

    config
}
