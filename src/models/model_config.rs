//! Model configuration types

use serde::{Deserialize, Serialize};
use std::fmt;

/// API family a model deployment belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    GoogleGenai,
    /// Vertex AI hosted models
    Google,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::GoogleGenai => "google_genai",
            ProviderKind::Google => "google",
        }
    }

    pub fn all() -> [ProviderKind; 4] {
        [
            ProviderKind::OpenAi,
            ProviderKind::Anthropic,
            ProviderKind::GoogleGenai,
            ProviderKind::Google,
        ]
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One LLM deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub provider_kind: ProviderKind,
    pub context_window: usize,
    pub max_output_tokens: usize,
    pub deployment_location: String,
    pub supports_image_input: bool,
}

impl ModelConfig {
    pub fn new(
        name: impl Into<String>,
        provider_kind: ProviderKind,
        context_window: usize,
        max_output_tokens: usize,
        deployment_location: impl Into<String>,
        supports_image_input: bool,
    ) -> Self {
        Self {
            name: name.into(),
            provider_kind,
            context_window,
            max_output_tokens,
            deployment_location: deployment_location.into(),
            supports_image_input,
        }
    }

    /// A config is usable only when every field is populated and both
    /// token limits are positive
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
            && !self.deployment_location.is_empty()
            && self.context_window > 0
            && self.max_output_tokens > 0
    }
}

/// Partially specified model entry, as read from configuration or supplied
/// as a per-request override
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub provider_kind: Option<ProviderKind>,
    #[serde(default)]
    pub context_window: Option<usize>,
    #[serde(default)]
    pub max_output_tokens: Option<usize>,
    #[serde(default)]
    pub deployment_location: Option<String>,
    #[serde(default)]
    pub supports_image_input: Option<bool>,
}

impl ModelRecord {
    /// Convert into a [`ModelConfig`] if all six fields are present and valid
    pub fn to_config(&self) -> Option<ModelConfig> {
        let config = ModelConfig {
            name: self.name.clone()?,
            provider_kind: self.provider_kind?,
            context_window: self.context_window?,
            max_output_tokens: self.max_output_tokens?,
            deployment_location: self.deployment_location.clone()?,
            supports_image_input: self.supports_image_input?,
        };
        config.is_valid().then_some(config)
    }
}

impl From<ModelConfig> for ModelRecord {
    fn from(config: ModelConfig) -> Self {
        Self {
            name: Some(config.name),
            provider_kind: Some(config.provider_kind),
            context_window: Some(config.context_window),
            max_output_tokens: Some(config.max_output_tokens),
            deployment_location: Some(config.deployment_location),
            supports_image_input: Some(config.supports_image_input),
        }
    }
}
