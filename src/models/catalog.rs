//! Built-in model catalog
//!
//! The first entry is the registry default and must stay valid.

use super::model_config::{ModelConfig, ModelRecord, ProviderKind};

const EUROPE_WEST1: &str = "europe-west1";
const US_CENTRAL1: &str = "us-central1";

/// Built-in deployments, default first
pub fn builtin_models() -> Vec<ModelConfig> {
    use ProviderKind::*;

    vec![
        ModelConfig::new("claude-3-7-sonnet@20250219", Anthropic, 200_000, 64_000, EUROPE_WEST1, true),
        ModelConfig::new("gemini-1.5-pro-001", GoogleGenai, 2_000_000, 8192, US_CENTRAL1, true),
        ModelConfig::new("gemini-1.5-pro-002", GoogleGenai, 2_000_000, 8192, US_CENTRAL1, true),
        ModelConfig::new("gemini-1.5-flash-001", GoogleGenai, 1_000_000, 8192, US_CENTRAL1, true),
        ModelConfig::new("gemini-1.5-flash-002", GoogleGenai, 1_000_000, 8192, US_CENTRAL1, true),
        ModelConfig::new("gemini-2.0-flash-exp", GoogleGenai, 1_048_576, 8192, US_CENTRAL1, true),
        ModelConfig::new("gpt-4", OpenAi, 8192, 8192, US_CENTRAL1, false),
        ModelConfig::new("gpt-4o", OpenAi, 100_000, 8192, US_CENTRAL1, true),
        ModelConfig::new("gpt-4-turbo", OpenAi, 100_000, 8192, US_CENTRAL1, true),
        ModelConfig::new("claude-3-5-sonnet@20240620", Anthropic, 200_000, 4096, EUROPE_WEST1, true),
        ModelConfig::new("claude-3-5-sonnet-v2@20241022", Anthropic, 200_000, 4096, US_CENTRAL1, true),
        ModelConfig::new("gemini-2.0-flash-thinking-exp", GoogleGenai, 1_000_000, 64_000, US_CENTRAL1, true),
        ModelConfig::new("gemini-2.5-pro", GoogleGenai, 1_000_000, 64_000, US_CENTRAL1, true),
        ModelConfig::new("gemini-2.5-flash", GoogleGenai, 1_000_000, 64_000, US_CENTRAL1, true),
    ]
}

/// Built-in deployments in record form, for registry construction
pub fn builtin_records() -> Vec<ModelRecord> {
    builtin_models().into_iter().map(ModelRecord::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_builtin_is_valid() {
        assert!(builtin_models().iter().all(ModelConfig::is_valid));
    }

    #[test]
    fn test_default_entry_first() {
        let models = builtin_models();
        assert_eq!(models[0].name, "claude-3-7-sonnet@20250219");
        assert_eq!(models[0].context_window, 200_000);
        assert_eq!(models[0].max_output_tokens, 64_000);
    }

    #[test]
    fn test_names_unique() {
        let models = builtin_models();
        let names: HashSet<_> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names.len(), models.len());
    }
}
