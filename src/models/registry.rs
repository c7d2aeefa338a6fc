//! Model registry with default-entry fallback
//!
//! `resolve` never fails: an unknown or misconfigured model name silently
//! resolves to the default (first) entry so generation stays available.

use super::catalog;
use super::model_config::{ModelConfig, ModelRecord};
use thiserror::Error;
use tracing::{debug, warn};

/// Registry construction errors. Fatal at startup.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Model catalog is empty")]
    EmptyCatalog,

    #[error("Default model entry is invalid: {0}")]
    InvalidDefault(String),
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    name: String,
    config: Option<ModelConfig>,
}

/// Read-only model catalog
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    entries: Vec<CatalogEntry>,
    default: ModelConfig,
}

impl ModelRegistry {
    /// Build a registry from catalog records. The first record is the default.
    pub fn new(records: Vec<ModelRecord>) -> Result<Self, RegistryError> {
        let first = records.first().ok_or(RegistryError::EmptyCatalog)?;
        let default = first.to_config().ok_or_else(|| {
            RegistryError::InvalidDefault(first.name.clone().unwrap_or_else(|| "<unnamed>".to_string()))
        })?;

        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let Some(name) = record.name.clone() else {
                warn!("Skipping model catalog entry without a name");
                continue;
            };
            let config = record.to_config();
            if config.is_none() {
                warn!(model = %name, "Model catalog entry is incomplete and will resolve to the default");
            }
            entries.push(CatalogEntry { name, config });
        }

        debug!(models = entries.len(), default = %default.name, "Model registry built");

        Ok(Self { entries, default })
    }

    /// Registry over the built-in catalog
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::new(catalog::builtin_records())
    }

    /// Resolve a model name to a usable configuration
    pub fn resolve(&self, requested_name: &str) -> &ModelConfig {
        match self.entries.iter().find(|e| e.name == requested_name) {
            Some(CatalogEntry { config: Some(config), .. }) => config,
            Some(_) => {
                warn!(
                    requested = requested_name,
                    fallback = %self.default.name,
                    "Model entry is invalid, substituting default"
                );
                &self.default
            }
            None => {
                warn!(
                    requested = requested_name,
                    fallback = %self.default.name,
                    "Unknown model, substituting default"
                );
                &self.default
            }
        }
    }

    /// Look up a valid entry without falling back
    pub fn get(&self, name: &str) -> Option<&ModelConfig> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| e.config.as_ref())
    }

    pub fn default_model(&self) -> &ModelConfig {
        &self.default
    }

    /// Valid entries in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &ModelConfig> {
        self.entries.iter().filter_map(|e| e.config.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
