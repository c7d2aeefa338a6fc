//! Service configuration
//!
//! Layered from an optional TOML file and `SPRINTSPEED__SECTION__KEY`
//! environment variables, with `.env` loaded first. Every section has
//! defaults, so an empty environment yields a working configuration.

use crate::context::BudgetPolicy;
use crate::conversation::ConversationConfig;
use crate::error::Result;
use crate::generation::{GenerationConfig, ProvidersConfig};
use crate::models::{catalog, ModelRecord, ModelRegistry};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const ENV_PREFIX: &str = "SPRINTSPEED";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request body ceiling in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Allowed CORS origins; empty allows any
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_max_body_bytes() -> usize { 10 * 1024 * 1024 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub budget: BudgetPolicy,

    #[serde(default)]
    pub conversation: ConversationConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    /// Replaces the built-in model catalog; the first entry is the default
    #[serde(default)]
    pub models: Option<Vec<ModelRecord>>,
}

impl Config {
    /// Load configuration. With no path, `config.toml` in the working
    /// directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_with_env(path, None)
    }

    /// Load with `env` standing in for the process environment when given
    fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("config").required(false),
        };

        let config: Config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(Config {
            providers: config.providers.from_env(),
            ..config
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.budget.validate()?;
        if self.conversation.ttl_secs == 0 {
            return Err(crate::error::Error::Configuration(
                "conversation.ttl_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the model registry from the configured or built-in catalog
    pub fn registry(&self) -> Result<ModelRegistry> {
        let records = self
            .models
            .clone()
            .unwrap_or_else(catalog::builtin_records);
        Ok(ModelRegistry::new(records)?)
    }
}
