//! Provider endpoint and call-policy configuration

use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

/// One provider endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Base URL; `{location}` and `{project}` are substituted per request
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Project id substituted for `{project}`
    #[serde(default)]
    pub project_id: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 { 300 }

impl EndpointConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            project_id: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Base URL for one deployment location
    pub fn resolve_base_url(&self, location: &str) -> String {
        let url = self.base_url.replace("{location}", location);
        let url = match &self.project_id {
            Some(project) => url.replace("{project}", project),
            None => url,
        };
        url.trim_end_matches('/').to_string()
    }
}

/// Endpoints for every provider family
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_openai")]
    pub openai: EndpointConfig,

    /// Claude through Vertex AI's Anthropic publisher endpoint
    #[serde(default = "default_anthropic")]
    pub anthropic: EndpointConfig,

    /// Gemini through its OpenAI-compatible endpoint
    #[serde(default = "default_google_genai")]
    pub google_genai: EndpointConfig,

    /// Vertex AI OpenAI-compatible endpoint
    #[serde(default = "default_google")]
    pub google: EndpointConfig,
}

fn default_openai() -> EndpointConfig {
    EndpointConfig::new("https://api.openai.com/v1")
}

fn default_anthropic() -> EndpointConfig {
    EndpointConfig::new(
        "https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/publishers/anthropic/models",
    )
}

fn default_google_genai() -> EndpointConfig {
    EndpointConfig::new("https://generativelanguage.googleapis.com/v1beta/openai")
}

fn default_google() -> EndpointConfig {
    EndpointConfig::new(
        "https://{location}-aiplatform.googleapis.com/v1beta1/projects/{project}/locations/{location}/endpoints/openapi",
    )
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai: default_openai(),
            anthropic: default_anthropic(),
            google_genai: default_google_genai(),
            google: default_google(),
        }
    }
}

impl ProvidersConfig {
    /// Fill API keys missing from configuration from the providers'
    /// conventional environment variables
    pub fn from_env(mut self) -> Self {
        fill_key(&mut self.openai, "OPENAI_API_KEY");
        fill_key(&mut self.anthropic, "GOOGLE_ACCESS_TOKEN");
        fill_key(&mut self.google_genai, "GENAI_API_KEY");
        fill_key(&mut self.google, "GOOGLE_ACCESS_TOKEN");
        fill_project(&mut self.anthropic);
        fill_project(&mut self.google);
        self
    }
}

fn fill_key(endpoint: &mut EndpointConfig, var: &str) {
    if endpoint.api_key.is_none() {
        if let Ok(key) = std::env::var(var) {
            endpoint.api_key = Some(SecretString::new(key));
        }
    }
}

fn fill_project(endpoint: &mut EndpointConfig) {
    if endpoint.project_id.is_none() {
        if let Ok(project) = std::env::var("GOOGLE_CLOUD_PROJECT") {
            endpoint.project_id = Some(project);
        }
    }
}

/// Retry, breaker and sampling policy for provider calls
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// Retries after the first attempt
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,

    /// Base backoff in milliseconds, doubled per attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Consecutive failures that open a provider's circuit
    #[serde(default = "default_breaker_failures")]
    pub circuit_breaker_failures: usize,

    /// Seconds before an open circuit lets a trial call through
    #[serde(default = "default_breaker_reset")]
    pub circuit_breaker_reset_secs: u64,

    #[serde(default = "default_temperature")]
    pub default_temperature: f32,
}

fn default_retry_attempts() -> usize { 2 }
fn default_retry_backoff_ms() -> u64 { 500 }
fn default_breaker_failures() -> usize { 5 }
fn default_breaker_reset() -> u64 { 30 }
fn default_temperature() -> f32 { 0.2 }

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            circuit_breaker_failures: default_breaker_failures(),
            circuit_breaker_reset_secs: default_breaker_reset(),
            default_temperature: default_temperature(),
        }
    }
}

impl GenerationConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn breaker_reset_timeout(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker_reset_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_substitution() {
        let mut endpoint = default_google();
        endpoint.project_id = Some("acme".to_string());
        assert_eq!(
            endpoint.resolve_base_url("europe-west1"),
            "https://europe-west1-aiplatform.googleapis.com/v1beta1/projects/acme/locations/europe-west1/endpoints/openapi"
        );
        assert_eq!(
            EndpointConfig::new("http://localhost:9000/").resolve_base_url("us-central1"),
            "http://localhost:9000"
        );
    }

    #[test]
    fn test_anthropic_endpoint_is_regional() {
        let mut endpoint = default_anthropic();
        endpoint.project_id = Some("acme".to_string());
        assert_eq!(
            endpoint.resolve_base_url("us-central1"),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/acme/locations/us-central1/publishers/anthropic/models"
        );
    }

    #[test]
    fn test_generation_defaults() {
        let config: GenerationConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.retry_attempts, 2);
        assert_eq!(config.retry_backoff(), Duration::from_millis(500));
        assert_eq!(config.default_temperature, 0.2);
    }
}
