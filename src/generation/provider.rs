//! Provider-neutral chat interface and error classification

use crate::context::BudgetDecision;
use crate::models::ProviderKind;
use async_trait::async_trait;
use futures::Stream;
use serde::Deserialize;
use std::pin::Pin;
use thiserror::Error;

pub const CONTEXT_LENGTH_EXCEEDED: &str = "context_length_exceeded";
pub const OVERLOADED: &str = "error_overloaded_sonnet_529";
pub const RATE_LIMIT_EXCEEDED: &str = "error_rate_limit_exceeded";
pub const FAILED_TO_PROCESS: &str = "failed_to_process_your_request";

/// Generation errors
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("No client configured for provider {0}")]
    NotConfigured(ProviderKind),

    #[error("Circuit breaker is open for {0}")]
    CircuitOpen(ProviderKind),

    #[error("Request failed: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Upstream error {status}: {message}")]
    Upstream {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl GenerationError {
    /// Stable client-facing error code
    pub fn code(&self) -> &'static str {
        let text = self.to_string();
        let lowered = text.to_lowercase();

        let code = match self {
            GenerationError::Upstream { code, .. } => code.as_deref(),
            _ => None,
        };
        let status = match self {
            GenerationError::Upstream { status, .. } => Some(*status),
            _ => None,
        };

        if code == Some(CONTEXT_LENGTH_EXCEEDED) || lowered.contains(CONTEXT_LENGTH_EXCEEDED) {
            CONTEXT_LENGTH_EXCEEDED
        } else if status == Some(529) || text.contains("529") || lowered.contains("overloaded") {
            OVERLOADED
        } else if status == Some(429) || text.contains("429") || lowered.contains("rate limit") {
            RATE_LIMIT_EXCEEDED
        } else {
            FAILED_TO_PROCESS
        }
    }

    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Network(_) | GenerationError::Timeout(_) => true,
            GenerationError::Upstream { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::Timeout(err.to_string())
        } else {
            GenerationError::Network(err.to_string())
        }
    }

    /// Build an upstream error from a non-success response body, picking up
    /// the provider's own error code when the body carries one
    pub fn upstream(status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct Envelope {
            error: Option<Detail>,
        }

        #[derive(Deserialize)]
        struct Detail {
            code: Option<serde_json::Value>,
            #[serde(rename = "type")]
            kind: Option<String>,
            message: Option<String>,
        }

        let detail = serde_json::from_str::<Envelope>(body).ok().and_then(|e| e.error);
        let (code, message) = match detail {
            Some(detail) => {
                let code = match detail.code {
                    Some(serde_json::Value::String(code)) => Some(code),
                    Some(serde_json::Value::Number(code)) => Some(code.to_string()),
                    _ => detail.kind,
                };
                (code, detail.message.unwrap_or_else(|| body.to_string()))
            }
            None => (None, body.to_string()),
        };

        GenerationError::Upstream {
            status,
            code,
            message,
        }
    }
}

/// Streamed text deltas
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// One model invocation. Carries every per-call parameter so clients stay
/// stateless.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub provider_kind: ProviderKind,
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub location: String,
}

impl GenerationRequest {
    /// Request for a budget decision. The token ceiling is at least one.
    pub fn from_decision(decision: &BudgetDecision, temperature: f32) -> Self {
        let max_tokens = u32::try_from(decision.requested_output_tokens.max(1)).unwrap_or(u32::MAX);
        Self {
            provider_kind: decision.resolved_model.provider_kind,
            model: decision.resolved_model.name.clone(),
            prompt: decision.final_prompt.clone(),
            max_tokens,
            temperature,
            location: decision.resolved_model.deployment_location.clone(),
        }
    }
}

/// A chat-completion backend
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Collect the whole response
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Stream text deltas. Errors before the first chunk are returned
    /// directly; later failures arrive on the stream.
    async fn stream(&self, request: &GenerationRequest) -> Result<ChunkStream, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{FileStatus, PromptComposition};
    use crate::models::ModelConfig;

    #[test]
    fn test_error_codes() {
        let context = GenerationError::upstream(
            400,
            r#"{"error": {"message": "too long", "code": "context_length_exceeded"}}"#,
        );
        assert_eq!(context.code(), CONTEXT_LENGTH_EXCEEDED);
        assert!(!context.is_retryable());

        let overloaded = GenerationError::upstream(
            529,
            r#"{"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}"#,
        );
        assert_eq!(overloaded.code(), OVERLOADED);
        assert!(overloaded.is_retryable());

        let limited = GenerationError::upstream(429, "slow down");
        assert_eq!(limited.code(), RATE_LIMIT_EXCEEDED);
        assert!(limited.is_retryable());

        assert_eq!(
            GenerationError::Stream("Rate limit reached for requests".into()).code(),
            RATE_LIMIT_EXCEEDED
        );
        assert_eq!(GenerationError::InvalidResponse("bad json".into()).code(), FAILED_TO_PROCESS);
        assert_eq!(GenerationError::CircuitOpen(ProviderKind::OpenAi).code(), FAILED_TO_PROCESS);
    }

    #[test]
    fn test_upstream_error_without_json_body() {
        let err = GenerationError::upstream(503, "<html>unavailable</html>");
        match &err {
            GenerationError::Upstream { status, code, message } => {
                assert_eq!(*status, 503);
                assert!(code.is_none());
                assert_eq!(message, "<html>unavailable</html>");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.is_retryable());
    }

    #[test]
    fn test_request_from_decision_clamps_tokens() {
        let decision = BudgetDecision {
            final_prompt: "prompt".to_string(),
            requested_output_tokens: -12,
            unadjusted_output_tokens: -12,
            prompt_tokens: 1012,
            remaining_tokens: -12,
            resolved_model: ModelConfig::new("gpt-4", ProviderKind::OpenAi, 1000, 500, "us-central1", false),
            composition: PromptComposition {
                base_tokens: Some(1012),
                file: FileStatus::Absent,
                prior_turn_included: false,
            },
        };
        let request = GenerationRequest::from_decision(&decision, 0.2);
        assert_eq!(request.max_tokens, 1);
        assert_eq!(request.model, "gpt-4");
        assert_eq!(request.location, "us-central1");
    }
}
