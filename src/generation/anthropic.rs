//! Claude on Vertex AI
//!
//! Requests go to the regional `publishers/anthropic` endpoint of the
//! deployment location; the body follows the Messages API with
//! `anthropic_version` in place of `model`.

use super::config::EndpointConfig;
use super::provider::{ChatModel, ChunkStream, GenerationError, GenerationRequest};
use super::streaming::{chunk_stream_from_sse, SseStep};
use crate::models::ProviderKind;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

const ANTHROPIC_VERSION: &str = "vertex-2023-10-16";

/// Client for `{model}:rawPredict` and `{model}:streamRawPredict`
pub struct AnthropicClient {
    http: Client,
    endpoint: EndpointConfig,
}

impl AnthropicClient {
    pub fn new(endpoint: EndpointConfig) -> Result<Self, GenerationError> {
        let http = Client::builder()
            .timeout(endpoint.timeout())
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;
        Ok(Self { http, endpoint })
    }

    fn url(&self, request: &GenerationRequest, stream: bool) -> Result<String, GenerationError> {
        let base = self.endpoint.resolve_base_url(&request.location);
        if base.contains("{project}") {
            return Err(GenerationError::NotConfigured(ProviderKind::Anthropic));
        }
        let method = if stream { "streamRawPredict" } else { "rawPredict" };
        Ok(format!("{}/{}:{}", base, request.model, method))
    }

    async fn send(&self, request: &GenerationRequest, stream: bool) -> Result<reqwest::Response, GenerationError> {
        let url = self.url(request, stream)?;
        debug!(
            model = %request.model,
            location = %request.location,
            max_tokens = request.max_tokens,
            stream,
            "Calling Vertex Anthropic"
        );

        let mut req = self.http.post(&url).json(&build_body(request, stream));
        if let Some(token) = &self.endpoint.api_key {
            req = req.bearer_auth(token.expose_secret());
        }

        let response = req.send().await.map_err(GenerationError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GenerationError::upstream(status.as_u16(), &error_text));
        }
        Ok(response)
    }
}

fn build_body(request: &GenerationRequest, stream: bool) -> Value {
    json!({
        "anthropic_version": ANTHROPIC_VERSION,
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
        "stream": stream,
        "messages": [{
            "role": "user",
            "content": [{ "type": "text", "text": request.prompt }],
        }],
    })
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta { delta: Delta },
    MessageStop,
    Error { error: ErrorDetail },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message: String,
}

fn parse_stream_event(data: &str) -> Result<SseStep, GenerationError> {
    let event: StreamEvent = serde_json::from_str(data)
        .map_err(|e| GenerationError::InvalidResponse(format!("{e}: {data}")))?;

    match event {
        StreamEvent::ContentBlockDelta { delta } => match delta.text {
            Some(text) if !text.is_empty() => Ok(SseStep::Emit(text)),
            _ => Ok(SseStep::Skip),
        },
        StreamEvent::MessageStop => Ok(SseStep::Done),
        StreamEvent::Error { error } => {
            Err(GenerationError::Stream(format!("{}: {}", error.kind, error.message)))
        }
        StreamEvent::Other => Ok(SseStep::Skip),
    }
}

#[async_trait]
impl ChatModel for AnthropicClient {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let response = self.send(request, false).await?;
        let message: MessageResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        Ok(message
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect())
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<ChunkStream, GenerationError> {
        let response = self.send(request, true).await?;
        Ok(chunk_stream_from_sse(response, |_event, data| parse_stream_event(data)))
    }
}
